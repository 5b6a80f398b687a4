//! Lightweight logging setup shared by the weir crates.
//!
//! Emission is controlled by the WEIR_LOG environment variable:
//! - WEIR_LOG=off (default) - silent
//! - WEIR_LOG=info - operational logs (batch progress, repairs made)
//! - WEIR_LOG=debug - per-path diagnostic detail

use std::sync::Once;

// Re-export emit so the macros can expand in downstream crates
pub use emit;

static INIT: Once = Once::new();

/// Initialize logging from the WEIR_LOG environment variable.
///
/// Safe to call more than once; only the first call takes effect.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let level = std::env::var("WEIR_LOG").unwrap_or_else(|_| "off".to_string());

        let min = match level.as_str() {
            "off" => return,
            "debug" => emit::Level::Debug,
            "info" => emit::Level::Info,
            "warn" => emit::Level::Warn,
            "error" => emit::Level::Error,
            other => {
                eprintln!("Warning: unknown WEIR_LOG value '{}', using 'info'", other);
                emit::Level::Info
            }
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(min))
            .init();

        // The runtime must outlive the process; there is no shutdown hook.
        std::mem::forget(rt);
    });
}

/// Log an operational event (a path checked, a repair made, a batch summary).
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log per-path diagnostic detail (replica states, metadata field decisions).
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log a recoverable condition (a retried connection, a skipped entry).
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log a failure (a path that could not be checked or repaired).
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

pub use init_diagnostics as init;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_safe_to_call_multiple_times() {
        init_diagnostics();
        init_diagnostics();
        init_diagnostics();
    }

    #[test]
    fn test_macros_compile() {
        log_info!("checked path");
        log_debug!("replica detail {value}", value: 2);
        log_warn!("retrying");
        log_error!("repair failed");
    }
}
