//! Injected logging capability.
//!
//! Components report through a `Journal` handle passed at construction
//! rather than ambient global state; the process decides once where those
//! events go. The interface is deliberately minimal: informational events
//! and failures, optionally tied to a depot path.

use depot::ObjectPath;
use std::sync::Arc;
use std::sync::Mutex;

/// Minimal logging interface handed to every engine component.
pub trait Journal: Send + Sync {
    fn info(&self, path: Option<&ObjectPath>, message: &str);
    fn error(&self, path: Option<&ObjectPath>, message: &str);
}

/// Forwards journal events to the process-wide diagnostics setup.
#[derive(Debug, Default, Clone)]
pub struct EmitJournal;

impl Journal for EmitJournal {
    fn info(&self, path: Option<&ObjectPath>, message: &str) {
        match path {
            Some(path) => {
                let path = path.as_str();
                diagnostics::log_info!("{message} path={path}", message, path);
            }
            None => diagnostics::log_info!("{message}", message),
        }
    }

    fn error(&self, path: Option<&ObjectPath>, message: &str) {
        match path {
            Some(path) => {
                let path = path.as_str();
                diagnostics::log_error!("{message} path={path}", message, path);
            }
            None => diagnostics::log_error!("{message}", message),
        }
    }
}

/// Severity of a recorded [`JournalEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalLevel {
    Info,
    Error,
}

/// One recorded event.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub level: JournalLevel,
    pub path: Option<ObjectPath>,
    pub message: String,
}

/// Records events in memory; used by tests to assert on what was reported.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl MemoryJournal {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryJournal::default())
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().expect("journal mutex poisoned").clone()
    }

    /// Messages at the given level, for quick assertions.
    pub fn messages(&self, level: JournalLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .map(|e| e.message)
            .collect()
    }

    fn push(&self, level: JournalLevel, path: Option<&ObjectPath>, message: &str) {
        self.entries
            .lock()
            .expect("journal mutex poisoned")
            .push(JournalEntry {
                level,
                path: path.cloned(),
                message: message.to_string(),
            });
    }
}

impl Journal for MemoryJournal {
    fn info(&self, path: Option<&ObjectPath>, message: &str) {
        self.push(JournalLevel::Info, path, message);
    }

    fn error(&self, path: Option<&ObjectPath>, message: &str) {
        self.push(JournalLevel::Error, path, message);
    }
}
