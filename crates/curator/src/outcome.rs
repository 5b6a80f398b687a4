//! Per-path outcomes and batch accounting.

use crate::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};

/// The result of processing one input path. Produced exactly once per path.
#[derive(Debug)]
pub enum WorkOutcome {
    /// The required state already held; nothing was written.
    Passed,
    /// The store was mutated and the required state now holds.
    Repaired,
    /// The required state does not hold or could not be reached.
    Failed(Error),
    /// Nothing to do for this entry (copy onto an identical destination).
    Skipped,
}

impl WorkOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, WorkOutcome::Failed(_))
    }

    pub fn is_repaired(&self) -> bool {
        matches!(self, WorkOutcome::Repaired)
    }
}

/// Which outcomes have their path written to the output stream.
#[derive(Debug, Clone, Copy)]
pub struct PrintFlags {
    pub passed: bool,
    pub repaired: bool,
    pub failed: bool,
}

impl PrintFlags {
    pub fn matches(&self, outcome: &WorkOutcome) -> bool {
        match outcome {
            WorkOutcome::Passed | WorkOutcome::Skipped => self.passed,
            WorkOutcome::Repaired => self.repaired,
            WorkOutcome::Failed(_) => self.failed,
        }
    }
}

/// Final accounting of one batch run.
///
/// `passed` counts every successful outcome (passes, repairs, and skips);
/// `repaired` additionally counts those that mutated the store. For every
/// run, `processed == passed + errors`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: u64,
    pub passed: u64,
    pub repaired: u64,
    pub errors: u64,
}

impl BatchSummary {
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

/// Live counters shared by the workers; snapshotted into a [`BatchSummary`]
/// when the run completes. Increments are atomic so no outcome is lost.
#[derive(Debug, Default)]
pub(crate) struct BatchCounters {
    processed: AtomicU64,
    passed: AtomicU64,
    repaired: AtomicU64,
    errors: AtomicU64,
}

impl BatchCounters {
    pub(crate) fn record(&self, outcome: &WorkOutcome) {
        let _ = self.processed.fetch_add(1, Ordering::Relaxed);
        match outcome {
            WorkOutcome::Passed | WorkOutcome::Skipped => {
                let _ = self.passed.fetch_add(1, Ordering::Relaxed);
            }
            WorkOutcome::Repaired => {
                let _ = self.passed.fetch_add(1, Ordering::Relaxed);
                let _ = self.repaired.fetch_add(1, Ordering::Relaxed);
            }
            WorkOutcome::Failed(_) => {
                let _ = self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn summary(&self) -> BatchSummary {
        BatchSummary {
            processed: self.processed.load(Ordering::Relaxed),
            passed: self.passed.load(Ordering::Relaxed),
            repaired: self.repaired.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot::ObjectPath;

    #[test]
    fn test_counters_conserve_outcomes() {
        let counters = BatchCounters::default();
        counters.record(&WorkOutcome::Passed);
        counters.record(&WorkOutcome::Repaired);
        counters.record(&WorkOutcome::Skipped);
        counters.record(&WorkOutcome::Failed(Error::NoReplicas {
            path: ObjectPath::parse("/x").expect("path"),
        }));

        let summary = counters.summary();
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.passed, 3);
        assert_eq!(summary.repaired, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.processed, summary.passed + summary.errors);
    }

    #[test]
    fn test_print_flags_select_outcomes() {
        let flags = PrintFlags {
            passed: false,
            repaired: true,
            failed: true,
        };
        assert!(!flags.matches(&WorkOutcome::Passed));
        assert!(!flags.matches(&WorkOutcome::Skipped));
        assert!(flags.matches(&WorkOutcome::Repaired));
        assert!(flags.matches(&WorkOutcome::Failed(Error::NoReplicas {
            path: ObjectPath::parse("/x").expect("path"),
        })));
    }
}
