//! Batch integrity verification and repair for a replica-based depot.
//!
//! The engine reads a stream of object paths and dispatches per-path
//! checks and repairs across a bounded pool of worker tasks backed by a
//! bounded pool of store connections. Per-path failures are isolated:
//! each input path yields exactly one outcome, and the final counters are
//! a fixed function of the input regardless of concurrency.
//!
//! Checks are strictly read-only; repairs trim invalid replicas, restore
//! missing valid ones, and rewrite absent or incorrect common metadata,
//! and are idempotent so a batch can be re-run after partial failure.
//! Copying is a separate single-traversal walk with skip-existing
//! semantics driven by checksum comparison.

mod batch;
mod checksum;
mod copy;
mod engine;
mod error;
mod journal;
mod metadata;
mod outcome;
mod pool;
mod remove;
mod replicas;

pub use batch::{BatchRunner, UnitOfWork};
pub use checksum::{
    ChecksumChecker, ChecksumRecordRepairer, RecordPolicy, consistent_valid_checksum,
};
pub use copy::{CopyEngine, CopyOptions, CopyStats};
pub use engine::{
    BatchOptions, CheckChecksumsOptions, CheckMetadataOptions, CheckReplicasOptions, Curator,
    RepairChecksumsOptions, RepairMetadataOptions, RepairReplicasOptions,
};
pub use error::{Error, Result};
pub use journal::{EmitJournal, Journal, JournalEntry, JournalLevel, MemoryJournal};
pub use metadata::{MetadataChecker, MetadataRepairer, PLACEHOLDER_CREATOR};
pub use outcome::{BatchSummary, PrintFlags, WorkOutcome};
pub use pool::{ClientPool, PooledClient};
pub use remove::{ScriptOptions, write_safe_remove_commands, write_safe_remove_script};
pub use replicas::{ReplicaChecker, ReplicaRepairer};
