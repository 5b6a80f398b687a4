//! Error taxonomy for integrity checks, repairs, and copies.

use depot::{DepotError, ObjectPath};

pub type Result<T> = std::result::Result<T, Error>;

/// Why a path failed a check, a repair, or a copy.
///
/// Every failure mode carries fixed, typed fields; nothing here is an
/// untyped bag of attributes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Depot(#[from] DepotError),

    /// The object has no valid replica at all (including the empty set).
    #[error("no valid replicas: {path}")]
    NoReplicas { path: ObjectPath },

    /// A valid replica is missing its checksum, so agreement cannot be
    /// established.
    #[error("valid replica without checksum: {path}")]
    ReplicaWithoutChecksum { path: ObjectPath },

    /// Valid replicas disagree among themselves.
    #[error("valid replicas disagree on checksum: {path} {checksums:?}")]
    InconsistentReplicas {
        path: ObjectPath,
        checksums: Vec<String>,
    },

    /// No checksum record exists and policy requires one.
    #[error("no checksum record: {path}")]
    MissingChecksumRecord { path: ObjectPath },

    /// The checksum record disagrees with the (consistent) replica checksum.
    #[error("checksum record mismatch: {path} (record {record}, replicas {replica})")]
    ChecksumMismatch {
        path: ObjectPath,
        record: String,
        replica: String,
    },

    /// The replica set does not have the expected shape (read-only check).
    #[error(
        "replica set incomplete: {path} ({valid} valid, {invalid} invalid, expected {expected})"
    )]
    IncompleteReplicas {
        path: ObjectPath,
        valid: usize,
        invalid: usize,
        expected: usize,
    },

    /// Repair could not reach the target number of valid replicas.
    #[error("cannot reach {wanted} valid replicas for {path} (reached {reached})")]
    RepairExhausted {
        path: ObjectPath,
        wanted: usize,
        reached: usize,
    },

    /// Invalid replicas could not all be trimmed.
    #[error("failed to trim {failed} invalid replicas: {path}")]
    TrimIncomplete { path: ObjectPath, failed: usize },

    /// Common metadata fields are absent (read-only check).
    #[error("common metadata incomplete: {path} (missing {missing})")]
    IncompleteMetadata { path: ObjectPath, missing: String },

    /// Copy destination exists and `exist_ok` was not requested.
    #[error("destination already exists: {path}")]
    DestinationExists { path: ObjectPath },

    /// Copy-time checksum conflict; fatal to the whole copy invocation.
    #[error("checksum conflict at {path}: expected {expected}, observed {observed}")]
    ChecksumConflict {
        path: ObjectPath,
        expected: String,
        observed: String,
    },

    /// A non-empty collection cannot be copied without `recurse`.
    #[error("recursion required to copy non-empty collection: {path}")]
    RecurseRequired { path: ObjectPath },

    /// A collection cannot be copied onto a data object.
    #[error("cannot copy collection {source} onto data object {dest}")]
    InvalidCopy {
        source: ObjectPath,
        dest: ObjectPath,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Transient failures retried on a fresh client before counting as
    /// a failed outcome.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Depot(e) if e.is_transient())
    }
}
