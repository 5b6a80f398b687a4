//! Replica state as reported by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored copy of a data object's content on a specific resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    /// Identifier of the storage resource holding this copy.
    pub resource: String,
    /// Hex digest of the stored content, if the store has computed one.
    pub checksum: Option<String>,
    /// Whether the store considers this copy current (non-stale).
    pub valid: bool,
    /// Store-assigned replica number, unique within the object.
    pub index: u32,
    /// When the replica was created, per the store catalog.
    pub created_at: DateTime<Utc>,
}

/// The expected-checksum metadata value recorded against a data object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumRecord {
    pub value: String,
}

impl ChecksumRecord {
    pub fn new(value: impl Into<String>) -> Self {
        ChecksumRecord {
            value: value.into(),
        }
    }
}

/// Split a replica set into valid and invalid subsets.
pub fn partition_validity(replicas: &[Replica]) -> (Vec<&Replica>, Vec<&Replica>) {
    replicas.iter().partition(|r| r.valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replica(resource: &str, valid: bool, index: u32) -> Replica {
        Replica {
            resource: resource.to_string(),
            checksum: Some("abc".to_string()),
            valid,
            index,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_partition_validity() {
        let replicas = vec![
            replica("res-a", true, 0),
            replica("res-b", false, 1),
            replica("res-c", true, 2),
        ];
        let (valid, invalid) = partition_validity(&replicas);
        assert_eq!(valid.iter().map(|r| r.index).collect::<Vec<_>>(), [0, 2]);
        assert_eq!(invalid.iter().map(|r| r.index).collect::<Vec<_>>(), [1]);
    }
}
