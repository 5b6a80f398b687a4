//! Checksum consistency checking and checksum-record repair.

use crate::batch::UnitOfWork;
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::outcome::WorkOutcome;
use async_trait::async_trait;
use depot::replica::partition_validity;
use depot::{DepotClient, MetaField, ObjectPath};
use std::collections::BTreeSet;
use std::sync::Arc;

/// What checksum checking does when an object has no checksum record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordPolicy {
    /// Replica agreement alone passes; the record is optional.
    #[default]
    Lenient,
    /// A missing record fails the check.
    Require,
}

/// The single checksum shared by all valid replicas of `path`.
///
/// Fails if there is no valid replica, a valid replica has no checksum, or
/// valid replicas disagree. This is the consistency question asked by the
/// checker, the copy engine, and the metadata repairers alike.
pub async fn consistent_valid_checksum(
    client: &dyn DepotClient,
    path: &ObjectPath,
) -> Result<String> {
    let replicas = client.get_replicas(path).await?;
    let (valid, _) = partition_validity(&replicas);
    if valid.is_empty() {
        return Err(Error::NoReplicas { path: path.clone() });
    }
    let mut checksums = BTreeSet::new();
    for replica in &valid {
        match &replica.checksum {
            Some(checksum) => {
                let _ = checksums.insert(checksum.clone());
            }
            None => {
                return Err(Error::ReplicaWithoutChecksum { path: path.clone() });
            }
        }
    }
    if checksums.len() > 1 {
        return Err(Error::InconsistentReplicas {
            path: path.clone(),
            checksums: checksums.into_iter().collect(),
        });
    }
    Ok(checksums.into_iter().next().expect("one checksum"))
}

/// Read-only verification that replicas agree and match the record.
pub struct ChecksumChecker {
    policy: RecordPolicy,
    journal: Arc<dyn Journal>,
}

impl ChecksumChecker {
    pub fn new(policy: RecordPolicy, journal: Arc<dyn Journal>) -> Self {
        ChecksumChecker { policy, journal }
    }

    /// Never mutates the store.
    pub async fn verify(&self, client: &dyn DepotClient, path: &ObjectPath) -> Result<()> {
        let replica_sum = consistent_valid_checksum(client, path).await?;
        match client.get_checksum_record(path).await? {
            Some(record) if record.value == replica_sum => Ok(()),
            Some(record) => Err(Error::ChecksumMismatch {
                path: path.clone(),
                record: record.value,
                replica: replica_sum,
            }),
            None => match self.policy {
                RecordPolicy::Lenient => Ok(()),
                RecordPolicy::Require => {
                    Err(Error::MissingChecksumRecord { path: path.clone() })
                }
            },
        }
    }
}

#[async_trait]
impl UnitOfWork for ChecksumChecker {
    async fn run(&self, client: &dyn DepotClient, path: &ObjectPath) -> WorkOutcome {
        match self.verify(client, path).await {
            Ok(()) => {
                self.journal.info(Some(path), "checksums correct");
                WorkOutcome::Passed
            }
            Err(err) => {
                self.journal
                    .error(Some(path), &format!("checksum check failed: {err}"));
                WorkOutcome::Failed(err)
            }
        }
    }
}

/// Fills a missing checksum record from consistent replica checksums.
///
/// Never guesses: a record that disagrees with the replicas, or replicas
/// that disagree among themselves, need human assessment and fail instead
/// of being overwritten.
pub struct ChecksumRecordRepairer {
    journal: Arc<dyn Journal>,
}

impl ChecksumRecordRepairer {
    pub fn new(journal: Arc<dyn Journal>) -> Self {
        ChecksumRecordRepairer { journal }
    }

    async fn attempt(&self, client: &dyn DepotClient, path: &ObjectPath) -> Result<WorkOutcome> {
        let replica_sum = consistent_valid_checksum(client, path).await?;
        match client.get_checksum_record(path).await? {
            Some(record) if record.value == replica_sum => {
                self.journal.info(Some(path), "checksum record matches");
                Ok(WorkOutcome::Passed)
            }
            Some(record) => Err(Error::ChecksumMismatch {
                path: path.clone(),
                record: record.value,
                replica: replica_sum,
            }),
            None => {
                client
                    .set_metadata(path, MetaField::Checksum, &replica_sum)
                    .await?;
                self.journal
                    .info(Some(path), "checksum record was missing; written");
                Ok(WorkOutcome::Repaired)
            }
        }
    }
}

#[async_trait]
impl UnitOfWork for ChecksumRecordRepairer {
    async fn run(&self, client: &dyn DepotClient, path: &ObjectPath) -> WorkOutcome {
        match self.attempt(client, path).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.journal
                    .error(Some(path), &format!("checksum repair failed: {err}"));
                WorkOutcome::Failed(err)
            }
        }
    }
}
