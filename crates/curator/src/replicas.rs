//! Replica-set checking and repair.

use crate::batch::UnitOfWork;
use crate::checksum::consistent_valid_checksum;
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::outcome::WorkOutcome;
use async_trait::async_trait;
use depot::replica::partition_validity;
use depot::{DepotClient, ObjectPath};
use std::sync::Arc;

/// Read-only check that a data object has exactly the expected replica set:
/// the target number of valid replicas, no invalid ones, and consistent
/// checksums across them (matching the record when one exists).
pub struct ReplicaChecker {
    target: usize,
    journal: Arc<dyn Journal>,
}

impl ReplicaChecker {
    pub fn new(target: usize, journal: Arc<dyn Journal>) -> Self {
        ReplicaChecker { target, journal }
    }

    async fn verify(&self, client: &dyn DepotClient, path: &ObjectPath) -> Result<()> {
        let replicas = client.get_replicas(path).await?;
        let (valid, invalid) = partition_validity(&replicas);
        if valid.len() != self.target || !invalid.is_empty() {
            return Err(Error::IncompleteReplicas {
                path: path.clone(),
                valid: valid.len(),
                invalid: invalid.len(),
                expected: self.target,
            });
        }
        let replica_sum = consistent_valid_checksum(client, path).await?;
        if let Some(record) = client.get_checksum_record(path).await?
            && record.value != replica_sum
        {
            return Err(Error::ChecksumMismatch {
                path: path.clone(),
                record: record.value,
                replica: replica_sum,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for ReplicaChecker {
    async fn run(&self, client: &dyn DepotClient, path: &ObjectPath) -> WorkOutcome {
        match self.verify(client, path).await {
            Ok(()) => {
                self.journal.info(Some(path), "replicas complete");
                WorkOutcome::Passed
            }
            Err(err) => {
                self.journal
                    .error(Some(path), &format!("replica check failed: {err}"));
                WorkOutcome::Failed(err)
            }
        }
    }
}

/// Brings a data object's replica set to the configured target: trims
/// invalid replicas and creates missing valid ones on candidate resources.
///
/// Valid replicas are never deleted. A surplus of valid replicas beyond the
/// target is journaled as an anomaly and otherwise left alone.
pub struct ReplicaRepairer {
    target: usize,
    resources: Vec<String>,
    journal: Arc<dyn Journal>,
}

impl ReplicaRepairer {
    /// `resources` are the candidate locations for new replicas, tried in
    /// order, skipping any resource already holding a valid replica.
    pub fn new(target: usize, resources: Vec<String>, journal: Arc<dyn Journal>) -> Self {
        ReplicaRepairer {
            target,
            resources,
            journal,
        }
    }

    async fn attempt(&self, client: &dyn DepotClient, path: &ObjectPath) -> Result<WorkOutcome> {
        let replicas = client.get_replicas(path).await?;
        let (valid, invalid) = partition_validity(&replicas);
        if valid.is_empty() {
            return Err(Error::NoReplicas { path: path.clone() });
        }

        let mut mutated = false;

        // Trim invalid replicas. One failed trim does not stop the rest,
        // but the path does not count as repaired while any remain.
        let mut trim_failures = 0usize;
        for replica in &invalid {
            match client.remove_replica(path, replica.index).await {
                Ok(()) => {
                    mutated = true;
                    self.journal.info(
                        Some(path),
                        &format!("trimmed invalid replica {}", replica.index),
                    );
                }
                Err(err) if err.is_transient() => return Err(err.into()),
                Err(err) => {
                    trim_failures += 1;
                    self.journal.error(
                        Some(path),
                        &format!("failed to trim replica {}: {err}", replica.index),
                    );
                }
            }
        }

        // Create replicas until the target is met, on resources that do
        // not already hold a valid copy.
        let mut valid_count = valid.len();
        if valid_count < self.target {
            let occupied: Vec<&str> = valid.iter().map(|r| r.resource.as_str()).collect();
            for resource in &self.resources {
                if valid_count >= self.target {
                    break;
                }
                if occupied.contains(&resource.as_str()) {
                    continue;
                }
                match client.create_replica(path, resource).await {
                    Ok(()) => {
                        mutated = true;
                        valid_count += 1;
                        self.journal
                            .info(Some(path), &format!("created replica on {resource}"));
                    }
                    Err(err) if err.is_transient() => return Err(err.into()),
                    Err(err) => {
                        self.journal.error(
                            Some(path),
                            &format!("failed to create replica on {resource}: {err}"),
                        );
                    }
                }
            }
            if valid_count < self.target {
                return Err(Error::RepairExhausted {
                    path: path.clone(),
                    wanted: self.target,
                    reached: valid_count,
                });
            }
        }

        if valid_count > self.target {
            // Anomaly, by policy never corrected: a valid replica is never
            // deleted here.
            self.journal.info(
                Some(path),
                &format!(
                    "{valid_count} valid replicas exceed target {}; surplus left in place",
                    self.target
                ),
            );
        }

        if trim_failures > 0 {
            return Err(Error::TrimIncomplete {
                path: path.clone(),
                failed: trim_failures,
            });
        }

        // The final state must satisfy the replica invariant: consistent
        // checksums across valid replicas, matching the record if present.
        let replica_sum = consistent_valid_checksum(client, path).await?;
        if let Some(record) = client.get_checksum_record(path).await?
            && record.value != replica_sum
        {
            return Err(Error::ChecksumMismatch {
                path: path.clone(),
                record: record.value,
                replica: replica_sum,
            });
        }

        if mutated {
            Ok(WorkOutcome::Repaired)
        } else {
            self.journal.info(Some(path), "replicas already complete");
            Ok(WorkOutcome::Passed)
        }
    }
}

#[async_trait]
impl UnitOfWork for ReplicaRepairer {
    async fn run(&self, client: &dyn DepotClient, path: &ObjectPath) -> WorkOutcome {
        match self.attempt(client, path).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.journal
                    .error(Some(path), &format!("replica repair failed: {err}"));
                WorkOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::MemoryJournal;
    use depot::MemoryDepot;

    fn path(s: &str) -> ObjectPath {
        ObjectPath::parse(s).expect("test path")
    }

    fn repairer(target: usize) -> ReplicaRepairer {
        ReplicaRepairer::new(
            target,
            vec!["res-a".to_string(), "res-b".to_string(), "res-c".to_string()],
            MemoryJournal::new(),
        )
    }

    #[tokio::test]
    async fn test_repair_trims_invalid_and_restores_target() {
        let depot = MemoryDepot::new();
        let obj = path("/a/obj");
        depot.put_object(&obj, b"data", &["res-a", "res-b"]).await.expect("put");
        depot.invalidate_replica(&obj, 1).await.expect("invalidate");

        let client = depot.client();
        let outcome = repairer(2).run(client.as_ref(), &obj).await;
        assert!(outcome.is_repaired());

        let replicas = client.get_replicas(&obj).await.expect("replicas");
        assert_eq!(replicas.len(), 2);
        assert!(replicas.iter().all(|r| r.valid));
        assert_eq!(replicas[0].checksum, replicas[1].checksum);
    }

    #[tokio::test]
    async fn test_repair_is_idempotent() {
        let depot = MemoryDepot::new();
        let obj = path("/a/obj");
        depot.put_object(&obj, b"data", &["res-a", "res-b"]).await.expect("put");
        depot.invalidate_replica(&obj, 1).await.expect("invalidate");

        let client = depot.client();
        let work = repairer(2);

        let first = work.run(client.as_ref(), &obj).await;
        assert!(first.is_repaired());
        // Nothing left to do on the second run.
        let second = work.run(client.as_ref(), &obj).await;
        assert!(matches!(second, WorkOutcome::Passed));
    }

    #[tokio::test]
    async fn test_surplus_valid_replicas_are_reported_not_deleted() {
        let depot = MemoryDepot::new();
        let obj = path("/a/obj");
        depot
            .put_object(&obj, b"data", &["res-a", "res-b", "res-c"])
            .await
            .expect("put");

        let journal = MemoryJournal::new();
        let work = ReplicaRepairer::new(2, vec!["res-a".to_string()], journal.clone());
        let client = depot.client();
        let outcome = work.run(client.as_ref(), &obj).await;
        assert!(matches!(outcome, WorkOutcome::Passed));

        // All three replicas survive.
        let replicas = client.get_replicas(&obj).await.expect("replicas");
        assert_eq!(replicas.len(), 3);
        let anomalies: Vec<_> = journal
            .messages(crate::journal::JournalLevel::Info)
            .into_iter()
            .filter(|m| m.contains("surplus"))
            .collect();
        assert_eq!(anomalies.len(), 1);
    }

    #[tokio::test]
    async fn test_repair_exhausted_when_no_resource_available() {
        let depot = MemoryDepot::new();
        let obj = path("/a/obj");
        depot.put_object(&obj, b"data", &["res-a"]).await.expect("put");

        // Only res-a is a candidate, and it already holds a valid replica.
        let work = ReplicaRepairer::new(2, vec!["res-a".to_string()], MemoryJournal::new());
        let client = depot.client();
        let outcome = work.run(client.as_ref(), &obj).await;
        assert!(matches!(
            outcome,
            WorkOutcome::Failed(Error::RepairExhausted {
                wanted: 2,
                reached: 1,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_checker_flags_incomplete_sets() {
        let depot = MemoryDepot::new();
        let complete = path("/a/ok");
        let short = path("/a/short");
        depot.put_object(&complete, b"x", &["res-a", "res-b"]).await.expect("put");
        depot.put_object(&short, b"y", &["res-a", "res-b"]).await.expect("put");
        depot.invalidate_replica(&short, 1).await.expect("invalidate");

        let client = depot.client();
        let checker = ReplicaChecker::new(2, MemoryJournal::new());
        assert!(matches!(
            checker.run(client.as_ref(), &complete).await,
            WorkOutcome::Passed
        ));
        assert!(matches!(
            checker.run(client.as_ref(), &short).await,
            WorkOutcome::Failed(Error::IncompleteReplicas {
                valid: 1,
                invalid: 1,
                expected: 2,
                ..
            })
        ));
    }
}
