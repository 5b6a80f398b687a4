//! Common-metadata checking and repair.

use crate::batch::UnitOfWork;
use crate::checksum::consistent_valid_checksum;
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::outcome::WorkOutcome;
use async_trait::async_trait;
use depot::{DepotClient, MetaField, ObjectPath};
use std::sync::Arc;

/// Creator recorded when none was supplied and none is present.
pub const PLACEHOLDER_CREATOR: &str = "unknown";

/// Read-only check that the canonical metadata fields are present.
///
/// `file_type` is only required when the path carries an extension.
pub struct MetadataChecker {
    journal: Arc<dyn Journal>,
}

impl MetadataChecker {
    pub fn new(journal: Arc<dyn Journal>) -> Self {
        MetadataChecker { journal }
    }

    async fn verify(&self, client: &dyn DepotClient, path: &ObjectPath) -> Result<()> {
        let meta = client.get_metadata(path).await?;
        let mut missing: Vec<&str> = meta
            .missing_fields()
            .into_iter()
            .map(MetaField::as_str)
            .collect();
        if path.extension().is_some() && meta.file_type.is_none() {
            missing.push(MetaField::FileType.as_str());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::IncompleteMetadata {
                path: path.clone(),
                missing: missing.join(","),
            })
        }
    }
}

#[async_trait]
impl UnitOfWork for MetadataChecker {
    async fn run(&self, client: &dyn DepotClient, path: &ObjectPath) -> WorkOutcome {
        match self.verify(client, path).await {
            Ok(()) => {
                self.journal.info(Some(path), "common metadata complete");
                WorkOutcome::Passed
            }
            Err(err) => {
                self.journal
                    .error(Some(path), &format!("metadata check failed: {err}"));
                WorkOutcome::Failed(err)
            }
        }
    }
}

/// Writes the canonical metadata fields that are absent or wrong, leaving
/// correct fields untouched to avoid churn and audit noise.
///
/// Authoritative values: the supplied creator (or a placeholder), the
/// earliest replica creation time from the store catalog, the consistent
/// replica checksum, and the file type taken from the path extension.
pub struct MetadataRepairer {
    creator: Option<String>,
    journal: Arc<dyn Journal>,
}

impl MetadataRepairer {
    pub fn new(creator: Option<String>, journal: Arc<dyn Journal>) -> Self {
        MetadataRepairer { creator, journal }
    }

    async fn attempt(&self, client: &dyn DepotClient, path: &ObjectPath) -> Result<WorkOutcome> {
        // Checksum metadata is never written while replicas disagree.
        let replica_sum = consistent_valid_checksum(client, path).await?;
        let replicas = client.get_replicas(path).await?;
        let earliest = replicas
            .iter()
            .filter(|r| r.valid)
            .map(|r| r.created_at)
            .min()
            .ok_or_else(|| Error::NoReplicas { path: path.clone() })?;

        let current = client.get_metadata(path).await?;
        let mut written: Vec<&str> = Vec::new();

        if current.creator.is_none() {
            let creator = self.creator.as_deref().unwrap_or(PLACEHOLDER_CREATOR);
            client
                .set_metadata(path, MetaField::Creator, creator)
                .await?;
            written.push(MetaField::Creator.as_str());
        }
        if current.created.is_none() {
            client
                .set_metadata(path, MetaField::Created, &earliest.to_rfc3339())
                .await?;
            written.push(MetaField::Created.as_str());
        }
        if current.checksum.as_deref() != Some(replica_sum.as_str()) {
            client
                .set_metadata(path, MetaField::Checksum, &replica_sum)
                .await?;
            written.push(MetaField::Checksum.as_str());
        }
        if let Some(extension) = path.extension()
            && current.file_type.as_deref() != Some(extension)
        {
            client
                .set_metadata(path, MetaField::FileType, extension)
                .await?;
            written.push(MetaField::FileType.as_str());
        }

        if written.is_empty() {
            self.journal.info(Some(path), "common metadata complete");
            Ok(WorkOutcome::Passed)
        } else {
            self.journal.info(
                Some(path),
                &format!("metadata repaired: {}", written.join(",")),
            );
            Ok(WorkOutcome::Repaired)
        }
    }
}

#[async_trait]
impl UnitOfWork for MetadataRepairer {
    async fn run(&self, client: &dyn DepotClient, path: &ObjectPath) -> WorkOutcome {
        match self.attempt(client, path).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.journal
                    .error(Some(path), &format!("metadata repair failed: {err}"));
                WorkOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::MemoryJournal;
    use depot::{DepotError, MemoryDepot};

    fn path(s: &str) -> ObjectPath {
        ObjectPath::parse(s).expect("test path")
    }

    #[tokio::test]
    async fn test_repair_fills_all_fields_then_passes() {
        let depot = MemoryDepot::new();
        let obj = path("/seq/run1.cram");
        depot.put_object(&obj, b"reads", &["res-a"]).await.expect("put");

        let client = depot.client();
        let work = MetadataRepairer::new(Some("svc-archive".to_string()), MemoryJournal::new());

        let outcome = work.run(client.as_ref(), &obj).await;
        assert!(outcome.is_repaired());

        let meta = client.get_metadata(&obj).await.expect("meta");
        assert_eq!(meta.creator.as_deref(), Some("svc-archive"));
        assert!(meta.created.is_some());
        assert_eq!(meta.checksum, Some(depot::sha256_hex(b"reads")));
        assert_eq!(meta.file_type.as_deref(), Some("cram"));

        // Write-minimization: the second run writes nothing.
        let outcome = work.run(client.as_ref(), &obj).await;
        assert!(matches!(outcome, WorkOutcome::Passed));
    }

    #[tokio::test]
    async fn test_repair_uses_placeholder_creator() {
        let depot = MemoryDepot::new();
        let obj = path("/seq/run2.bam");
        depot.put_object(&obj, b"reads", &["res-a"]).await.expect("put");

        let client = depot.client();
        let work = MetadataRepairer::new(None, MemoryJournal::new());
        let outcome = work.run(client.as_ref(), &obj).await;
        assert!(outcome.is_repaired());

        let meta = client.get_metadata(&obj).await.expect("meta");
        assert_eq!(meta.creator.as_deref(), Some(PLACEHOLDER_CREATOR));
    }

    #[tokio::test]
    async fn test_repair_rewrites_stale_checksum_field_only() {
        let depot = MemoryDepot::new();
        let obj = path("/seq/run3.cram");
        depot.put_object(&obj, b"reads", &["res-a"]).await.expect("put");
        let client = depot.client();
        client
            .set_metadata(&obj, MetaField::Creator, "earlier-run")
            .await
            .expect("meta");
        depot.set_checksum_record(&obj, "stale").await.expect("record");

        let work = MetadataRepairer::new(Some("svc".to_string()), MemoryJournal::new());
        let outcome = work.run(client.as_ref(), &obj).await;
        assert!(outcome.is_repaired());

        let meta = client.get_metadata(&obj).await.expect("meta");
        // Present creator untouched; stale checksum corrected.
        assert_eq!(meta.creator.as_deref(), Some("earlier-run"));
        assert_eq!(meta.checksum, Some(depot::sha256_hex(b"reads")));
    }

    #[tokio::test]
    async fn test_repair_refuses_inconsistent_replicas() {
        let depot = MemoryDepot::new();
        let obj = path("/seq/run4.cram");
        depot.put_object(&obj, b"reads", &["res-a", "res-b"]).await.expect("put");
        depot.corrupt_replica(&obj, 1, b"drift").await.expect("corrupt");

        let client = depot.client();
        let work = MetadataRepairer::new(None, MemoryJournal::new());
        let outcome = work.run(client.as_ref(), &obj).await;
        assert!(matches!(
            outcome,
            WorkOutcome::Failed(Error::InconsistentReplicas { .. })
        ));
        // Nothing was written.
        let meta = client.get_metadata(&obj).await.expect("meta");
        assert!(meta.creator.is_none());
        assert!(meta.checksum.is_none());
    }

    #[tokio::test]
    async fn test_repair_fails_on_denied_write() {
        let depot = MemoryDepot::new();
        let obj = path("/seq/run5.cram");
        depot.put_object(&obj, b"reads", &["res-a"]).await.expect("put");
        depot.deny_metadata_writes(&obj).await;

        let client = depot.client();
        let work = MetadataRepairer::new(None, MemoryJournal::new());
        let outcome = work.run(client.as_ref(), &obj).await;
        assert!(matches!(
            outcome,
            WorkOutcome::Failed(Error::Depot(DepotError::PermissionDenied { .. }))
        ));
    }

    #[tokio::test]
    async fn test_checker_requires_type_only_with_extension() {
        let depot = MemoryDepot::new();
        let with_ext = path("/seq/a.cram");
        let without_ext = path("/seq/readme");
        depot.put_object(&with_ext, b"1", &["res-a"]).await.expect("put");
        depot.put_object(&without_ext, b"2", &["res-a"]).await.expect("put");

        let client = depot.client();
        for obj in [&with_ext, &without_ext] {
            client
                .set_metadata(obj, MetaField::Creator, "svc")
                .await
                .expect("meta");
            let now = chrono::Utc::now().to_rfc3339();
            client
                .set_metadata(obj, MetaField::Created, &now)
                .await
                .expect("meta");
            let sum = depot::sha256_hex(if obj == &with_ext { b"1" } else { b"2" });
            client
                .set_metadata(obj, MetaField::Checksum, &sum)
                .await
                .expect("meta");
        }

        let checker = MetadataChecker::new(MemoryJournal::new());
        // file_type missing, extension present: fail.
        assert!(matches!(
            checker.run(client.as_ref(), &with_ext).await,
            WorkOutcome::Failed(Error::IncompleteMetadata { .. })
        ));
        // No extension: file_type is not required.
        assert!(matches!(
            checker.run(client.as_ref(), &without_ext).await,
            WorkOutcome::Passed
        ));
    }
}
