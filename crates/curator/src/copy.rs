//! Idempotent copying of collections and data objects.

use crate::checksum::consistent_valid_checksum;
use crate::error::{Error, Result};
use crate::journal::Journal;
use depot::{DepotClient, DepotError, EntryKind, MetaField, ObjectPath};
use futures::future::BoxFuture;
use std::sync::Arc;

/// What a copy carries besides object content.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyOptions {
    /// Copy common metadata onto entries that are written.
    pub avu: bool,
    /// Copy access control entries onto entries that are written.
    pub acl: bool,
    /// Descend into collections.
    pub recurse: bool,
    /// Tolerate existing destinations whose checksums match the source.
    pub exist_ok: bool,
}

/// Entries visited and entries actually written by one copy invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub processed: u64,
    pub copied: u64,
}

/// A single-traversal copier over one client connection.
///
/// The walk aborts on the first structural error or checksum conflict:
/// a destination the tool cannot safely reconcile must be resolved
/// out-of-band, after which re-running with `exist_ok` resumes past the
/// entries already copied.
pub struct CopyEngine<'a> {
    client: &'a dyn DepotClient,
    journal: Arc<dyn Journal>,
    options: CopyOptions,
}

impl<'a> CopyEngine<'a> {
    pub fn new(client: &'a dyn DepotClient, journal: Arc<dyn Journal>, options: CopyOptions) -> Self {
        CopyEngine {
            client,
            journal,
            options,
        }
    }

    /// Copy `source` to `dest`.
    ///
    /// A data-object source counts as one processed entry. A collection
    /// source is the traversal root: the destination collection is ensured
    /// without being counted, and each child visited counts once.
    pub async fn copy(&self, source: &ObjectPath, dest: &ObjectPath) -> Result<CopyStats> {
        let mut stats = CopyStats::default();
        let src_kind = self
            .client
            .stat(source)
            .await?
            .ok_or_else(|| DepotError::NotFound {
                path: source.clone(),
            })?;
        let dst_kind = self.client.stat(dest).await?;

        match (src_kind, dst_kind) {
            (EntryKind::Collection, Some(EntryKind::DataObject)) => {
                return Err(Error::InvalidCopy {
                    source: source.clone(),
                    dest: dest.clone(),
                });
            }
            (EntryKind::Collection, existing) => {
                let created = self
                    .ensure_collection(dest, existing.is_some(), None)
                    .await?;
                if created {
                    self.copy_attributes(source, dest).await?;
                }
                let children = self.client.list_children(source).await?;
                if !children.is_empty() && !self.options.recurse {
                    return Err(Error::RecurseRequired {
                        path: source.clone(),
                    });
                }
                self.copy_children(source, dest, &mut stats).await?;
            }
            (EntryKind::DataObject, Some(EntryKind::Collection)) => {
                let name = source.file_name().ok_or_else(|| DepotError::InvalidPath {
                    path: source.as_str().to_string(),
                })?;
                let target = dest.join(name)?;
                self.copy_object_entry(source, &target, &mut stats).await?;
            }
            (EntryKind::DataObject, _) => {
                self.copy_object_entry(source, dest, &mut stats).await?;
            }
        }
        Ok(stats)
    }

    /// Create a destination collection or accept an existing one.
    /// Returns whether it was created. Child entries are counted into
    /// `stats`; the traversal root passes `None`.
    async fn ensure_collection(
        &self,
        dest: &ObjectPath,
        exists: bool,
        stats: Option<&mut CopyStats>,
    ) -> Result<bool> {
        if exists {
            if !self.options.exist_ok {
                return Err(Error::DestinationExists { path: dest.clone() });
            }
            self.journal
                .info(Some(dest), "destination collection exists; skipped");
            if let Some(stats) = stats {
                stats.processed += 1;
            }
            Ok(false)
        } else {
            self.client.create_collection(dest).await?;
            self.journal.info(Some(dest), "collection created");
            if let Some(stats) = stats {
                stats.processed += 1;
                stats.copied += 1;
            }
            Ok(true)
        }
    }

    fn copy_children<'b>(
        &'b self,
        src: &'b ObjectPath,
        dst: &'b ObjectPath,
        stats: &'b mut CopyStats,
    ) -> BoxFuture<'b, Result<()>> {
        Box::pin(async move {
            for child in self.client.list_children(src).await? {
                let name = child.file_name().ok_or_else(|| DepotError::InvalidPath {
                    path: child.as_str().to_string(),
                })?;
                let target = dst.join(name)?;
                let kind = self
                    .client
                    .stat(&child)
                    .await?
                    .ok_or_else(|| DepotError::NotFound { path: child.clone() })?;
                match kind {
                    EntryKind::DataObject => {
                        self.copy_object_entry(&child, &target, stats).await?;
                    }
                    EntryKind::Collection => {
                        let existing = self.client.stat(&target).await?;
                        if existing == Some(EntryKind::DataObject) {
                            return Err(Error::InvalidCopy {
                                source: child.clone(),
                                dest: target.clone(),
                            });
                        }
                        let created = self
                            .ensure_collection(&target, existing.is_some(), Some(&mut *stats))
                            .await?;
                        if created {
                            self.copy_attributes(&child, &target).await?;
                        }
                        self.copy_children(&child, &target, stats).await?;
                    }
                }
            }
            Ok(())
        })
    }

    async fn copy_object_entry(
        &self,
        src: &ObjectPath,
        dst: &ObjectPath,
        stats: &mut CopyStats,
    ) -> Result<()> {
        match self.client.stat(dst).await? {
            Some(EntryKind::DataObject) => {
                if !self.options.exist_ok {
                    return Err(Error::DestinationExists { path: dst.clone() });
                }
                // Both sides must be internally consistent before their
                // checksums mean anything.
                let expected = consistent_valid_checksum(self.client, src).await?;
                let observed = consistent_valid_checksum(self.client, dst).await?;
                if expected != observed {
                    return Err(Error::ChecksumConflict {
                        path: dst.clone(),
                        expected,
                        observed,
                    });
                }
                stats.processed += 1;
                self.journal.info(
                    Some(dst),
                    "destination object exists with matching checksum; skipped",
                );
                Ok(())
            }
            Some(EntryKind::Collection) => Err(Error::DestinationExists { path: dst.clone() }),
            None => {
                self.client.copy_object(src, dst).await?;
                stats.processed += 1;
                stats.copied += 1;
                self.journal.info(Some(dst), "data object copied");
                self.copy_attributes(src, dst).await?;
                Ok(())
            }
        }
    }

    async fn copy_attributes(&self, src: &ObjectPath, dst: &ObjectPath) -> Result<()> {
        if self.options.avu {
            let meta = self.client.get_metadata(src).await?;
            if let Some(creator) = &meta.creator {
                self.client
                    .set_metadata(dst, MetaField::Creator, creator)
                    .await?;
            }
            if let Some(created) = &meta.created {
                self.client
                    .set_metadata(dst, MetaField::Created, &created.to_rfc3339())
                    .await?;
            }
            if let Some(checksum) = &meta.checksum {
                self.client
                    .set_metadata(dst, MetaField::Checksum, checksum)
                    .await?;
            }
            if let Some(file_type) = &meta.file_type {
                self.client
                    .set_metadata(dst, MetaField::FileType, file_type)
                    .await?;
            }
        }
        if self.options.acl {
            let entries = self.client.get_acl(src).await?;
            if !entries.is_empty() {
                self.client.set_acl(dst, &entries).await?;
            }
        }
        Ok(())
    }
}
