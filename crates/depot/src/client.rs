//! The client contract every depot transport implements.

use crate::error::Result;
use crate::meta::{AccessControlEntry, CommonMetadata, MetaField};
use crate::path::ObjectPath;
use crate::replica::{ChecksumRecord, Replica};
use async_trait::async_trait;
use std::sync::Arc;

/// What kind of entry a path names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Collection,
    DataObject,
}

/// One connection to the remote store.
///
/// A handle is never shared between two workers at the same time; the pool
/// in the engine crate enforces that. All state returned here is a snapshot:
/// the store may change between calls, so callers re-fetch rather than
/// cache across units of work.
#[async_trait]
pub trait DepotClient: Send + Sync {
    /// What `path` names right now, `None` if nothing exists there.
    async fn stat(&self, path: &ObjectPath) -> Result<Option<EntryKind>>;

    /// All replicas of a data object, in store order.
    async fn get_replicas(&self, path: &ObjectPath) -> Result<Vec<Replica>>;

    /// The recorded expected checksum, if one has been set.
    async fn get_checksum_record(&self, path: &ObjectPath) -> Result<Option<ChecksumRecord>>;

    /// Remove the replica with the given store index.
    async fn remove_replica(&self, path: &ObjectPath, index: u32) -> Result<()>;

    /// Ask the store to materialize a new replica on `resource`.
    async fn create_replica(&self, path: &ObjectPath, resource: &str) -> Result<()>;

    /// Common metadata of a collection or data object.
    async fn get_metadata(&self, path: &ObjectPath) -> Result<CommonMetadata>;

    /// Write one metadata field. `Created` takes an RFC 3339 timestamp.
    async fn set_metadata(&self, path: &ObjectPath, field: MetaField, value: &str) -> Result<()>;

    /// Access control entries of a collection or data object.
    async fn get_acl(&self, path: &ObjectPath) -> Result<Vec<AccessControlEntry>>;

    /// Grant the given entries, leaving existing ones in place.
    async fn set_acl(&self, path: &ObjectPath, entries: &[AccessControlEntry]) -> Result<()>;

    /// Server-side copy of a data object's content to a new path.
    /// The destination must not exist; metadata and ACL are not carried.
    async fn copy_object(&self, src: &ObjectPath, dst: &ObjectPath) -> Result<()>;

    /// Create an empty collection. The parent must already exist.
    async fn create_collection(&self, path: &ObjectPath) -> Result<()>;

    /// Direct children of a collection, in name order.
    async fn list_children(&self, path: &ObjectPath) -> Result<Vec<ObjectPath>>;

    /// Remove a data object and all its replicas.
    async fn remove_object(&self, path: &ObjectPath) -> Result<()>;

    /// Remove an empty collection. Non-empty collections are a conflict;
    /// removal is deliberately non-recursive.
    async fn remove_collection(&self, path: &ObjectPath) -> Result<()>;
}

/// Produces connected client handles for the pool, including transparent
/// replacements when a handle goes bad.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn DepotClient>>;
}
