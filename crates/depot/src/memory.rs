//! In-memory depot backend.
//!
//! Used by tests and as a reference implementation of the client contract.
//! All clients produced by one [`MemoryDepot`] share the same state, so a
//! pool of them behaves like a pool of connections to one store. The depot
//! also exposes an administrative API for constructing damaged states
//! (invalid replicas, corrupt content, missing metadata) and for injecting
//! connection faults, neither of which is part of the client contract.

use crate::client::{ClientFactory, DepotClient, EntryKind};
use crate::error::{DepotError, Result};
use crate::meta::{AccessControlEntry, CommonMetadata, MetaField};
use crate::path::ObjectPath;
use crate::replica::{ChecksumRecord, Replica};
use crate::sha256_hex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredReplica {
    info: Replica,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct ObjectState {
    replicas: Vec<StoredReplica>,
    meta: CommonMetadata,
    acl: Vec<AccessControlEntry>,
    next_index: u32,
}

#[derive(Debug, Default)]
struct CollectionState {
    meta: CommonMetadata,
    acl: Vec<AccessControlEntry>,
}

#[derive(Debug)]
enum Entry {
    Collection(CollectionState),
    Object(ObjectState),
}

#[derive(Default)]
struct State {
    entries: BTreeMap<ObjectPath, Entry>,
    fail_connects: u32,
    fail_calls: u32,
    denied_meta: BTreeSet<ObjectPath>,
}

impl State {
    fn new() -> Self {
        let mut state = State::default();
        let _ = state
            .entries
            .insert(ObjectPath::root(), Entry::Collection(CollectionState::default()));
        state
    }

    /// Consume one injected call fault, if armed.
    fn gate(&mut self) -> Result<()> {
        if self.fail_calls > 0 {
            self.fail_calls -= 1;
            return Err(DepotError::connection("injected fault"));
        }
        Ok(())
    }

    fn object(&self, path: &ObjectPath) -> Result<&ObjectState> {
        match self.entries.get(path) {
            Some(Entry::Object(obj)) => Ok(obj),
            Some(Entry::Collection(_)) => Err(DepotError::NotADataObject { path: path.clone() }),
            None => Err(DepotError::NotFound { path: path.clone() }),
        }
    }

    fn object_mut(&mut self, path: &ObjectPath) -> Result<&mut ObjectState> {
        match self.entries.get_mut(path) {
            Some(Entry::Object(obj)) => Ok(obj),
            Some(Entry::Collection(_)) => Err(DepotError::NotADataObject { path: path.clone() }),
            None => Err(DepotError::NotFound { path: path.clone() }),
        }
    }

    fn require_collection(&self, path: &ObjectPath) -> Result<()> {
        match self.entries.get(path) {
            Some(Entry::Collection(_)) => Ok(()),
            Some(Entry::Object(_)) => Err(DepotError::NotACollection { path: path.clone() }),
            None => Err(DepotError::NotFound { path: path.clone() }),
        }
    }

    fn children(&self, path: &ObjectPath) -> Vec<ObjectPath> {
        self.entries
            .keys()
            .filter(|p| p.parent().as_ref() == Some(path))
            .cloned()
            .collect()
    }

    fn meta_of(&self, path: &ObjectPath) -> Result<&CommonMetadata> {
        match self.entries.get(path) {
            Some(Entry::Object(obj)) => Ok(&obj.meta),
            Some(Entry::Collection(coll)) => Ok(&coll.meta),
            None => Err(DepotError::NotFound { path: path.clone() }),
        }
    }

    fn meta_mut(&mut self, path: &ObjectPath) -> Result<&mut CommonMetadata> {
        match self.entries.get_mut(path) {
            Some(Entry::Object(obj)) => Ok(&mut obj.meta),
            Some(Entry::Collection(coll)) => Ok(&mut coll.meta),
            None => Err(DepotError::NotFound { path: path.clone() }),
        }
    }

    fn acl_mut(&mut self, path: &ObjectPath) -> Result<&mut Vec<AccessControlEntry>> {
        match self.entries.get_mut(path) {
            Some(Entry::Object(obj)) => Ok(&mut obj.acl),
            Some(Entry::Collection(coll)) => Ok(&mut coll.acl),
            None => Err(DepotError::NotFound { path: path.clone() }),
        }
    }
}

/// A fault-injectable in-memory store shared by any number of clients.
#[derive(Clone)]
pub struct MemoryDepot {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryDepot {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDepot {
    /// An empty depot holding only the root collection.
    pub fn new() -> Self {
        MemoryDepot {
            state: Arc::new(Mutex::new(State::new())),
        }
    }

    /// A connected client sharing this depot's state.
    pub fn client(&self) -> Arc<dyn DepotClient> {
        Arc::new(MemoryClient {
            state: self.state.clone(),
        })
    }

    /// A factory producing clients of this depot, honoring injected
    /// connection faults.
    pub fn factory(&self) -> Arc<dyn ClientFactory> {
        Arc::new(MemoryFactory {
            state: self.state.clone(),
        })
    }

    /// Create `path` and any missing ancestor collections.
    pub async fn ensure_collection(&self, path: &ObjectPath) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut missing = Vec::new();
        let mut cursor = path.clone();
        loop {
            match state.entries.get(&cursor) {
                Some(Entry::Collection(_)) => break,
                Some(Entry::Object(_)) => {
                    return Err(DepotError::NotACollection { path: cursor });
                }
                None => {
                    missing.push(cursor.clone());
                    match cursor.parent() {
                        Some(parent) => cursor = parent,
                        None => break,
                    }
                }
            }
        }
        for coll in missing.into_iter().rev() {
            let _ = state
                .entries
                .insert(coll, Entry::Collection(CollectionState::default()));
        }
        Ok(())
    }

    /// Create a data object with one valid replica per resource, all
    /// holding `content`. Missing ancestor collections are created.
    pub async fn put_object(
        &self,
        path: &ObjectPath,
        content: &[u8],
        resources: &[&str],
    ) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.ensure_collection(&parent).await?;
        }
        let mut state = self.state.lock().await;
        if state.entries.contains_key(path) {
            return Err(DepotError::AlreadyExists { path: path.clone() });
        }
        let checksum = sha256_hex(content);
        let mut object = ObjectState::default();
        for resource in resources {
            let index = object.next_index;
            object.next_index += 1;
            object.replicas.push(StoredReplica {
                info: Replica {
                    resource: (*resource).to_string(),
                    checksum: Some(checksum.clone()),
                    valid: true,
                    index,
                    created_at: Utc::now(),
                },
                content: content.to_vec(),
            });
        }
        let _ = state.entries.insert(path.clone(), Entry::Object(object));
        Ok(())
    }

    /// Set the expected-checksum record directly.
    pub async fn set_checksum_record(&self, path: &ObjectPath, value: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.meta_mut(path)?.checksum = Some(value.to_string());
        Ok(())
    }

    /// Mark one replica stale.
    pub async fn invalidate_replica(&self, path: &ObjectPath, index: u32) -> Result<()> {
        let mut state = self.state.lock().await;
        let object = state.object_mut(path)?;
        let replica = object
            .replicas
            .iter_mut()
            .find(|r| r.info.index == index)
            .ok_or_else(|| DepotError::conflict(path, format!("no replica with index {index}")))?;
        replica.info.valid = false;
        Ok(())
    }

    /// Replace one replica's content, recomputing its checksum but leaving
    /// it marked valid; the replica set then disagrees with itself.
    pub async fn corrupt_replica(
        &self,
        path: &ObjectPath,
        index: u32,
        content: &[u8],
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let object = state.object_mut(path)?;
        let replica = object
            .replicas
            .iter_mut()
            .find(|r| r.info.index == index)
            .ok_or_else(|| DepotError::conflict(path, format!("no replica with index {index}")))?;
        replica.content = content.to_vec();
        replica.info.checksum = Some(sha256_hex(content));
        Ok(())
    }

    /// Drop one replica's checksum, as if the store never computed it.
    pub async fn clear_replica_checksum(&self, path: &ObjectPath, index: u32) -> Result<()> {
        let mut state = self.state.lock().await;
        let object = state.object_mut(path)?;
        let replica = object
            .replicas
            .iter_mut()
            .find(|r| r.info.index == index)
            .ok_or_else(|| DepotError::conflict(path, format!("no replica with index {index}")))?;
        replica.info.checksum = None;
        Ok(())
    }

    /// Fail the next `n` `connect()` calls with a connection error.
    pub async fn inject_connect_faults(&self, n: u32) {
        self.state.lock().await.fail_connects = n;
    }

    /// Fail the next `n` client calls (across all clients) with a
    /// connection error.
    pub async fn inject_call_faults(&self, n: u32) {
        self.state.lock().await.fail_calls = n;
    }

    /// Make metadata writes to `path` fail with permission denied.
    pub async fn deny_metadata_writes(&self, path: &ObjectPath) {
        let _ = self.state.lock().await.denied_meta.insert(path.clone());
    }
}

struct MemoryFactory {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl ClientFactory for MemoryFactory {
    async fn connect(&self) -> Result<Arc<dyn DepotClient>> {
        let mut state = self.state.lock().await;
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(DepotError::connection("injected connect fault"));
        }
        Ok(Arc::new(MemoryClient {
            state: self.state.clone(),
        }))
    }
}

struct MemoryClient {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl DepotClient for MemoryClient {
    async fn stat(&self, path: &ObjectPath) -> Result<Option<EntryKind>> {
        let mut state = self.state.lock().await;
        state.gate()?;
        Ok(state.entries.get(path).map(|entry| match entry {
            Entry::Collection(_) => EntryKind::Collection,
            Entry::Object(_) => EntryKind::DataObject,
        }))
    }

    async fn get_replicas(&self, path: &ObjectPath) -> Result<Vec<Replica>> {
        let mut state = self.state.lock().await;
        state.gate()?;
        Ok(state
            .object(path)?
            .replicas
            .iter()
            .map(|r| r.info.clone())
            .collect())
    }

    async fn get_checksum_record(&self, path: &ObjectPath) -> Result<Option<ChecksumRecord>> {
        let mut state = self.state.lock().await;
        state.gate()?;
        Ok(state
            .object(path)?
            .meta
            .checksum
            .clone()
            .map(ChecksumRecord::new))
    }

    async fn remove_replica(&self, path: &ObjectPath, index: u32) -> Result<()> {
        let mut state = self.state.lock().await;
        state.gate()?;
        let object = state.object_mut(path)?;
        let before = object.replicas.len();
        object.replicas.retain(|r| r.info.index != index);
        if object.replicas.len() == before {
            return Err(DepotError::conflict(
                path,
                format!("no replica with index {index}"),
            ));
        }
        Ok(())
    }

    async fn create_replica(&self, path: &ObjectPath, resource: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.gate()?;
        let object = state.object_mut(path)?;
        let source = object
            .replicas
            .iter()
            .find(|r| r.info.valid)
            .ok_or_else(|| DepotError::conflict(path, "no valid replica to clone"))?;
        let content = source.content.clone();
        let checksum = sha256_hex(&content);
        let index = object.next_index;
        object.next_index += 1;
        object.replicas.push(StoredReplica {
            info: Replica {
                resource: resource.to_string(),
                checksum: Some(checksum),
                valid: true,
                index,
                created_at: Utc::now(),
            },
            content,
        });
        Ok(())
    }

    async fn get_metadata(&self, path: &ObjectPath) -> Result<CommonMetadata> {
        let mut state = self.state.lock().await;
        state.gate()?;
        state.meta_of(path).cloned()
    }

    async fn set_metadata(&self, path: &ObjectPath, field: MetaField, value: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.gate()?;
        if state.denied_meta.contains(path) {
            return Err(DepotError::PermissionDenied { path: path.clone() });
        }
        let meta = state.meta_mut(path)?;
        match field {
            MetaField::Creator => meta.creator = Some(value.to_string()),
            MetaField::Created => {
                let parsed: DateTime<Utc> = value
                    .parse()
                    .map_err(|_| DepotError::conflict(path, format!("bad timestamp {value:?}")))?;
                meta.created = Some(parsed);
            }
            MetaField::Checksum => meta.checksum = Some(value.to_string()),
            MetaField::FileType => meta.file_type = Some(value.to_string()),
        }
        Ok(())
    }

    async fn get_acl(&self, path: &ObjectPath) -> Result<Vec<AccessControlEntry>> {
        let mut state = self.state.lock().await;
        state.gate()?;
        match state.entries.get(path) {
            Some(Entry::Object(obj)) => Ok(obj.acl.clone()),
            Some(Entry::Collection(coll)) => Ok(coll.acl.clone()),
            None => Err(DepotError::NotFound { path: path.clone() }),
        }
    }

    async fn set_acl(&self, path: &ObjectPath, entries: &[AccessControlEntry]) -> Result<()> {
        let mut state = self.state.lock().await;
        state.gate()?;
        let acl = state.acl_mut(path)?;
        for entry in entries {
            match acl.iter_mut().find(|e| e.principal == entry.principal) {
                Some(existing) => existing.level = entry.level,
                None => acl.push(entry.clone()),
            }
        }
        Ok(())
    }

    async fn copy_object(&self, src: &ObjectPath, dst: &ObjectPath) -> Result<()> {
        let mut state = self.state.lock().await;
        state.gate()?;
        if state.entries.contains_key(dst) {
            return Err(DepotError::AlreadyExists { path: dst.clone() });
        }
        let parent = dst
            .parent()
            .ok_or_else(|| DepotError::InvalidPath {
                path: dst.as_str().to_string(),
            })?;
        state.require_collection(&parent)?;
        let source = state.object(src)?;
        let mut object = ObjectState::default();
        for replica in source.replicas.iter().filter(|r| r.info.valid) {
            let index = object.next_index;
            object.next_index += 1;
            object.replicas.push(StoredReplica {
                info: Replica {
                    resource: replica.info.resource.clone(),
                    checksum: replica.info.checksum.clone(),
                    valid: true,
                    index,
                    created_at: Utc::now(),
                },
                content: replica.content.clone(),
            });
        }
        if object.replicas.is_empty() {
            return Err(DepotError::conflict(src, "no valid replica to copy"));
        }
        let _ = state.entries.insert(dst.clone(), Entry::Object(object));
        Ok(())
    }

    async fn create_collection(&self, path: &ObjectPath) -> Result<()> {
        let mut state = self.state.lock().await;
        state.gate()?;
        if state.entries.contains_key(path) {
            return Err(DepotError::AlreadyExists { path: path.clone() });
        }
        let parent = path
            .parent()
            .ok_or_else(|| DepotError::InvalidPath {
                path: path.as_str().to_string(),
            })?;
        state.require_collection(&parent)?;
        let _ = state
            .entries
            .insert(path.clone(), Entry::Collection(CollectionState::default()));
        Ok(())
    }

    async fn list_children(&self, path: &ObjectPath) -> Result<Vec<ObjectPath>> {
        let mut state = self.state.lock().await;
        state.gate()?;
        state.require_collection(path)?;
        Ok(state.children(path))
    }

    async fn remove_object(&self, path: &ObjectPath) -> Result<()> {
        let mut state = self.state.lock().await;
        state.gate()?;
        let _ = state.object(path)?;
        let _ = state.entries.remove(path);
        Ok(())
    }

    async fn remove_collection(&self, path: &ObjectPath) -> Result<()> {
        let mut state = self.state.lock().await;
        state.gate()?;
        if path.is_root() {
            return Err(DepotError::conflict(path, "cannot remove the root"));
        }
        state.require_collection(path)?;
        if !state.children(path).is_empty() {
            return Err(DepotError::conflict(path, "collection is not empty"));
        }
        let _ = state.entries.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ObjectPath {
        ObjectPath::parse(s).expect("test path")
    }

    #[tokio::test]
    async fn test_put_object_creates_replicas_with_checksums() {
        let depot = MemoryDepot::new();
        depot
            .put_object(&path("/a/b/obj"), b"payload", &["res-a", "res-b"])
            .await
            .expect("put");

        let client = depot.client();
        assert_eq!(
            client.stat(&path("/a/b/obj")).await.expect("stat"),
            Some(EntryKind::DataObject)
        );
        let replicas = client.get_replicas(&path("/a/b/obj")).await.expect("replicas");
        assert_eq!(replicas.len(), 2);
        assert!(replicas.iter().all(|r| r.valid));
        assert_eq!(replicas[0].checksum, Some(sha256_hex(b"payload")));
        assert_eq!(replicas[0].checksum, replicas[1].checksum);
    }

    #[tokio::test]
    async fn test_create_replica_clones_valid_content() {
        let depot = MemoryDepot::new();
        let obj = path("/x/obj");
        depot.put_object(&obj, b"data", &["res-a"]).await.expect("put");
        let client = depot.client();
        client.create_replica(&obj, "res-b").await.expect("create");

        let replicas = client.get_replicas(&obj).await.expect("replicas");
        assert_eq!(replicas.len(), 2);
        assert_eq!(replicas[1].resource, "res-b");
        assert_eq!(replicas[1].index, 1);
        assert_eq!(replicas[0].checksum, replicas[1].checksum);
    }

    #[tokio::test]
    async fn test_remove_replica_unknown_index_is_conflict() {
        let depot = MemoryDepot::new();
        let obj = path("/x/obj");
        depot.put_object(&obj, b"data", &["res-a"]).await.expect("put");
        let client = depot.client();
        let err = client.remove_replica(&obj, 9).await.expect_err("missing");
        assert!(matches!(err, DepotError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_list_children_name_order_and_kinds() {
        let depot = MemoryDepot::new();
        depot.put_object(&path("/c/b"), b"1", &["res-a"]).await.expect("put");
        depot.ensure_collection(&path("/c/a")).await.expect("coll");
        let client = depot.client();
        let children = client.list_children(&path("/c")).await.expect("children");
        assert_eq!(children, [path("/c/a"), path("/c/b")]);
        let err = client.list_children(&path("/c/b")).await.expect_err("object");
        assert!(matches!(err, DepotError::NotACollection { .. }));
    }

    #[tokio::test]
    async fn test_copy_object_copies_valid_replicas_only() {
        let depot = MemoryDepot::new();
        let src = path("/s/obj");
        depot.put_object(&src, b"data", &["res-a", "res-b"]).await.expect("put");
        depot.invalidate_replica(&src, 1).await.expect("invalidate");
        depot.ensure_collection(&path("/d")).await.expect("coll");

        let client = depot.client();
        client.copy_object(&src, &path("/d/obj")).await.expect("copy");
        let replicas = client.get_replicas(&path("/d/obj")).await.expect("replicas");
        assert_eq!(replicas.len(), 1);
        assert!(replicas[0].valid);

        let err = client
            .copy_object(&src, &path("/d/obj"))
            .await
            .expect_err("exists");
        assert!(matches!(err, DepotError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_injected_faults_are_consumed() {
        let depot = MemoryDepot::new();
        depot.put_object(&path("/x"), b"1", &["res-a"]).await.expect("put");
        depot.inject_call_faults(1).await;

        let client = depot.client();
        let err = client.stat(&path("/x")).await.expect_err("fault");
        assert!(err.is_transient());
        // The fault is spent; the next call succeeds.
        assert!(client.stat(&path("/x")).await.expect("stat").is_some());

        depot.inject_connect_faults(1).await;
        let factory = depot.factory();
        assert!(factory.connect().await.is_err());
        assert!(factory.connect().await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_collection_requires_empty() {
        let depot = MemoryDepot::new();
        depot.put_object(&path("/c/obj"), b"1", &["res-a"]).await.expect("put");
        let client = depot.client();
        let err = client
            .remove_collection(&path("/c"))
            .await
            .expect_err("not empty");
        assert!(matches!(err, DepotError::Conflict { .. }));
        client.remove_object(&path("/c/obj")).await.expect("rm");
        client.remove_collection(&path("/c")).await.expect("rmdir");
        assert_eq!(client.stat(&path("/c")).await.expect("stat"), None);
    }
}
