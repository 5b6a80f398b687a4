//! Host-directory depot backend.
//!
//! Maps a local directory tree onto the depot contract so the CLI and
//! integration tests can run against durable state without a remote store.
//! Collections are plain directories. A data object is a directory holding
//! a `.object.json` manifest (replica catalog, metadata, ACL) and one
//! `.replica.<index>` payload file per replica. Collection metadata lives
//! in an optional `.collection.json` sidecar. Dot-prefixed names are
//! reserved and never listed as children.

use crate::client::{ClientFactory, DepotClient, EntryKind};
use crate::error::{DepotError, Result};
use crate::meta::{AccessControlEntry, CommonMetadata, MetaField};
use crate::path::ObjectPath;
use crate::replica::{ChecksumRecord, Replica};
use crate::sha256_hex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const OBJECT_MANIFEST: &str = ".object.json";
const COLLECTION_MANIFEST: &str = ".collection.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct ObjectManifest {
    replicas: Vec<Replica>,
    #[serde(default)]
    meta: CommonMetadata,
    #[serde(default)]
    acl: Vec<AccessControlEntry>,
    #[serde(default)]
    next_index: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CollectionManifest {
    #[serde(default)]
    meta: CommonMetadata,
    #[serde(default)]
    acl: Vec<AccessControlEntry>,
}

/// A depot emulated on a host directory.
#[derive(Clone)]
pub struct FsDepot {
    root: PathBuf,
    // One writer at a time; manifest updates are read-modify-write.
    lock: Arc<Mutex<()>>,
}

impl FsDepot {
    /// Open a depot rooted at an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let canonical = root
            .canonicalize()
            .map_err(|e| DepotError::io(root.clone(), e))?;
        if !canonical.is_dir() {
            return Err(DepotError::io(
                canonical.clone(),
                std::io::Error::new(std::io::ErrorKind::NotADirectory, "depot root"),
            ));
        }
        Ok(FsDepot {
            root: canonical,
            lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A connected client for this depot.
    pub fn client(&self) -> Arc<dyn DepotClient> {
        Arc::new(FsClient {
            depot: self.clone(),
        })
    }

    /// A factory producing clients of this depot.
    pub fn factory(&self) -> Arc<dyn ClientFactory> {
        Arc::new(FsFactory {
            depot: self.clone(),
        })
    }

    /// Create a data object with one valid replica per resource, creating
    /// missing ancestor collections. Administrative: ingestion is not part
    /// of the client contract.
    pub async fn put_object(
        &self,
        path: &ObjectPath,
        content: &[u8],
        resources: &[&str],
    ) -> Result<()> {
        let _guard = self.lock.lock().await;
        let dir = self.host_path(path);
        if dir.exists() {
            return Err(DepotError::AlreadyExists { path: path.clone() });
        }
        fs::create_dir_all(&dir).map_err(|e| DepotError::io(&dir, e))?;
        let checksum = sha256_hex(content);
        let mut manifest = ObjectManifest::default();
        for resource in resources {
            let index = manifest.next_index;
            manifest.next_index += 1;
            let payload = dir.join(format!(".replica.{index}"));
            fs::write(&payload, content).map_err(|e| DepotError::io(&payload, e))?;
            manifest.replicas.push(Replica {
                resource: (*resource).to_string(),
                checksum: Some(checksum.clone()),
                valid: true,
                index,
                created_at: Utc::now(),
            });
        }
        self.save_object_manifest(&dir, &manifest)
    }

    fn host_path(&self, path: &ObjectPath) -> PathBuf {
        if path.is_root() {
            self.root.clone()
        } else {
            self.root.join(&path.as_str()[1..])
        }
    }

    fn kind_of(dir: &Path) -> Option<EntryKind> {
        if !dir.is_dir() {
            return None;
        }
        if dir.join(OBJECT_MANIFEST).is_file() {
            Some(EntryKind::DataObject)
        } else {
            Some(EntryKind::Collection)
        }
    }

    fn load_object_manifest(&self, path: &ObjectPath) -> Result<(PathBuf, ObjectManifest)> {
        let dir = self.host_path(path);
        match Self::kind_of(&dir) {
            Some(EntryKind::DataObject) => {}
            Some(EntryKind::Collection) => {
                return Err(DepotError::NotADataObject { path: path.clone() });
            }
            None => return Err(DepotError::NotFound { path: path.clone() }),
        }
        let manifest_path = dir.join(OBJECT_MANIFEST);
        let raw = fs::read_to_string(&manifest_path)
            .map_err(|e| DepotError::io(&manifest_path, e))?;
        let manifest = serde_json::from_str(&raw).map_err(|e| DepotError::Manifest {
            path: manifest_path,
            source: e,
        })?;
        Ok((dir, manifest))
    }

    fn save_object_manifest(&self, dir: &Path, manifest: &ObjectManifest) -> Result<()> {
        let manifest_path = dir.join(OBJECT_MANIFEST);
        let raw = serde_json::to_string_pretty(manifest).map_err(|e| DepotError::Manifest {
            path: manifest_path.clone(),
            source: e,
        })?;
        fs::write(&manifest_path, raw).map_err(|e| DepotError::io(&manifest_path, e))
    }

    fn load_collection_manifest(&self, path: &ObjectPath) -> Result<(PathBuf, CollectionManifest)> {
        let dir = self.host_path(path);
        match Self::kind_of(&dir) {
            Some(EntryKind::Collection) => {}
            Some(EntryKind::DataObject) => {
                return Err(DepotError::NotACollection { path: path.clone() });
            }
            None => return Err(DepotError::NotFound { path: path.clone() }),
        }
        let manifest_path = dir.join(COLLECTION_MANIFEST);
        if !manifest_path.is_file() {
            return Ok((dir, CollectionManifest::default()));
        }
        let raw = fs::read_to_string(&manifest_path)
            .map_err(|e| DepotError::io(&manifest_path, e))?;
        let manifest = serde_json::from_str(&raw).map_err(|e| DepotError::Manifest {
            path: manifest_path,
            source: e,
        })?;
        Ok((dir, manifest))
    }

    fn save_collection_manifest(&self, dir: &Path, manifest: &CollectionManifest) -> Result<()> {
        let manifest_path = dir.join(COLLECTION_MANIFEST);
        let raw = serde_json::to_string_pretty(manifest).map_err(|e| DepotError::Manifest {
            path: manifest_path.clone(),
            source: e,
        })?;
        fs::write(&manifest_path, raw).map_err(|e| DepotError::io(&manifest_path, e))
    }
}

struct FsFactory {
    depot: FsDepot,
}

#[async_trait]
impl ClientFactory for FsFactory {
    async fn connect(&self) -> Result<Arc<dyn DepotClient>> {
        Ok(self.depot.client())
    }
}

struct FsClient {
    depot: FsDepot,
}

#[async_trait]
impl DepotClient for FsClient {
    async fn stat(&self, path: &ObjectPath) -> Result<Option<EntryKind>> {
        Ok(FsDepot::kind_of(&self.depot.host_path(path)))
    }

    async fn get_replicas(&self, path: &ObjectPath) -> Result<Vec<Replica>> {
        let (_, manifest) = self.depot.load_object_manifest(path)?;
        Ok(manifest.replicas)
    }

    async fn get_checksum_record(&self, path: &ObjectPath) -> Result<Option<ChecksumRecord>> {
        let (_, manifest) = self.depot.load_object_manifest(path)?;
        Ok(manifest.meta.checksum.map(ChecksumRecord::new))
    }

    async fn remove_replica(&self, path: &ObjectPath, index: u32) -> Result<()> {
        let _guard = self.depot.lock.lock().await;
        let (dir, mut manifest) = self.depot.load_object_manifest(path)?;
        let before = manifest.replicas.len();
        manifest.replicas.retain(|r| r.index != index);
        if manifest.replicas.len() == before {
            return Err(DepotError::conflict(
                path,
                format!("no replica with index {index}"),
            ));
        }
        let payload = dir.join(format!(".replica.{index}"));
        if payload.exists() {
            fs::remove_file(&payload).map_err(|e| DepotError::io(&payload, e))?;
        }
        self.depot.save_object_manifest(&dir, &manifest)
    }

    async fn create_replica(&self, path: &ObjectPath, resource: &str) -> Result<()> {
        let _guard = self.depot.lock.lock().await;
        let (dir, mut manifest) = self.depot.load_object_manifest(path)?;
        let source = manifest
            .replicas
            .iter()
            .find(|r| r.valid)
            .ok_or_else(|| DepotError::conflict(path, "no valid replica to clone"))?;
        let source_payload = dir.join(format!(".replica.{}", source.index));
        let content =
            fs::read(&source_payload).map_err(|e| DepotError::io(&source_payload, e))?;
        let index = manifest.next_index;
        manifest.next_index += 1;
        let payload = dir.join(format!(".replica.{index}"));
        fs::write(&payload, &content).map_err(|e| DepotError::io(&payload, e))?;
        manifest.replicas.push(Replica {
            resource: resource.to_string(),
            checksum: Some(sha256_hex(&content)),
            valid: true,
            index,
            created_at: Utc::now(),
        });
        self.depot.save_object_manifest(&dir, &manifest)
    }

    async fn get_metadata(&self, path: &ObjectPath) -> Result<CommonMetadata> {
        match FsDepot::kind_of(&self.depot.host_path(path)) {
            Some(EntryKind::DataObject) => {
                Ok(self.depot.load_object_manifest(path)?.1.meta)
            }
            Some(EntryKind::Collection) => {
                Ok(self.depot.load_collection_manifest(path)?.1.meta)
            }
            None => Err(DepotError::NotFound { path: path.clone() }),
        }
    }

    async fn set_metadata(&self, path: &ObjectPath, field: MetaField, value: &str) -> Result<()> {
        let _guard = self.depot.lock.lock().await;
        let apply = |meta: &mut CommonMetadata| -> Result<()> {
            match field {
                MetaField::Creator => meta.creator = Some(value.to_string()),
                MetaField::Created => {
                    let parsed: DateTime<Utc> = value.parse().map_err(|_| {
                        DepotError::conflict(path, format!("bad timestamp {value:?}"))
                    })?;
                    meta.created = Some(parsed);
                }
                MetaField::Checksum => meta.checksum = Some(value.to_string()),
                MetaField::FileType => meta.file_type = Some(value.to_string()),
            }
            Ok(())
        };
        match FsDepot::kind_of(&self.depot.host_path(path)) {
            Some(EntryKind::DataObject) => {
                let (dir, mut manifest) = self.depot.load_object_manifest(path)?;
                apply(&mut manifest.meta)?;
                self.depot.save_object_manifest(&dir, &manifest)
            }
            Some(EntryKind::Collection) => {
                let (dir, mut manifest) = self.depot.load_collection_manifest(path)?;
                apply(&mut manifest.meta)?;
                self.depot.save_collection_manifest(&dir, &manifest)
            }
            None => Err(DepotError::NotFound { path: path.clone() }),
        }
    }

    async fn get_acl(&self, path: &ObjectPath) -> Result<Vec<AccessControlEntry>> {
        match FsDepot::kind_of(&self.depot.host_path(path)) {
            Some(EntryKind::DataObject) => Ok(self.depot.load_object_manifest(path)?.1.acl),
            Some(EntryKind::Collection) => {
                Ok(self.depot.load_collection_manifest(path)?.1.acl)
            }
            None => Err(DepotError::NotFound { path: path.clone() }),
        }
    }

    async fn set_acl(&self, path: &ObjectPath, entries: &[AccessControlEntry]) -> Result<()> {
        let _guard = self.depot.lock.lock().await;
        let merge = |acl: &mut Vec<AccessControlEntry>| {
            for entry in entries {
                match acl.iter_mut().find(|e| e.principal == entry.principal) {
                    Some(existing) => existing.level = entry.level,
                    None => acl.push(entry.clone()),
                }
            }
        };
        match FsDepot::kind_of(&self.depot.host_path(path)) {
            Some(EntryKind::DataObject) => {
                let (dir, mut manifest) = self.depot.load_object_manifest(path)?;
                merge(&mut manifest.acl);
                self.depot.save_object_manifest(&dir, &manifest)
            }
            Some(EntryKind::Collection) => {
                let (dir, mut manifest) = self.depot.load_collection_manifest(path)?;
                merge(&mut manifest.acl);
                self.depot.save_collection_manifest(&dir, &manifest)
            }
            None => Err(DepotError::NotFound { path: path.clone() }),
        }
    }

    async fn copy_object(&self, src: &ObjectPath, dst: &ObjectPath) -> Result<()> {
        let _guard = self.depot.lock.lock().await;
        let dst_dir = self.depot.host_path(dst);
        if dst_dir.exists() {
            return Err(DepotError::AlreadyExists { path: dst.clone() });
        }
        let parent = dst.parent().ok_or_else(|| DepotError::InvalidPath {
            path: dst.as_str().to_string(),
        })?;
        match FsDepot::kind_of(&self.depot.host_path(&parent)) {
            Some(EntryKind::Collection) => {}
            Some(EntryKind::DataObject) => {
                return Err(DepotError::NotACollection { path: parent });
            }
            None => return Err(DepotError::NotFound { path: parent }),
        }
        let (src_dir, src_manifest) = self.depot.load_object_manifest(src)?;
        let mut manifest = ObjectManifest::default();
        fs::create_dir(&dst_dir).map_err(|e| DepotError::io(&dst_dir, e))?;
        for replica in src_manifest.replicas.iter().filter(|r| r.valid) {
            let source_payload = src_dir.join(format!(".replica.{}", replica.index));
            let index = manifest.next_index;
            manifest.next_index += 1;
            let payload = dst_dir.join(format!(".replica.{index}"));
            fs::copy(&source_payload, &payload).map_err(|e| DepotError::io(&payload, e))?;
            manifest.replicas.push(Replica {
                resource: replica.resource.clone(),
                checksum: replica.checksum.clone(),
                valid: true,
                index,
                created_at: Utc::now(),
            });
        }
        if manifest.replicas.is_empty() {
            fs::remove_dir_all(&dst_dir).map_err(|e| DepotError::io(&dst_dir, e))?;
            return Err(DepotError::conflict(src, "no valid replica to copy"));
        }
        self.depot.save_object_manifest(&dst_dir, &manifest)
    }

    async fn create_collection(&self, path: &ObjectPath) -> Result<()> {
        let _guard = self.depot.lock.lock().await;
        let dir = self.depot.host_path(path);
        if dir.exists() {
            return Err(DepotError::AlreadyExists { path: path.clone() });
        }
        let parent = path.parent().ok_or_else(|| DepotError::InvalidPath {
            path: path.as_str().to_string(),
        })?;
        match FsDepot::kind_of(&self.depot.host_path(&parent)) {
            Some(EntryKind::Collection) => {}
            Some(EntryKind::DataObject) => {
                return Err(DepotError::NotACollection { path: parent });
            }
            None => return Err(DepotError::NotFound { path: parent }),
        }
        fs::create_dir(&dir).map_err(|e| DepotError::io(&dir, e))
    }

    async fn list_children(&self, path: &ObjectPath) -> Result<Vec<ObjectPath>> {
        let dir = self.depot.host_path(path);
        match FsDepot::kind_of(&dir) {
            Some(EntryKind::Collection) => {}
            Some(EntryKind::DataObject) => {
                return Err(DepotError::NotACollection { path: path.clone() });
            }
            None => return Err(DepotError::NotFound { path: path.clone() }),
        }
        let mut children = Vec::new();
        let reader = fs::read_dir(&dir).map_err(|e| DepotError::io(&dir, e))?;
        for entry in reader {
            let entry = entry.map_err(|e| DepotError::io(&dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            if entry.path().is_dir() {
                children.push(path.join(name)?);
            }
        }
        children.sort();
        Ok(children)
    }

    async fn remove_object(&self, path: &ObjectPath) -> Result<()> {
        let _guard = self.depot.lock.lock().await;
        let dir = self.depot.host_path(path);
        match FsDepot::kind_of(&dir) {
            Some(EntryKind::DataObject) => {}
            Some(EntryKind::Collection) => {
                return Err(DepotError::NotADataObject { path: path.clone() });
            }
            None => return Err(DepotError::NotFound { path: path.clone() }),
        }
        fs::remove_dir_all(&dir).map_err(|e| DepotError::io(&dir, e))
    }

    async fn remove_collection(&self, path: &ObjectPath) -> Result<()> {
        let _guard = self.depot.lock.lock().await;
        if path.is_root() {
            return Err(DepotError::conflict(path, "cannot remove the root"));
        }
        let dir = self.depot.host_path(path);
        match FsDepot::kind_of(&dir) {
            Some(EntryKind::Collection) => {}
            Some(EntryKind::DataObject) => {
                return Err(DepotError::NotACollection { path: path.clone() });
            }
            None => return Err(DepotError::NotFound { path: path.clone() }),
        }
        let reader = fs::read_dir(&dir).map_err(|e| DepotError::io(&dir, e))?;
        for entry in reader {
            let entry = entry.map_err(|e| DepotError::io(&dir, e))?;
            let name = entry.file_name();
            if name.to_str().is_none_or(|n| !n.starts_with('.')) {
                return Err(DepotError::conflict(path, "collection is not empty"));
            }
        }
        fs::remove_dir_all(&dir).map_err(|e| DepotError::io(&dir, e))
    }
}
