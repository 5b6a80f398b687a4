//! Client-side model of a remote, replica-based data store.
//!
//! A depot is a hierarchical namespace of collections and data objects.
//! Every data object is replicated across one or more storage resources;
//! each replica carries a checksum and a validity flag maintained by the
//! store. This crate defines the typed path/replica/metadata model, the
//! [`DepotClient`] trait that any transport implements, and two built-in
//! backends: an in-memory depot for tests and a host-directory emulation
//! for local use.

pub mod client;
pub mod error;
pub mod fs;
pub mod memory;
pub mod meta;
pub mod path;
pub mod replica;

pub use client::{ClientFactory, DepotClient, EntryKind};
pub use error::{DepotError, Result};
pub use fs::FsDepot;
pub use memory::MemoryDepot;
pub use meta::{AccessControlEntry, CommonMetadata, MetaField, Permission};
pub use path::ObjectPath;
pub use replica::{ChecksumRecord, Replica};

/// Hex-encoded SHA-256 digest of a payload.
///
/// Backends record this as the replica checksum when content is written.
/// The engine itself never computes digests; it only compares what the
/// store reports.
pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(data))
}
