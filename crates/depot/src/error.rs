//! Error type for depot client operations.

use crate::path::ObjectPath;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, DepotError>;

/// Typed failures reported by a depot client.
///
/// Every transport maps its wire-level failures onto these variants so the
/// engine can distinguish transient connection trouble (retryable) from
/// definitive answers about store state.
#[derive(Debug, thiserror::Error)]
pub enum DepotError {
    #[error("not found: {path}")]
    NotFound { path: ObjectPath },

    #[error("already exists: {path}")]
    AlreadyExists { path: ObjectPath },

    #[error("permission denied: {path}")]
    PermissionDenied { path: ObjectPath },

    #[error("connection failure: {message}")]
    Connection { message: String },

    #[error("conflict at {path}: {message}")]
    Conflict { path: ObjectPath, message: String },

    #[error("not a collection: {path}")]
    NotACollection { path: ObjectPath },

    #[error("not a data object: {path}")]
    NotADataObject { path: ObjectPath },

    #[error("invalid path: {path:?}")]
    InvalidPath { path: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest error at {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl DepotError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DepotError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        DepotError::Connection {
            message: message.into(),
        }
    }

    pub fn conflict(path: &ObjectPath, message: impl Into<String>) -> Self {
        DepotError::Conflict {
            path: path.clone(),
            message: message.into(),
        }
    }

    /// Transient failures worth retrying on a fresh connection.
    pub fn is_transient(&self) -> bool {
        matches!(self, DepotError::Connection { .. })
    }
}
