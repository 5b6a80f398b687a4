//! Common provenance metadata and access control entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The minimal provenance/integrity metadata every data object should carry:
/// who created it and when, its expected checksum, and its file type.
///
/// Each field is independently present or absent; absent fields are
/// candidates for repair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonMetadata {
    pub creator: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub checksum: Option<String>,
    pub file_type: Option<String>,
}

impl CommonMetadata {
    /// Names of the canonical fields currently absent. `file_type` is only
    /// required when the object's path carries an extension, so that check
    /// belongs to the caller.
    pub fn missing_fields(&self) -> Vec<MetaField> {
        let mut missing = Vec::new();
        if self.creator.is_none() {
            missing.push(MetaField::Creator);
        }
        if self.created.is_none() {
            missing.push(MetaField::Created);
        }
        if self.checksum.is_none() {
            missing.push(MetaField::Checksum);
        }
        missing
    }
}

/// Addresses one field of [`CommonMetadata`] in `set_metadata` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaField {
    Creator,
    Created,
    Checksum,
    FileType,
}

impl MetaField {
    pub fn as_str(self) -> &'static str {
        match self {
            MetaField::Creator => "creator",
            MetaField::Created => "created",
            MetaField::Checksum => "checksum",
            MetaField::FileType => "file_type",
        }
    }
}

impl std::fmt::Display for MetaField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access level a principal holds on a collection or data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Own,
    Write,
    Read,
}

/// One (principal, permission) pair; copied verbatim when ACL copy is
/// requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlEntry {
    pub principal: String,
    pub level: Permission,
}

impl AccessControlEntry {
    pub fn new(principal: impl Into<String>, level: Permission) -> Self {
        AccessControlEntry {
            principal: principal.into(),
            level,
        }
    }
}
