//! Absolute paths in the depot namespace.

use crate::error::{DepotError, Result};
use serde::{Deserialize, Serialize};

/// An absolute, `/`-separated path naming a collection or data object.
///
/// Paths are validated at construction and immutable afterwards: they must
/// start with `/`, contain no empty, `.` or `..` segments, and carry no
/// trailing slash (the root `/` being the one exception).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Parse and validate an absolute depot path.
    pub fn parse<S: AsRef<str>>(s: S) -> Result<Self> {
        let raw = s.as_ref();
        if raw == "/" {
            return Ok(ObjectPath("/".to_string()));
        }
        if !raw.starts_with('/') || raw.ends_with('/') {
            return Err(DepotError::InvalidPath {
                path: raw.to_string(),
            });
        }
        for segment in raw[1..].split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(DepotError::InvalidPath {
                    path: raw.to_string(),
                });
            }
        }
        Ok(ObjectPath(raw.to_string()))
    }

    /// The root collection `/`.
    pub fn root() -> Self {
        ObjectPath("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The final path segment, `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// The containing collection, `None` for the root.
    pub fn parent(&self) -> Option<ObjectPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(ObjectPath::root()),
            Some(idx) => Some(ObjectPath(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Append one segment. The segment must be non-empty and slash-free.
    pub fn join(&self, name: &str) -> Result<ObjectPath> {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(DepotError::InvalidPath {
                path: format!("{}/{}", self.0, name),
            });
        }
        if self.is_root() {
            Ok(ObjectPath(format!("/{name}")))
        } else {
            Ok(ObjectPath(format!("{}/{name}", self.0)))
        }
    }

    /// Number of segments below the root. The root itself has depth 0.
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count()
        }
    }

    /// The extension of the final segment, if any; used to derive file-type
    /// metadata. `/a/run.cram` -> `Some("cram")`, `/a/readme` -> `None`.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < name.len() => Some(&name[idx + 1..]),
            _ => None,
        }
    }

    /// True when `self` strictly contains `other`.
    pub fn is_ancestor_of(&self, other: &ObjectPath) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }
}

impl std::fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for ObjectPath {
    type Err = DepotError;

    fn from_str(s: &str) -> Result<Self> {
        ObjectPath::parse(s)
    }
}

impl TryFrom<String> for ObjectPath {
    type Error = DepotError;

    fn try_from(s: String) -> Result<Self> {
        ObjectPath::parse(s)
    }
}

impl From<ObjectPath> for String {
    fn from(p: ObjectPath) -> String {
        p.0
    }
}
