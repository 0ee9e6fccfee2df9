/*!
 * Storage Entry Types
 * Node kinds, stat results and directory listings
 */

use super::errors::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a filesystem node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Dir,
}

impl NodeKind {
    #[inline]
    pub fn is_dir(self) -> bool {
        matches!(self, NodeKind::Dir)
    }

    #[inline]
    pub fn is_file(self) -> bool {
        matches!(self, NodeKind::File)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::File => write!(f, "file"),
            NodeKind::Dir => write!(f, "dir"),
        }
    }
}

/// Result of a stat call: what kind of node lives at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub kind: NodeKind,
}

impl Stat {
    pub fn file() -> Self {
        Self { kind: NodeKind::File }
    }

    pub fn dir() -> Self {
        Self { kind: NodeKind::Dir }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Directory entry with type-safe construction and validation
///
/// Entry names must be non-empty and cannot contain null bytes or path
/// separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
}

impl DirEntry {
    /// Create a new directory entry with validation
    #[must_use = "validation result must be checked"]
    pub fn new(name: String, kind: NodeKind) -> Result<Self, StoreError> {
        if name.is_empty() {
            return Err(StoreError::InvalidPath("entry name cannot be empty".into()));
        }
        if name.contains('\0') {
            return Err(StoreError::InvalidPath(
                "entry name cannot contain null bytes".into(),
            ));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(StoreError::InvalidPath(
                "entry name cannot contain path separators".into(),
            ));
        }
        Ok(Self { name, kind })
    }

    /// Create a new entry without validation (internal use)
    pub(crate) fn new_unchecked(name: String, kind: NodeKind) -> Self {
        Self { name, kind }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}
