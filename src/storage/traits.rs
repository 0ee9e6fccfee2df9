/*!
 * Storage Traits
 * Core backend abstraction for virtual workspace storage
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::*;
use crate::path::AbsPath;

/// Which concrete backend family a disk is wired to.
///
/// Persisted in disk descriptors so a workspace can be rehydrated with
/// the same storage family it was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    LocalDir,
    Null,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::LocalDir => write!(f, "local_dir"),
            BackendKind::Null => write!(f, "null"),
        }
    }
}

/// Storage backend trait
///
/// All backend implementations must implement this trait. Every call can
/// suspend, so callers must tolerate interleaving: a stat that succeeded
/// may be stale by the time the next call runs.
///
/// Contract notes shared by all implementations:
/// - missing paths surface as [`StoreError::NotFound`] from `stat`,
///   `read_file`, `read_dir`, `unlink` and `rename` alike
/// - `write_file` and `rename` require the parent directory of the
///   target to already exist; [`StorageBackend::mkdir_recursive`] is the
///   one call that creates missing ancestors
/// - `unlink` on a directory removes its whole subtree
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// What kind of node lives at `path`
    async fn stat(&self, path: &AbsPath) -> StoreResult<Stat>;

    /// Read entire file contents
    async fn read_file(&self, path: &AbsPath) -> StoreResult<FileData>;

    /// Write entire file contents (create or overwrite)
    async fn write_file(&self, path: &AbsPath, data: &FileData) -> StoreResult<()>;

    /// Remove a file, or a directory together with its subtree
    async fn unlink(&self, path: &AbsPath) -> StoreResult<()>;

    /// Move a node; directories move with their subtree
    async fn rename(&self, from: &AbsPath, to: &AbsPath) -> StoreResult<()>;

    /// List directory contents
    async fn read_dir(&self, path: &AbsPath) -> StoreResult<Vec<DirEntry>>;

    /// Create a directory including missing ancestors; existing
    /// directories are fine, an existing file at the path is not
    async fn mkdir_recursive(&self, path: &AbsPath) -> StoreResult<()>;

    /// Backend family identifier
    fn kind(&self) -> BackendKind;

    /// Check if a node exists at `path`
    async fn exists(&self, path: &AbsPath) -> bool {
        self.stat(path).await.is_ok()
    }
}
