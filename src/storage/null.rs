/*!
 * Null Storage Backend
 * Placeholder backend for disconnected disks
 */

use async_trait::async_trait;

use super::traits::{BackendKind, StorageBackend};
use super::types::*;
use crate::path::AbsPath;

/// Backend that persists nothing.
///
/// The root exists and is always empty, writes are accepted and
/// discarded, everything else is missing. Lets a disk whose real storage
/// is unavailable stay alive with an empty tree instead of erroring.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl NullStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageBackend for NullStore {
    async fn stat(&self, path: &AbsPath) -> StoreResult<Stat> {
        if path.is_root() {
            Ok(Stat::dir())
        } else {
            Err(StoreError::NotFound(path.to_string()))
        }
    }

    async fn read_file(&self, path: &AbsPath) -> StoreResult<FileData> {
        Err(StoreError::NotFound(path.to_string()))
    }

    async fn write_file(&self, _path: &AbsPath, _data: &FileData) -> StoreResult<()> {
        Ok(())
    }

    async fn unlink(&self, path: &AbsPath) -> StoreResult<()> {
        Err(StoreError::NotFound(path.to_string()))
    }

    async fn rename(&self, from: &AbsPath, _to: &AbsPath) -> StoreResult<()> {
        Err(StoreError::NotFound(from.to_string()))
    }

    async fn read_dir(&self, path: &AbsPath) -> StoreResult<Vec<DirEntry>> {
        if path.is_root() {
            Ok(Vec::new())
        } else {
            Err(StoreError::NotFound(path.to_string()))
        }
    }

    async fn mkdir_recursive(&self, _path: &AbsPath) -> StoreResult<()> {
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }
}
