/*!
 * Descriptor Persistence
 * Durable identity and index cache per disk
 */

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::identity::DiskGuid;
use crate::index::IndexSnapshot;
use crate::storage::{io_error, BackendKind, StoreError, StoreResult};

/// Everything a disk needs to come back in a later session: its stable
/// identity, the backend family it binds to, and an optional cached
/// index for instant hydration before the first scan completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskDescriptor {
    pub guid: DiskGuid,
    pub backend: BackendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_cache: Option<IndexSnapshot>,
}

impl DiskDescriptor {
    pub fn new(guid: DiskGuid, backend: BackendKind) -> Self {
        Self {
            guid,
            backend,
            index_cache: None,
        }
    }

    pub fn with_index_cache(mut self, cache: IndexSnapshot) -> Self {
        self.index_cache = Some(cache);
        self
    }
}

/// Where descriptors live between sessions.
///
/// Loading never hard-fails on a descriptor that cannot be decoded: a
/// corrupt record reads back as absent so the disk falls through to a
/// fresh scan.
#[async_trait]
pub trait DescriptorStore: Send + Sync {
    async fn load(&self, guid: &DiskGuid) -> StoreResult<Option<DiskDescriptor>>;

    async fn save(&self, descriptor: &DiskDescriptor) -> StoreResult<()>;

    async fn remove(&self, guid: &DiskGuid) -> StoreResult<()>;

    /// Refresh only the cached index of an already-saved descriptor.
    /// A disk that was never saved stays unsaved.
    async fn update_index_cache(&self, guid: &DiskGuid, cache: IndexSnapshot) -> StoreResult<()> {
        if let Some(mut descriptor) = self.load(guid).await? {
            descriptor.index_cache = Some(cache);
            self.save(&descriptor).await?;
        }
        Ok(())
    }
}

// ============================================================================
// JSON Store
// ============================================================================

/// One `<guid>.json` per descriptor under a host directory.
///
/// Saves go through a sibling temp file plus rename, so readers never
/// observe a half-written descriptor.
#[derive(Debug, Clone)]
pub struct JsonDescriptorStore {
    dir: PathBuf,
}

impl JsonDescriptorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the backing directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(e, dir.display().to_string()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, guid: &DiskGuid) -> PathBuf {
        self.dir.join(format!("{}.json", guid.as_str()))
    }
}

#[async_trait]
impl DescriptorStore for JsonDescriptorStore {
    async fn load(&self, guid: &DiskGuid) -> StoreResult<Option<DiskDescriptor>> {
        let file = self.file_for(guid);
        let bytes = match tokio::fs::read(&file).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(e, guid.as_str())),
        };
        match serde_json::from_slice::<DiskDescriptor>(&bytes) {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(e) => {
                warn!(guid = %guid, error = %e, "Discarding undecodable disk descriptor");
                Ok(None)
            }
        }
    }

    async fn save(&self, descriptor: &DiskDescriptor) -> StoreResult<()> {
        let file = self.file_for(&descriptor.guid);
        let tmp = file.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(descriptor)
            .map_err(|e| StoreError::Io(format!("encode descriptor: {}", e)))?;
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| io_error(e, descriptor.guid.as_str()))?;
        tokio::fs::rename(&tmp, &file)
            .await
            .map_err(|e| io_error(e, descriptor.guid.as_str()))?;
        Ok(())
    }

    async fn remove(&self, guid: &DiskGuid) -> StoreResult<()> {
        match tokio::fs::remove_file(self.file_for(guid)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e, guid.as_str())),
        }
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// Descriptor store for tests and hosts without durable storage
#[derive(Debug, Default)]
pub struct MemoryDescriptorStore {
    records: DashMap<DiskGuid, DiskDescriptor, ahash::RandomState>,
}

impl MemoryDescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl DescriptorStore for MemoryDescriptorStore {
    async fn load(&self, guid: &DiskGuid) -> StoreResult<Option<DiskDescriptor>> {
        Ok(self.records.get(guid).map(|r| r.clone()))
    }

    async fn save(&self, descriptor: &DiskDescriptor) -> StoreResult<()> {
        self.records
            .insert(descriptor.guid.clone(), descriptor.clone());
        Ok(())
    }

    async fn remove(&self, guid: &DiskGuid) -> StoreResult<()> {
        self.records.remove(guid);
        Ok(())
    }
}
