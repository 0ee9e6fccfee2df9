/*!
 * Disk
 * A virtual workspace volume: storage, index, events, remote fan-out
 *
 * A [`Disk`] binds one [`StorageBackend`] to one [`TreeIndex`] and keeps
 * both observable: every mutating operation re-indexes, persists the
 * fresh index into the disk descriptor, announces the change on the
 * local [`Emitter`], and publishes it to other contexts over an optional
 * [`RemoteChannel`]. Handles are cheap clones sharing one core.
 */

mod events;
mod identity;
mod listeners;
mod ops;
mod persist;
mod remote;
mod scan;

pub use events::{DiskEvent, IndexTrigger, RenameRecord};
pub use identity::{DiskGuid, InstanceId};
pub use ops::{CopyMode, NewFileSpec, TRASH_DIR};
pub use persist::{DescriptorStore, DiskDescriptor, JsonDescriptorStore, MemoryDescriptorStore};
pub use remote::{
    LoopbackChannel, RemoteChannel, RemoteNotice, RemotePayload, REMOTE_CHANNEL_CAPACITY,
};

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::{DiskError, DiskResult};
use crate::events::{Emitter, InstanceKey};
use crate::index::{TreeIndex, TreeNode};
use crate::path::AbsPath;
use crate::storage::{BackendKind, StorageBackend, StoreResult};

/// How many numbered candidates a name collision is probed through
/// before the operation gives up
pub const MAX_UNIQUE_PROBES: u32 = 10_000;

// ============================================================================
// Core
// ============================================================================

/// Shared state behind every [`Disk`] handle
struct DiskCore {
    guid: DiskGuid,
    instance: InstanceId,
    backend: Arc<dyn StorageBackend>,
    index: TreeIndex,
    emitter: Emitter<DiskEvent>,
    remote: Option<Arc<dyn RemoteChannel>>,
    descriptor: Option<Arc<dyn DescriptorStore>>,
    /// Serializes full rescans and content sweeps
    scan_lock: tokio::sync::Mutex<()>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DiskCore {
    fn drop(&mut self) {
        if let Some(handle) = self.pump.lock().take() {
            handle.abort();
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`Disk`] around a required backend
pub struct DiskBuilder {
    backend: Arc<dyn StorageBackend>,
    guid: Option<DiskGuid>,
    remote: Option<Arc<dyn RemoteChannel>>,
    descriptor: Option<Arc<dyn DescriptorStore>>,
}

impl DiskBuilder {
    /// Reuse a stable identity instead of minting a fresh one.
    /// Required when several contexts should see the same disk.
    pub fn with_guid(mut self, guid: DiskGuid) -> Self {
        self.guid = Some(guid);
        self
    }

    /// Join a broadcast domain shared with other contexts
    pub fn with_remote(mut self, remote: Arc<dyn RemoteChannel>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Persist identity and index cache between sessions
    pub fn with_descriptor(mut self, store: Arc<dyn DescriptorStore>) -> Self {
        self.descriptor = Some(store);
        self
    }

    pub fn build(self) -> Disk {
        let backend = self.backend;
        let guid = self.guid.unwrap_or_else(DiskGuid::generate);
        let emitter = Emitter::new();
        emitter.set_instance_key(InstanceKey::new(guid.as_str()));
        Disk {
            core: Arc::new(DiskCore {
                guid,
                instance: InstanceId::generate(),
                index: TreeIndex::new(backend.clone()),
                backend,
                emitter,
                remote: self.remote,
                descriptor: self.descriptor,
                scan_lock: tokio::sync::Mutex::new(()),
                pump: Mutex::new(None),
            }),
        }
    }
}

// ============================================================================
// Disk
// ============================================================================

/// Handle to one workspace volume; clones share the same core
#[derive(Clone)]
pub struct Disk {
    core: Arc<DiskCore>,
}

impl Disk {
    pub fn builder(backend: Arc<dyn StorageBackend>) -> DiskBuilder {
        DiskBuilder {
            backend,
            guid: None,
            remote: None,
            descriptor: None,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Bring the disk online.
    ///
    /// Hydrates the index from a cached descriptor when one is
    /// available, starts the remote pump, scans the backend, saves a
    /// fresh descriptor and announces the tree with a refresh trigger.
    /// Only a failed scan is fatal; descriptor problems degrade to a
    /// cold start with a warning.
    pub async fn init(&self) -> DiskResult<()> {
        if let Some(store) = &self.core.descriptor {
            match store.load(&self.core.guid).await {
                Ok(Some(descriptor)) => {
                    if let Some(cache) = descriptor.index_cache {
                        if self.core.index.force_index(cache) {
                            debug!(guid = %self.core.guid, "Hydrated index from descriptor cache");
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(guid = %self.core.guid, error = %e, "Descriptor load failed; starting cold");
                }
            }
        }

        self.spawn_pump();

        {
            let _guard = self.core.scan_lock.lock().await;
            self.core.index.index().await.map_err(|e| {
                DiskError::ServiceUnavailable(format!("initial scan failed: {}", e))
            })?;
        }

        if let Some(store) = &self.core.descriptor {
            let descriptor =
                DiskDescriptor::new(self.core.guid.clone(), self.core.backend.kind())
                    .with_index_cache(self.core.index.snapshot());
            if let Err(e) = store.save(&descriptor).await {
                warn!(guid = %self.core.guid, error = %e, "Descriptor save failed");
            }
        }

        self.core
            .emitter
            .emit(&DiskEvent::Index(IndexTrigger::Refresh));
        Ok(())
    }

    /// Stop background work and drop every listener.
    ///
    /// The backend and descriptor are left untouched, so a torn-down
    /// disk can be rebuilt and initialized again later.
    pub fn tear_down(&self) {
        if let Some(handle) = self.core.pump.lock().take() {
            handle.abort();
        }
        self.core.emitter.clear();
    }

    /// Tear down and delete the persisted descriptor
    pub async fn destroy(&self) -> DiskResult<()> {
        self.tear_down();
        if let Some(store) = &self.core.descriptor {
            store.remove(&self.core.guid).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Identity and access
    // ------------------------------------------------------------------

    /// Stable disk identity, shared across contexts
    pub fn guid(&self) -> &DiskGuid {
        &self.core.guid
    }

    /// Identity of this in-process instance
    pub fn instance(&self) -> &InstanceId {
        &self.core.instance
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.core.backend
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.core.backend.kind()
    }

    /// The live tree index over this disk
    pub fn tree(&self) -> &TreeIndex {
        &self.core.index
    }

    /// Current tree root, `None` before the first scan
    pub fn root(&self) -> Option<Arc<TreeNode>> {
        self.core.index.root()
    }

    /// Node at `path` in the current tree, if indexed
    pub fn node_at(&self, path: &AbsPath) -> Option<Arc<TreeNode>> {
        self.core.index.node_at(path)
    }

    /// Event source for this disk.
    ///
    /// The emitter carries the disk guid as its attached instance key,
    /// so connecting it to an [`crate::events::EventBus`] without an
    /// explicit key routes by guid.
    pub fn emitter(&self) -> &Emitter<DiskEvent> {
        &self.core.emitter
    }

    // ------------------------------------------------------------------
    // Announcements
    // ------------------------------------------------------------------

    /// Re-index and announce a structural change.
    ///
    /// The local event fires only after the rebuild, so listeners
    /// reading the tree inside their callback observe the post-change
    /// state. Every trigger except [`IndexTrigger::Refresh`] is also
    /// published to other contexts.
    pub(crate) async fn signal(&self, trigger: IndexTrigger) -> DiskResult<()> {
        {
            let _guard = self.core.scan_lock.lock().await;
            self.core.index.index().await?;
        }
        self.persist_cache();
        self.core
            .emitter
            .emit(&DiskEvent::Index(trigger.clone()));
        if !matches!(trigger, IndexTrigger::Refresh) {
            self.publish_remote(RemotePayload::Index(trigger));
        }
        Ok(())
    }

    /// Announce an index-only change (virtual nodes); never leaves
    /// this instance and never touches the descriptor cache
    pub(crate) fn signal_local_refresh(&self) {
        self.core
            .emitter
            .emit(&DiskEvent::Index(IndexTrigger::Refresh));
    }

    pub(crate) fn emit_local(&self, event: &DiskEvent) {
        self.core.emitter.emit(event);
    }

    /// Publish a notice under this disk's identity, if a remote
    /// channel is attached
    pub(crate) fn publish_remote(&self, payload: RemotePayload) {
        if let Some(remote) = &self.core.remote {
            remote.publish(RemoteNotice::new(
                self.core.guid.clone(),
                self.core.instance.clone(),
                payload,
            ));
        }
    }

    /// Write the current index into the descriptor cache without
    /// blocking the calling operation
    pub(crate) fn persist_cache(&self) {
        let Some(store) = self.core.descriptor.clone() else {
            return;
        };
        let guid = self.core.guid.clone();
        let cache = self.core.index.snapshot();
        tokio::spawn(async move {
            if let Err(e) = store.update_index_cache(&guid, cache).await {
                warn!(guid = %guid, error = %e, "Index cache persist failed");
            }
        });
    }

    // ------------------------------------------------------------------
    // Remote intake
    // ------------------------------------------------------------------

    fn spawn_pump(&self) {
        let Some(remote) = self.core.remote.clone() else {
            return;
        };
        let mut slot = self.core.pump.lock();
        if slot.is_some() {
            return;
        }
        let mut rx = remote.subscribe();
        let weak = Arc::downgrade(&self.core);
        let handle = tokio::spawn(async move {
            loop {
                let notice = match rx.recv().await {
                    Ok(notice) => notice,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Remote notices dropped by a slow pump");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(core) = weak.upgrade() else { break };
                if notice.instance_id == core.instance {
                    // The loopback transport echoes our own notices back
                    continue;
                }
                Disk { core }.absorb_remote(notice).await;
            }
        });
        *slot = Some(handle);
    }

    /// Fold one remote notice into this instance.
    ///
    /// Notices for other disks are dropped. A notice carrying our own
    /// instance id is forwarded to local listeners as-is: the change
    /// already went through this instance, so the index is current. A
    /// notice from a foreign instance of the same disk means storage
    /// changed underneath us, so the index is rebuilt before the event
    /// goes out; if that rebuild fails the event still fires, over the
    /// stale tree, with a warning.
    pub async fn absorb_remote(&self, notice: RemoteNotice) {
        if notice.disk_id != self.core.guid {
            return;
        }
        let own = notice.instance_id == self.core.instance;
        if !own {
            let _guard = self.core.scan_lock.lock().await;
            match self.core.index.index().await {
                Ok(_) => self.persist_cache(),
                Err(e) => {
                    warn!(guid = %self.core.guid, error = %e,
                        "Re-scan after remote notice failed; forwarding over stale tree");
                }
            }
        }
        let event = match notice.payload {
            RemotePayload::Index(trigger) => DiskEvent::Index(trigger),
            RemotePayload::Write { path } => {
                if own {
                    DiskEvent::InsideWrite { path }
                } else {
                    DiskEvent::OutsideWrite { path }
                }
            }
        };
        self.core.emitter.emit(&event);
    }

    // ------------------------------------------------------------------
    // Naming
    // ------------------------------------------------------------------

    /// Resolve `desired` to a path that is free in both the index and
    /// the backend, numbering the name before its final extension on
    /// collision (`note.txt`, `note-1.txt`, `note-2.txt`, ...).
    ///
    /// The index check keeps virtual nodes from being shadowed; the
    /// backend check keeps batch operations honest between rescans.
    pub async fn resolve_unique(&self, desired: &AbsPath) -> DiskResult<AbsPath> {
        if self.is_free(desired).await {
            return Ok(desired.clone());
        }
        for n in 1..=MAX_UNIQUE_PROBES {
            let candidate = desired.numbered(n);
            if self.is_free(&candidate).await {
                return Ok(candidate);
            }
        }
        Err(DiskError::BadRequest(format!(
            "no unique name available near {}",
            desired
        )))
    }

    async fn is_free(&self, path: &AbsPath) -> bool {
        if self.core.index.node_at(path).is_some() {
            return false;
        }
        !self.core.backend.exists(path).await
    }

    /// Create every missing ancestor directory of `path`
    pub(crate) async fn ensure_ancestors(&self, path: &AbsPath) -> StoreResult<()> {
        match path.parent() {
            Some(parent) => self.core.backend.mkdir_recursive(&parent).await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Disk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disk")
            .field("guid", &self.core.guid)
            .field("instance", &self.core.instance)
            .field("backend", &self.core.backend.kind())
            .field("listeners", &self.core.emitter.listener_count())
            .finish()
    }
}
