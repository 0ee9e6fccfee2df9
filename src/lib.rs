/*!
 * Atelier Core
 * Workspace filesystem and event routing for embedding hosts
 *
 * A workspace is a [`Disk`]: a pluggable [`StorageBackend`] under an
 * always-consistent [`TreeIndex`], with every change announced through a
 * typed [`Emitter`] and optionally fanned out to other contexts over a
 * remote channel. The [`EventBus`] routes events from many emitters by
 * class and instance keys.
 */

pub mod disk;
pub mod errors;
pub mod events;
pub mod index;
pub mod path;
pub mod storage;
pub mod telemetry;

// Re-exports
pub use disk::{
    CopyMode, Disk, DiskBuilder, DiskEvent, DiskGuid, IndexTrigger, InstanceId, NewFileSpec,
    RenameRecord,
};
pub use errors::{DiskError, DiskResult};
pub use events::{ClassKey, Emitter, EventBus, InstanceKey, Subscription};
pub use index::{TreeIndex, TreeNode};
pub use path::{AbsPath, PathError, RelPath};
pub use storage::{FileData, LocalDirStore, MemoryStore, NodeKind, StorageBackend, StoreError};
