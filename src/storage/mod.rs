/*!
 * Storage Layer
 * Pluggable backends behind one async trait
 *
 * A disk talks to its storage exclusively through [`StorageBackend`].
 * Three implementations ship here: [`MemoryStore`] for volatile
 * workspaces and tests, [`LocalDirStore`] mapping the virtual tree onto
 * a host directory, and [`NullStore`] for disconnected placeholders.
 */

mod local;
mod memory;
mod null;
mod traits;
pub mod types;

pub(crate) use local::io_error;
pub use local::LocalDirStore;
pub use memory::MemoryStore;
pub use null::NullStore;
pub use traits::{BackendKind, StorageBackend};
pub use types::{DirEntry, FileData, NodeKind, Stat, StoreError, StoreResult};
