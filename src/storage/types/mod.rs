/*!
 * Storage Types
 * Shared types for backend operations with modern serde patterns
 */

mod data;
mod entry;
mod errors;

pub use data::FileData;
pub use entry::{DirEntry, NodeKind, Stat};
pub use errors::{StoreError, StoreResult};
