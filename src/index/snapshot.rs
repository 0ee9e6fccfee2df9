/*!
 * Index Snapshots
 * Versioned serializable capture of a tree root
 */

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::node::TreeNode;

/// Bump whenever the serialized shape of [`TreeNode`] changes; cached
/// snapshots from other versions are discarded instead of migrated.
pub const INDEX_SNAPSHOT_VERSION: u32 = 1;

/// A serializable capture of an index root, used for descriptor caches
/// and cross-context handoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub version: u32,
    pub root: Option<Arc<TreeNode>>,
}

impl IndexSnapshot {
    pub fn new(root: Option<Arc<TreeNode>>) -> Self {
        Self {
            version: INDEX_SNAPSHOT_VERSION,
            root,
        }
    }

    pub fn is_current(&self) -> bool {
        self.version == INDEX_SNAPSHOT_VERSION
    }
}
