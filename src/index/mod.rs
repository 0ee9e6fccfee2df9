/*!
 * Tree Index
 * RCU-style snapshot of the backend's directory tree
 *
 * The index holds one immutable tree behind an atomic pointer. Scans
 * build a fresh tree and swap it in whole, mutations clone the spine
 * down to the touched node, and readers either see the previous tree or
 * the new one, never an intermediate state.
 */

mod iter;
mod node;
mod snapshot;

pub use iter::TreeIter;
pub use node::TreeNode;
pub use snapshot::{IndexSnapshot, INDEX_SNAPSHOT_VERSION};

use arc_swap::ArcSwapOption;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

use crate::path::AbsPath;
use crate::storage::{NodeKind, StorageBackend, StoreResult};

/// Snapshot index over one storage backend.
pub struct TreeIndex {
    backend: Arc<dyn StorageBackend>,
    root: ArcSwapOption<TreeNode>,
}

impl TreeIndex {
    /// New index with no tree yet; [`TreeIndex::index`] or
    /// [`TreeIndex::force_index`] establishes the first one.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            root: ArcSwapOption::const_empty(),
        }
    }

    /// Current root, if any scan or adoption has happened
    pub fn root(&self) -> Option<Arc<TreeNode>> {
        self.root.load_full()
    }

    /// Walk the backend and swap in a freshly built tree.
    ///
    /// On failure the previous tree stays in place untouched. A newer
    /// concurrent scan wins wholesale; there is no merging.
    pub async fn index(&self) -> StoreResult<Arc<TreeNode>> {
        let root = Arc::new(self.scan_dir(AbsPath::root()).await?);
        self.root.store(Some(root.clone()));
        debug!(nodes = root.subtree_len(), "index rebuilt");
        Ok(root)
    }

    fn scan_dir<'a>(
        &'a self,
        path: AbsPath,
    ) -> Pin<Box<dyn Future<Output = StoreResult<TreeNode>> + Send + 'a>> {
        Box::pin(async move {
            let entries = self.backend.read_dir(&path).await?;
            let mut node = TreeNode::dir(path.clone());
            for entry in entries {
                let Ok(child_path) = path.child(&entry.name) else {
                    continue;
                };
                let child = match entry.kind {
                    NodeKind::Dir => self.scan_dir(child_path).await?,
                    NodeKind::File => TreeNode::file(child_path),
                };
                node.insert_child(Arc::new(child));
            }
            Ok(node)
        })
    }

    /// Adopt a previously captured snapshot without touching the backend.
    ///
    /// Snapshots from another [`INDEX_SNAPSHOT_VERSION`] are ignored and
    /// `false` is returned; the caller decides whether to rescan.
    pub fn force_index(&self, snapshot: IndexSnapshot) -> bool {
        if !snapshot.is_current() {
            debug!(version = snapshot.version, "ignoring stale index snapshot");
            return false;
        }
        self.root.store(snapshot.root);
        true
    }

    /// Capture the current root for persistence or handoff
    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot::new(self.root())
    }

    /// Node at an exact path in the current tree
    pub fn node_at(&self, path: &AbsPath) -> Option<Arc<TreeNode>> {
        let mut current = self.root.load_full()?;
        for segment in path.segments() {
            let next = current.child(segment)?.clone();
            current = next;
        }
        Some(current)
    }

    /// Lazy preorder walk over the current tree
    pub fn iter(&self) -> TreeIter<fn(&TreeNode) -> bool> {
        TreeIter::new(self.root(), |_| true)
    }

    /// Walk with a descent gate: returning `false` for a directory
    /// prunes its subtree (the directory itself is still yielded)
    pub fn iter_pruned<F>(&self, enter: F) -> TreeIter<F>
    where
        F: FnMut(&TreeNode) -> bool,
    {
        TreeIter::new(self.root(), enter)
    }

    /// Insert a node that is not backed by storage.
    ///
    /// Missing ancestors are created as virtual directories. Returns
    /// `false` when a non-directory blocks the way or a node already
    /// occupies the path. With no tree yet, a fresh virtual root is
    /// grown. Virtual nodes live only until the next full scan.
    pub fn insert_virtual(
        &self,
        path: &AbsPath,
        kind: NodeKind,
        source: Option<AbsPath>,
    ) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        let mut inserted = false;
        self.root.rcu(|current| {
            inserted = false;
            let mut new_root: TreeNode = match current {
                Some(node) => (**node).clone(),
                None => TreeNode::dir(AbsPath::root()),
            };
            {
                let mut cursor: &mut TreeNode = &mut new_root;
                for segment in parent.segments() {
                    let child_path = match cursor.path.child(segment) {
                        Ok(p) => p,
                        Err(_) => return current.clone(),
                    };
                    let entry = cursor
                        .children
                        .entry(segment.to_string())
                        .or_insert_with(|| Arc::new(TreeNode::dir(child_path)));
                    if !entry.is_dir() {
                        return current.clone();
                    }
                    cursor = Arc::make_mut(entry);
                }
                if cursor.children.contains_key(path.basename()) {
                    return current.clone();
                }
                let node = match kind {
                    NodeKind::File => TreeNode::file(path.clone()),
                    NodeKind::Dir => TreeNode::dir(path.clone()),
                }
                .with_source(source.clone());
                cursor.insert_child(Arc::new(node));
                inserted = true;
            }
            Some(Arc::new(new_root))
        });
        inserted
    }

    /// Drop a node (and its subtree) from the tree without touching the
    /// backend. Returns `false` when the path is absent or is the root.
    pub fn remove_node(&self, path: &AbsPath) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        let mut removed = false;
        self.root.rcu(|current| {
            removed = false;
            let Some(root) = current else {
                return current.clone();
            };
            let mut new_root = (**root).clone();
            {
                let mut cursor: &mut TreeNode = &mut new_root;
                for segment in parent.segments() {
                    match cursor.children.get_mut(segment) {
                        Some(child) if child.is_dir() => {
                            cursor = Arc::make_mut(child);
                        }
                        _ => return current.clone(),
                    }
                }
                if cursor.remove_child(path.basename()).is_none() {
                    return current.clone();
                }
                removed = true;
            }
            Some(Arc::new(new_root))
        });
        removed
    }
}

impl std::fmt::Debug for TreeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeIndex")
            .field("backend", &self.backend.kind())
            .field("nodes", &self.root().map_or(0, |r| r.subtree_len()))
            .finish()
    }
}
