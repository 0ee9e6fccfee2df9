/*!
 * In-Memory Storage Backend
 * Fast, volatile backend for tests, scratch workspaces and previews
 */

use ahash::RandomState;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::traits::{BackendKind, StorageBackend};
use super::types::*;
use crate::path::AbsPath;

/// In-memory node. Directories track child names only; full child paths
/// are derived from the directory's own path, so moves never leave stale
/// path values behind.
#[derive(Debug, Clone)]
enum Node {
    File { data: FileData },
    Dir { children: BTreeSet<String> },
}

impl Node {
    fn kind(&self) -> NodeKind {
        match self {
            Node::File { .. } => NodeKind::File,
            Node::Dir { .. } => NodeKind::Dir,
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self, Node::Dir { .. })
    }

    fn size(&self) -> usize {
        match self {
            Node::File { data } => data.len(),
            Node::Dir { .. } => 0,
        }
    }
}

/// In-memory storage backend
#[derive(Debug, Clone)]
pub struct MemoryStore {
    nodes: Arc<DashMap<AbsPath, Node, RandomState>>,
    max_size: Option<usize>,
    current_size: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Create a new empty store with just the root directory
    pub fn new() -> Self {
        let nodes = DashMap::with_hasher(RandomState::new());
        nodes.insert(
            AbsPath::root(),
            Node::Dir {
                children: BTreeSet::new(),
            },
        );
        Self {
            nodes: Arc::new(nodes),
            max_size: None,
            current_size: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create with a total content-size limit in bytes
    pub fn with_capacity(max_size: usize) -> Self {
        let mut store = Self::new();
        store.max_size = Some(max_size);
        store
    }

    /// Total bytes of file content currently held
    pub fn used_bytes(&self) -> usize {
        self.current_size.load(Ordering::SeqCst)
    }

    /// Check if space is available and reserve it atomically
    fn reserve_space(&self, additional: usize) -> StoreResult<()> {
        if let Some(max) = self.max_size {
            loop {
                let current = self.current_size.load(Ordering::SeqCst);
                if current + additional > max {
                    return Err(StoreError::OutOfSpace);
                }
                if self
                    .current_size
                    .compare_exchange(
                        current,
                        current + additional,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok()
                {
                    return Ok(());
                }
                // Retry on contention
            }
        }
        self.current_size.fetch_add(additional, Ordering::SeqCst);
        Ok(())
    }

    fn release_space(&self, amount: usize) {
        self.current_size.fetch_sub(amount, Ordering::SeqCst);
    }

    /// Verify the parent of `path` exists and is a directory
    fn ensure_parent(&self, path: &AbsPath) -> StoreResult<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        match self.nodes.get(&parent) {
            Some(node) if node.is_dir() => Ok(()),
            Some(_) => Err(StoreError::NotADirectory(parent.into_string())),
            None => Err(StoreError::NotFound(format!(
                "parent directory not found: {parent}"
            ))),
        }
    }

    fn add_child(&self, path: &AbsPath) {
        if let Some(parent) = path.parent() {
            if let Some(mut node) = self.nodes.get_mut(&parent) {
                if let Node::Dir { children } = node.value_mut() {
                    children.insert(path.basename().to_string());
                }
            }
        }
    }

    fn remove_child(&self, path: &AbsPath) {
        if let Some(parent) = path.parent() {
            if let Some(mut node) = self.nodes.get_mut(&parent) {
                if let Node::Dir { children } = node.value_mut() {
                    children.remove(path.basename());
                }
            }
        }
    }

    /// Every path in the subtree rooted at `root`, root first
    fn subtree_paths(&self, root: &AbsPath) -> Vec<AbsPath> {
        let mut out = vec![root.clone()];
        let mut stack = vec![root.clone()];
        while let Some(dir) = stack.pop() {
            let child_names: Vec<String> = match self.nodes.get(&dir) {
                Some(node) => match node.value() {
                    Node::Dir { children } => children.iter().cloned().collect(),
                    Node::File { .. } => continue,
                },
                None => continue,
            };
            for name in child_names {
                if let Ok(child) = dir.child(&name) {
                    out.push(child.clone());
                    stack.push(child);
                }
            }
        }
        out
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryStore {
    async fn stat(&self, path: &AbsPath) -> StoreResult<Stat> {
        match self.nodes.get(path) {
            Some(node) => Ok(Stat { kind: node.kind() }),
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }

    async fn read_file(&self, path: &AbsPath) -> StoreResult<FileData> {
        match self.nodes.get(path) {
            Some(node) => match node.value() {
                Node::File { data } => Ok(data.clone()),
                Node::Dir { .. } => Err(StoreError::IsADirectory(path.to_string())),
            },
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }

    async fn write_file(&self, path: &AbsPath, data: &FileData) -> StoreResult<()> {
        if path.is_root() {
            return Err(StoreError::IsADirectory(path.to_string()));
        }
        self.ensure_parent(path)?;

        let new_size = data.len();
        let old_size = match self.nodes.get(path) {
            Some(node) => match node.value() {
                Node::File { data } => data.len(),
                Node::Dir { .. } => return Err(StoreError::IsADirectory(path.to_string())),
            },
            None => 0,
        };

        if new_size > old_size {
            self.reserve_space(new_size - old_size)?;
        } else {
            self.release_space(old_size - new_size);
        }

        self.nodes.insert(path.clone(), Node::File { data: data.clone() });
        self.add_child(path);
        Ok(())
    }

    async fn unlink(&self, path: &AbsPath) -> StoreResult<()> {
        if path.is_root() {
            return Err(StoreError::InvalidPath("cannot remove the root".into()));
        }
        let is_dir = match self.nodes.get(path) {
            Some(node) => node.is_dir(),
            None => return Err(StoreError::NotFound(path.to_string())),
        };

        if is_dir {
            for node_path in self.subtree_paths(path) {
                if let Some((_, node)) = self.nodes.remove(&node_path) {
                    self.release_space(node.size());
                }
            }
        } else if let Some((_, node)) = self.nodes.remove(path) {
            self.release_space(node.size());
        }

        self.remove_child(path);
        Ok(())
    }

    async fn rename(&self, from: &AbsPath, to: &AbsPath) -> StoreResult<()> {
        if from == to {
            return Ok(());
        }
        if from.is_root() || to.is_root() {
            return Err(StoreError::InvalidPath("cannot move the root".into()));
        }
        if from.is_ancestor_of(to) {
            return Err(StoreError::InvalidPath(format!(
                "cannot move {from} into its own subtree"
            )));
        }
        if !self.nodes.contains_key(from) {
            return Err(StoreError::NotFound(from.to_string()));
        }
        if self.nodes.contains_key(to) {
            return Err(StoreError::AlreadyExists(to.to_string()));
        }
        self.ensure_parent(to)?;

        for old_path in self.subtree_paths(from) {
            let Some(rel) = old_path.relative_to(from) else {
                continue;
            };
            let new_path = to.join(&rel);
            if let Some((_, node)) = self.nodes.remove(&old_path) {
                self.nodes.insert(new_path, node);
            }
        }

        self.remove_child(from);
        self.add_child(to);
        Ok(())
    }

    async fn read_dir(&self, path: &AbsPath) -> StoreResult<Vec<DirEntry>> {
        let child_names: Vec<String> = match self.nodes.get(path) {
            Some(node) => match node.value() {
                Node::Dir { children } => children.iter().cloned().collect(),
                Node::File { .. } => return Err(StoreError::NotADirectory(path.to_string())),
            },
            None => return Err(StoreError::NotFound(path.to_string())),
        };

        let mut entries = Vec::with_capacity(child_names.len());
        for name in child_names {
            let Ok(child) = path.child(&name) else {
                continue;
            };
            if let Some(node) = self.nodes.get(&child) {
                entries.push(DirEntry::new_unchecked(name, node.kind()));
            }
        }
        Ok(entries)
    }

    async fn mkdir_recursive(&self, path: &AbsPath) -> StoreResult<()> {
        let mut current = AbsPath::root();
        for segment in path.segments() {
            let next = current.child(segment)?;
            match self.nodes.get(&next).map(|n| n.is_dir()) {
                Some(true) => {}
                Some(false) => return Err(StoreError::NotADirectory(next.into_string())),
                None => {
                    self.nodes.insert(
                        next.clone(),
                        Node::Dir {
                            children: BTreeSet::new(),
                        },
                    );
                    self.add_child(&next);
                }
            }
            current = next;
        }
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}
