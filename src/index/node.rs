/*!
 * Tree Nodes
 * Immutable snapshot nodes shared between readers via Arc
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::path::{AbsPath, RelPath};
use crate::storage::NodeKind;

/// One node of an index snapshot.
///
/// Nodes are immutable once published: mutation clones the spine from
/// the root down to the touched node and swaps the new root in, so a
/// reader holding any `Arc<TreeNode>` keeps a consistent subtree no
/// matter what happens to the live index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub path: AbsPath,
    pub basename: String,
    pub kind: NodeKind,
    /// Provenance link for virtual or copied nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<AbsPath>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, Arc<TreeNode>>,
}

impl TreeNode {
    pub fn file(path: AbsPath) -> Self {
        Self::leaf(path, NodeKind::File)
    }

    pub fn dir(path: AbsPath) -> Self {
        Self::leaf(path, NodeKind::Dir)
    }

    fn leaf(path: AbsPath, kind: NodeKind) -> Self {
        let basename = path.basename().to_string();
        Self {
            path,
            basename,
            kind,
            source: None,
            children: BTreeMap::new(),
        }
    }

    pub fn with_source(mut self, source: Option<AbsPath>) -> Self {
        self.source = source;
        self
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn child(&self, name: &str) -> Option<&Arc<TreeNode>> {
        self.children.get(name)
    }

    /// Follow a relative path down from this node
    pub fn descend(&self, rel: &RelPath) -> Option<&Arc<TreeNode>> {
        let mut segments = rel.segments();
        let first = segments.next()?;
        let mut current = self.child(first)?;
        for segment in segments {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Total number of nodes in this subtree, including self
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .values()
            .map(|child| child.subtree_len())
            .sum::<usize>()
    }

    pub(crate) fn insert_child(&mut self, node: Arc<TreeNode>) {
        self.children.insert(node.basename.clone(), node);
    }

    pub(crate) fn remove_child(&mut self, name: &str) -> Option<Arc<TreeNode>> {
        self.children.remove(name)
    }
}
