/*!
 * Tree Iteration
 * Lazy depth-first walks over index snapshots
 */

use std::sync::Arc;

use super::node::TreeNode;

/// Lazy preorder walk over a snapshot.
///
/// Children are visited in name order. The `enter` predicate is asked
/// before descending into a directory; answering `false` skips that
/// directory's subtree while the directory node itself is still
/// yielded. The iterator owns `Arc`s into the snapshot, so it stays
/// valid (and consistent) however long consumption is suspended.
pub struct TreeIter<F> {
    stack: Vec<Arc<TreeNode>>,
    enter: F,
}

impl<F> TreeIter<F>
where
    F: FnMut(&TreeNode) -> bool,
{
    pub(crate) fn new(root: Option<Arc<TreeNode>>, enter: F) -> Self {
        Self {
            stack: root.into_iter().collect(),
            enter,
        }
    }
}

impl<F> Iterator for TreeIter<F>
where
    F: FnMut(&TreeNode) -> bool,
{
    type Item = Arc<TreeNode>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if node.is_dir() && (self.enter)(&node) {
            // Reverse push so name order comes off the stack first
            for child in node.children.values().rev() {
                self.stack.push(child.clone());
            }
        }
        Some(node)
    }
}
