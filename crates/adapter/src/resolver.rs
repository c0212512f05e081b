use crate::children::{TreeResult, TreeState};
use crate::handle::NodeHandle;
use treebind_core::TreePath;

impl TreeState {
    /// Resolves a positional path from the root sentinel, materializing
    /// lazily segment by segment. Any out-of-range segment yields `None`,
    /// a normal outcome (e.g. after concurrent external mutation), never an
    /// error.
    pub fn node_at_path(&mut self, path: &TreePath) -> TreeResult<Option<NodeHandle>> {
        let mut current = None;
        for &segment in path.indices() {
            match self.node_at_index(current, segment)? {
                Some(node) => current = Some(node),
                None => return Ok(None),
            }
        }
        Ok(current)
    }

    /// Walks parent links up to the root, prepending each node's sibling
    /// index. Correct as long as the change translator keeps `.index`
    /// consistent, which is exactly its job.
    pub fn path_of(&self, handle: NodeHandle) -> Option<TreePath> {
        let mut node = self.nodes.get(handle)?;
        let mut reversed = Vec::new();
        loop {
            reversed.push(node.index);
            match node.parent {
                Some(parent) => node = self.nodes.get(parent)?,
                None => break,
            }
        }
        Some(TreePath::new(reversed.into_iter().rev()))
    }

    /// Path of `parent` itself; the root sentinel maps to the empty path.
    pub(crate) fn parent_path(&self, parent: Option<NodeHandle>) -> TreePath {
        match parent {
            None => TreePath::root(),
            Some(handle) => self.path_of(handle).unwrap_or_default(),
        }
    }
}
