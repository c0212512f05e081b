use crate::handle::NodeHandle;
use treebind_core::{TreePath, Value};

/// Iteration contract a rendering consumer pulls from, implemented by
/// [`crate::TreeAdapter`] and [`crate::FilterView`].
///
/// Every method is a synchronous, viewport-driven pull. Lookups that miss
/// (a stale handle, an out-of-range path segment) answer `None` or `0`;
/// they are normal outcomes, not errors. `parent = None` addresses the
/// synthetic root sentinel, which itself has no handle.
pub trait TreeModel {
    /// Number of value columns every row exposes.
    fn column_count(&self) -> usize;

    /// Resolves a positional path to a handle, materializing as needed.
    fn node_at(&self, path: &TreePath) -> Option<NodeHandle>;

    /// Positional path of a live handle.
    fn path_of(&self, handle: NodeHandle) -> Option<TreePath>;

    /// Column value of the row, read from the source at call time.
    fn value(&self, handle: NodeHandle, column: usize) -> Option<Value>;

    /// Parent handle; `None` for top-level rows and stale handles.
    fn parent(&self, handle: NodeHandle) -> Option<NodeHandle>;

    fn first_child(&self, parent: Option<NodeHandle>) -> Option<NodeHandle>;

    fn next_sibling(&self, handle: NodeHandle) -> Option<NodeHandle>;

    fn nth_child(&self, parent: Option<NodeHandle>, index: usize) -> Option<NodeHandle>;

    /// Child count of `parent`. O(1) for counted sources; walks a
    /// forward-only collection to exhaustion once.
    fn child_count(&self, parent: Option<NodeHandle>) -> usize;
}
