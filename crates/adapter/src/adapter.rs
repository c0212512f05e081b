use crate::children::{Fault, TreeResult, TreeState};
use crate::events::{RowEvent, RowEventDispatcher, RowEventSink};
use crate::handle::NodeHandle;
use crate::model::TreeModel;
use std::cell::RefCell;
use std::rc::Rc;
use treebind_core::source::{SourceEvent, TreeSource};
use treebind_core::{TreePath, Value};
use tracing::warn;

/// Consumer-facing facade over one data source.
///
/// Composes the handle table, the lazy per-parent child caches, path
/// resolution and change translation behind the [`TreeModel`] pull
/// contract, and fans structural [`RowEvent`]s out to registered sinks.
///
/// The adapter is single-threaded and performs no locking; source change
/// notifications must be marshalled onto the owning thread and handed to
/// [`TreeAdapter::apply`] before the next pull is serviced.
pub struct TreeAdapter {
    state: RefCell<TreeState>,
    events: RowEventDispatcher,
    source: Rc<dyn TreeSource>,
}

impl TreeAdapter {
    pub fn new(source: Rc<dyn TreeSource>) -> Self {
        Self {
            state: RefCell::new(TreeState::new(Rc::clone(&source))),
            events: RowEventDispatcher::default(),
            source,
        }
    }

    /// Registers a sink receiving every structural event this adapter
    /// emits.
    pub fn subscribe(&self, sink: Rc<dyn RowEventSink>) {
        self.events.register(sink);
    }

    /// Applies one source mutation notification: repairs the caches and
    /// emits the path-addressed row events describing the change.
    pub fn apply(&self, event: &SourceEvent) {
        let emitted = self.state.borrow_mut().translate(event);
        self.dispatch(&emitted);
    }

    fn dispatch(&self, events: &[RowEvent]) {
        for event in events {
            self.events.dispatch(event);
        }
    }

    /// Runs a materializing pull, converting a fault into the self-healing
    /// reset the error contract prescribes: the affected subtree is
    /// dropped, a structural reset reaches the consumer, and the call
    /// itself answers its not-found fallback.
    fn pull<T>(&self, op: impl FnOnce(&mut TreeState) -> TreeResult<T>, fallback: T) -> T {
        let result = op(&mut self.state.borrow_mut());
        match result {
            Ok(value) => value,
            Err(fault) => self.recover(fault, fallback),
        }
    }

    fn recover<T>(&self, fault: Fault, fallback: T) -> T {
        warn!(error = %fault.error, "child enumeration failed; resetting affected subtree");
        let emitted = self.state.borrow_mut().reset_subtree(fault.parent);
        self.dispatch(&emitted);
        fallback
    }
}

impl TreeModel for TreeAdapter {
    fn column_count(&self) -> usize {
        self.source.column_count()
    }

    fn node_at(&self, path: &TreePath) -> Option<NodeHandle> {
        self.pull(|state| state.node_at_path(path), None)
    }

    fn path_of(&self, handle: NodeHandle) -> Option<TreePath> {
        self.state.borrow().path_of(handle)
    }

    fn value(&self, handle: NodeHandle, column: usize) -> Option<Value> {
        let state = self.state.borrow();
        let node = state.node(handle)?;
        Some(node.item.value(column))
    }

    fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.state.borrow().node(handle)?.parent
    }

    fn first_child(&self, parent: Option<NodeHandle>) -> Option<NodeHandle> {
        self.pull(|state| state.first_child(parent), None)
    }

    fn next_sibling(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.pull(|state| state.next_sibling(handle), None)
    }

    fn nth_child(&self, parent: Option<NodeHandle>, index: usize) -> Option<NodeHandle> {
        self.pull(|state| state.node_at_index(parent, index), None)
    }

    fn child_count(&self, parent: Option<NodeHandle>) -> usize {
        self.pull(|state| state.child_count(parent), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{indexed_list, sequential_list};
    use rstest::rstest;
    use treebind_core::Value;
    use treebind_source_mock::MockSource;

    fn pump(source: &MockSource, adapter: &TreeAdapter) {
        for event in source.take_events() {
            adapter.apply(&event);
        }
    }

    #[rstest]
    fn stale_handles_miss_on_every_surface(
        indexed_list: (Rc<MockSource>, TreeAdapter),
    ) {
        let (source, adapter) = indexed_list;
        let b = adapter.node_at(&TreePath::new([1])).expect("B resolves");
        source.remove(&TreePath::root(), 1, 1);
        pump(&source, &adapter);

        assert_eq!(adapter.value(b, 0), None);
        assert_eq!(adapter.path_of(b), None);
        assert_eq!(adapter.parent(b), None);
        assert_eq!(adapter.next_sibling(b), None);
        assert_eq!(adapter.first_child(Some(b)), None);
        assert_eq!(adapter.child_count(Some(b)), 0);
    }

    #[rstest]
    fn faults_self_heal_through_reset(sequential_list: (Rc<MockSource>, TreeAdapter)) {
        let (source, adapter) = sequential_list;
        source.schedule_fault(&TreePath::root(), 0);
        // The very first materialization step faults: the pull misses...
        assert_eq!(adapter.first_child(None), None);
        // ...and rediscovery serves the full collection again.
        assert_eq!(adapter.child_count(None), 3);
        let a = adapter.first_child(None).expect("A resolves");
        assert_eq!(adapter.value(a, 0), Some(Value::from("A")));
    }
}
