use std::cell::RefCell;
use std::rc::Rc;
use treebind_core::TreePath;

/// Structural notification raised toward the rendering consumer.
///
/// Paths are expressed in the emitting model's own path space and describe
/// the tree as it looks *after* the mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowEvent {
    /// A row now exists at `path`.
    Inserted { path: TreePath },
    /// The row at `path` is gone; later siblings moved up by one.
    Removed { path: TreePath },
    /// The row at `path` changed its value content in place.
    Changed { path: TreePath },
    /// The children of `parent` were permuted;
    /// `permutation[new_index] = old_index` over the materialized rows.
    Reordered { parent: TreePath, permutation: Vec<usize> },
    /// Everything beneath `parent` must be re-requested from scratch.
    Reset { parent: TreePath },
}

/// Receiver of consumer-facing row events.
pub trait RowEventSink {
    fn on_event(&self, event: &RowEvent);
}

/// Fan-out of row events to registered sinks, single-threaded.
#[derive(Default)]
pub(crate) struct RowEventDispatcher {
    sinks: RefCell<Vec<Rc<dyn RowEventSink>>>,
}

impl RowEventDispatcher {
    pub fn register(&self, sink: Rc<dyn RowEventSink>) {
        self.sinks.borrow_mut().push(sink);
    }

    pub fn dispatch(&self, event: &RowEvent) {
        // Snapshot first: a sink may register further sinks while handling
        // the event.
        let sinks = self.sinks.borrow().clone();
        for sink in sinks {
            sink.on_event(event);
        }
    }
}
