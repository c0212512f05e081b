// Each test binary compiles its own view of this module; not every binary
// uses every helper.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use treebind_adapter::{RowEvent, RowEventSink, TreeAdapter};
use treebind_core::source::TreeSource;
use treebind_source_mock::{ItemSpec, MockSource, MockTree};

/// Sink collecting every row event for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: RefCell<Vec<RowEvent>>,
}

impl RecordingSink {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn take(&self) -> Vec<RowEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl RowEventSink for RecordingSink {
    fn on_event(&self, event: &RowEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Drains the mock's recorded notifications into the adapter, the way a
/// host event loop would.
pub fn pump(source: &MockSource, adapter: &TreeAdapter) {
    for event in source.take_events() {
        adapter.apply(&event);
    }
}

pub fn adapter_over(source: &Rc<MockSource>) -> TreeAdapter {
    TreeAdapter::new(Rc::clone(source) as Rc<dyn TreeSource>)
}

/// Flat list `[A, B, C]` with a numeric second column.
pub fn list_tree() -> MockTree {
    MockTree::new(vec![
        ItemSpec::labeled("A").with_value(1),
        ItemSpec::labeled("B").with_value(2),
        ItemSpec::labeled("C").with_value(3),
    ])
}

/// Two-level tree `{P[c1, c2], Q}`.
pub fn nested_tree() -> MockTree {
    MockTree::new(vec![
        ItemSpec::labeled("P")
            .with_child(ItemSpec::labeled("c1"))
            .with_child(ItemSpec::labeled("c2")),
        ItemSpec::labeled("Q"),
    ])
}
