use crate::TreeAdapter;
use rstest::fixture;
use std::rc::Rc;
use treebind_core::source::TreeSource;
use treebind_source_mock::{ItemSpec, MockSource, MockTree};

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

pub fn adapter_over(source: &Rc<MockSource>) -> TreeAdapter {
    TreeAdapter::new(Rc::clone(source) as Rc<dyn TreeSource>)
}

#[fixture]
pub fn indexed_list() -> (Rc<MockSource>, TreeAdapter) {
    let source = Rc::new(MockSource::new(list_tree()));
    let adapter = adapter_over(&source);
    (source, adapter)
}

#[fixture]
pub fn sequential_list() -> (Rc<MockSource>, TreeAdapter) {
    let source = Rc::new(MockSource::sequential(list_tree()));
    let adapter = adapter_over(&source);
    (source, adapter)
}
