mod common;

use common::{adapter_over, list_tree, nested_tree};
use rstest::rstest;
use std::rc::Rc;
use treebind_adapter::{TreeAdapter, TreeModel};
use treebind_core::{TreePath, Value};
use treebind_source_mock::{MockSource, MockTree};

fn indexed(tree: MockTree) -> TreeAdapter {
    adapter_over(&Rc::new(MockSource::new(tree)))
}

fn sequential(tree: MockTree) -> TreeAdapter {
    adapter_over(&Rc::new(MockSource::sequential(tree)))
}

fn labels_in_order(adapter: &TreeAdapter) -> Vec<String> {
    let mut labels = Vec::new();
    let mut cursor = adapter.first_child(None);
    while let Some(handle) = cursor {
        let Some(Value::String(label)) = adapter.value(handle, 0) else {
            panic!("label column must be a string");
        };
        labels.push(label);
        cursor = adapter.next_sibling(handle);
    }
    labels
}

#[rstest]
#[case::indexed(indexed(list_tree()))]
#[case::sequential(sequential(list_tree()))]
fn forward_iteration_yields_source_order(#[case] adapter: TreeAdapter) {
    assert_eq!(labels_in_order(&adapter), ["A", "B", "C"]);
    assert_eq!(adapter.child_count(None), 3);
}

#[rstest]
#[case::indexed(indexed(nested_tree()))]
#[case::sequential(sequential(nested_tree()))]
fn paths_round_trip_for_every_resolvable_node(#[case] adapter: TreeAdapter) {
    for indices in [vec![0], vec![1], vec![0, 0], vec![0, 1]] {
        let path = TreePath::new(indices);
        let handle = adapter.node_at(&path).expect("path resolves");
        assert_eq!(adapter.path_of(handle), Some(path));
    }
}

#[rstest]
fn values_reflect_the_source_at_call_time() {
    let source = Rc::new(MockSource::new(list_tree()));
    let adapter = adapter_over(&source);
    let b = adapter.node_at(&TreePath::new([1])).expect("B resolves");
    assert_eq!(adapter.value(b, 0), Some(Value::from("B")));
    assert_eq!(adapter.value(b, 1), Some(Value::from(2)));
    // In-place source mutation is visible on the next pull even before any
    // change notification arrives.
    source.set_value(&TreePath::new([1]), 1, Value::from(20));
    assert_eq!(adapter.value(b, 1), Some(Value::from(20)));
    // Out-of-range columns are null, not missing.
    assert_eq!(adapter.value(b, 9), Some(Value::Null));
    assert_eq!(adapter.column_count(), 2);
}

#[rstest]
fn nested_child_path_addresses_second_child() {
    let adapter = indexed(nested_tree());
    let p = adapter.node_at(&TreePath::new([0])).expect("P resolves");
    let c2 = adapter.nth_child(Some(p), 1).expect("c2 resolves");
    assert_eq!(adapter.path_of(c2), Some(TreePath::new([0, 1])));
    assert_eq!(adapter.parent(c2), Some(p));
    assert_eq!(adapter.value(c2, 0), Some(Value::from("c2")));
}

#[rstest]
#[case::indexed(indexed(nested_tree()))]
#[case::sequential(sequential(nested_tree()))]
fn out_of_range_lookups_miss_without_error(#[case] adapter: TreeAdapter) {
    assert_eq!(adapter.node_at(&TreePath::new([5])), None);
    assert_eq!(adapter.node_at(&TreePath::new([1, 0])), None);
    assert_eq!(adapter.node_at(&TreePath::new([0, 2])), None);
    let p = adapter.node_at(&TreePath::new([0])).expect("P resolves");
    assert_eq!(adapter.nth_child(Some(p), 9), None);
}

#[rstest]
fn the_root_sentinel_has_no_handle() {
    let adapter = indexed(nested_tree());
    assert_eq!(adapter.node_at(&TreePath::root()), None);
    let p = adapter.node_at(&TreePath::new([0])).expect("P resolves");
    assert_eq!(adapter.parent(p), None);
}

#[rstest]
fn leaf_rows_report_no_children() {
    let adapter = indexed(nested_tree());
    let q = adapter.node_at(&TreePath::new([1])).expect("Q resolves");
    assert_eq!(adapter.first_child(Some(q)), None);
    assert_eq!(adapter.child_count(Some(q)), 0);
}

#[rstest]
fn repeated_resolution_returns_the_same_handle() {
    let adapter = sequential(list_tree());
    let first = adapter.node_at(&TreePath::new([2])).expect("C resolves");
    let second = adapter.node_at(&TreePath::new([2])).expect("C resolves again");
    assert_eq!(first, second);
}
