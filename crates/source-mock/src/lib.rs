mod tree;

pub use tree::{ItemSpec, MockTree, TreeLoadError};

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use treebind_core::TreePath;
use treebind_core::Value;
use treebind_core::source::{
    ChildAccess, CollectionChange, CollectionId, IndexedChildren, ItemRef, SourceError,
    SourceErrorKind, SourceEvent, SourceItem, TreeSource,
};

/// Controllable in-memory data source.
///
/// Backs tests, demos and the CLI: the tree is mutated through the methods
/// below, each of which records the matching [`SourceEvent`] for the host
/// to drain via [`MockSource::take_events`] and feed to an adapter.
///
/// The source serves children either with random access (default) or as
/// forward-only enumerators ([`MockSource::sequential`]); enumerators
/// observe mutations as faults on their next step, like a real collection
/// invalidating its iterators.
pub struct MockSource {
    roots: Rc<MockCollection>,
    columns: usize,
    sequential: bool,
    events: RefCell<Vec<SourceEvent>>,
    next_collection: Cell<u64>,
    fault: Rc<RefCell<Option<FaultPlan>>>,
}

impl MockSource {
    /// Source with O(1) count/index capability.
    pub fn new(tree: MockTree) -> Self {
        Self::build(tree, false)
    }

    /// Source that only hands out forward-only enumerators.
    pub fn sequential(tree: MockTree) -> Self {
        Self::build(tree, true)
    }

    fn build(tree: MockTree, sequential: bool) -> Self {
        let columns = tree.column_count();
        let next_collection = Cell::new(0);
        let roots = build_collection(tree.roots(), &next_collection);
        Self {
            roots,
            columns,
            sequential,
            events: RefCell::new(Vec::new()),
            next_collection,
            fault: Rc::new(RefCell::new(None)),
        }
    }

    /// Drains the events recorded since the last call, in order.
    pub fn take_events(&self) -> Vec<SourceEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    /// Records a raw event without touching the tree; the hook for
    /// injecting malformed or stale notifications in tests.
    pub fn push_event(&self, event: SourceEvent) {
        self.events.borrow_mut().push(event);
    }

    /// Collection id of the child collection under `parent`.
    ///
    /// # Panics
    /// Panics when `parent` does not address an item with children.
    pub fn collection_id(&self, parent: &TreePath) -> CollectionId {
        self.collection_at(parent).id
    }

    /// Schedules a one-shot enumeration fault: the next read of `index`
    /// under `parent` fails, then the plan clears.
    pub fn schedule_fault(&self, parent: &TreePath, index: usize) {
        let collection = self.collection_at(parent);
        *self.fault.borrow_mut() = Some(FaultPlan { collection: collection.id, index });
    }

    /// Inserts `specs` at `index` under `parent`.
    pub fn insert(&self, parent: &TreePath, index: usize, specs: Vec<ItemSpec>) {
        let collection = self.collection_at(parent);
        let count = specs.len();
        {
            let mut items = collection.items.borrow_mut();
            for (offset, spec) in specs.iter().enumerate() {
                items.insert(index + offset, build_record(spec, &self.next_collection));
            }
        }
        collection.touch();
        self.record(collection.id, CollectionChange::Inserted { index, count });
    }

    /// Removes `count` items starting at `index` under `parent`.
    pub fn remove(&self, parent: &TreePath, index: usize, count: usize) {
        let collection = self.collection_at(parent);
        collection.items.borrow_mut().drain(index..index + count);
        collection.touch();
        self.record(collection.id, CollectionChange::Removed { index, count });
    }

    /// Replaces the items at `index ..` with fresh records built from
    /// `specs`, keeping the collection length unchanged.
    pub fn replace(&self, parent: &TreePath, index: usize, specs: Vec<ItemSpec>) {
        let collection = self.collection_at(parent);
        let count = specs.len();
        {
            let mut items = collection.items.borrow_mut();
            for (offset, spec) in specs.iter().enumerate() {
                items[index + offset] = build_record(spec, &self.next_collection);
            }
        }
        collection.touch();
        self.record(collection.id, CollectionChange::Replaced { index, count });
    }

    /// Updates a single value in place on the item at `path`, reporting it
    /// as a one-item replace to the owning collection.
    ///
    /// # Panics
    /// Panics when `path` is the root sentinel or out of range.
    pub fn set_value(&self, path: &TreePath, column: usize, value: Value) {
        let parent = path.parent().expect("cannot set a value on the root sentinel");
        let index = path.last().expect("cannot set a value on the root sentinel");
        let collection = self.collection_at(&parent);
        let record =
            collection.items.borrow().get(index).cloned().expect("mock path out of range");
        {
            let mut values = record.values.borrow_mut();
            if values.len() <= column {
                values.resize(column + 1, Value::Null);
            }
            values[column] = value;
        }
        self.record(collection.id, CollectionChange::Replaced { index, count: 1 });
    }

    /// Moves a block of `count` items from `old_index` to `new_index`
    /// (`new_index` addresses the collection after the block was removed).
    pub fn move_block(&self, parent: &TreePath, old_index: usize, new_index: usize, count: usize) {
        let collection = self.collection_at(parent);
        {
            let mut items = collection.items.borrow_mut();
            let block: Vec<Rc<MockRecord>> = items.drain(old_index..old_index + count).collect();
            for (offset, record) in block.into_iter().enumerate() {
                items.insert(new_index + offset, record);
            }
        }
        collection.touch();
        self.record(collection.id, CollectionChange::Moved { old_index, new_index, count });
    }

    /// Permutes the collection under `parent`; `order[new_index] = old_index`.
    pub fn reorder(&self, parent: &TreePath, order: &[usize]) {
        let collection = self.collection_at(parent);
        {
            let mut items = collection.items.borrow_mut();
            assert_eq!(order.len(), items.len(), "reorder must cover the whole collection");
            let reordered: Vec<Rc<MockRecord>> =
                order.iter().map(|&old| Rc::clone(&items[old])).collect();
            *items = reordered;
        }
        collection.touch();
        self.record(collection.id, CollectionChange::Reordered { order: order.to_vec() });
    }

    /// Replaces the whole collection under `parent` and reports it as an
    /// unindexed reset.
    pub fn replace_all(&self, parent: &TreePath, specs: Vec<ItemSpec>) {
        let collection = self.collection_at(parent);
        {
            let mut items = collection.items.borrow_mut();
            *items = specs.iter().map(|spec| build_record(spec, &self.next_collection)).collect();
        }
        collection.touch();
        self.record(collection.id, CollectionChange::Reset);
    }

    /// Reports an unindexed reset without changing the tree.
    pub fn reset(&self, parent: &TreePath) {
        let collection = self.collection_at(parent);
        self.record(collection.id, CollectionChange::Reset);
    }

    fn record(&self, collection: CollectionId, change: CollectionChange) {
        self.events.borrow_mut().push(SourceEvent::new(collection, change));
    }

    /// # Panics
    /// Panics when the path does not address a live child collection.
    fn collection_at(&self, parent: &TreePath) -> Rc<MockCollection> {
        let mut collection = Rc::clone(&self.roots);
        for &index in parent.indices() {
            let record = collection
                .items
                .borrow()
                .get(index)
                .cloned()
                .unwrap_or_else(|| panic!("mock path {parent} out of range"));
            let children = record
                .children
                .clone()
                .unwrap_or_else(|| panic!("mock item at {parent} has no child collection"));
            collection = children;
        }
        collection
    }
}

impl TreeSource for MockSource {
    fn column_count(&self) -> usize {
        self.columns
    }

    fn children(&self, parent: Option<&ItemRef>) -> ChildAccess {
        let collection = match parent {
            None => Rc::clone(&self.roots),
            Some(item) => {
                let Some(record) = as_record(item) else {
                    return ChildAccess::None;
                };
                match &record.children {
                    Some(children) => Rc::clone(children),
                    None => return ChildAccess::None,
                }
            }
        };
        if self.sequential {
            ChildAccess::Sequential {
                collection: collection.id,
                items: Box::new(SequentialItems {
                    version: collection.version.get(),
                    position: 0,
                    collection,
                    fault: Rc::clone(&self.fault),
                }),
            }
        } else {
            ChildAccess::Indexed {
                collection: collection.id,
                store: Box::new(IndexedItems { collection, fault: Rc::clone(&self.fault) }),
            }
        }
    }
}

/// One scheduled fault: reading `index` of `collection` fails once.
#[derive(Clone, Debug)]
struct FaultPlan {
    collection: CollectionId,
    index: usize,
}

#[derive(Debug)]
struct MockCollection {
    id: CollectionId,
    /// Bumped on every structural mutation; open enumerators fault on
    /// their next step when they notice, like real invalidated iterators.
    version: Cell<u64>,
    items: RefCell<Vec<Rc<MockRecord>>>,
}

impl MockCollection {
    fn touch(&self) {
        self.version.set(self.version.get() + 1);
    }
}

#[derive(Debug)]
struct MockRecord {
    values: RefCell<Vec<Value>>,
    children: Option<Rc<MockCollection>>,
}

impl SourceItem for MockRecord {
    fn value(&self, column: usize) -> Value {
        self.values.borrow().get(column).cloned().unwrap_or(Value::Null)
    }
}

fn as_record(item: &ItemRef) -> Option<&MockRecord> {
    (item.as_ref() as &dyn Any).downcast_ref::<MockRecord>()
}

fn build_collection(specs: &[ItemSpec], next: &Cell<u64>) -> Rc<MockCollection> {
    let id = CollectionId::new(next.get());
    next.set(next.get() + 1);
    let items = specs.iter().map(|spec| build_record(spec, next)).collect();
    Rc::new(MockCollection { id, version: Cell::new(0), items: RefCell::new(items) })
}

fn build_record(spec: &ItemSpec, next: &Cell<u64>) -> Rc<MockRecord> {
    let children = if spec.children.is_empty() && !spec.expose_children {
        None
    } else {
        Some(build_collection(&spec.children, next))
    };
    Rc::new(MockRecord { values: RefCell::new(spec.values.clone()), children })
}

struct IndexedItems {
    collection: Rc<MockCollection>,
    fault: Rc<RefCell<Option<FaultPlan>>>,
}

impl IndexedChildren for IndexedItems {
    fn len(&self) -> usize {
        self.collection.items.borrow().len()
    }

    fn get(&self, index: usize) -> Result<ItemRef, SourceError> {
        if take_fault(&self.fault, self.collection.id, index) {
            return Err(SourceError::enumeration("injected enumeration fault"));
        }
        self.collection
            .items
            .borrow()
            .get(index)
            .cloned()
            .map(|record| record as ItemRef)
            .ok_or_else(|| {
                SourceError::new(
                    SourceErrorKind::IndexUnavailable,
                    format!("index {index} out of bounds"),
                )
            })
    }
}

struct SequentialItems {
    collection: Rc<MockCollection>,
    fault: Rc<RefCell<Option<FaultPlan>>>,
    version: u64,
    position: usize,
}

impl Iterator for SequentialItems {
    type Item = Result<ItemRef, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.collection.version.get() != self.version {
            return Some(Err(SourceError::enumeration("collection modified during enumeration")));
        }
        if take_fault(&self.fault, self.collection.id, self.position) {
            return Some(Err(SourceError::enumeration("injected enumeration fault")));
        }
        let record = self.collection.items.borrow().get(self.position).cloned()?;
        self.position += 1;
        Some(Ok(record as ItemRef))
    }
}

fn take_fault(
    plan: &Rc<RefCell<Option<FaultPlan>>>,
    collection: CollectionId,
    index: usize,
) -> bool {
    let mut slot = plan.borrow_mut();
    match slot.as_ref() {
        Some(fault) if fault.collection == collection && fault.index == index => {
            *slot = None;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn source() -> MockSource {
        MockSource::new(MockTree::new(vec![
            ItemSpec::labeled("A").with_child(ItemSpec::labeled("A0")),
            ItemSpec::labeled("B"),
        ]))
    }

    fn root_items(source: &MockSource) -> Vec<ItemRef> {
        match source.children(None) {
            ChildAccess::Indexed { store, .. } => {
                (0..store.len()).map(|index| store.get(index).expect("item")).collect()
            }
            _ => panic!("expected indexed access"),
        }
    }

    #[rstest]
    fn serves_indexed_children(source: MockSource) {
        let items = root_items(&source);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].value(0), Value::from("A"));
        assert_eq!(items[1].value(0), Value::from("B"));
    }

    #[rstest]
    fn nested_collections_resolve_through_items(source: MockSource) {
        let items = root_items(&source);
        let ChildAccess::Indexed { store, .. } = source.children(Some(&items[0])) else {
            panic!("expected indexed children under A");
        };
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0).expect("child").value(0), Value::from("A0"));
        // B never had children.
        assert!(matches!(source.children(Some(&items[1])), ChildAccess::None));
    }

    #[rstest]
    fn mutations_record_matching_events(source: MockSource) {
        let root = TreePath::root();
        source.insert(&root, 1, vec![ItemSpec::labeled("X")]);
        source.remove(&root, 0, 1);
        let events = source.take_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].change, CollectionChange::Inserted { index: 1, count: 1 });
        assert_eq!(events[1].change, CollectionChange::Removed { index: 0, count: 1 });
        assert!(source.take_events().is_empty());
    }

    #[rstest]
    fn sequential_enumerators_fault_after_mutation() {
        let sequential = MockSource::sequential(MockTree::new(vec![
            ItemSpec::labeled("A"),
            ItemSpec::labeled("B"),
        ]));
        let ChildAccess::Sequential { mut items, .. } = sequential.children(None) else {
            panic!("expected sequential access");
        };
        assert!(items.next().expect("first").is_ok());
        sequential.insert(&TreePath::root(), 0, vec![ItemSpec::labeled("X")]);
        let fault = items.next().expect("step after mutation");
        assert_eq!(fault.unwrap_err().kind, SourceErrorKind::EnumerationFailed);
    }

    #[rstest]
    fn scheduled_faults_fire_once(source: MockSource) {
        source.schedule_fault(&TreePath::root(), 1);
        let ChildAccess::Indexed { store, .. } = source.children(None) else {
            panic!("expected indexed access");
        };
        assert!(store.get(0).is_ok());
        assert!(store.get(1).is_err());
        assert!(store.get(1).is_ok());
    }
}
