use crate::handle::NodeHandle;
use treebind_core::source::{ChildEnumerator, CollectionId, IndexedChildren, ItemRef};

/// One adapted row: a source item plus its position and topology metadata.
///
/// `parent` is fixed for the node's whole lifetime. Reparenting in the
/// source is modeled as remove + insert, never as pointer mutation.
pub(crate) struct Node {
    pub item: ItemRef,
    /// Sibling index; accurate only while the parent's cache has not been
    /// invalidated since the node was linked.
    pub index: usize,
    pub parent: Option<NodeHandle>,
    pub prev: Option<NodeHandle>,
    pub next: Option<NodeHandle>,
    pub children: ChildrenState,
}

impl Node {
    pub fn new(item: ItemRef, index: usize, parent: Option<NodeHandle>) -> Self {
        Self { item, index, parent, prev: None, next: None, children: ChildrenState::Unopened }
    }
}

/// Child discovery state of one parent.
pub(crate) enum ChildrenState {
    /// The source has not been asked yet.
    Unopened,
    /// The source reported no child collection; terminal until a reset.
    Empty,
    /// Discovery is underway; the cache tracks the enumerated prefix.
    Open(Box<ChildrenCache>),
}

/// Incrementally discovered children of one parent.
pub(crate) struct ChildrenCache {
    /// Registration ticket under which change notifications are routed.
    pub collection: CollectionId,
    pub store: ChildStore,
    /// Total size when cheaply known: always present for indexed stores,
    /// pinned at exhaustion for sequential ones.
    pub known_count: Option<usize>,
    pub head: Option<NodeHandle>,
    pub tail: Option<NodeHandle>,
    /// Length of the materialized prefix. The sibling chain is always
    /// contiguous from index zero.
    pub materialized: usize,
    pub progress: Progress,
    /// Last visited (index, handle). Traversal resumes here when moving
    /// forward and never walks backward.
    pub hint: Option<(usize, NodeHandle)>,
}

impl ChildrenCache {
    pub fn indexed(collection: CollectionId, store: Box<dyn IndexedChildren>) -> Self {
        let known = store.len();
        Self {
            collection,
            store: ChildStore::Indexed(store),
            known_count: Some(known),
            head: None,
            tail: None,
            materialized: 0,
            progress: Progress::NotStarted,
            hint: None,
        }
    }

    pub fn sequential(collection: CollectionId, items: ChildEnumerator) -> Self {
        Self {
            collection,
            store: ChildStore::Sequential(items),
            known_count: None,
            head: None,
            tail: None,
            materialized: 0,
            progress: Progress::NotStarted,
            hint: None,
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self.store, ChildStore::Indexed(_))
    }
}

/// Where further items of a collection come from.
pub(crate) enum ChildStore {
    Indexed(Box<dyn IndexedChildren>),
    Sequential(ChildEnumerator),
}

/// Enumerator progress of one child cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Progress {
    NotStarted,
    InProgress,
    Exhausted,
}
