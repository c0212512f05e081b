use crate::handle::{HandleTable, NodeHandle};
use crate::node::{ChildStore, ChildrenCache, ChildrenState, Node, Progress};
use std::collections::HashMap;
use std::rc::Rc;
use treebind_core::source::{ChildAccess, CollectionId, ItemRef, SourceError, TreeSource};
use tracing::debug;

/// Materialization fault, tagged with the parent whose child enumeration
/// failed so the facade can reset exactly that subtree.
#[derive(Debug)]
pub(crate) struct Fault {
    pub parent: Option<NodeHandle>,
    pub error: SourceError,
}

pub(crate) type TreeResult<T> = Result<T, Fault>;

/// The adapter's mutable heart: node arena, per-parent child caches and the
/// change-routing table. All operations take `&mut self`; the facade wraps
/// one instance in a `RefCell` (the whole engine is single-threaded).
pub(crate) struct TreeState {
    source: Rc<dyn TreeSource>,
    pub(crate) nodes: HandleTable<Node>,
    /// Children of the synthetic root sentinel, which has no handle.
    root: ChildrenState,
    /// Routes collection-scoped change notifications to the owning parent
    /// (`None` = the root sentinel). Registration doubles as the
    /// change-subscription flag of the collection's cache.
    pub(crate) collections: HashMap<CollectionId, Option<NodeHandle>>,
}

impl TreeState {
    pub fn new(source: Rc<dyn TreeSource>) -> Self {
        Self {
            source,
            nodes: HandleTable::new(),
            root: ChildrenState::Unopened,
            collections: HashMap::new(),
        }
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    fn children_state(&self, parent: Option<NodeHandle>) -> Option<&ChildrenState> {
        match parent {
            None => Some(&self.root),
            Some(handle) => self.nodes.get(handle).map(|node| &node.children),
        }
    }

    fn children_state_mut(&mut self, parent: Option<NodeHandle>) -> Option<&mut ChildrenState> {
        match parent {
            None => Some(&mut self.root),
            Some(handle) => self.nodes.get_mut(handle).map(|node| &mut node.children),
        }
    }

    pub(crate) fn cache(&self, parent: Option<NodeHandle>) -> Option<&ChildrenCache> {
        match self.children_state(parent)? {
            ChildrenState::Open(cache) => Some(cache),
            _ => None,
        }
    }

    pub(crate) fn cache_mut(&mut self, parent: Option<NodeHandle>) -> Option<&mut ChildrenCache> {
        match self.children_state_mut(parent)? {
            ChildrenState::Open(cache) => Some(cache),
            _ => None,
        }
    }

    /// Obtains the child set from the source on first contact. Indexed
    /// capability is recorded with its O(1) count; sequential collections
    /// keep their open enumerator; an absent collection collapses to the
    /// terminal `Empty` state.
    fn ensure_open(&mut self, parent: Option<NodeHandle>) {
        match self.children_state(parent) {
            Some(ChildrenState::Unopened) => {}
            _ => return,
        }
        let item: Option<ItemRef> = match parent {
            None => None,
            Some(handle) => match self.nodes.get(handle) {
                Some(node) => Some(Rc::clone(&node.item)),
                None => return,
            },
        };
        let source = Rc::clone(&self.source);
        let state = match source.children(item.as_ref()) {
            ChildAccess::None => {
                debug!(parent = ?parent, "source reports no child collection");
                ChildrenState::Empty
            }
            ChildAccess::Indexed { collection, store } => {
                debug!(parent = ?parent, %collection, len = store.len(), "opened indexed child collection");
                self.collections.insert(collection, parent);
                ChildrenState::Open(Box::new(ChildrenCache::indexed(collection, store)))
            }
            ChildAccess::Sequential { collection, items } => {
                debug!(parent = ?parent, %collection, "opened sequential child collection");
                self.collections.insert(collection, parent);
                ChildrenState::Open(Box::new(ChildrenCache::sequential(collection, items)))
            }
        };
        if let Some(slot) = self.children_state_mut(parent) {
            *slot = state;
        }
    }

    /// Materializes exactly one more child of `parent`, linking it after
    /// the current tail. `Ok(None)` means the collection is exhausted.
    fn advance(&mut self, parent: Option<NodeHandle>) -> TreeResult<Option<NodeHandle>> {
        let Some(slot) = self.children_state_mut(parent) else {
            return Ok(None);
        };
        // Take the cache out so new nodes can be minted while it is held.
        let taken = std::mem::replace(slot, ChildrenState::Unopened);
        let mut cache = match taken {
            ChildrenState::Open(cache) => cache,
            other => {
                if let Some(slot) = self.children_state_mut(parent) {
                    *slot = other;
                }
                return Ok(None);
            }
        };
        let result = self.advance_in(parent, &mut cache);
        if let Some(slot) = self.children_state_mut(parent) {
            *slot = ChildrenState::Open(cache);
        }
        result
    }

    fn advance_in(
        &mut self,
        parent: Option<NodeHandle>,
        cache: &mut ChildrenCache,
    ) -> TreeResult<Option<NodeHandle>> {
        if cache.progress == Progress::Exhausted {
            return Ok(None);
        }
        let next_item = match &mut cache.store {
            ChildStore::Indexed(store) => {
                let total = cache.known_count.unwrap_or_else(|| store.len());
                if cache.materialized >= total {
                    None
                } else {
                    let item = store
                        .get(cache.materialized)
                        .map_err(|error| Fault { parent, error })?;
                    Some(item)
                }
            }
            ChildStore::Sequential(items) => match items.next() {
                None => None,
                Some(Ok(item)) => Some(item),
                Some(Err(error)) => return Err(Fault { parent, error }),
            },
        };
        let Some(item) = next_item else {
            cache.progress = Progress::Exhausted;
            cache.known_count.get_or_insert(cache.materialized);
            return Ok(None);
        };
        let mut node = Node::new(item, cache.materialized, parent);
        node.prev = cache.tail;
        let handle = self.nodes.mint(node);
        match cache.tail {
            Some(tail) => {
                if let Some(tail_node) = self.nodes.get_mut(tail) {
                    tail_node.next = Some(handle);
                }
            }
            None => cache.head = Some(handle),
        }
        cache.tail = Some(handle);
        cache.materialized += 1;
        cache.progress = Progress::InProgress;
        Ok(Some(handle))
    }

    pub fn first_child(&mut self, parent: Option<NodeHandle>) -> TreeResult<Option<NodeHandle>> {
        self.ensure_open(parent);
        match self.children_state(parent) {
            Some(ChildrenState::Open(cache)) => {
                if let Some(head) = cache.head {
                    return Ok(Some(head));
                }
            }
            _ => return Ok(None),
        }
        self.advance(parent)
    }

    /// Cached successor in O(1) when known; otherwise one enumerator step.
    pub fn next_sibling(&mut self, handle: NodeHandle) -> TreeResult<Option<NodeHandle>> {
        let Some(node) = self.nodes.get(handle) else {
            return Ok(None);
        };
        if let Some(next) = node.next {
            return Ok(Some(next));
        }
        let parent = node.parent;
        match self.cache(parent) {
            Some(cache) if cache.tail == Some(handle) => self.advance(parent),
            _ => Ok(None),
        }
    }

    /// Resolves the child at `index`, materializing forward as needed. The
    /// last-visited hint decides whether to continue from there or restart
    /// at the head; the walk never goes backward.
    pub fn node_at_index(
        &mut self,
        parent: Option<NodeHandle>,
        index: usize,
    ) -> TreeResult<Option<NodeHandle>> {
        self.ensure_open(parent);
        let Some(cache) = self.cache(parent) else {
            return Ok(None);
        };
        let start = match cache.hint {
            Some((pos, handle))
                if pos <= index
                    && self.nodes.get(handle).is_some_and(|node| node.index == pos) =>
            {
                Some((pos, handle))
            }
            _ => cache.head.map(|head| (0, head)),
        };
        let (mut pos, mut current) = match start {
            Some(start) => start,
            None => match self.advance(parent)? {
                Some(head) => (0, head),
                None => return Ok(None),
            },
        };
        while pos < index {
            let next = self.nodes.get(current).and_then(|node| node.next);
            current = match next {
                Some(next) => next,
                None => match self.advance(parent)? {
                    Some(next) => next,
                    None => return Ok(None),
                },
            };
            pos += 1;
        }
        if let Some(cache) = self.cache_mut(parent) {
            cache.hint = Some((index, current));
        }
        Ok(Some(current))
    }

    /// O(1) when the source reports a count; otherwise walks the whole
    /// chain to exhaustion, caching as it goes, and pins the total so the
    /// walk happens at most once.
    pub fn child_count(&mut self, parent: Option<NodeHandle>) -> TreeResult<usize> {
        self.ensure_open(parent);
        match self.children_state(parent) {
            Some(ChildrenState::Open(cache)) => {
                if let Some(count) = cache.known_count {
                    return Ok(count);
                }
            }
            _ => return Ok(0),
        }
        debug!(parent = ?parent, "child_count: walking sequential collection to exhaustion");
        while self.advance(parent)?.is_some() {}
        Ok(self.cache(parent).and_then(|cache| cache.known_count).unwrap_or(0))
    }

    /// Pure chain walk within the materialized prefix; no enumeration.
    pub(crate) fn materialized_at(
        &self,
        parent: Option<NodeHandle>,
        index: usize,
    ) -> Option<NodeHandle> {
        let cache = self.cache(parent)?;
        if index >= cache.materialized {
            return None;
        }
        let mut current = cache.head?;
        for _ in 0..index {
            current = self.nodes.get(current)?.next?;
        }
        Some(current)
    }

    pub(crate) fn materialized_chain(&self, parent: Option<NodeHandle>) -> Vec<NodeHandle> {
        let mut handles = Vec::new();
        let Some(cache) = self.cache(parent) else {
            return handles;
        };
        let mut cursor = cache.head;
        while let Some(handle) = cursor {
            handles.push(handle);
            cursor = self.nodes.get(handle).and_then(|node| node.next);
        }
        handles
    }

    /// Frees `handle` and everything below it, releasing tickets and
    /// dropping change registrations of nested collections.
    pub(crate) fn free_subtree(&mut self, handle: NodeHandle) {
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.release(current) else {
                continue;
            };
            if let ChildrenState::Open(cache) = node.children {
                self.collections.remove(&cache.collection);
                let mut child = cache.head;
                while let Some(handle) = child {
                    child = self.nodes.get(handle).and_then(|node| node.next);
                    stack.push(handle);
                }
            }
        }
    }

    /// Drops the child cache of `parent` (and every node beneath it) back
    /// to `Unopened` so the region is rediscovered from the source.
    pub(crate) fn drop_children(&mut self, parent: Option<NodeHandle>) {
        let Some(slot) = self.children_state_mut(parent) else {
            return;
        };
        let state = std::mem::replace(slot, ChildrenState::Unopened);
        if let ChildrenState::Open(cache) = state {
            self.collections.remove(&cache.collection);
            let mut child = cache.head;
            while let Some(handle) = child {
                child = self.nodes.get(handle).and_then(|node| node.next);
                self.free_subtree(handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{list_tree, nested_tree};
    use rstest::rstest;
    use treebind_source_mock::{ItemSpec, MockSource, MockTree};

    fn sequential_state() -> TreeState {
        TreeState::new(Rc::new(MockSource::sequential(list_tree())))
    }

    fn indexed_state() -> TreeState {
        TreeState::new(Rc::new(MockSource::new(list_tree())))
    }

    #[rstest]
    fn sequential_materialization_is_one_step_at_a_time() {
        let mut state = sequential_state();
        let first = state.first_child(None).unwrap().unwrap();
        {
            let cache = state.cache(None).unwrap();
            assert_eq!(cache.materialized, 1);
            assert_eq!(cache.progress, Progress::InProgress);
            assert_eq!(cache.known_count, None);
        }
        let second = state.next_sibling(first).unwrap().unwrap();
        assert_eq!(state.cache(None).unwrap().materialized, 2);
        let third = state.next_sibling(second).unwrap().unwrap();
        assert_eq!(state.next_sibling(third).unwrap(), None);
        let cache = state.cache(None).unwrap();
        assert_eq!(cache.progress, Progress::Exhausted);
        assert_eq!(cache.known_count, Some(3));
    }

    #[rstest]
    fn child_count_walks_sequential_collections_once() {
        let mut state = sequential_state();
        assert_eq!(state.child_count(None).unwrap(), 3);
        assert_eq!(state.cache(None).unwrap().materialized, 3);
        // Second call answers from the pinned total.
        assert_eq!(state.child_count(None).unwrap(), 3);
    }

    #[rstest]
    fn indexed_count_needs_no_materialization() {
        let mut state = indexed_state();
        assert_eq!(state.child_count(None).unwrap(), 3);
        assert_eq!(state.cache(None).unwrap().materialized, 0);
    }

    #[rstest]
    fn node_at_index_resumes_from_the_forward_hint() {
        let mut state = sequential_state();
        let third = state.node_at_index(None, 2).unwrap().unwrap();
        assert_eq!(state.cache(None).unwrap().hint, Some((2, third)));
        // A smaller index restarts from the head rather than walking back.
        let second = state.node_at_index(None, 1).unwrap().unwrap();
        assert_eq!(state.node(second).unwrap().index, 1);
        assert_eq!(state.cache(None).unwrap().hint, Some((1, second)));
    }

    #[rstest]
    fn out_of_range_index_is_a_plain_miss() {
        let mut state = indexed_state();
        assert_eq!(state.node_at_index(None, 7).unwrap(), None);
    }

    #[rstest]
    fn absent_child_collection_collapses_to_empty() {
        let mut state = TreeState::new(Rc::new(MockSource::new(nested_tree())));
        let q = state.node_at_index(None, 1).unwrap().unwrap();
        assert_eq!(state.first_child(Some(q)).unwrap(), None);
        assert!(matches!(state.node(q).unwrap().children, ChildrenState::Empty));
        // Only the root collection is registered for change routing.
        assert_eq!(state.collections.len(), 1);
    }

    #[rstest]
    fn growable_empty_collection_stays_subscribed() {
        let tree = MockTree::new(vec![ItemSpec::labeled("G").with_children_enabled()]);
        let mut state = TreeState::new(Rc::new(MockSource::new(tree)));
        let g = state.node_at_index(None, 0).unwrap().unwrap();
        assert_eq!(state.child_count(Some(g)).unwrap(), 0);
        assert_eq!(state.collections.len(), 2);
    }
}

