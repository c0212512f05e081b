use crate::children::TreeState;
use crate::events::RowEvent;
use crate::handle::NodeHandle;
use crate::node::{ChildStore, Node, Progress};
use treebind_core::source::{CollectionChange, ItemRef, SourceEvent};
use tracing::{debug, warn};

impl TreeState {
    /// Translates one source mutation into cache repairs plus the
    /// consumer-facing events describing them. Events are returned instead
    /// of dispatched so the facade can drop its borrow first.
    pub(crate) fn translate(&mut self, event: &SourceEvent) -> Vec<RowEvent> {
        let Some(&parent) = self.collections.get(&event.collection) else {
            debug!(collection = %event.collection, "ignoring event for unsubscribed collection");
            return Vec::new();
        };
        if let Some(handle) = parent
            && self.node(handle).is_none()
        {
            debug!(collection = %event.collection, "ignoring event for freed parent");
            self.collections.remove(&event.collection);
            return Vec::new();
        }
        match &event.change {
            CollectionChange::Inserted { index, count } => {
                self.translate_inserted(parent, *index, *count)
            }
            CollectionChange::Removed { index, count } => {
                self.translate_removed(parent, *index, *count)
            }
            CollectionChange::Replaced { index, count } => {
                self.translate_replaced(parent, *index, *count)
            }
            CollectionChange::Moved { old_index, new_index, count } => {
                self.translate_moved(parent, *old_index, *new_index, *count)
            }
            CollectionChange::Reordered { order } => self.translate_reordered(parent, order),
            CollectionChange::Reset => self.reset_subtree(parent),
        }
    }

    /// Drops the subtree cache of `parent` and tells the consumer to
    /// re-request everything beneath it. The localized self-healing used by
    /// every fault path.
    pub(crate) fn reset_subtree(&mut self, parent: Option<NodeHandle>) -> Vec<RowEvent> {
        let path = self.parent_path(parent);
        self.drop_children(parent);
        vec![RowEvent::Reset { parent: path }]
    }

    fn degrade_to_reset(&mut self, parent: Option<NodeHandle>, reason: &str) -> Vec<RowEvent> {
        warn!(parent = ?parent, reason, "change event inconsistent with cached state; resetting subtree");
        self.reset_subtree(parent)
    }

    fn translate_inserted(
        &mut self,
        parent: Option<NodeHandle>,
        index: usize,
        count: usize,
    ) -> Vec<RowEvent> {
        let Some(cache) = self.cache(parent) else {
            return Vec::new();
        };
        if count == 0 {
            return Vec::new();
        }
        let materialized = cache.materialized;
        let known = cache.known_count;
        let indexed = cache.is_indexed();
        let exhausted = cache.progress == Progress::Exhausted;
        if let Some(total) = known
            && index > total
        {
            return self.degrade_to_reset(parent, "insert index beyond known collection size");
        }
        if index >= materialized {
            // Past the materialized frontier: no splice, no synthetic
            // events; the region is discovered later under the new layout.
            if indexed {
                if let Some(cache) = self.cache_mut(parent) {
                    cache.known_count = known.map(|total| total + count);
                    if exhausted {
                        cache.progress = Progress::InProgress;
                    }
                }
                return Vec::new();
            }
            if exhausted {
                // The sequential enumerator is spent, so the appended
                // suffix could never be discovered again.
                return self.degrade_to_reset(parent, "insert past an exhausted sequential enumerator");
            }
            return Vec::new();
        }
        if !indexed {
            return self.degrade_to_reset(parent, "positional insert into a forward-only collection");
        }
        self.splice_inserted(parent, index, count)
    }

    fn splice_inserted(
        &mut self,
        parent: Option<NodeHandle>,
        index: usize,
        count: usize,
    ) -> Vec<RowEvent> {
        let items = match self.read_indexed(parent, index, count) {
            Ok(items) => items,
            Err(events) => return events,
        };
        let Some(successor) = self.materialized_at(parent, index) else {
            return self.degrade_to_reset(parent, "insert position missing from materialized chain");
        };
        let predecessor = self.node(successor).and_then(|node| node.prev);
        let mut prev = predecessor;
        let base = self.parent_path(parent);
        let mut events = Vec::with_capacity(count);
        for (offset, item) in items.into_iter().enumerate() {
            let mut node = Node::new(item, index + offset, parent);
            node.prev = prev;
            let handle = self.nodes.mint(node);
            match prev {
                Some(prev_handle) => {
                    if let Some(prev_node) = self.nodes.get_mut(prev_handle) {
                        prev_node.next = Some(handle);
                    }
                }
                None => {
                    if let Some(cache) = self.cache_mut(parent) {
                        cache.head = Some(handle);
                    }
                }
            }
            prev = Some(handle);
            events.push(RowEvent::Inserted { path: base.child(index + offset) });
        }
        if let Some(last) = prev
            && let Some(last_node) = self.nodes.get_mut(last)
        {
            last_node.next = Some(successor);
        }
        if let Some(successor_node) = self.nodes.get_mut(successor) {
            successor_node.prev = prev;
        }
        // Shift the displaced suffix of the chain.
        let mut cursor = Some(successor);
        while let Some(handle) = cursor {
            let Some(node) = self.nodes.get_mut(handle) else {
                break;
            };
            node.index += count;
            cursor = node.next;
        }
        if let Some(cache) = self.cache_mut(parent) {
            cache.materialized += count;
            cache.known_count = cache.known_count.map(|total| total + count);
            cache.hint = None;
        }
        events
    }

    fn translate_removed(
        &mut self,
        parent: Option<NodeHandle>,
        index: usize,
        count: usize,
    ) -> Vec<RowEvent> {
        let Some(cache) = self.cache(parent) else {
            return Vec::new();
        };
        if count == 0 {
            return Vec::new();
        }
        if let Some(total) = cache.known_count
            && index + count > total
        {
            return self.degrade_to_reset(parent, "remove range exceeds known collection size");
        }
        let materialized = cache.materialized;
        if index < materialized {
            let victim_count = count.min(materialized - index);
            let Some(first_victim) = self.materialized_at(parent, index) else {
                return self.degrade_to_reset(parent, "remove position missing from materialized chain");
            };
            let mut victims = Vec::with_capacity(victim_count);
            let mut cursor = Some(first_victim);
            for _ in 0..victim_count {
                let Some(handle) = cursor else {
                    break;
                };
                victims.push(handle);
                cursor = self.node(handle).and_then(|node| node.next);
            }
            let predecessor = self.node(first_victim).and_then(|node| node.prev);
            let successor = cursor;
            match predecessor {
                Some(handle) => {
                    if let Some(node) = self.nodes.get_mut(handle) {
                        node.next = successor;
                    }
                }
                None => {
                    if let Some(cache) = self.cache_mut(parent) {
                        cache.head = successor;
                    }
                }
            }
            match successor {
                Some(handle) => {
                    if let Some(node) = self.nodes.get_mut(handle) {
                        node.prev = predecessor;
                    }
                }
                None => {
                    if let Some(cache) = self.cache_mut(parent) {
                        cache.tail = predecessor;
                    }
                }
            }
            for victim in victims {
                self.free_subtree(victim);
            }
            // Only a removal fully inside the prefix leaves a suffix to
            // shift; otherwise the chain now ends at the predecessor.
            let mut cursor = successor;
            while let Some(handle) = cursor {
                let Some(node) = self.nodes.get_mut(handle) else {
                    break;
                };
                node.index -= count;
                cursor = node.next;
            }
            if let Some(cache) = self.cache_mut(parent) {
                cache.materialized -= victim_count;
            }
        }
        if let Some(cache) = self.cache_mut(parent) {
            cache.known_count = cache.known_count.map(|total| total.saturating_sub(count));
            cache.hint = None;
        }
        // One event per removed index, all at the same post-shift path:
        // consumers apply them one deletion at a time.
        let path = self.parent_path(parent).child(index);
        (0..count).map(|_| RowEvent::Removed { path: path.clone() }).collect()
    }

    fn translate_replaced(
        &mut self,
        parent: Option<NodeHandle>,
        index: usize,
        count: usize,
    ) -> Vec<RowEvent> {
        let Some(cache) = self.cache(parent) else {
            return Vec::new();
        };
        if count == 0 {
            return Vec::new();
        }
        if let Some(total) = cache.known_count
            && index + count > total
        {
            return self.degrade_to_reset(parent, "replace range exceeds known collection size");
        }
        let materialized = cache.materialized;
        let indexed = cache.is_indexed();
        if index >= materialized {
            return Vec::new();
        }
        let last = (index + count).min(materialized);
        if indexed {
            // Same handle, same index, fresh item reference. Forward-only
            // items need no swap: their values are pulled at call time.
            let items = match self.read_indexed(parent, index, last - index) {
                Ok(items) => items,
                Err(events) => return events,
            };
            for (offset, item) in items.into_iter().enumerate() {
                if let Some(handle) = self.materialized_at(parent, index + offset)
                    && let Some(node) = self.nodes.get_mut(handle)
                {
                    node.item = item;
                }
            }
        }
        let base = self.parent_path(parent);
        (index..last).map(|position| RowEvent::Changed { path: base.child(position) }).collect()
    }

    fn translate_moved(
        &mut self,
        parent: Option<NodeHandle>,
        old_index: usize,
        new_index: usize,
        count: usize,
    ) -> Vec<RowEvent> {
        let Some(cache) = self.cache(parent) else {
            return Vec::new();
        };
        if count == 0 || old_index == new_index {
            return Vec::new();
        }
        if let Some(total) = cache.known_count
            && (old_index + count > total || new_index + count > total)
        {
            return self.degrade_to_reset(parent, "move range exceeds known collection size");
        }
        let materialized = cache.materialized;
        if old_index >= materialized && new_index >= materialized {
            // Entirely within the undiscovered suffix.
            return Vec::new();
        }
        if old_index + count > materialized || new_index + count > materialized {
            return self.degrade_to_reset(parent, "move straddles the materialized frontier");
        }
        let mut order: Vec<usize> = (0..materialized).collect();
        let block: Vec<usize> = order.drain(old_index..old_index + count).collect();
        for (offset, original) in block.into_iter().enumerate() {
            order.insert(new_index + offset, original);
        }
        self.apply_permutation(parent, &order)
    }

    fn translate_reordered(
        &mut self,
        parent: Option<NodeHandle>,
        order: &[usize],
    ) -> Vec<RowEvent> {
        let Some(cache) = self.cache(parent) else {
            return Vec::new();
        };
        if let Some(total) = cache.known_count
            && order.len() != total
        {
            return self.degrade_to_reset(parent, "reorder length disagrees with known collection size");
        }
        let materialized = cache.materialized;
        if materialized == 0 {
            return Vec::new();
        }
        if order.len() < materialized
            || !is_prefix_permutation(&order[..materialized], materialized)
        {
            // Unmaterialized suffixes are left for later discovery, which
            // only works when the prefix maps onto itself.
            return self.degrade_to_reset(parent, "reorder does not map the materialized prefix onto itself");
        }
        let prefix = order[..materialized].to_vec();
        self.apply_permutation(parent, &prefix)
    }

    /// Relinks the materialized chain in permuted order and emits the
    /// single reorder event carrying the permutation.
    fn apply_permutation(&mut self, parent: Option<NodeHandle>, order: &[usize]) -> Vec<RowEvent> {
        let handles = self.materialized_chain(parent);
        if handles.len() != order.len() {
            return self.degrade_to_reset(parent, "permutation length disagrees with materialized chain");
        }
        let mut reordered = Vec::with_capacity(handles.len());
        for &original in order {
            match handles.get(original) {
                Some(&handle) => reordered.push(handle),
                None => {
                    return self.degrade_to_reset(parent, "permutation references unknown index");
                }
            }
        }
        let mut prev: Option<NodeHandle> = None;
        for (position, &handle) in reordered.iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(handle) {
                node.index = position;
                node.prev = prev;
                node.next = None;
            }
            if let Some(prev_handle) = prev
                && let Some(prev_node) = self.nodes.get_mut(prev_handle)
            {
                prev_node.next = Some(handle);
            }
            prev = Some(handle);
        }
        if let Some(cache) = self.cache_mut(parent) {
            cache.head = reordered.first().copied();
            cache.tail = reordered.last().copied();
            cache.hint = None;
        }
        let path = self.parent_path(parent);
        vec![RowEvent::Reordered { parent: path, permutation: order.to_vec() }]
    }

    /// Random-access read of `count` items starting at `index`; a faulting
    /// store degrades to a reset of the parent (`Err` carries the events).
    fn read_indexed(
        &mut self,
        parent: Option<NodeHandle>,
        index: usize,
        count: usize,
    ) -> Result<Vec<ItemRef>, Vec<RowEvent>> {
        let read = {
            let Some(cache) = self.cache(parent) else {
                return Err(Vec::new());
            };
            let ChildStore::Indexed(store) = &cache.store else {
                return Err(Vec::new());
            };
            let mut items = Vec::with_capacity(count);
            let mut failed = None;
            for offset in 0..count {
                match store.get(index + offset) {
                    Ok(item) => items.push(item),
                    Err(error) => {
                        failed = Some(error);
                        break;
                    }
                }
            }
            match failed {
                Some(error) => Err(error),
                None => Ok(items),
            }
        };
        read.map_err(|error| {
            warn!(parent = ?parent, %error, "re-reading mutated items failed; resetting subtree");
            self.reset_subtree(parent)
        })
    }
}

fn is_prefix_permutation(order: &[usize], len: usize) -> bool {
    let mut seen = vec![false; len];
    order.iter().all(|&index| index < len && !std::mem::replace(&mut seen[index], true))
}

#[cfg(test)]
mod tests {
    use super::is_prefix_permutation;
    use rstest::rstest;

    #[rstest]
    #[case(&[2, 0, 1], true)]
    #[case(&[0, 1, 2], true)]
    #[case(&[0, 0, 2], false)]
    #[case(&[0, 1, 3], false)]
    fn prefix_permutation_detection(#[case] order: &[usize], #[case] expected: bool) {
        assert_eq!(is_prefix_permutation(order, 3), expected);
    }
}
