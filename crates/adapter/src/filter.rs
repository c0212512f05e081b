use crate::adapter::TreeAdapter;
use crate::events::{RowEvent, RowEventDispatcher, RowEventSink};
use crate::handle::NodeHandle;
use crate::model::TreeModel;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Instant;
use treebind_core::{TreePath, Value};
use tracing::{debug, warn};

/// Predicate deciding which base rows a [`FilterView`] exposes.
pub type FilterPredicate = Box<dyn Fn(&TreeAdapter, NodeHandle) -> bool>;

/// Predicate-based subset of a base adapter with its own path space.
///
/// Hidden rows prune their subtrees. The visible set is evaluated eagerly:
/// [`FilterView::refilter`] walks the entire base tree (materializing it
/// fully) and pulls are then answered from the snapshot. Base mutations
/// trigger a refilter scoped to the affected parent rather than incremental
/// patching, because predicate results are not monotonic with source order.
pub struct FilterView {
    base: Rc<TreeAdapter>,
    predicate: FilterPredicate,
    snapshot: RefCell<FilterSnapshot>,
    events: RowEventDispatcher,
    rebuilding: Cell<bool>,
}

#[derive(Default)]
struct FilterSnapshot {
    roots: Vec<VisibleNode>,
    /// Base handle → view path, rebuilt with the snapshot.
    lookup: HashMap<NodeHandle, TreePath>,
}

struct VisibleNode {
    /// Base adapter handle; the view exposes base handles unchanged.
    handle: NodeHandle,
    /// Sibling index within the base parent at snapshot time.
    base_index: usize,
    children: Vec<VisibleNode>,
}

impl FilterView {
    pub fn new(
        base: Rc<TreeAdapter>,
        predicate: impl Fn(&TreeAdapter, NodeHandle) -> bool + 'static,
    ) -> Rc<Self> {
        let view = Rc::new(Self {
            base: Rc::clone(&base),
            predicate: Box::new(predicate),
            snapshot: RefCell::new(FilterSnapshot::default()),
            events: RowEventDispatcher::default(),
            rebuilding: Cell::new(false),
        });
        view.rebuild_all();
        base.subscribe(Rc::new(BaseRelay { view: Rc::downgrade(&view) }));
        view
    }

    pub fn base(&self) -> &Rc<TreeAdapter> {
        &self.base
    }

    /// Registers a sink receiving this view's structural events.
    pub fn subscribe(&self, sink: Rc<dyn RowEventSink>) {
        self.events.register(sink);
    }

    /// Forces a full re-evaluation of the predicate over every base row,
    /// eager even over rows the base has not materialized yet, and emits
    /// a structural reset for the whole view.
    pub fn refilter(&self) {
        self.rebuild_all();
        self.events.dispatch(&RowEvent::Reset { parent: TreePath::root() });
    }

    /// Translates a view path into the base adapter's path space.
    pub fn convert_path_to_base(&self, path: &TreePath) -> Option<TreePath> {
        let snapshot = self.snapshot.borrow();
        let mut nodes = &snapshot.roots;
        let mut base = TreePath::root();
        for &index in path.indices() {
            let node = nodes.get(index)?;
            base.push(node.base_index);
            nodes = &node.children;
        }
        Some(base)
    }

    /// Translates a base path into this view's path space; `None` when the
    /// base row or one of its ancestors is filtered out.
    pub fn convert_base_path(&self, path: &TreePath) -> Option<TreePath> {
        let snapshot = self.snapshot.borrow();
        let mut nodes = &snapshot.roots;
        let mut view = TreePath::root();
        for &base_index in path.indices() {
            let position = nodes.iter().position(|node| node.base_index == base_index)?;
            view.push(position);
            nodes = &nodes[position].children;
        }
        Some(view)
    }

    fn rebuild_all(&self) {
        if self.rebuilding.replace(true) {
            return;
        }
        let start = Instant::now();
        let roots = self.visible_children(None);
        self.rebuilding.set(false);
        let mut lookup = HashMap::new();
        index_nodes(&roots, &TreePath::root(), &mut lookup);
        let rows = lookup.len();
        *self.snapshot.borrow_mut() = FilterSnapshot { roots, lookup };
        debug!(rows, elapsed_ms = start.elapsed().as_millis() as u64, "refilter: complete");
    }

    fn visible_children(&self, parent: Option<NodeHandle>) -> Vec<VisibleNode> {
        let count = self.base.child_count(parent);
        let mut visible = Vec::new();
        for base_index in 0..count {
            let Some(handle) = self.base.nth_child(parent, base_index) else {
                break;
            };
            if (self.predicate)(&self.base, handle) {
                let children = self.visible_children(Some(handle));
                visible.push(VisibleNode { handle, base_index, children });
            }
        }
        visible
    }

    fn on_base_event(&self, event: &RowEvent) {
        let base_parent = match event {
            RowEvent::Inserted { path } | RowEvent::Removed { path } | RowEvent::Changed { path } => {
                path.parent().unwrap_or_default()
            }
            RowEvent::Reordered { parent, .. } | RowEvent::Reset { parent } => parent.clone(),
        };
        self.refilter_scope(&base_parent);
    }

    /// Best-effort narrow refilter: re-evaluates the subtree under the base
    /// parent the event names and resets the corresponding view region.
    fn refilter_scope(&self, base_parent: &TreePath) {
        if self.rebuilding.get() {
            // A rebuild is already walking the base; it will observe the
            // post-event state.
            return;
        }
        if base_parent.is_root() {
            self.refilter();
            return;
        }
        let Some(handle) = self.base.node_at(base_parent) else {
            warn!(base_parent = %base_parent, "event parent no longer resolvable; refiltering fully");
            self.refilter();
            return;
        };
        let view_path = match self.snapshot.borrow().lookup.get(&handle) {
            Some(path) => path.clone(),
            None => {
                debug!(base_parent = %base_parent, "mutation beneath a hidden row; nothing visible changes");
                return;
            }
        };
        self.rebuilding.set(true);
        let children = self.visible_children(Some(handle));
        self.rebuilding.set(false);
        {
            let mut snapshot = self.snapshot.borrow_mut();
            let Some(node) = find_node_mut(&mut snapshot.roots, view_path.indices()) else {
                drop(snapshot);
                self.refilter();
                return;
            };
            node.children = children;
            let mut lookup = HashMap::new();
            index_nodes(&snapshot.roots, &TreePath::root(), &mut lookup);
            snapshot.lookup = lookup;
        }
        self.events.dispatch(&RowEvent::Reset { parent: view_path });
    }
}

impl TreeModel for FilterView {
    fn column_count(&self) -> usize {
        self.base.column_count()
    }

    fn node_at(&self, path: &TreePath) -> Option<NodeHandle> {
        if path.is_root() {
            return None;
        }
        let snapshot = self.snapshot.borrow();
        find_node(&snapshot.roots, path.indices()).map(|node| node.handle)
    }

    fn path_of(&self, handle: NodeHandle) -> Option<TreePath> {
        self.snapshot.borrow().lookup.get(&handle).cloned()
    }

    fn value(&self, handle: NodeHandle, column: usize) -> Option<Value> {
        self.base.value(handle, column)
    }

    fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> {
        let path = self.path_of(handle)?;
        let parent = path.parent()?;
        if parent.is_root() {
            return None;
        }
        self.node_at(&parent)
    }

    fn first_child(&self, parent: Option<NodeHandle>) -> Option<NodeHandle> {
        self.nth_child(parent, 0)
    }

    fn next_sibling(&self, handle: NodeHandle) -> Option<NodeHandle> {
        let path = self.path_of(handle)?;
        let position = path.last()?;
        let parent = path.parent().unwrap_or_default();
        let snapshot = self.snapshot.borrow();
        let siblings = if parent.is_root() {
            &snapshot.roots
        } else {
            &find_node(&snapshot.roots, parent.indices())?.children
        };
        siblings.get(position + 1).map(|node| node.handle)
    }

    fn nth_child(&self, parent: Option<NodeHandle>, index: usize) -> Option<NodeHandle> {
        let snapshot = self.snapshot.borrow();
        let children = match parent {
            None => &snapshot.roots,
            Some(handle) => {
                let path = snapshot.lookup.get(&handle)?;
                &find_node(&snapshot.roots, path.indices())?.children
            }
        };
        children.get(index).map(|node| node.handle)
    }

    fn child_count(&self, parent: Option<NodeHandle>) -> usize {
        let snapshot = self.snapshot.borrow();
        match parent {
            None => snapshot.roots.len(),
            Some(handle) => snapshot
                .lookup
                .get(&handle)
                .and_then(|path| find_node(&snapshot.roots, path.indices()))
                .map_or(0, |node| node.children.len()),
        }
    }
}

struct BaseRelay {
    view: Weak<FilterView>,
}

impl RowEventSink for BaseRelay {
    fn on_event(&self, event: &RowEvent) {
        if let Some(view) = self.view.upgrade() {
            view.on_base_event(event);
        }
    }
}

fn index_nodes(nodes: &[VisibleNode], base: &TreePath, lookup: &mut HashMap<NodeHandle, TreePath>) {
    for (position, node) in nodes.iter().enumerate() {
        let path = base.child(position);
        index_nodes(&node.children, &path, lookup);
        lookup.insert(node.handle, path);
    }
}

fn find_node<'a>(nodes: &'a [VisibleNode], indices: &[usize]) -> Option<&'a VisibleNode> {
    let (&first, rest) = indices.split_first()?;
    let node = nodes.get(first)?;
    if rest.is_empty() { Some(node) } else { find_node(&node.children, rest) }
}

fn find_node_mut<'a>(nodes: &'a mut [VisibleNode], indices: &[usize]) -> Option<&'a mut VisibleNode> {
    let (&first, rest) = indices.split_first()?;
    let node = nodes.get_mut(first)?;
    if rest.is_empty() { Some(node) } else { find_node_mut(&mut node.children, rest) }
}
