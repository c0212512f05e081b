use super::error::SourceError;
use super::item::ItemRef;
use std::fmt;

/// Identifies one child collection for change routing.
///
/// A source assigns an id when it first hands out a collection and keeps it
/// stable for the collection's lifetime; mutation notifications carry the
/// same id so the adapter can route them to the owning parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(u64);

impl CollectionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collection#{}", self.0)
    }
}

/// Forward-only child enumerator. Every step may fault; a fault leaves the
/// consumer-side cache's materialized prefix intact.
pub type ChildEnumerator = Box<dyn Iterator<Item = Result<ItemRef, SourceError>>>;

/// Random-access view of a child collection: O(1) count and index reads.
pub trait IndexedChildren {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Result<ItemRef, SourceError>;
}

/// Child set handed out by a source, tagged with its access capability.
pub enum ChildAccess {
    /// The source reports count and index access in O(1).
    Indexed { collection: CollectionId, store: Box<dyn IndexedChildren> },
    /// The source can only be walked front to back.
    Sequential { collection: CollectionId, items: ChildEnumerator },
    /// No child collection at all. A source that may later grow children
    /// under this parent must return an empty collection instead; `None`
    /// is a permanent statement.
    None,
}

impl fmt::Debug for ChildAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildAccess::Indexed { collection, store } => f
                .debug_struct("Indexed")
                .field("collection", collection)
                .field("len", &store.len())
                .finish(),
            ChildAccess::Sequential { collection, .. } => {
                f.debug_struct("Sequential").field("collection", collection).finish_non_exhaustive()
            }
            ChildAccess::None => write!(f, "None"),
        }
    }
}
