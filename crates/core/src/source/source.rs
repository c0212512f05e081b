use super::access::ChildAccess;
use super::item::ItemRef;

/// Contract an application data source implements to be adapted.
///
/// `parent = None` addresses the top-level collection (the adapter's root
/// sentinel). Implementations are free to be lazy: the adapter materializes
/// children one step at a time and never enumerates eagerly on its own.
///
/// Everything here is single-threaded and synchronous. The adapter performs
/// no locking; a source firing change notifications from another thread
/// must have them marshalled onto the adapter's thread first.
pub trait TreeSource {
    /// Number of value columns every item exposes.
    fn column_count(&self) -> usize;

    /// Child set of `parent`, tagged with its access capability.
    ///
    /// Called at most once per parent between structural resets; the
    /// returned enumerator or store is owned by the adapter's cache from
    /// then on.
    fn children(&self, parent: Option<&ItemRef>) -> ChildAccess;
}
