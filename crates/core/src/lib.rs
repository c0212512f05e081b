pub mod path;
pub mod source;
pub mod value;

pub use path::{PathParseError, TreePath};
pub use source::{
    ChildAccess, ChildEnumerator, CollectionChange, CollectionId, IndexedChildren, ItemRef,
    SourceError, SourceErrorKind, SourceEvent, SourceItem, TreeSource,
};
pub use value::Value;
