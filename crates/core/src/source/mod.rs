mod access;
mod error;
mod event;
mod item;
mod source;

pub use access::{ChildAccess, ChildEnumerator, CollectionId, IndexedChildren};
pub use error::{SourceError, SourceErrorKind};
pub use event::{CollectionChange, SourceEvent};
pub use item::{ItemRef, SourceItem};
pub use source::TreeSource;
