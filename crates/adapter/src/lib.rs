mod adapter;
mod changes;
mod children;
mod events;
mod filter;
mod handle;
mod model;
mod node;
mod resolver;

#[cfg(test)]
mod test_support;

pub use adapter::TreeAdapter;
pub use events::{RowEvent, RowEventSink};
pub use filter::{FilterPredicate, FilterView};
pub use handle::NodeHandle;
pub use model::TreeModel;
