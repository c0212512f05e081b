use std::error::Error;
use std::fmt::{Display, Formatter};

/// General error reported by data sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub message: Option<String>,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: Some(message.into()) }
    }

    pub fn simple(kind: SourceErrorKind) -> Self {
        Self { kind, message: None }
    }

    /// Shorthand for the most common failure: the child enumerator threw.
    pub fn enumeration(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::EnumerationFailed, message)
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{msg}"),
            None => write!(f, "{:#?}", self.kind),
        }
    }
}

impl Error for SourceError {}

/// Categorises source failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Advancing a child enumerator failed; the consumer-side cache keeps
    /// its already materialized prefix.
    EnumerationFailed,
    /// A random-access read was outside the collection's current bounds.
    IndexUnavailable,
    /// The child collection is gone entirely (e.g. its owner was disposed).
    CollectionUnavailable,
}
