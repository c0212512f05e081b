use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Inline capacity covering the tree depths seen in practice; deeper paths
/// spill to the heap.
type Segments = SmallVec<[usize; 6]>;

/// Ordered sequence of sibling indices addressing a node from the root.
///
/// The empty path addresses the synthetic root sentinel itself. Paths are
/// positional: they stay meaningful only as long as no structural mutation
/// has been applied in between.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath {
    segments: Segments,
}

impl TreePath {
    /// The empty path, addressing the root sentinel.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(segments: impl IntoIterator<Item = usize>) -> Self {
        Self { segments: segments.into_iter().collect() }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments; the root sentinel has depth zero.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn indices(&self) -> &[usize] {
        &self.segments
    }

    /// Last segment, i.e. the sibling index under the immediate parent.
    pub fn last(&self) -> Option<usize> {
        self.segments.last().copied()
    }

    /// Path of the immediate parent; `None` for the root sentinel.
    pub fn parent(&self) -> Option<TreePath> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { segments })
    }

    /// New path addressing the `index`-th child of `self`.
    #[must_use]
    pub fn child(&self, index: usize) -> TreePath {
        let mut segments = self.segments.clone();
        segments.push(index);
        Self { segments }
    }

    pub fn push(&mut self, index: usize) {
        self.segments.push(index);
    }

    pub fn pop(&mut self) -> Option<usize> {
        self.segments.pop()
    }

    /// Whether `self` equals `prefix` or lies beneath it.
    pub fn starts_with(&self, prefix: &TreePath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, ":")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

/// Paths parse from their display form, e.g. `"0:2:5"`. The empty string
/// parses to the root path.
impl FromStr for TreePath {
    type Err = PathParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Segments::new();
        for chunk in text.split(':') {
            let index = chunk
                .trim()
                .parse::<usize>()
                .map_err(|_| PathParseError::InvalidSegment(chunk.to_owned()))?;
            segments.push(index);
        }
        Ok(Self { segments })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    #[error("invalid path segment '{0}' (expected a non-negative integer)")]
    InvalidSegment(String),
}
