use treebind_core::{PathParseError, TreePath};

pub type CliResult<T> = anyhow::Result<T>;

/// Parses a `0:2:5` path argument; an absent argument means the root.
pub fn parse_path(text: Option<&str>) -> Result<TreePath, PathParseError> {
    match text {
        Some(text) => text.parse(),
        None => Ok(TreePath::root()),
    }
}
