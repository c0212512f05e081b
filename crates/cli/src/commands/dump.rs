use crate::OutputFormat;
use crate::util::{CliResult, parse_path};
use anyhow::Context;
use clap::Args;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;
use std::fmt::Write;
use std::path::PathBuf;
use std::rc::Rc;
use treebind_adapter::{NodeHandle, TreeAdapter, TreeModel};
use treebind_core::source::TreeSource;
use treebind_core::{TreePath, Value};
use treebind_source_mock::{MockSource, MockTree};

#[derive(Args, Debug, Clone)]
pub struct DumpArgs {
    /// XML tree definition to adapt.
    #[arg(value_name = "TREE_XML")]
    pub file: PathBuf,
    /// Start path inside the tree, e.g. `0:2`; the root when omitted.
    #[arg(long = "path")]
    pub path: Option<String>,
    /// Maximum depth below the start path.
    #[arg(long = "depth")]
    pub depth: Option<usize>,
    /// Serve children through forward-only enumerators instead of random
    /// access.
    #[arg(long = "sequential")]
    pub sequential: bool,
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub(crate) struct RowSummary {
    path: String,
    values: Vec<Value>,
    children: Vec<RowSummary>,
}

pub fn run(args: &DumpArgs) -> CliResult<String> {
    let xml = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let tree = MockTree::from_xml(&xml)?;
    let source = if args.sequential { MockSource::sequential(tree) } else { MockSource::new(tree) };
    let adapter = TreeAdapter::new(Rc::new(source) as Rc<dyn TreeSource>);
    let start = parse_path(args.path.as_deref())?;

    let parent = if start.is_root() {
        None
    } else {
        Some(
            adapter
                .node_at(&start)
                .with_context(|| format!("path {start} does not resolve"))?,
        )
    };
    let rows = collect_rows(&adapter, parent, &start, args.depth.unwrap_or(usize::MAX));
    match args.format {
        OutputFormat::Text => Ok(render_text(&rows)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&rows)?),
    }
}

fn collect_rows(
    adapter: &TreeAdapter,
    parent: Option<NodeHandle>,
    base: &TreePath,
    depth: usize,
) -> Vec<RowSummary> {
    if depth == 0 {
        return Vec::new();
    }
    let mut rows = Vec::new();
    let count = adapter.child_count(parent);
    for index in 0..count {
        let Some(handle) = adapter.nth_child(parent, index) else {
            break;
        };
        let path = base.child(index);
        let values = (0..adapter.column_count())
            .map(|column| adapter.value(handle, column).unwrap_or(Value::Null))
            .collect();
        let children = collect_rows(adapter, Some(handle), &path, depth - 1);
        rows.push(RowSummary { path: path.to_string(), values, children });
    }
    rows
}

pub(crate) fn render_text(rows: &[RowSummary]) -> String {
    let mut output = String::new();
    render_rows(&mut output, rows, 0);
    output.trim_end().to_owned()
}

fn render_rows(output: &mut String, rows: &[RowSummary], indent: usize) {
    for row in rows {
        let padding = "  ".repeat(indent);
        let label = row.values.first().map(format_value).unwrap_or_default();
        let rest: Vec<String> = row.values.iter().skip(1).map(format_value).collect();
        let colored_label = colorize_label(&label);
        let colored_path = colorize_path(&row.path);
        if rest.is_empty() {
            let _ = writeln!(output, "{padding}{colored_label}  [{colored_path}]");
        } else {
            let _ = writeln!(
                output,
                "{padding}{colored_label} ({})  [{colored_path}]",
                rest.join(", ")
            );
        }
        render_rows(output, &row.children, indent + 1);
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(value) => value.to_string(),
        Value::Integer(value) => value.to_string(),
        Value::Number(value) => format!("{value}"),
        Value::String(text) => text.clone(),
        Value::Array(_) => serde_json::to_string(value).unwrap_or_else(|_| String::from("<value>")),
    }
}

fn colorize_label(label: &str) -> String {
    label
        .if_supports_color(Stream::Stdout, |text| text.bold().fg_rgb::<79, 166, 255>().to_string())
        .to_string()
}

fn colorize_path(path: &str) -> String {
    path.if_supports_color(Stream::Stdout, |text| text.dimmed().to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::borrow::Cow;
    use std::io::Write as _;

    const TREE: &str = r#"<tree>
        <item values="Alpha|1">
            <item values="Beta|2"/>
        </item>
        <item values="Gamma|3"/>
    </tree>"#;

    fn tree_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(TREE.as_bytes()).expect("write tree");
        file
    }

    fn strip_ansi(input: &str) -> Cow<'_, str> {
        if !input.contains('\u{1b}') {
            return Cow::Borrowed(input);
        }

        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars();
        loop {
            match chars.next() {
                Some('\u{1b}') => {
                    for next in chars.by_ref() {
                        if next == 'm' {
                            break;
                        }
                    }
                }
                Some(ch) => result.push(ch),
                None => break,
            }
        }
        Cow::Owned(result)
    }

    fn args(file: &tempfile::NamedTempFile) -> DumpArgs {
        DumpArgs {
            file: file.path().to_path_buf(),
            path: None,
            depth: None,
            sequential: false,
            format: OutputFormat::Text,
        }
    }

    #[rstest]
    fn dump_text_lists_rows_with_paths() {
        let file = tree_file();
        let output = run(&args(&file)).expect("dump");
        let plain = strip_ansi(&output);
        assert!(plain.contains("Alpha (1)  [0]"));
        assert!(plain.contains("  Beta (2)  [0:0]"));
        assert!(plain.contains("Gamma (3)  [1]"));
    }

    #[rstest]
    fn dump_json_nests_children() {
        let file = tree_file();
        let output =
            run(&DumpArgs { format: OutputFormat::Json, ..args(&file) }).expect("dump");
        let json: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert_eq!(json[0]["path"], "0");
        assert_eq!(json[0]["children"][0]["path"], "0:0");
        assert_eq!(json[1]["values"][0], "Gamma");
    }

    #[rstest]
    fn dump_subpath_starts_below_the_root() {
        let file = tree_file();
        let output = run(&DumpArgs { path: Some("0".into()), ..args(&file) }).expect("dump");
        let plain = strip_ansi(&output);
        assert!(plain.contains("Beta (2)  [0:0]"));
        assert!(!plain.contains("Gamma"));
    }

    #[rstest]
    fn dump_unresolvable_path_fails() {
        let file = tree_file();
        let error = run(&DumpArgs { path: Some("7".into()), ..args(&file) }).unwrap_err();
        assert!(error.to_string().contains("does not resolve"));
    }

    #[rstest]
    fn sequential_capability_yields_the_same_rows() {
        let file = tree_file();
        let indexed =
            run(&DumpArgs { format: OutputFormat::Json, ..args(&file) }).expect("dump");
        let sequential = run(&DumpArgs {
            format: OutputFormat::Json,
            sequential: true,
            ..args(&file)
        })
        .expect("dump");
        assert_eq!(indexed, sequential);
    }
}
