use crate::OutputFormat;
use crate::util::{CliResult, parse_path};
use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt::Write;
use std::path::PathBuf;
use std::rc::Rc;
use treebind_adapter::{NodeHandle, RowEvent, RowEventSink, TreeAdapter, TreeModel};
use treebind_core::Value;
use treebind_core::source::TreeSource;
use treebind_source_mock::{ItemSpec, MockSource, MockTree};

#[derive(Args, Debug, Clone)]
pub struct EventsArgs {
    /// XML tree definition to adapt.
    #[arg(value_name = "TREE_XML")]
    pub file: PathBuf,
    /// JSON mutation script to replay against the tree.
    #[arg(value_name = "SCRIPT_JSON")]
    pub script: PathBuf,
    /// Materialize the whole tree before replaying; without this only
    /// regions a consumer already pulled produce precise events.
    #[arg(long = "materialize")]
    pub materialize: bool,
    /// Serve children through forward-only enumerators.
    #[arg(long = "sequential")]
    pub sequential: bool,
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// One scripted mutation, e.g.
/// `{"op": "insert", "parent": "", "index": 1, "items": [{"values": ["X"]}]}`.
#[derive(Deserialize, Debug)]
#[serde(tag = "op", rename_all = "kebab-case")]
enum ScriptOp {
    Insert {
        #[serde(default)]
        parent: String,
        index: usize,
        items: Vec<ScriptItem>,
    },
    Remove {
        #[serde(default)]
        parent: String,
        index: usize,
        #[serde(default = "one")]
        count: usize,
    },
    Replace {
        #[serde(default)]
        parent: String,
        index: usize,
        items: Vec<ScriptItem>,
    },
    SetValue {
        path: String,
        column: usize,
        value: Value,
    },
    Move {
        #[serde(default)]
        parent: String,
        from: usize,
        to: usize,
        #[serde(default = "one")]
        count: usize,
    },
    Reorder {
        #[serde(default)]
        parent: String,
        order: Vec<usize>,
    },
    Reset {
        #[serde(default)]
        parent: String,
    },
}

fn one() -> usize {
    1
}

#[derive(Deserialize, Debug)]
struct ScriptItem {
    values: Vec<Value>,
    #[serde(default)]
    children: Vec<ScriptItem>,
}

impl ScriptItem {
    fn into_spec(self) -> ItemSpec {
        let mut spec = ItemSpec::new(self.values);
        for child in self.children {
            spec = spec.with_child(child.into_spec());
        }
        spec
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "kebab-case")]
enum EventSummary {
    Inserted { path: String },
    Removed { path: String },
    Changed { path: String },
    Reordered { parent: String, permutation: Vec<usize> },
    Reset { parent: String },
}

impl From<&RowEvent> for EventSummary {
    fn from(event: &RowEvent) -> Self {
        match event {
            RowEvent::Inserted { path } => EventSummary::Inserted { path: path.to_string() },
            RowEvent::Removed { path } => EventSummary::Removed { path: path.to_string() },
            RowEvent::Changed { path } => EventSummary::Changed { path: path.to_string() },
            RowEvent::Reordered { parent, permutation } => EventSummary::Reordered {
                parent: parent.to_string(),
                permutation: permutation.clone(),
            },
            RowEvent::Reset { parent } => EventSummary::Reset { parent: parent.to_string() },
        }
    }
}

#[derive(Default)]
struct CollectingSink {
    events: RefCell<Vec<EventSummary>>,
}

impl RowEventSink for CollectingSink {
    fn on_event(&self, event: &RowEvent) {
        self.events.borrow_mut().push(EventSummary::from(event));
    }
}

pub fn run(args: &EventsArgs) -> CliResult<String> {
    let xml = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let tree = MockTree::from_xml(&xml)?;
    let source = Rc::new(if args.sequential {
        MockSource::sequential(tree)
    } else {
        MockSource::new(tree)
    });
    let adapter = TreeAdapter::new(Rc::clone(&source) as Rc<dyn TreeSource>);
    let sink = Rc::new(CollectingSink::default());
    adapter.subscribe(sink.clone());

    if args.materialize {
        materialize_all(&adapter, None);
    }

    let script_text = std::fs::read_to_string(&args.script)
        .with_context(|| format!("reading {}", args.script.display()))?;
    let script: Vec<ScriptOp> =
        serde_json::from_str(&script_text).context("parsing mutation script")?;
    for op in script {
        apply_op(&source, op)?;
        for event in source.take_events() {
            adapter.apply(&event);
        }
    }

    let events = sink.events.borrow();
    match args.format {
        OutputFormat::Text => Ok(render_text(&events)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&*events)?),
    }
}

fn materialize_all(adapter: &TreeAdapter, parent: Option<NodeHandle>) {
    for index in 0..adapter.child_count(parent) {
        if let Some(handle) = adapter.nth_child(parent, index) {
            materialize_all(adapter, Some(handle));
        }
    }
}

fn apply_op(source: &MockSource, op: ScriptOp) -> CliResult<()> {
    match op {
        ScriptOp::Insert { parent, index, items } => {
            let parent = parse_path(Some(parent.as_str()))?;
            source.insert(&parent, index, items.into_iter().map(ScriptItem::into_spec).collect());
        }
        ScriptOp::Remove { parent, index, count } => {
            source.remove(&parse_path(Some(parent.as_str()))?, index, count);
        }
        ScriptOp::Replace { parent, index, items } => {
            let parent = parse_path(Some(parent.as_str()))?;
            source.replace(&parent, index, items.into_iter().map(ScriptItem::into_spec).collect());
        }
        ScriptOp::SetValue { path, column, value } => {
            source.set_value(&parse_path(Some(path.as_str()))?, column, value);
        }
        ScriptOp::Move { parent, from, to, count } => {
            source.move_block(&parse_path(Some(parent.as_str()))?, from, to, count);
        }
        ScriptOp::Reorder { parent, order } => {
            source.reorder(&parse_path(Some(parent.as_str()))?, &order);
        }
        ScriptOp::Reset { parent } => {
            source.reset(&parse_path(Some(parent.as_str()))?);
        }
    }
    Ok(())
}

fn render_text(events: &[EventSummary]) -> String {
    let mut output = String::new();
    for event in events {
        let line = match event {
            EventSummary::Inserted { path } => format!("inserted   {path}"),
            EventSummary::Removed { path } => format!("removed    {path}"),
            EventSummary::Changed { path } => format!("changed    {path}"),
            EventSummary::Reordered { parent, permutation } => {
                format!("reordered  {parent:<10} {permutation:?}")
            }
            EventSummary::Reset { parent } => format!("reset      {parent}"),
        };
        let _ = writeln!(output, "{}", line.trim_end());
    }
    output.trim_end().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write as _;

    const TREE: &str = r#"<tree>
        <item values="A"/>
        <item values="B"/>
        <item values="C"/>
    </tree>"#;

    fn write_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write");
        file
    }

    fn args(tree: &tempfile::NamedTempFile, script: &tempfile::NamedTempFile) -> EventsArgs {
        EventsArgs {
            file: tree.path().to_path_buf(),
            script: script.path().to_path_buf(),
            materialize: true,
            sequential: false,
            format: OutputFormat::Text,
        }
    }

    #[rstest]
    fn insert_script_reports_the_new_row() {
        let tree = write_file(TREE);
        let script = write_file(
            r#"[{"op": "insert", "index": 1, "items": [{"values": ["X"]}]}]"#,
        );
        let output = run(&args(&tree, &script)).expect("events");
        assert_eq!(output, "inserted   1");
    }

    #[rstest]
    fn scripts_chain_multiple_mutations() {
        let tree = write_file(TREE);
        let script = write_file(
            r#"[
                {"op": "remove", "index": 0},
                {"op": "set-value", "path": "0", "column": 0, "value": "B'"},
                {"op": "reorder", "order": [1, 0]}
            ]"#,
        );
        let output = run(&args(&tree, &script)).expect("events");
        assert_eq!(
            output.lines().collect::<Vec<_>>(),
            ["removed    0", "changed    0", "reordered             [1, 0]"]
        );
    }

    #[rstest]
    fn json_format_emits_tagged_events() {
        let tree = write_file(TREE);
        let script = write_file(r#"[{"op": "reset"}]"#);
        let output = run(&EventsArgs { format: OutputFormat::Json, ..args(&tree, &script) })
            .expect("events");
        let json: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert_eq!(json[0]["event"], "reset");
        assert_eq!(json[0]["parent"], "");
    }

    #[rstest]
    fn unmaterialized_regions_stay_silent() {
        let tree = write_file(TREE);
        let script = write_file(
            r#"[{"op": "insert", "index": 2, "items": [{"values": ["X"]}]}]"#,
        );
        let quiet = run(&EventsArgs {
            materialize: false,
            ..args(&tree, &script)
        })
        .expect("events");
        assert_eq!(quiet, "");
    }
}
