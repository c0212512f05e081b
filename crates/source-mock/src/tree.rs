use quick_xml::de::from_str;
use serde::Deserialize;
use thiserror::Error;
use treebind_core::Value;

/// Declarative builder for one mock item.
#[derive(Clone, Debug, Default)]
pub struct ItemSpec {
    pub(crate) values: Vec<Value>,
    pub(crate) children: Vec<ItemSpec>,
    pub(crate) expose_children: bool,
}

impl ItemSpec {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values, children: Vec::new(), expose_children: false }
    }

    /// Single-column item whose label occupies column zero.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self::new(vec![Value::String(label.into())])
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn with_child(mut self, child: ItemSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = ItemSpec>,
    {
        self.children.extend(children);
        self
    }

    /// Exposes an (initially empty) live child collection so the item can
    /// grow children later. Without this, a childless item reports no
    /// child collection at all.
    pub fn with_children_enabled(mut self) -> Self {
        self.expose_children = true;
        self
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn children(&self) -> &[ItemSpec] {
        &self.children
    }
}

/// Root-level description of a mock tree.
#[derive(Clone, Debug, Default)]
pub struct MockTree {
    pub(crate) roots: Vec<ItemSpec>,
}

impl MockTree {
    pub fn new(roots: Vec<ItemSpec>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[ItemSpec] {
        &self.roots
    }

    /// Widest value row anywhere in the tree.
    pub fn column_count(&self) -> usize {
        fn widest(specs: &[ItemSpec]) -> usize {
            specs
                .iter()
                .map(|spec| spec.values.len().max(widest(&spec.children)))
                .max()
                .unwrap_or(0)
        }
        widest(&self.roots)
    }

    /// Loads a tree from its XML form, e.g.
    /// `<tree><item values="Alpha|1"><item label="Beta"/></item></tree>`.
    /// The `values` attribute is `|`-separated with each chunk typed as
    /// bool, integer, number or string, whichever parses first.
    pub fn from_xml(xml: &str) -> Result<Self, TreeLoadError> {
        let parsed: XmlTree = from_str(xml)?;
        let mut roots = Vec::new();
        for item in parsed.items {
            roots.push(build_spec(item)?);
        }
        Ok(MockTree::new(roots))
    }
}

#[derive(Debug, Deserialize)]
struct XmlTree {
    #[serde(rename = "item", default)]
    items: Vec<XmlItem>,
}

#[derive(Debug, Deserialize)]
struct XmlItem {
    #[serde(rename = "@label")]
    label: Option<String>,
    #[serde(rename = "@values")]
    values: Option<String>,
    #[serde(rename = "@growable")]
    growable: Option<bool>,
    #[serde(rename = "item", default)]
    children: Vec<XmlItem>,
}

fn build_spec(item: XmlItem) -> Result<ItemSpec, TreeLoadError> {
    let values = match (&item.values, &item.label) {
        (Some(values), _) => values.split('|').map(parse_value).collect(),
        (None, Some(label)) => vec![Value::from(label.clone())],
        (None, None) => return Err(TreeLoadError::MissingValues),
    };
    let mut spec = ItemSpec::new(values);
    if item.growable.unwrap_or(false) {
        spec = spec.with_children_enabled();
    }
    for child in item.children {
        spec = spec.with_child(build_spec(child)?);
    }
    Ok(spec)
}

fn parse_value(chunk: &str) -> Value {
    let chunk = chunk.trim();
    if let Ok(boolean) = chunk.parse::<bool>() {
        return Value::from(boolean);
    }
    if let Ok(integer) = chunk.parse::<i64>() {
        return Value::from(integer);
    }
    if let Ok(number) = chunk.parse::<f64>() {
        return Value::from(number);
    }
    Value::from(chunk)
}

#[derive(Debug, Error)]
pub enum TreeLoadError {
    #[error("XML parsing failed: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("item is missing both 'values' and 'label' attributes")]
    MissingValues,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn builds_nested_specs_from_xml() {
        let tree = MockTree::from_xml(
            r#"<tree>
                 <item values="Alpha|1">
                   <item label="Beta"/>
                 </item>
                 <item values="Gamma|true" growable="true"/>
               </tree>"#,
        )
        .expect("parse");

        assert_eq!(tree.roots().len(), 2);
        assert_eq!(tree.column_count(), 2);
        let alpha = &tree.roots()[0];
        assert_eq!(alpha.values(), &[Value::from("Alpha"), Value::from(1)]);
        assert_eq!(alpha.children().len(), 1);
        assert_eq!(alpha.children()[0].values(), &[Value::from("Beta")]);
        let gamma = &tree.roots()[1];
        assert_eq!(gamma.values()[1], Value::Bool(true));
        assert!(gamma.expose_children);
    }

    #[rstest]
    fn rejects_items_without_values() {
        let error = MockTree::from_xml("<tree><item/></tree>").unwrap_err();
        assert!(matches!(error, TreeLoadError::MissingValues));
    }

    #[rstest]
    fn types_value_chunks_like_attributes() {
        assert_eq!(parse_value("true"), Value::Bool(true));
        assert_eq!(parse_value("42"), Value::Integer(42));
        assert_eq!(parse_value("1.25"), Value::Number(1.25));
        assert_eq!(parse_value("plain"), Value::String("plain".into()));
    }
}
