//! Schema node types
//!
//! A schema node is one entry of the extraction schema: a section, a
//! multivalue or tuple grouping, or a datapoint (a leaf field). The
//! attribute set of a node is fixed by its category and carried by the
//! matching [`NodeKind`] variant.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Category of a schema node, as spelled in the `category` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Section,
    Multivalue,
    Tuple,
    Datapoint,
}

impl Category {
    /// All categories, in the order they nest
    pub const ALL: [Category; 4] = [
        Category::Section,
        Category::Multivalue,
        Category::Tuple,
        Category::Datapoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Section => "section",
            Category::Multivalue => "multivalue",
            Category::Tuple => "tuple",
            Category::Datapoint => "datapoint",
        }
    }

    /// Parse a category name, exact match only
    pub fn parse(value: &str) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.as_str() == value)
    }

    /// Whether a node of this category may own a child of category `child`
    ///
    /// Sections hold datapoints and multivalues, multivalues hold a tuple or
    /// a datapoint, tuples hold datapoints. Sections are only legal as roots.
    pub fn can_contain(&self, child: Category) -> bool {
        matches!(
            (self, child),
            (Category::Section, Category::Datapoint)
                | (Category::Section, Category::Multivalue)
                | (Category::Multivalue, Category::Tuple)
                | (Category::Multivalue, Category::Datapoint)
                | (Category::Tuple, Category::Datapoint)
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value type of a datapoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Number,
    Date,
    Enum,
    Button,
}

impl DataType {
    pub const ALL: [DataType; 5] = [
        DataType::String,
        DataType::Number,
        DataType::Date,
        DataType::Enum,
        DataType::Button,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Date => "date",
            DataType::Enum => "enum",
            DataType::Button => "button",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        DataType::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an enum datapoint's option list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaOption {
    pub value: String,
    pub label: String,
}

impl SchemaOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SectionAttributes {
    pub icon: Option<String>,
    pub can_collapse: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultivalueAttributes {
    pub rir_field_names: Option<Vec<String>>,
    pub min_occurrences: Option<u32>,
    pub max_occurrences: Option<u32>,
    pub default_value: Option<String>,
    pub can_collapse: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TupleAttributes {
    pub rir_field_names: Option<Vec<String>>,
}

/// Attributes of a datapoint (leaf field)
#[derive(Debug, Clone, PartialEq)]
pub struct DatapointAttributes {
    /// Value type (`type` in the JSON form)
    pub data_type: DataType,
    /// Display/parse format, e.g. `YYYY-MM-DD` or `# ##0.#`
    pub format: Option<String>,
    /// Field names of the extraction engine this datapoint is filled from
    pub rir_field_names: Option<Vec<String>>,
    pub default_value: Option<String>,
    /// `constraints.required` in the JSON form
    pub required: Option<bool>,
    pub can_export: Option<bool>,
    pub width: Option<u32>,
    pub stretch: Option<bool>,
    pub score_threshold: Option<f64>,
    /// Ordered option list; `None` when the node carries no `options` key
    pub options: Option<Vec<SchemaOption>>,
}

impl DatapointAttributes {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            format: None,
            rir_field_names: None,
            default_value: None,
            required: None,
            can_export: None,
            width: None,
            stretch: None,
            score_threshold: None,
            options: None,
        }
    }

    /// Whether the option list of this datapoint may be replaced
    ///
    /// Enum datapoints always qualify; other types qualify when they already
    /// carry an `options` list (possibly empty).
    pub fn accepts_options(&self) -> bool {
        self.data_type == DataType::Enum || self.options.is_some()
    }
}

/// Category-specific attributes of a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Section(SectionAttributes),
    Multivalue(MultivalueAttributes),
    Tuple(TupleAttributes),
    Datapoint(DatapointAttributes),
}

impl NodeKind {
    pub fn category(&self) -> Category {
        match self {
            NodeKind::Section(_) => Category::Section,
            NodeKind::Multivalue(_) => Category::Multivalue,
            NodeKind::Tuple(_) => Category::Tuple,
            NodeKind::Datapoint(_) => Category::Datapoint,
        }
    }
}

/// A node of the schema tree
///
/// Children are owned exclusively by their parent, so a node can never be
/// its own ancestor. Global id uniqueness and nesting legality are checked
/// when nodes are assembled into a [`SchemaTree`](super::SchemaTree).
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    /// Schema id, unique across the whole tree
    pub id: String,
    /// Display label; empty when the source gives none
    pub label: String,
    pub description: Option<String>,
    pub hidden: Option<bool>,
    pub kind: NodeKind,
    pub children: Vec<SchemaNode>,
    /// Attributes this library does not interpret, kept verbatim for round trips
    pub extra: Map<String, Value>,
}

impl SchemaNode {
    fn with_kind(id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            hidden: None,
            kind,
            children: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn section(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(id, label, NodeKind::Section(SectionAttributes::default()))
    }

    pub fn multivalue(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(id, label, NodeKind::Multivalue(MultivalueAttributes::default()))
    }

    pub fn tuple(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(id, label, NodeKind::Tuple(TupleAttributes::default()))
    }

    pub fn datapoint(id: impl Into<String>, label: impl Into<String>, data_type: DataType) -> Self {
        Self::with_kind(
            id,
            label,
            NodeKind::Datapoint(DatapointAttributes::new(data_type)),
        )
    }

    /// Create an enum datapoint with the given options
    pub fn enum_datapoint(
        id: impl Into<String>,
        label: impl Into<String>,
        options: Vec<SchemaOption>,
    ) -> Self {
        let mut node = Self::datapoint(id, label, DataType::Enum);
        if let NodeKind::Datapoint(attrs) = &mut node.kind {
            attrs.options = Some(options);
        }
        node
    }

    /// Append a child
    pub fn with_child(mut self, child: SchemaNode) -> Self {
        self.children.push(child);
        self
    }

    /// Replace the children
    pub fn with_children(mut self, children: Vec<SchemaNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }

    /// Datapoint attributes, if this node is a datapoint
    pub fn datapoint_attributes(&self) -> Option<&DatapointAttributes> {
        match &self.kind {
            NodeKind::Datapoint(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Option list of a datapoint; empty for every other node
    pub fn options(&self) -> &[SchemaOption] {
        self.datapoint_attributes()
            .and_then(|attrs| attrs.options.as_deref())
            .unwrap_or(&[])
    }

    /// Ids of this node and all its descendants, in pre-order
    pub fn subtree_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            ids.push(node.id.as_str());
            stack.extend(node.children.iter().rev());
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip_names() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("Section"), None);
        assert_eq!(Category::parse("table"), None);
    }

    #[test]
    fn test_nesting_rules() {
        assert!(Category::Section.can_contain(Category::Datapoint));
        assert!(Category::Section.can_contain(Category::Multivalue));
        assert!(Category::Multivalue.can_contain(Category::Tuple));
        assert!(Category::Tuple.can_contain(Category::Datapoint));
        assert!(!Category::Section.can_contain(Category::Section));
        assert!(!Category::Tuple.can_contain(Category::Multivalue));
        assert!(!Category::Datapoint.can_contain(Category::Datapoint));
    }

    #[test]
    fn test_subtree_ids_preorder() {
        let node = SchemaNode::section("header", "Header")
            .with_child(SchemaNode::datapoint("a", "A", DataType::String))
            .with_child(
                SchemaNode::multivalue("items", "Items").with_child(
                    SchemaNode::tuple("item", "Item")
                        .with_child(SchemaNode::datapoint("b", "B", DataType::Number)),
                ),
            )
            .with_child(SchemaNode::datapoint("c", "C", DataType::Date));

        assert_eq!(
            node.subtree_ids(),
            vec!["header", "a", "items", "item", "b", "c"]
        );
    }

    #[test]
    fn test_accepts_options() {
        let enum_dp = DatapointAttributes::new(DataType::Enum);
        assert!(enum_dp.accepts_options());

        let mut string_dp = DatapointAttributes::new(DataType::String);
        assert!(!string_dp.accepts_options());
        string_dp.options = Some(Vec::new());
        assert!(string_dp.accepts_options());
    }
}
