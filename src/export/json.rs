//! JSON (and YAML) schema exporter
//!
//! Renders a [`SchemaTree`] as the nested mapping accepted by
//! [`crate::import::json`]. Attributes that are unset are omitted; a
//! multivalue with exactly one child writes it as a single object, the way
//! the service does. Uninterpreted attributes from [`SchemaNode::extra`]
//! are written back next to the typed ones.

use serde_json::{Map, Value, json};

use super::ExportError;
use crate::import::json::is_reserved_key;
use crate::models::{NodeKind, SchemaNode, SchemaTree};

/// Render the whole tree as a JSON array of root nodes
pub fn tree_to_json(tree: &SchemaTree) -> Value {
    Value::Array(tree.roots().iter().map(node_to_json).collect())
}

/// Render one node and its subtree
///
/// Builds children bottom-up with an explicit stack, so deep trees do not
/// grow the call stack.
pub fn node_to_json(root: &SchemaNode) -> Value {
    let mut stack: Vec<(&SchemaNode, Vec<Value>)> = vec![(root, Vec::new())];

    loop {
        let next = match stack.last() {
            Some(&(node, ref built)) => node.children.get(built.len()),
            None => return Value::Null,
        };
        if let Some(child) = next {
            stack.push((child, Vec::with_capacity(child.children.len())));
            continue;
        }

        let Some((node, children)) = stack.pop() else {
            return Value::Null;
        };
        let value = render_node(node, children);
        match stack.last_mut() {
            Some((_, built)) => built.push(value),
            None => return value,
        }
    }
}

/// Pretty-printed JSON text
pub fn to_json_string(tree: &SchemaTree) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&tree_to_json(tree))?)
}

/// YAML text of the same mapping
pub fn to_yaml_string(tree: &SchemaTree) -> Result<String, ExportError> {
    Ok(serde_yaml::to_string(&tree_to_json(tree))?)
}

fn render_node(node: &SchemaNode, children: Vec<Value>) -> Value {
    let mut map = Map::new();
    map.insert("category".to_string(), json!(node.category().as_str()));
    map.insert("id".to_string(), json!(node.id));
    if !node.label.is_empty() {
        map.insert("label".to_string(), json!(node.label));
    }
    insert_opt(&mut map, "description", node.description.as_ref());
    insert_opt(&mut map, "hidden", node.hidden.as_ref());

    match &node.kind {
        NodeKind::Section(attrs) => {
            insert_opt(&mut map, "icon", attrs.icon.as_ref());
            insert_opt(&mut map, "can_collapse", attrs.can_collapse.as_ref());
            map.insert("children".to_string(), Value::Array(children));
        }
        NodeKind::Multivalue(attrs) => {
            insert_opt(&mut map, "rir_field_names", attrs.rir_field_names.as_ref());
            insert_opt(&mut map, "min_occurrences", attrs.min_occurrences.as_ref());
            insert_opt(&mut map, "max_occurrences", attrs.max_occurrences.as_ref());
            insert_opt(&mut map, "default_value", attrs.default_value.as_ref());
            insert_opt(&mut map, "can_collapse", attrs.can_collapse.as_ref());
            let children = if children.len() == 1 {
                children.into_iter().next().unwrap_or(Value::Null)
            } else {
                Value::Array(children)
            };
            map.insert("children".to_string(), children);
        }
        NodeKind::Tuple(attrs) => {
            insert_opt(&mut map, "rir_field_names", attrs.rir_field_names.as_ref());
            map.insert("children".to_string(), Value::Array(children));
        }
        NodeKind::Datapoint(attrs) => {
            map.insert("type".to_string(), json!(attrs.data_type.as_str()));
            insert_opt(&mut map, "format", attrs.format.as_ref());
            insert_opt(&mut map, "rir_field_names", attrs.rir_field_names.as_ref());
            insert_opt(&mut map, "default_value", attrs.default_value.as_ref());
            let mut constraints = match node.extra.get("constraints") {
                Some(Value::Object(other)) => other.clone(),
                _ => Map::new(),
            };
            if let Some(required) = attrs.required {
                constraints.insert("required".to_string(), json!(required));
            }
            if !constraints.is_empty() {
                map.insert("constraints".to_string(), Value::Object(constraints));
            }
            insert_opt(&mut map, "can_export", attrs.can_export.as_ref());
            insert_opt(&mut map, "width", attrs.width.as_ref());
            insert_opt(&mut map, "stretch", attrs.stretch.as_ref());
            insert_opt(&mut map, "score_threshold", attrs.score_threshold.as_ref());
            if let Some(options) = &attrs.options {
                map.insert("options".to_string(), json!(options));
            }
        }
    }

    for (key, value) in &node.extra {
        if !is_reserved_key(key) {
            map.insert(key.clone(), value.clone());
        }
    }

    Value::Object(map)
}

fn insert_opt<T: serde::Serialize>(map: &mut Map<String, Value>, key: &str, value: Option<&T>) {
    if let Some(value) = value {
        map.insert(key.to_string(), json!(value));
    }
}
