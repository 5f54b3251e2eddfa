//! JSON (and YAML) schema importer
//!
//! Builds a [`SchemaTree`] from the nested mapping form used by the service:
//! an array of root node objects, each with `id`, `label`, `category`,
//! category-specific attributes and, for structural nodes, `children`.
//!
//! Typed keys of another category are rejected. Keys the model does not
//! know at all, and `constraints` entries other than `required`, are kept
//! verbatim in [`SchemaNode::extra`] so they survive a round trip.

use serde_json::{Map, Value};

use super::ImportError;
use crate::models::error::{SchemaResult, SchemaValidationError};
use crate::models::{
    Category, DataType, DatapointAttributes, MultivalueAttributes, NodeKind, SchemaNode,
    SchemaOption, SchemaTree, SectionAttributes, TupleAttributes,
};

const COMMON_KEYS: &[&str] = &["id", "schema_id", "category", "label", "description", "hidden"];
const SECTION_KEYS: &[&str] = &["icon", "can_collapse", "children"];
const MULTIVALUE_KEYS: &[&str] = &[
    "rir_field_names",
    "min_occurrences",
    "max_occurrences",
    "default_value",
    "can_collapse",
    "children",
];
const TUPLE_KEYS: &[&str] = &["rir_field_names", "children"];
const DATAPOINT_KEYS: &[&str] = &[
    "type",
    "format",
    "rir_field_names",
    "default_value",
    "constraints",
    "can_export",
    "width",
    "stretch",
    "score_threshold",
    "options",
];

/// Whether `key` names an attribute of the typed model
pub(crate) fn is_reserved_key(key: &str) -> bool {
    COMMON_KEYS.contains(&key) || is_typed_key(key)
}

fn is_typed_key(key: &str) -> bool {
    [SECTION_KEYS, MULTIVALUE_KEYS, TUPLE_KEYS, DATAPOINT_KEYS]
        .iter()
        .any(|keys| keys.contains(&key))
}

fn legal_keys(category: Category) -> &'static [&'static str] {
    match category {
        Category::Section => SECTION_KEYS,
        Category::Multivalue => MULTIVALUE_KEYS,
        Category::Tuple => TUPLE_KEYS,
        Category::Datapoint => DATAPOINT_KEYS,
    }
}

/// Build a tree from a parsed JSON value
///
/// Accepts an array of root nodes, or a single node object which becomes
/// the only root.
pub fn json_to_tree(value: &Value) -> SchemaResult<SchemaTree> {
    let roots = json_to_nodes(value)?;
    SchemaTree::new(roots)
}

/// Parse a schema from JSON text
pub fn parse_json_str(content: &str) -> Result<SchemaTree, ImportError> {
    let value: Value = serde_json::from_str(content)?;
    Ok(json_to_tree(&value)?)
}

/// Parse a schema from YAML text holding the same nested mapping
pub fn parse_yaml_str(content: &str) -> Result<SchemaTree, ImportError> {
    let value: Value = serde_yaml::from_str(content)?;
    Ok(json_to_tree(&value)?)
}

/// Build a single node (with its subtree) without assembling a tree
///
/// Used for nodes that are about to be inserted into an existing tree; the
/// tree-wide invariants are checked when the result is assembled.
pub fn node_from_json(value: &Value) -> SchemaResult<SchemaNode> {
    let mut nodes = build_forest(std::slice::from_ref(value), false)?;
    nodes.pop().ok_or_else(|| SchemaValidationError::Malformed {
        location: "node".to_string(),
        reason: "no node produced".to_string(),
    })
}

/// Convert a JSON array (or single object) into root nodes
pub fn json_to_nodes(value: &Value) -> SchemaResult<Vec<SchemaNode>> {
    match value {
        Value::Array(items) => build_forest(items, true),
        Value::Object(_) => build_forest(std::slice::from_ref(value), true),
        other => Err(SchemaValidationError::Malformed {
            location: "document".to_string(),
            reason: format!("expected an array of nodes, found {}", json_type_name(other)),
        }),
    }
}

/// A node whose own attributes are parsed but whose children are pending
struct Frame<'a> {
    node: SchemaNode,
    pending: std::vec::IntoIter<&'a Value>,
}

fn build_forest(items: &[Value], at_root: bool) -> SchemaResult<Vec<SchemaNode>> {
    let mut roots = Vec::with_capacity(items.len());

    for (i, item) in items.iter().enumerate() {
        let mut stack = vec![parse_frame(item, &format!("node #{}", i), at_root)?];

        while let Some(top) = stack.last_mut() {
            if let Some(child) = top.pending.next() {
                let location = format!("child of '{}'", top.node.id);
                let frame = parse_frame(child, &location, false)?;
                stack.push(frame);
                continue;
            }
            let Some(done) = stack.pop() else { break };
            match stack.last_mut() {
                Some(parent) => parent.node.children.push(done.node),
                None => roots.push(done.node),
            }
        }
    }

    Ok(roots)
}

fn parse_frame<'a>(value: &'a Value, location: &str, at_root: bool) -> SchemaResult<Frame<'a>> {
    let Value::Object(map) = value else {
        return Err(SchemaValidationError::Malformed {
            location: location.to_string(),
            reason: format!("expected a node object, found {}", json_type_name(value)),
        });
    };

    let id = read_id(map, location)?;
    let category = read_category(map, &id, at_root)?;

    let mut extra = Map::new();
    for (key, raw) in map {
        if COMMON_KEYS.contains(&key.as_str()) || legal_keys(category).contains(&key.as_str()) {
            continue;
        }
        if is_typed_key(key) {
            return Err(SchemaValidationError::IllegalAttribute {
                id: id.clone(),
                category,
                attribute: key.clone(),
            });
        }
        extra.insert(key.clone(), raw.clone());
    }

    let label = get_string(map, "label", &id)?.unwrap_or_default();
    let description = get_string(map, "description", &id)?;
    let hidden = get_bool(map, "hidden", &id)?;

    let kind = match category {
        Category::Section => NodeKind::Section(SectionAttributes {
            icon: get_string(map, "icon", &id)?,
            can_collapse: get_bool(map, "can_collapse", &id)?,
        }),
        Category::Multivalue => NodeKind::Multivalue(MultivalueAttributes {
            rir_field_names: get_string_list(map, "rir_field_names", &id)?,
            min_occurrences: get_u32(map, "min_occurrences", &id)?,
            max_occurrences: get_u32(map, "max_occurrences", &id)?,
            default_value: get_string(map, "default_value", &id)?,
            can_collapse: get_bool(map, "can_collapse", &id)?,
        }),
        Category::Tuple => NodeKind::Tuple(TupleAttributes {
            rir_field_names: get_string_list(map, "rir_field_names", &id)?,
        }),
        Category::Datapoint => {
            if let Some(Value::Object(constraints)) = map.get("constraints") {
                let other: Map<String, Value> = constraints
                    .iter()
                    .filter(|(k, _)| k.as_str() != "required")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                if !other.is_empty() {
                    extra.insert("constraints".to_string(), Value::Object(other));
                }
            }
            NodeKind::Datapoint(read_datapoint(map, &id)?)
        }
    };

    let pending = read_children(map, category, &id)?;

    Ok(Frame {
        node: SchemaNode {
            id,
            label,
            description,
            hidden,
            kind,
            children: Vec::with_capacity(pending.len()),
            extra,
        },
        pending: pending.into_iter(),
    })
}

fn read_id(map: &Map<String, Value>, location: &str) -> SchemaResult<String> {
    let id = get_string(map, "id", location)?;
    let schema_id = get_string(map, "schema_id", location)?;
    match (id, schema_id) {
        (Some(id), Some(schema_id)) if id != schema_id => {
            Err(SchemaValidationError::InvalidAttribute {
                id,
                attribute: "schema_id".to_string(),
                reason: format!("'{}' does not match id", schema_id),
            })
        }
        (Some(id), _) | (None, Some(id)) if !id.is_empty() => Ok(id),
        _ => Err(SchemaValidationError::MissingAttribute {
            id: location.to_string(),
            attribute: "id".to_string(),
        }),
    }
}

fn read_category(map: &Map<String, Value>, id: &str, at_root: bool) -> SchemaResult<Category> {
    if let Some(raw) = get_string(map, "category", id)? {
        return Category::parse(&raw).ok_or_else(|| SchemaValidationError::UnknownCategory {
            id: id.to_string(),
            category: raw,
        });
    }

    // Without an explicit category the shape decides.
    match map.get("children") {
        Some(Value::Object(_)) => Ok(Category::Multivalue),
        Some(Value::Array(_)) if at_root => Ok(Category::Section),
        Some(Value::Array(_)) => Ok(Category::Tuple),
        _ if map.contains_key("type") => Ok(Category::Datapoint),
        _ => Err(SchemaValidationError::MissingAttribute {
            id: id.to_string(),
            attribute: "category".to_string(),
        }),
    }
}

fn read_datapoint(map: &Map<String, Value>, id: &str) -> SchemaResult<DatapointAttributes> {
    let raw_type =
        get_string(map, "type", id)?.ok_or_else(|| SchemaValidationError::MissingAttribute {
            id: id.to_string(),
            attribute: "type".to_string(),
        })?;
    let data_type =
        DataType::parse(&raw_type).ok_or_else(|| SchemaValidationError::InvalidAttribute {
            id: id.to_string(),
            attribute: "type".to_string(),
            reason: format!("unknown datapoint type '{}'", raw_type),
        })?;

    let required = match map.get("constraints") {
        None | Some(Value::Null) => None,
        Some(Value::Object(constraints)) => get_bool(constraints, "required", id)?,
        Some(other) => {
            return Err(invalid(id, "constraints", format!("expected an object, found {}", json_type_name(other))));
        }
    };

    let options = match map.get("options") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            serde_json::from_value::<Vec<SchemaOption>>(value.clone())
                .map_err(|e| invalid(id, "options", e.to_string()))?,
        ),
    };

    Ok(DatapointAttributes {
        data_type,
        format: get_string(map, "format", id)?,
        rir_field_names: get_string_list(map, "rir_field_names", id)?,
        default_value: get_string(map, "default_value", id)?,
        required,
        can_export: get_bool(map, "can_export", id)?,
        width: get_u32(map, "width", id)?,
        stretch: get_bool(map, "stretch", id)?,
        score_threshold: get_f64(map, "score_threshold", id)?,
        options,
    })
}

fn read_children<'a>(
    map: &'a Map<String, Value>,
    category: Category,
    id: &str,
) -> SchemaResult<Vec<&'a Value>> {
    match (category, map.get("children")) {
        (Category::Datapoint, _) | (_, None) | (_, Some(Value::Null)) => Ok(Vec::new()),
        (_, Some(Value::Array(items))) => Ok(items.iter().collect()),
        // A multivalue holds its single child as an object.
        (Category::Multivalue, Some(child @ Value::Object(_))) => Ok(vec![child]),
        (_, Some(other)) => Err(invalid(
            id,
            "children",
            format!("expected an array, found {}", json_type_name(other)),
        )),
    }
}

fn invalid(id: &str, attribute: &str, reason: impl Into<String>) -> SchemaValidationError {
    SchemaValidationError::InvalidAttribute {
        id: id.to_string(),
        attribute: attribute.to_string(),
        reason: reason.into(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn get_string(map: &Map<String, Value>, key: &str, id: &str) -> SchemaResult<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(invalid(
            id,
            key,
            format!("expected a string, found {}", json_type_name(other)),
        )),
    }
}

fn get_bool(map: &Map<String, Value>, key: &str, id: &str) -> SchemaResult<Option<bool>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(invalid(
            id,
            key,
            format!("expected a boolean, found {}", json_type_name(other)),
        )),
    }
}

fn get_u32(map: &Map<String, Value>, key: &str, id: &str) -> SchemaResult<Option<u32>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let whole = n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64));
            whole
                .and_then(|v| u32::try_from(v).ok())
                .map(Some)
                .ok_or_else(|| invalid(id, key, format!("{} is not a non-negative integer", n)))
        }
        Some(other) => Err(invalid(
            id,
            key,
            format!("expected a number, found {}", json_type_name(other)),
        )),
    }
}

fn get_f64(map: &Map<String, Value>, key: &str, id: &str) -> SchemaResult<Option<f64>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(other) => Err(invalid(
            id,
            key,
            format!("expected a number, found {}", json_type_name(other)),
        )),
    }
}

fn get_string_list(
    map: &Map<String, Value>,
    key: &str,
    id: &str,
) -> SchemaResult<Option<Vec<String>>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(invalid(
                    id,
                    key,
                    format!("expected strings, found {}", json_type_name(other)),
                )),
            })
            .collect::<SchemaResult<Vec<_>>>()
            .map(Some),
        Some(other) => Err(invalid(
            id,
            key,
            format!("expected an array, found {}", json_type_name(other)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_schema() {
        let value = json!([{
            "category": "section",
            "id": "invoice_details",
            "label": "Invoice details",
            "icon": null,
            "children": [
                {
                    "category": "datapoint",
                    "id": "invoice_id",
                    "label": "Invoice number",
                    "type": "string",
                    "rir_field_names": ["document_id"],
                    "constraints": {"required": false},
                    "default_value": null
                },
                {
                    "category": "multivalue",
                    "id": "line_items",
                    "label": "Line items",
                    "min_occurrences": 0,
                    "children": {
                        "category": "tuple",
                        "id": "line_item",
                        "label": "Line item",
                        "children": [
                            {"category": "datapoint", "id": "item_amount", "label": "Amount", "type": "number", "format": "# ##0.#"}
                        ]
                    }
                }
            ]
        }]);

        let tree = json_to_tree(&value).unwrap();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.roots()[0].children.len(), 2);

        let invoice_id = tree.get("invoice_id").unwrap();
        let attrs = invoice_id.datapoint_attributes().unwrap();
        assert_eq!(attrs.data_type, DataType::String);
        assert_eq!(attrs.required, Some(false));
        assert_eq!(attrs.rir_field_names.as_deref(), Some(&["document_id".to_string()][..]));
        assert_eq!(attrs.default_value, None);

        assert_eq!(tree.parent_of("item_amount").unwrap().id, "line_item");
        assert_eq!(tree.get("line_items").unwrap().category(), Category::Multivalue);
    }

    #[test]
    fn test_single_object_becomes_root() {
        let value = json!({"id": "invoice_id", "category": "datapoint", "type": "string", "label": "Invoice", "options": []});
        let tree = json_to_tree(&value).unwrap();
        assert_eq!(tree.roots().len(), 1);
        assert_eq!(
            tree.get("invoice_id").unwrap().datapoint_attributes().unwrap().options,
            Some(Vec::new())
        );
    }

    #[test]
    fn test_category_inferred_from_shape() {
        let value = json!([{
            "id": "s",
            "label": "S",
            "children": [
                {"id": "d", "label": "D", "type": "date"},
                {"id": "m", "label": "M", "children": {"id": "t", "label": "T", "children": []}}
            ]
        }]);
        let tree = json_to_tree(&value).unwrap();
        assert_eq!(tree.get("s").unwrap().category(), Category::Section);
        assert_eq!(tree.get("d").unwrap().category(), Category::Datapoint);
        assert_eq!(tree.get("m").unwrap().category(), Category::Multivalue);
        assert_eq!(tree.get("t").unwrap().category(), Category::Tuple);
    }

    #[test]
    fn test_unknown_category() {
        let value = json!([{"id": "x", "label": "X", "category": "table"}]);
        assert_eq!(
            json_to_tree(&value),
            Err(SchemaValidationError::UnknownCategory {
                id: "x".to_string(),
                category: "table".to_string()
            })
        );
    }

    #[test]
    fn test_attribute_illegal_for_category() {
        let value = json!([{"id": "s", "label": "S", "category": "section", "type": "string", "children": []}]);
        assert!(matches!(
            json_to_tree(&value),
            Err(SchemaValidationError::IllegalAttribute { id, attribute, .. }) if id == "s" && attribute == "type"
        ));
    }

    #[test]
    fn test_duplicate_option_value_names_node() {
        let value = json!([{
            "id": "currency", "label": "Currency", "category": "datapoint", "type": "enum",
            "options": [{"value": "eur", "label": "EUR"}, {"value": "eur", "label": "Euro"}]
        }]);
        let err = json_to_tree(&value).unwrap_err();
        assert_eq!(err.node_id(), "currency");
        assert!(matches!(err, SchemaValidationError::DuplicateOptionValue { .. }));
    }

    #[test]
    fn test_duplicate_id() {
        let value = json!([
            {"id": "a", "label": "A", "category": "section", "children": [
                {"id": "dup", "label": "1", "category": "datapoint", "type": "string"}
            ]},
            {"id": "b", "label": "B", "category": "section", "children": [
                {"id": "dup", "label": "2", "category": "datapoint", "type": "string"}
            ]}
        ]);
        assert_eq!(
            json_to_tree(&value),
            Err(SchemaValidationError::DuplicateId { id: "dup".to_string() })
        );
    }

    #[test]
    fn test_missing_type_on_datapoint() {
        let value = json!([{"id": "d", "label": "D", "category": "datapoint"}]);
        assert_eq!(
            json_to_tree(&value),
            Err(SchemaValidationError::MissingAttribute {
                id: "d".to_string(),
                attribute: "type".to_string()
            })
        );
    }

    #[test]
    fn test_schema_id_alias() {
        let value = json!([{"schema_id": "d", "label": "D", "category": "datapoint", "type": "string"}]);
        assert!(json_to_tree(&value).unwrap().contains("d"));

        let value = json!([{"id": "d", "schema_id": "e", "label": "D", "category": "datapoint", "type": "string"}]);
        assert!(matches!(
            json_to_tree(&value),
            Err(SchemaValidationError::InvalidAttribute { attribute, .. }) if attribute == "schema_id"
        ));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
- id: header
  label: Header
  category: section
  children:
    - id: vendor
      label: Vendor
      category: datapoint
      type: string
      can_export: true
"#;
        let tree = parse_yaml_str(yaml).unwrap();
        let vendor = tree.get("vendor").unwrap().datapoint_attributes().unwrap();
        assert_eq!(vendor.can_export, Some(true));
    }

    #[test]
    fn test_deeply_nested_input_does_not_recurse() {
        // Nesting legality is checked after the build, so a deep chain of
        // tuples only fails validation. Dropping the nested serde_json value
        // still recurses, so the body runs on a thread with a large stack.
        let handle = std::thread::Builder::new()
            .stack_size(64 << 20)
            .spawn(|| {
                let mut value =
                    json!({"id": "leaf", "label": "Leaf", "category": "datapoint", "type": "string"});
                for depth in 0..1_000 {
                    value = json!({"id": format!("t{}", depth), "label": "T", "category": "tuple", "children": [value]});
                }
                json_to_tree(&json!([value]))
            })
            .unwrap();
        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, SchemaValidationError::IllegalChild { .. }));
    }

    #[test]
    fn test_label_is_optional() {
        let value = json!({"id": "invoice_id", "category": "datapoint", "type": "string", "options": []});
        let tree = json_to_tree(&value).unwrap();
        let node = tree.get("invoice_id").unwrap();
        assert_eq!(node.label, "");
        assert_eq!(node.options(), &[] as &[SchemaOption]);
    }

    #[test]
    fn test_unknown_keys_kept_as_extra() {
        let value = json!([{
            "id": "amount", "label": "Amount", "category": "datapoint", "type": "number",
            "constraints": {"required": false, "length": {"min": 1, "max": 12}},
            "ui_configuration": {"type": "captured", "edit": "enabled"}
        }]);
        let tree = json_to_tree(&value).unwrap();
        let node = tree.get("amount").unwrap();
        assert_eq!(node.datapoint_attributes().unwrap().required, Some(false));
        assert_eq!(
            node.extra.get("ui_configuration"),
            Some(&json!({"type": "captured", "edit": "enabled"}))
        );
        assert_eq!(
            node.extra.get("constraints"),
            Some(&json!({"length": {"min": 1, "max": 12}}))
        );
        assert!(!node.extra.contains_key("type"));
    }
}
