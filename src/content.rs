//! Lookups in annotation content
//!
//! Annotation content (and hook payloads built from it) is a list of section
//! objects, each with `children` nested the same way as the schema: section,
//! then datapoints or multivalues, then tuples, then datapoints. Every object
//! carries the `schema_id` of the schema node it was filled from.
//!
//! Objects without a `children` list are simply skipped, so the helpers never
//! fail on partial payloads.

use serde_json::Value;

fn children(node: &Value) -> &[Value] {
    match node.get("children") {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

fn has_schema_id(node: &Value, schema_id: &str) -> bool {
    node.get("schema_id").and_then(Value::as_str) == Some(schema_id)
}

/// Objects directly below the sections
fn section_children(content: &[Value]) -> impl Iterator<Item = &Value> {
    content.iter().flat_map(children)
}

/// First object with `schema_id` directly below a section
pub fn find_single_datapoint<'a>(content: &'a [Value], schema_id: &str) -> Option<&'a Value> {
    section_children(content).find(|node| has_schema_id(node, schema_id))
}

/// The multivalue with `schema_id`; multivalues sit where datapoints do
pub fn find_multivalue_parent<'a>(content: &'a [Value], schema_id: &str) -> Option<&'a Value> {
    find_single_datapoint(content, schema_id)
}

/// Every datapoint of every line item row, row by row
pub fn find_all_line_items_datapoints(content: &[Value]) -> Vec<&Value> {
    section_children(content)
        .flat_map(children)
        .flat_map(children)
        .collect()
}

/// One column of the line items: the cells with `schema_id` in every row
pub fn find_line_items_column<'a>(content: &'a [Value], schema_id: &str) -> Vec<&'a Value> {
    find_all_line_items_datapoints(content)
        .into_iter()
        .filter(|node| has_schema_id(node, schema_id))
        .collect()
}

/// Rows (tuples) of the first multivalue with `schema_id`
///
/// `None` when there is no such multivalue or it has no `children` list.
pub fn find_line_items_rows<'a>(content: &'a [Value], schema_id: &str) -> Option<Vec<&'a Value>> {
    let table = find_single_datapoint(content, schema_id)?;
    match table.get("children") {
        Some(Value::Array(rows)) => Some(rows.iter().collect()),
        _ => None,
    }
}

/// Values of a multivalue holding plain datapoints, found by the child's `schema_id`
pub fn find_children_of_simple_multivalue<'a>(
    content: &'a [Value],
    child_schema_id: &str,
) -> Vec<&'a Value> {
    section_children(content)
        .flat_map(children)
        .filter(|node| has_schema_id(node, child_schema_id))
        .collect()
}
