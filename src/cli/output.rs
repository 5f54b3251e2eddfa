//! Output formatting for CLI

use serde_json::Value;

use crate::models::{NodeKind, SchemaTree};
use crate::transform::Change;

/// Render rows under a header with left-aligned, padded columns
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let width = cell.chars().count();
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(width),
                None => widths.push(width),
            }
        }
    }

    let separators: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let mut output = String::new();
    output.push_str(&render_line(headers.iter().copied(), &widths));
    output.push_str(&render_line(separators.iter().map(String::as_str), &widths));
    for row in rows {
        output.push_str(&render_line(row.iter().map(String::as_str), &widths));
    }
    output
}

fn render_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let line = cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    format!("{}\n", line.trim_end())
}

/// Display form of a JSON field: strings unquoted, lists comma-joined
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| cell(Some(item)))
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

/// Trailing id of an object URL (`.../queues/42` -> `42`)
pub fn id_from_url(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

/// Table of API objects restricted to `fields`
pub fn format_objects(objects: &[Value], fields: &[&str]) -> String {
    let rows: Vec<Vec<String>> = objects
        .iter()
        .map(|object| fields.iter().map(|f| cell(object.get(*f))).collect())
        .collect();
    format_table(fields, &rows)
}

/// Indented outline of a schema tree
pub fn format_tree(tree: &SchemaTree) -> String {
    let mut output = String::new();
    for (node, depth) in tree.preorder() {
        let detail = match &node.kind {
            NodeKind::Datapoint(attrs) => match &attrs.options {
                Some(options) => format!("{} [{} options]", attrs.data_type, options.len()),
                None => attrs.data_type.to_string(),
            },
            _ => node.category().to_string(),
        };
        output.push_str(&format!(
            "{}{} ({}) {}\n",
            "  ".repeat(depth - 1),
            node.id,
            detail,
            node.label
        ));
    }
    output
}

pub fn format_changes(changes: &[Change]) -> String {
    if changes.is_empty() {
        return "No changes\n".to_string();
    }
    changes.iter().map(|c| format!("{}\n", c)).collect()
}
