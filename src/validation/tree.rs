//! Structural validation of schema trees
//!
//! Walks a forest of [`SchemaNode`]s with an explicit stack and checks the
//! invariants every [`SchemaTree`](crate::models::SchemaTree) upholds:
//! global id uniqueness, nesting legality, option value uniqueness and
//! attribute ranges. On success the id → position index is returned so the
//! caller does not have to walk the tree a second time.

use std::collections::{HashMap, HashSet};

use crate::models::error::{SchemaResult, SchemaValidationError};
use crate::models::node::{Category, NodeKind, SchemaNode};

/// Position of a node: child indices starting from the root list
pub type NodePath = Vec<usize>;

/// Validate a forest and build its id index
pub fn index_roots(roots: &[SchemaNode]) -> SchemaResult<HashMap<String, NodePath>> {
    let mut index: HashMap<String, NodePath> = HashMap::new();
    let mut stack: Vec<(&SchemaNode, NodePath, Option<&SchemaNode>)> = roots
        .iter()
        .enumerate()
        .rev()
        .map(|(i, node)| (node, vec![i], None))
        .collect();

    while let Some((node, path, parent)) = stack.pop() {
        if node.id.is_empty() {
            return Err(SchemaValidationError::MissingAttribute {
                id: describe_position(&path),
                attribute: "id".to_string(),
            });
        }

        if let Some(parent) = parent {
            check_nesting(parent, node)?;
        }

        check_attributes(node)?;

        if index.contains_key(&node.id) {
            return Err(SchemaValidationError::DuplicateId {
                id: node.id.clone(),
            });
        }

        for (i, child) in node.children.iter().enumerate().rev() {
            let mut child_path = path.clone();
            child_path.push(i);
            stack.push((child, child_path, Some(node)));
        }

        index.insert(node.id.clone(), path);
    }

    Ok(index)
}

fn describe_position(path: &[usize]) -> String {
    let parts: Vec<String> = path.iter().map(|i| i.to_string()).collect();
    format!("node #{}", parts.join("."))
}

fn check_nesting(parent: &SchemaNode, child: &SchemaNode) -> SchemaResult<()> {
    let child_category = child.category();
    if child_category == Category::Section {
        return Err(SchemaValidationError::RootOnly {
            id: child.id.clone(),
            category: child_category,
        });
    }
    if !parent.category().can_contain(child_category) {
        return Err(SchemaValidationError::IllegalChild {
            parent: parent.id.clone(),
            parent_category: parent.category(),
            child: child.id.clone(),
            child_category,
        });
    }
    Ok(())
}

fn check_attributes(node: &SchemaNode) -> SchemaResult<()> {
    match &node.kind {
        NodeKind::Datapoint(attrs) => {
            if let Some(options) = &attrs.options {
                check_unique_options(&node.id, options.iter().map(|o| o.value.as_str()))?;
            }
            if let Some(threshold) = attrs.score_threshold
                && !(0.0..=1.0).contains(&threshold)
            {
                return Err(SchemaValidationError::InvalidAttribute {
                    id: node.id.clone(),
                    attribute: "score_threshold".to_string(),
                    reason: format!("{} is outside 0.0..=1.0", threshold),
                });
            }
        }
        NodeKind::Multivalue(attrs) => {
            if let (Some(min), Some(max)) = (attrs.min_occurrences, attrs.max_occurrences)
                && min > max
            {
                return Err(SchemaValidationError::InvalidAttribute {
                    id: node.id.clone(),
                    attribute: "min_occurrences".to_string(),
                    reason: format!("{} exceeds max_occurrences {}", min, max),
                });
            }
        }
        NodeKind::Section(_) | NodeKind::Tuple(_) => {}
    }
    Ok(())
}

/// Fail on the first option value that occurs twice
pub fn check_unique_options<'a>(
    id: &str,
    values: impl IntoIterator<Item = &'a str>,
) -> SchemaResult<()> {
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(value) {
            return Err(SchemaValidationError::DuplicateOptionValue {
                id: id.to_string(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::node::{DataType, SchemaOption};

    fn header() -> SchemaNode {
        SchemaNode::section("header", "Header")
            .with_child(SchemaNode::datapoint("invoice_id", "Invoice ID", DataType::String))
            .with_child(
                SchemaNode::multivalue("line_items", "Line items").with_child(
                    SchemaNode::tuple("line_item", "Line item")
                        .with_child(SchemaNode::datapoint("amount", "Amount", DataType::Number)),
                ),
            )
    }

    #[test]
    fn test_index_paths() {
        let roots = vec![header(), SchemaNode::section("footer", "Footer")];
        let index = index_roots(&roots).unwrap();

        assert_eq!(index.len(), 6);
        assert_eq!(index["header"], vec![0]);
        assert_eq!(index["invoice_id"], vec![0, 0]);
        assert_eq!(index["amount"], vec![0, 1, 0, 0]);
        assert_eq!(index["footer"], vec![1]);
    }

    #[test]
    fn test_duplicate_id_across_subtrees() {
        let roots = vec![
            header(),
            SchemaNode::section("footer", "Footer")
                .with_child(SchemaNode::datapoint("amount", "Again", DataType::Number)),
        ];
        assert_eq!(
            index_roots(&roots),
            Err(SchemaValidationError::DuplicateId {
                id: "amount".to_string()
            })
        );
    }

    #[test]
    fn test_nested_section_rejected() {
        let roots = vec![
            SchemaNode::section("outer", "Outer").with_child(SchemaNode::section("inner", "Inner")),
        ];
        assert!(matches!(
            index_roots(&roots),
            Err(SchemaValidationError::RootOnly { id, .. }) if id == "inner"
        ));
    }

    #[test]
    fn test_datapoint_cannot_have_children() {
        let roots = vec![
            SchemaNode::datapoint("leaf", "Leaf", DataType::String)
                .with_child(SchemaNode::datapoint("child", "Child", DataType::String)),
        ];
        assert!(matches!(
            index_roots(&roots),
            Err(SchemaValidationError::IllegalChild { parent, .. }) if parent == "leaf"
        ));
    }

    #[test]
    fn test_duplicate_option_value() {
        let roots = vec![SchemaNode::enum_datapoint(
            "currency",
            "Currency",
            vec![
                SchemaOption::new("eur", "Euro"),
                SchemaOption::new("usd", "Dollar"),
                SchemaOption::new("eur", "Euro again"),
            ],
        )];
        assert_eq!(
            index_roots(&roots),
            Err(SchemaValidationError::DuplicateOptionValue {
                id: "currency".to_string(),
                value: "eur".to_string()
            })
        );
    }

    #[test]
    fn test_empty_id_reports_position() {
        let roots = vec![
            SchemaNode::section("s", "S").with_child(SchemaNode::datapoint("", "?", DataType::String)),
        ];
        let err = index_roots(&roots).unwrap_err();
        assert_eq!(err.node_id(), "node #0.0");
    }
}
