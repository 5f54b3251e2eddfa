//! Tree ⇄ row sequence
//!
//! A [`TabularRow`] is one node of the tree with its children stripped and
//! its position encoded as the chain of ids from its root. Rows are emitted
//! in pre-order; reading them back rebuilds the nesting with a stack of open
//! ancestors.

use super::error::{FormatResult, SchemaFormatError};
use crate::models::{Category, SchemaNode, SchemaTree};

/// One row of the flat representation
#[derive(Debug, Clone, PartialEq)]
pub struct TabularRow {
    /// Ids from the root down to this node, inclusive
    pub path: Vec<String>,
    /// The node's own attributes; `children` is always empty
    pub node: SchemaNode,
}

impl TabularRow {
    pub fn category(&self) -> Category {
        self.node.category()
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// The path as shown in error messages
    pub fn display_path(&self) -> String {
        self.path.join("/")
    }
}

/// Flatten a tree into rows, one per node, in document order
pub fn tree_to_rows(tree: &SchemaTree) -> Vec<TabularRow> {
    let mut rows = Vec::with_capacity(tree.len());
    let mut path: Vec<String> = Vec::new();

    for (node, depth) in tree.preorder() {
        path.truncate(depth - 1);
        path.push(node.id.clone());
        rows.push(TabularRow {
            path: path.clone(),
            node: SchemaNode {
                children: Vec::new(),
                ..node.clone()
            },
        });
    }

    rows
}

/// Rebuild a tree from rows in pre-order
///
/// A row whose path extends the open ancestor chain by one id becomes a
/// child of the last open node; a shorter path closes nodes until its parent
/// is on top. Anything else means the rows are not in a valid pre-order.
pub fn rows_to_tree(
    rows: impl IntoIterator<Item = TabularRow>,
    version: &str,
) -> FormatResult<SchemaTree> {
    let mut roots: Vec<SchemaNode> = Vec::new();
    let mut open: Vec<SchemaNode> = Vec::new();

    for (i, row) in rows.into_iter().enumerate() {
        let row_number = i + 1;
        let Some((last, parent_path)) = row.path.split_last() else {
            return Err(SchemaFormatError::EmptyPath { row: row_number });
        };
        if *last != row.node.id {
            return Err(SchemaFormatError::IdMismatch {
                path: row.display_path(),
                id: row.node.id.clone(),
            });
        }
        if parent_path.len() > open.len() {
            return Err(SchemaFormatError::RowsOutOfOrder {
                row: row_number,
                path: row.display_path(),
            });
        }

        while open.len() > parent_path.len() {
            close_last(&mut open, &mut roots);
        }

        if open.iter().zip(parent_path).any(|(node, id)| node.id != *id) {
            return Err(SchemaFormatError::RowsOutOfOrder {
                row: row_number,
                path: row.display_path(),
            });
        }

        open.push(row.node);
    }

    while !open.is_empty() {
        close_last(&mut open, &mut roots);
    }

    Ok(SchemaTree::with_version(roots, version)?)
}

fn close_last(open: &mut Vec<SchemaNode>, roots: &mut Vec<SchemaNode>) {
    if let Some(node) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}
