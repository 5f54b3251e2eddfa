//! Schema transformations
//!
//! Every operation takes a tree by reference and returns a fresh tree plus a
//! changelog. The input is never modified: the roots are cloned, edited and
//! validated as a new [`SchemaTree`], so a failing operation leaves nothing
//! half-applied.

use std::collections::HashSet;
use std::fmt;

use super::error::{TransformError, TransformResult};
use crate::models::tree::node_at_mut;
use crate::models::{NodeKind, SchemaNode, SchemaOption, SchemaTree, SchemaValidationError};
use crate::validation::check_unique_options;

/// Name used for the root list in messages and changelogs
pub const ROOT: &str = "(root)";

/// One transformation step
#[derive(Debug, Clone, PartialEq)]
pub enum Transformation {
    /// Replace the option list of an enum-capable datapoint
    SubstituteOptions {
        target_id: String,
        options: Vec<SchemaOption>,
    },
    /// Delete a node and its subtree
    Remove { target_id: String },
    /// Insert a node under `parent_id` (`None` inserts a root)
    Add {
        parent_id: Option<String>,
        node: SchemaNode,
        position: Option<usize>,
    },
    /// Detach a node and insert it elsewhere
    Move {
        target_id: String,
        parent_id: Option<String>,
        position: Option<usize>,
    },
}

impl Transformation {
    pub fn apply(&self, tree: &SchemaTree) -> TransformResult<TransformOutcome> {
        match self {
            Transformation::SubstituteOptions { target_id, options } => {
                substitute_options(tree, target_id, options.clone())
            }
            Transformation::Remove { target_id } => remove(tree, target_id),
            Transformation::Add {
                parent_id,
                node,
                position,
            } => add(tree, parent_id.as_deref(), node.clone(), *position),
            Transformation::Move {
                target_id,
                parent_id,
                position,
            } => move_node(tree, target_id, parent_id.as_deref(), *position),
        }
    }

    /// Short operation name, as used in scripts
    pub fn name(&self) -> &'static str {
        match self {
            Transformation::SubstituteOptions { .. } => "substitute-options",
            Transformation::Remove { .. } => "remove",
            Transformation::Add { .. } => "add",
            Transformation::Move { .. } => "move",
        }
    }
}

/// A single entry of the changelog
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    OptionsReplaced {
        id: String,
        before: Vec<SchemaOption>,
        after: Vec<SchemaOption>,
    },
    Removed {
        id: String,
        parent: Option<String>,
        position: usize,
        /// Ids of the removed subtree, in pre-order
        removed_ids: Vec<String>,
    },
    Added {
        id: String,
        parent: Option<String>,
        position: usize,
    },
    Moved {
        id: String,
        from_parent: Option<String>,
        from_position: usize,
        to_parent: Option<String>,
        to_position: usize,
    },
}

fn parent_name(parent: &Option<String>) -> &str {
    parent.as_deref().unwrap_or(ROOT)
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::OptionsReplaced { id, before, after } => write!(
                f,
                "~ {}: options replaced ({} -> {})",
                id,
                before.len(),
                after.len()
            ),
            Change::Removed {
                id,
                parent,
                position,
                removed_ids,
            } => write!(
                f,
                "- {} removed from {}[{}] ({} nodes)",
                id,
                parent_name(parent),
                position,
                removed_ids.len()
            ),
            Change::Added {
                id,
                parent,
                position,
            } => write!(f, "+ {} added at {}[{}]", id, parent_name(parent), position),
            Change::Moved {
                id,
                from_parent,
                from_position,
                to_parent,
                to_position,
            } => write!(
                f,
                "> {} moved from {}[{}] to {}[{}]",
                id,
                parent_name(from_parent),
                from_position,
                parent_name(to_parent),
                to_position
            ),
        }
    }
}

/// Result of applying one or more transformations
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    pub tree: SchemaTree,
    pub changes: Vec<Change>,
}

/// Replace the options of `target_id`, keeping the supplied order
pub fn substitute_options(
    tree: &SchemaTree,
    target_id: &str,
    options: Vec<SchemaOption>,
) -> TransformResult<TransformOutcome> {
    let path = lookup(tree, target_id)?.to_vec();
    let target = tree.get(target_id).ok_or_else(|| not_found(target_id))?;

    let accepts = target
        .datapoint_attributes()
        .is_some_and(|attrs| attrs.accepts_options());
    if !accepts {
        return Err(TransformError::UnsupportedNodeKind {
            id: target_id.to_string(),
            category: target.category(),
            reason: "only enum datapoints or datapoints with an options list take options"
                .to_string(),
        });
    }

    if let Err(SchemaValidationError::DuplicateOptionValue { id, value }) =
        check_unique_options(target_id, options.iter().map(|o| o.value.as_str()))
    {
        return Err(TransformError::DuplicateOptionValue { id, value });
    }

    let before = target.options().to_vec();
    let mut roots = tree.roots().to_vec();
    if let Some(NodeKind::Datapoint(attrs)) = node_at_mut(&mut roots, &path).map(|n| &mut n.kind) {
        attrs.options = Some(options.clone());
    }

    tracing::debug!(
        "Substituted {} options on '{}' (was {})",
        options.len(),
        target_id,
        before.len()
    );

    Ok(TransformOutcome {
        tree: rebuild(tree, roots)?,
        changes: vec![Change::OptionsReplaced {
            id: target_id.to_string(),
            before,
            after: options,
        }],
    })
}

/// Delete the subtree rooted at `target_id`
pub fn remove(tree: &SchemaTree, target_id: &str) -> TransformResult<TransformOutcome> {
    let path = lookup(tree, target_id)?.to_vec();
    let parent = tree.parent_of(target_id).map(|p| p.id.clone());

    let mut roots = tree.roots().to_vec();
    let removed = detach(&mut roots, &path).ok_or_else(|| not_found(target_id))?;
    let position = path.last().copied().unwrap_or(0);
    let removed_ids: Vec<String> = removed.subtree_ids().into_iter().map(String::from).collect();

    tracing::debug!("Removed '{}' and {} descendants", target_id, removed_ids.len() - 1);

    Ok(TransformOutcome {
        tree: rebuild(tree, roots)?,
        changes: vec![Change::Removed {
            id: target_id.to_string(),
            parent,
            position,
            removed_ids,
        }],
    })
}

/// Insert `node` under `parent_id` (or as a root) at `position`
///
/// `None` appends. Every id in the new subtree must be new to the tree.
pub fn add(
    tree: &SchemaTree,
    parent_id: Option<&str>,
    node: SchemaNode,
    position: Option<usize>,
) -> TransformResult<TransformOutcome> {
    let mut seen = HashSet::new();
    for id in node.subtree_ids() {
        if tree.contains(id) || !seen.insert(id) {
            return Err(TransformError::DuplicateId { id: id.to_string() });
        }
    }

    let mut roots = tree.roots().to_vec();
    let id = node.id.clone();
    let position = insert(&mut roots, parent_id, node, position)?;

    tracing::debug!("Added '{}' under {} at {}", id, parent_id.unwrap_or(ROOT), position);

    Ok(TransformOutcome {
        tree: rebuild(tree, roots)?,
        changes: vec![Change::Added {
            id,
            parent: parent_id.map(String::from),
            position,
        }],
    })
}

/// Move `target_id` under `parent_id` (or to the roots) at `position`
///
/// The position counts siblings after the node has been detached, so moving
/// a node to position 0 of its own parent makes it the first child.
pub fn move_node(
    tree: &SchemaTree,
    target_id: &str,
    parent_id: Option<&str>,
    position: Option<usize>,
) -> TransformResult<TransformOutcome> {
    let path = lookup(tree, target_id)?.to_vec();

    if let Some(parent_id) = parent_id {
        let ancestry = tree.id_path(parent_id).ok_or_else(|| not_found(parent_id))?;
        if ancestry.contains(&target_id) {
            return Err(TransformError::MoveIntoDescendant {
                id: target_id.to_string(),
                parent: parent_id.to_string(),
            });
        }
    }

    let from_parent = tree.parent_of(target_id).map(|p| p.id.clone());
    let from_position = path.last().copied().unwrap_or(0);

    let mut roots = tree.roots().to_vec();
    let node = detach(&mut roots, &path).ok_or_else(|| not_found(target_id))?;
    let to_position = insert(&mut roots, parent_id, node, position)?;

    tracing::debug!(
        "Moved '{}' from {} to {} at {}",
        target_id,
        parent_name(&from_parent),
        parent_id.unwrap_or(ROOT),
        to_position
    );

    Ok(TransformOutcome {
        tree: rebuild(tree, roots)?,
        changes: vec![Change::Moved {
            id: target_id.to_string(),
            from_parent,
            from_position,
            to_parent: parent_id.map(String::from),
            to_position,
        }],
    })
}

fn not_found(id: &str) -> TransformError {
    TransformError::NodeNotFound { id: id.to_string() }
}

fn lookup<'a>(tree: &'a SchemaTree, id: &str) -> TransformResult<&'a [usize]> {
    tree.path_of(id).ok_or_else(|| not_found(id))
}

fn rebuild(original: &SchemaTree, roots: Vec<SchemaNode>) -> TransformResult<SchemaTree> {
    Ok(SchemaTree::with_version(roots, original.version())?)
}

fn detach(roots: &mut Vec<SchemaNode>, path: &[usize]) -> Option<SchemaNode> {
    let (&last, parent_path) = path.split_last()?;
    let siblings = if parent_path.is_empty() {
        roots
    } else {
        &mut node_at_mut(roots, parent_path)?.children
    };
    (last < siblings.len()).then(|| siblings.remove(last))
}

/// Find a node by id in a root list that has no index yet
fn find_mut<'a>(roots: &'a mut [SchemaNode], id: &str) -> Option<&'a mut SchemaNode> {
    let mut stack: Vec<&'a mut SchemaNode> = roots.iter_mut().collect();
    while let Some(node) = stack.pop() {
        if node.id == id {
            return Some(node);
        }
        stack.extend(node.children.iter_mut());
    }
    None
}

/// Insert into `roots` (already edited) under `parent_id`; returns the index used
fn insert(
    roots: &mut Vec<SchemaNode>,
    parent_id: Option<&str>,
    node: SchemaNode,
    position: Option<usize>,
) -> TransformResult<usize> {
    let (siblings, parent_label) = match parent_id {
        None => (roots, ROOT),
        Some(parent_id) => {
            let parent = find_mut(roots, parent_id).ok_or_else(|| not_found(parent_id))?;
            if !parent.category().can_contain(node.category()) {
                return Err(TransformError::UnsupportedNodeKind {
                    id: node.id.clone(),
                    category: node.category(),
                    reason: format!(
                        "a {} node cannot hold a {} node",
                        parent.category(),
                        node.category()
                    ),
                });
            }
            (&mut parent.children, parent_id)
        }
    };

    let len = siblings.len();
    let index = match position {
        None => len,
        Some(p) if p <= len => p,
        Some(p) => {
            return Err(TransformError::PositionOutOfRange {
                parent: parent_label.to_string(),
                position: p,
                len,
            });
        }
    };
    siblings.insert(index, node);
    Ok(index)
}
