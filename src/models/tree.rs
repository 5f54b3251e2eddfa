//! Schema tree: an ordered, validated forest of schema nodes

use std::collections::HashMap;

use super::error::SchemaResult;
use super::node::SchemaNode;
use crate::validation::tree::{NodePath, index_roots};

/// Format version written when none is supplied
pub const DEFAULT_FORMAT_VERSION: &str = "1";

/// An immutable, validated schema
///
/// Built once from a forest of nodes, validated, and indexed by schema id.
/// Transformations never modify a tree; they build a new one, which is
/// validated and indexed afresh.
#[derive(Debug, Clone)]
pub struct SchemaTree {
    version: String,
    roots: Vec<SchemaNode>,
    index: HashMap<String, NodePath>,
}

impl PartialEq for SchemaTree {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version && self.roots == other.roots
    }
}

impl SchemaTree {
    /// Validate `roots` and build a tree with the default format version
    pub fn new(roots: Vec<SchemaNode>) -> SchemaResult<Self> {
        Self::with_version(roots, DEFAULT_FORMAT_VERSION)
    }

    /// Validate `roots` and build a tree tagged with `version`
    pub fn with_version(roots: Vec<SchemaNode>, version: impl Into<String>) -> SchemaResult<Self> {
        let index = index_roots(&roots)?;
        Ok(Self {
            version: version.into(),
            roots,
            index,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn roots(&self) -> &[SchemaNode] {
        &self.roots
    }

    /// Take the roots out of the tree, e.g. to build a modified copy
    pub fn into_roots(self) -> Vec<SchemaNode> {
        self.roots
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Position of a node as child indices from the root list
    pub fn path_of(&self, id: &str) -> Option<&[usize]> {
        self.index.get(id).map(Vec::as_slice)
    }

    /// Look a node up by schema id
    pub fn get(&self, id: &str) -> Option<&SchemaNode> {
        self.path_of(id).and_then(|path| node_at(&self.roots, path))
    }

    /// Parent of a node; `None` for roots and unknown ids
    pub fn parent_of(&self, id: &str) -> Option<&SchemaNode> {
        let path = self.path_of(id)?;
        if path.len() < 2 {
            return None;
        }
        node_at(&self.roots, &path[..path.len() - 1])
    }

    /// Schema ids from the root down to `id`, inclusive
    pub fn id_path(&self, id: &str) -> Option<Vec<&str>> {
        let path = self.path_of(id)?;
        let mut ids = Vec::with_capacity(path.len());
        let mut siblings = self.roots.as_slice();
        for &i in path {
            let node = siblings.get(i)?;
            ids.push(node.id.as_str());
            siblings = &node.children;
        }
        Some(ids)
    }

    /// Depth of the deepest node (roots have depth 1)
    pub fn depth(&self) -> usize {
        self.index.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Pre-order walk yielding each node with its depth (roots have depth 1)
    pub fn preorder(&self) -> PreOrder<'_> {
        PreOrder {
            stack: self.roots.iter().rev().map(|node| (node, 1)).collect(),
        }
    }
}

/// Resolve a position against a root list
pub fn node_at<'a>(roots: &'a [SchemaNode], path: &[usize]) -> Option<&'a SchemaNode> {
    let (first, rest) = path.split_first()?;
    let mut node = roots.get(*first)?;
    for &i in rest {
        node = node.children.get(i)?;
    }
    Some(node)
}

/// Mutable variant of [`node_at`], used when assembling modified copies
pub fn node_at_mut<'a>(roots: &'a mut [SchemaNode], path: &[usize]) -> Option<&'a mut SchemaNode> {
    let (first, rest) = path.split_first()?;
    let mut node = roots.get_mut(*first)?;
    for &i in rest {
        node = node.children.get_mut(i)?;
    }
    Some(node)
}

/// Iterator returned by [`SchemaTree::preorder`]
pub struct PreOrder<'a> {
    stack: Vec<(&'a SchemaNode, usize)>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = (&'a SchemaNode, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, depth) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|child| (child, depth + 1)));
        Some((node, depth))
    }
}
