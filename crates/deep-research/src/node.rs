//! Hierarchical node identities for the research tree
//!
//! Every node of the recursive query expansion is addressed by a dash
//! separated path starting at the root `"0"`: the second child of the root
//! is `"0-1"`, its first child is `"0-1-0"`, and so on. Progress events carry
//! these ids so a consumer can rebuild the tree, and a single branch can be
//! re-run by id.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Id of the root node
pub const ROOT_NODE_ID: &str = "0";

const SEPARATOR: char = '-';

/// Identity of one node in the research tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap an existing id string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The root node `"0"`
    pub fn root() -> Self {
        Self(ROOT_NODE_ID.to_string())
    }

    /// Id of the `index`-th child of this node
    pub fn child(&self, index: usize) -> Self {
        Self(format!("{}{}{}", self.0, SEPARATOR, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_NODE_ID
    }

    /// Id of the parent node, or `None` for a single-segment id
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rfind(SEPARATOR)
            .map(|pos| Self(self.0[..pos].to_string()))
    }

    /// Position of this node among its siblings
    ///
    /// Returns `None` when the trailing segment is not an integer.
    pub fn index(&self) -> Option<usize> {
        self.0.rsplit(SEPARATOR).next()?.parse().ok()
    }

    /// Number of segments; the root has depth 1
    pub fn depth(&self) -> usize {
        self.0.split(SEPARATOR).count()
    }

    /// True when `self` is a descendant of `ancestor`
    pub fn is_child_of(&self, ancestor: &NodeId) -> bool {
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0[ancestor.0.len()..].starts_with(SEPARATOR)
    }

    /// True when `descendant` lies below `self` in the tree
    pub fn is_parent_of(&self, descendant: &NodeId) -> bool {
        descendant.is_child_of(self)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// `id` is a strict descendant of `parent`
pub fn is_child_node(parent: &NodeId, id: &NodeId) -> bool {
    id.is_child_of(parent)
}

/// `ancestor` is a strict ancestor of `id`
pub fn is_parent_node(id: &NodeId, ancestor: &NodeId) -> bool {
    ancestor.is_parent_of(id)
}

pub fn is_root_node(id: &NodeId) -> bool {
    id.is_root()
}

/// Search breadth at a node: the initial breadth halved once per level
/// below the root, rounded up.
pub fn search_breadth(initial_breadth: usize, id: &NodeId) -> usize {
    let halvings = id.depth().saturating_sub(1);
    if halvings >= usize::BITS as usize {
        return usize::from(initial_breadth > 0);
    }
    initial_breadth.div_ceil(1usize << halvings)
}
