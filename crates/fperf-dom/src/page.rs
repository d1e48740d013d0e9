//! Page - A submitted document

use serde::{Deserialize, Serialize};

use crate::node::Node;

/// A document submitted to the engine
///
/// The identifier may be empty until the engine assigns one. A page without a
/// root is valid and carries no structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Page {
    pub id: String,
    pub url: String,
    pub root: Option<Node>,
}

impl Page {
    /// Create a page with no identifier and no structure
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            url: url.into(),
            root: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_root(mut self, root: Node) -> Self {
        self.root = Some(root);
        self
    }

    /// Whether an identifier has been set
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// Whether the page carries no tree
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Pre-order walk over the whole tree; yields nothing for an empty page
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.root.iter().flat_map(|root| root.descendants())
    }

    pub fn node_count(&self) -> usize {
        self.root.as_ref().map_or(0, Node::node_count)
    }
}
