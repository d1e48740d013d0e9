//! Document node

use serde::{Deserialize, Serialize};

/// One element of a page's document tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Tag name (`div`, `img`, `h2`, ...)
    #[serde(default)]
    pub tag: String,
    /// Element identifier, reported back in accessibility issues
    #[serde(default)]
    pub id: String,
    /// Text content
    #[serde(default)]
    pub text: String,
    /// ARIA role
    #[serde(default)]
    pub role: String,
    /// ARIA label
    #[serde(default)]
    pub aria_label: String,
    /// Whether the element accepts user interaction
    #[serde(default)]
    pub interactive: bool,
    /// Children in declared order
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    /// Create an element with the given tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: String::new(),
            text: String::new(),
            role: String::new(),
            aria_label: String::new(),
            interactive: false,
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_aria_label(mut self, label: impl Into<String>) -> Self {
        self.aria_label = label.into();
        self
    }

    /// Mark the element as interactive (focusable / clickable)
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Append a child and return self (builder form)
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Append a child
    pub fn append_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// True when the ARIA label or the text content is non-empty
    #[inline]
    pub fn has_accessible_name(&self) -> bool {
        !self.aria_label.is_empty() || !self.text.is_empty()
    }

    /// Heading level for `h1`..`h6`, `None` for every other tag
    pub fn heading_level(&self) -> Option<u8> {
        match self.tag.as_bytes() {
            [b'h', level @ b'1'..=b'6'] => Some(level - b'0'),
            _ => None,
        }
    }

    /// Pre-order depth-first iterator, starting with `self`
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Number of nodes in this subtree, including `self`
    pub fn node_count(&self) -> usize {
        self.descendants().count()
    }
}

// Children are released from a heap stack so a deep tree does not
// overflow the thread stack when its last owner goes away.
impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Pre-order traversal over a subtree
///
/// Children are visited in declared order. Uses an explicit stack so deep
/// trees do not recurse.
#[derive(Debug, Clone)]
pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Reversed so the first child is popped next
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
