//! fperf DOM - Page document model
//!
//! Plain owned trees: a [`Page`] owns an optional root [`Node`], every node
//! owns its children. There are no parent pointers, so a tree is acyclic and
//! traversal order is always the declared child order.

mod node;
mod page;

pub use node::{Descendants, Node};
pub use page::Page;
