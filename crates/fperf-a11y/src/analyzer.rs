//! Accessibility Analyzer
//!
//! Walks a tree in pre-order and runs every rule on every node.

use fperf_dom::{Node, Page};

use crate::AccessibilityIssue;
use crate::rules::{Rule, default_rules};

/// Rule runner
///
/// Holds no state between calls: the same tree always produces the same
/// issues in the same order.
#[derive(Debug)]
pub struct AccessibilityAnalyzer {
    rules: Vec<Box<dyn Rule>>,
}

impl AccessibilityAnalyzer {
    /// Analyzer with the built-in rules
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    /// Analyzer with a custom rule set, evaluated in the given order
    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    /// Analyze a page; an empty page has no issues
    pub fn analyze(&self, page: &Page) -> Vec<AccessibilityIssue> {
        page.root.as_ref().map(|root| self.analyze_node(root)).unwrap_or_default()
    }

    /// Analyze a subtree
    pub fn analyze_node(&self, root: &Node) -> Vec<AccessibilityIssue> {
        root.descendants()
            .flat_map(|node| self.rules.iter().filter_map(move |rule| rule.check(node)))
            .collect()
    }
}

impl Default for AccessibilityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
