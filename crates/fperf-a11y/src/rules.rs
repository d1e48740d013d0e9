//! Accessibility Rules
//!
//! Each rule looks at a single node, without context from its ancestors or
//! siblings.

use std::fmt::Debug;

use fperf_dom::Node;

use crate::{AccessibilityIssue, IssueCode, Severity};

/// A per-node check
pub trait Rule: Debug + Send + Sync {
    /// Code carried by the issues this rule reports
    fn code(&self) -> IssueCode;

    /// Inspect one node; `None` when it passes
    fn check(&self, node: &Node) -> Option<AccessibilityIssue>;
}

/// Images must have alt text or an aria-label
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageAltRule;

impl Rule for ImageAltRule {
    fn code(&self) -> IssueCode {
        IssueCode::ImgAltMissing
    }

    fn check(&self, node: &Node) -> Option<AccessibilityIssue> {
        if node.tag != "img" || node.has_accessible_name() {
            return None;
        }
        Some(AccessibilityIssue::new(
            self.code(),
            "Image element is missing descriptive text or aria-label.",
            Severity::Warning,
            &node.id,
        ))
    }
}

/// Interactive elements must have a label
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractiveLabelRule;

impl Rule for InteractiveLabelRule {
    fn code(&self) -> IssueCode {
        IssueCode::InteractiveMissingLabel
    }

    fn check(&self, node: &Node) -> Option<AccessibilityIssue> {
        if !node.interactive || node.has_accessible_name() {
            return None;
        }
        Some(AccessibilityIssue::new(
            self.code(),
            "Interactive element lacks a visible label or aria-label.",
            Severity::Error,
            &node.id,
        ))
    }
}

/// Buttons and links must have accessible text
#[derive(Debug, Clone, Copy, Default)]
pub struct ButtonLinkTextRule;

impl Rule for ButtonLinkTextRule {
    fn code(&self) -> IssueCode {
        IssueCode::ButtonLinkNoText
    }

    fn check(&self, node: &Node) -> Option<AccessibilityIssue> {
        let message = match node.tag.as_str() {
            "button" => "Button element has no accessible text or aria-label.",
            "a" => "Link element has no accessible text or aria-label.",
            _ => return None,
        };
        if node.has_accessible_name() {
            return None;
        }
        Some(AccessibilityIssue::new(self.code(), message, Severity::Error, &node.id))
    }
}

/// Headings must have text
///
/// Only emptiness is checked; skipped heading levels are not tracked.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadingTextRule;

impl Rule for HeadingTextRule {
    fn code(&self) -> IssueCode {
        IssueCode::HeadingNoText
    }

    fn check(&self, node: &Node) -> Option<AccessibilityIssue> {
        node.heading_level()?;
        if node.has_accessible_name() {
            return None;
        }
        Some(AccessibilityIssue::new(
            self.code(),
            "Heading element has no text content.",
            Severity::Warning,
            &node.id,
        ))
    }
}

/// The built-in rule set, in evaluation order
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(ImageAltRule),
        Box::new(InteractiveLabelRule),
        Box::new(ButtonLinkTextRule),
        Box::new(HeadingTextRule),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_alt() {
        let issue = ImageAltRule.check(&Node::new("img").with_id("hero")).unwrap();
        assert_eq!(issue.code, IssueCode::ImgAltMissing);
        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(issue.node_id, "hero");

        assert!(ImageAltRule.check(&Node::new("img").with_aria_label("Logo")).is_none());
        assert!(ImageAltRule.check(&Node::new("img").with_text("Logo")).is_none());
        assert!(ImageAltRule.check(&Node::new("div")).is_none());
    }

    #[test]
    fn test_interactive_label() {
        let node = Node::new("div").with_id("widget").interactive(true);
        let issue = InteractiveLabelRule.check(&node).unwrap();
        assert_eq!(issue.code, IssueCode::InteractiveMissingLabel);
        assert_eq!(issue.severity, Severity::Error);

        assert!(InteractiveLabelRule.check(&Node::new("div")).is_none());
        assert!(InteractiveLabelRule
            .check(&Node::new("div").interactive(true).with_aria_label("Close"))
            .is_none());
    }

    #[test]
    fn test_button_and_link_messages() {
        let button = ButtonLinkTextRule.check(&Node::new("button")).unwrap();
        assert!(button.message.starts_with("Button"));
        assert_eq!(button.severity, Severity::Error);

        let link = ButtonLinkTextRule.check(&Node::new("a")).unwrap();
        assert!(link.message.starts_with("Link"));

        assert!(ButtonLinkTextRule.check(&Node::new("button").with_text("OK")).is_none());
        assert!(ButtonLinkTextRule.check(&Node::new("abbr")).is_none());
    }

    #[test]
    fn test_heading_text() {
        for tag in ["h1", "h2", "h3", "h4", "h5", "h6"] {
            let issue = HeadingTextRule.check(&Node::new(tag)).unwrap();
            assert_eq!(issue.code, IssueCode::HeadingNoText);
            assert_eq!(issue.severity, Severity::Warning);
        }
        assert!(HeadingTextRule.check(&Node::new("h7")).is_none());
        assert!(HeadingTextRule.check(&Node::new("head")).is_none());
        assert!(HeadingTextRule.check(&Node::new("h2").with_text("Intro")).is_none());
    }

    #[test]
    fn test_default_rule_order() {
        let codes: Vec<IssueCode> = default_rules().iter().map(|r| r.code()).collect();
        assert_eq!(
            codes,
            [
                IssueCode::ImgAltMissing,
                IssueCode::InteractiveMissingLabel,
                IssueCode::ButtonLinkNoText,
                IssueCode::HeadingNoText,
            ]
        );
    }
}
