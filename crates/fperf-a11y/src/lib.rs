//! fperf Accessibility
//!
//! Static, rule-based accessibility checks over a page's document tree.
//!
//! Built-in rules:
//! - `IMG_ALT_MISSING` - images without descriptive text
//! - `INTERACTIVE_MISSING_LABEL` - interactive elements without a label
//! - `BUTTON_LINK_NO_TEXT` - buttons and links without accessible text
//! - `HEADING_NO_TEXT` - empty `h1`..`h6`

mod analyzer;
pub mod rules;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use analyzer::AccessibilityAnalyzer;
pub use rules::{ButtonLinkTextRule, HeadingTextRule, ImageAltRule, InteractiveLabelRule, Rule};

/// Issue severity, ordered by increasing criticality
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Suggestion only
    Info,
    /// Should fix
    Warning,
    /// Must fix
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable rule identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    ImgAltMissing,
    InteractiveMissingLabel,
    ButtonLinkNoText,
    HeadingNoText,
}

impl IssueCode {
    /// The code as reported to callers
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImgAltMissing => "IMG_ALT_MISSING",
            Self::InteractiveMissingLabel => "INTERACTIVE_MISSING_LABEL",
            Self::ButtonLinkNoText => "BUTTON_LINK_NO_TEXT",
            Self::HeadingNoText => "HEADING_NO_TEXT",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule violation found in a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibilityIssue {
    pub code: IssueCode,
    /// Human-readable description
    pub message: String,
    pub severity: Severity,
    /// Identifier of the offending node
    pub node_id: String,
}

impl AccessibilityIssue {
    pub fn new(code: IssueCode, message: impl Into<String>, severity: Severity, node_id: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity,
            node_id: node_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert_eq!(
            [Severity::Error, Severity::Info, Severity::Warning].iter().max(),
            Some(&Severity::Error)
        );
    }

    #[test]
    fn test_issue_code_wire_form() {
        for code in [
            IssueCode::ImgAltMissing,
            IssueCode::InteractiveMissingLabel,
            IssueCode::ButtonLinkNoText,
            IssueCode::HeadingNoText,
        ] {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, code.as_str());
        }
    }
}
