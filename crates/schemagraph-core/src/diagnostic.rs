//! Non-fatal findings reported alongside successful results.

use crate::catalog::TableKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A dependency cycle was broken by deferring foreign keys to ALTER.
    CycleBroken,
    /// A foreign key target never attached.
    UnresolvedReference,
    /// Deferred foreign keys were rendered inline because the backend has no ALTER.
    ResidualInlined,
    /// A sequence was skipped because the backend does not need it.
    SequenceSkipped,
    /// Tables were dropped unsorted because a cycle could not be broken without ALTER.
    UnsortedDrop,
}

/// A recoverable finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Kind.
    pub kind: DiagnosticKind,
    /// Human-readable message.
    pub message: String,
    /// Tables involved.
    pub tables: Vec<TableKey>,
}

impl Diagnostic {
    /// Create a diagnostic.
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, tables: Vec<TableKey>) -> Self {
        Self {
            kind,
            message: message.into(),
            tables,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_serializes_for_reports() {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::CycleBroken,
            "cycle between x and y broken",
            vec![TableKey::new(None, "x"), TableKey::new(Some("shop"), "y")],
        );
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["kind"], "cycle_broken");
        assert_eq!(json["tables"][1]["schema"], "shop");
        let back: Diagnostic = serde_json::from_value(json).unwrap();
        assert_eq!(back, diagnostic);
    }
}
