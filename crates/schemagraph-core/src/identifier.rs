//! Identifiers and quoting rules.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Reserved words shared by the supported backends.
///
/// Backends add their own through [`crate::BackendConfig::reserved_words`].
pub const RESERVED_WORDS: &[&str] = &[
    "all", "alter", "and", "any", "as", "asc", "between", "by", "case", "check", "column",
    "constraint", "create", "cross", "current_date", "current_time", "current_timestamp",
    "default", "delete", "desc", "distinct", "drop", "else", "end", "except", "exists", "false",
    "foreign", "from", "full", "group", "having", "in", "index", "inner", "insert", "intersect",
    "into", "is", "join", "key", "left", "like", "limit", "not", "null", "offset", "on", "or",
    "order", "outer", "primary", "references", "right", "select", "sequence", "set", "table",
    "then", "to", "true", "union", "unique", "update", "user", "using", "values", "view", "when",
    "where", "with",
];

/// Quoting preference for an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuotePolicy {
    /// Always quote.
    Force,
    /// Never quote, even when the value would otherwise need it.
    Never,
    /// Quote when casing, reserved words or characters require it.
    #[default]
    Infer,
}

/// A name with a quoting preference.
///
/// Equality and hashing only look at the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    value: String,
    quote: QuotePolicy,
}

impl Identifier {
    /// Create an identifier with inferred quoting.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quote: QuotePolicy::Infer,
        }
    }

    /// Create an identifier that is always quoted.
    pub fn quoted(value: impl Into<String>) -> Self {
        Self::new(value).with_quote(QuotePolicy::Force)
    }

    /// Set the quoting preference.
    pub fn with_quote(mut self, quote: QuotePolicy) -> Self {
        self.quote = quote;
        self
    }

    /// The raw value.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The quoting preference.
    pub fn quote_policy(&self) -> QuotePolicy {
        self.quote
    }

    /// Check if the value is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Check if this identifier must be quoted when rendered.
    pub fn requires_quotes(&self, extra_reserved: &[String]) -> bool {
        match self.quote {
            QuotePolicy::Force => true,
            QuotePolicy::Never => false,
            QuotePolicy::Infer => value_requires_quotes(&self.value, extra_reserved),
        }
    }

    /// Check if the value is a reserved word.
    pub fn is_reserved(&self, extra_reserved: &[String]) -> bool {
        is_reserved(&self.value, extra_reserved)
    }

    /// Render the identifier, double-quoting it when required.
    pub fn render(&self, extra_reserved: &[String]) -> String {
        if self.requires_quotes(extra_reserved) {
            format!("\"{}\"", self.value.replace('"', "\"\""))
        } else {
            self.value.clone()
        }
    }
}

fn is_reserved(value: &str, extra_reserved: &[String]) -> bool {
    let lower = value.to_lowercase();
    RESERVED_WORDS.contains(&lower.as_str())
        || extra_reserved.iter().any(|w| w.eq_ignore_ascii_case(&lower))
}

fn value_requires_quotes(value: &str, extra_reserved: &[String]) -> bool {
    let Some(first) = value.chars().next() else {
        return true;
    };
    let illegal_initial = first.is_ascii_digit() || first == '$';
    let illegal_chars = !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    is_reserved(value, extra_reserved)
        || illegal_initial
        || illegal_chars
        || value.to_lowercase() != value
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.value
    }
}

impl PartialEq<str> for Identifier {
    fn eq(&self, other: &str) -> bool {
        self.value == other
    }
}

impl PartialEq<&str> for Identifier {
    fn eq(&self, other: &&str) -> bool {
        self.value == *other
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_infer_quoting() {
        let none: Vec<String> = Vec::new();
        assert!(!Identifier::new("users").requires_quotes(&none));
        assert!(Identifier::new("Users").requires_quotes(&none));
        assert!(Identifier::new("select").requires_quotes(&none));
        assert!(Identifier::new("1st").requires_quotes(&none));
        assert!(Identifier::new("has space").requires_quotes(&none));
        assert!(!Identifier::new("select").with_quote(QuotePolicy::Never).requires_quotes(&none));
        assert!(Identifier::quoted("plain").requires_quotes(&none));
    }

    #[test]
    fn test_backend_reserved_words() {
        let extra = vec!["rowid".to_string()];
        assert!(Identifier::new("rowid").requires_quotes(&extra));
        assert!(!Identifier::new("rowid").requires_quotes(&[]));
    }

    #[test]
    fn test_render_escapes_quotes() {
        assert_eq!(Identifier::new("a\"b").render(&[]), "\"a\"\"b\"");
        assert_eq!(Identifier::new("plain").render(&[]), "plain");
    }

    #[test]
    fn test_value_equality_ignores_policy() {
        let a = Identifier::new("name");
        let b = Identifier::quoted("name");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert!(set.contains("name"));
    }
}
