//! Backend capabilities and run policies.

use crate::identifier::Identifier;
use serde::{Deserialize, Serialize};

/// Default maximum identifier length.
pub const DEFAULT_MAX_IDENTIFIER_LENGTH: usize = 63;

/// What the target backend supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend name, used in logs and events.
    pub name: String,

    /// ALTER TABLE ADD/DROP CONSTRAINT is available. Without it, deferred
    /// foreign keys are rendered inline.
    pub supports_alter: bool,

    /// CREATE SEQUENCE is available.
    pub supports_sequences: bool,

    /// Sequences marked optional are skipped.
    pub sequences_optional: bool,

    /// Named enum types are created server-side.
    pub supports_native_enum: bool,

    /// Table and column comments are supported.
    pub supports_comments: bool,

    /// Comments are rendered inside CREATE TABLE rather than as separate statements.
    pub inline_comments: bool,

    /// Longest identifier the backend accepts.
    pub max_identifier_length: usize,

    /// Reserved words beyond the common set.
    pub reserved_words: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            supports_alter: true,
            supports_sequences: false,
            sequences_optional: false,
            supports_native_enum: false,
            supports_comments: false,
            inline_comments: false,
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
            reserved_words: Vec::new(),
        }
    }
}

impl BackendConfig {
    /// PostgreSQL capabilities.
    pub fn postgres() -> Self {
        Self {
            name: "postgresql".to_string(),
            supports_alter: true,
            supports_sequences: true,
            sequences_optional: true,
            supports_native_enum: true,
            supports_comments: true,
            inline_comments: false,
            max_identifier_length: 63,
            reserved_words: vec!["analyse".into(), "analyze".into(), "returning".into()],
        }
    }

    /// SQLite capabilities.
    pub fn sqlite() -> Self {
        Self {
            name: "sqlite".to_string(),
            supports_alter: false,
            supports_sequences: false,
            sequences_optional: false,
            supports_native_enum: false,
            supports_comments: false,
            inline_comments: false,
            max_identifier_length: usize::MAX,
            reserved_words: vec!["autoincrement".into(), "glob".into(), "pragma".into()],
        }
    }

    /// MySQL capabilities.
    pub fn mysql() -> Self {
        Self {
            name: "mysql".to_string(),
            supports_alter: true,
            supports_sequences: false,
            sequences_optional: true,
            supports_native_enum: false,
            supports_comments: true,
            inline_comments: true,
            max_identifier_length: 64,
            reserved_words: vec!["accessible".into(), "dual".into(), "rlike".into()],
        }
    }

    /// Set the backend name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set ALTER support.
    pub fn with_alter(mut self, supported: bool) -> Self {
        self.supports_alter = supported;
        self
    }

    /// Set sequence support.
    pub fn with_sequences(mut self, supported: bool, optional: bool) -> Self {
        self.supports_sequences = supported;
        self.sequences_optional = optional;
        self
    }

    /// Set native enum support.
    pub fn with_native_enum(mut self, supported: bool) -> Self {
        self.supports_native_enum = supported;
        self
    }

    /// Set comment support.
    pub fn with_comments(mut self, supported: bool, inline: bool) -> Self {
        self.supports_comments = supported;
        self.inline_comments = inline;
        self
    }

    /// Set the maximum identifier length.
    pub fn with_max_identifier_length(mut self, length: usize) -> Self {
        self.max_identifier_length = length;
        self
    }

    /// Add backend reserved words.
    pub fn with_reserved_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_words.extend(words.into_iter().map(Into::into));
        self
    }

    /// Check if comments need their own statements.
    pub fn separate_comments(&self) -> bool {
        self.supports_comments && !self.inline_comments
    }

    /// Check if an identifier fits the backend's length limit.
    pub fn identifier_fits(&self, ident: &Identifier) -> bool {
        ident.as_str().chars().count() <= self.max_identifier_length
    }

    /// Render an identifier with this backend's reserved words.
    pub fn render(&self, ident: &Identifier) -> String {
        ident.render(&self.reserved_words)
    }
}

/// Which item kinds get an existence check before CREATE or DROP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckFirst {
    /// Tables.
    pub tables: bool,
    /// Views.
    pub views: bool,
    /// Indexes.
    pub indexes: bool,
    /// Sequences.
    pub sequences: bool,
    /// Server-side types.
    pub types: bool,
}

impl CheckFirst {
    /// Check everything.
    pub fn all() -> Self {
        Self {
            tables: true,
            views: true,
            indexes: true,
            sequences: true,
            types: true,
        }
    }

    /// Check nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Check only tables and views.
    pub fn tables() -> Self {
        Self {
            tables: true,
            views: true,
            ..Self::default()
        }
    }

    /// Check if any kind is checked.
    pub fn any(&self) -> bool {
        self.tables || self.views || self.indexes || self.sequences || self.types
    }
}
