//! Index definitions.

use super::item::TableId;
use super::options::IndexOptions;
use crate::identifier::Identifier;

/// One element of an index.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexElement {
    /// A column, by key.
    Column(String),
    /// An expression plus the column keys it mentions.
    Expression {
        /// SQL expression text.
        text: String,
        /// Column keys used by the expression.
        columns: Vec<String>,
    },
}

impl IndexElement {
    /// Column keys this element depends on.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            IndexElement::Column(key) => vec![key.as_str()],
            IndexElement::Expression { columns, .. } => columns.iter().map(String::as_str).collect(),
        }
    }
}

/// An index on one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    /// Index name. Unnamed indexes are named by the registry's convention.
    pub name: Option<Identifier>,
    /// Ordered elements.
    pub elements: Vec<IndexElement>,
    /// UNIQUE index.
    pub unique: bool,
    /// Backend options.
    pub options: IndexOptions,
    pub(crate) table: Option<TableId>,
}

impl Index {
    /// Create an index over column keys.
    pub fn new<I, S>(name: impl Into<Identifier>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::unnamed(columns);
        index.name = Some(name.into());
        index
    }

    /// Create an index named on attach.
    pub fn unnamed<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            elements: columns
                .into_iter()
                .map(|c| IndexElement::Column(c.into()))
                .collect(),
            unique: false,
            options: IndexOptions::default(),
            table: None,
        }
    }

    /// Mark unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Append an expression element.
    pub fn with_expression<I, S>(mut self, text: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.elements.push(IndexElement::Expression {
            text: text.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Set backend options.
    pub fn with_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// Owning table, once attached.
    pub fn table(&self) -> Option<TableId> {
        self.table
    }

    /// All column keys mentioned by the elements, in order, without repeats.
    pub fn column_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for key in self.elements.iter().flat_map(IndexElement::columns) {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
        keys
    }

    /// Check if the index mentions a column key.
    pub fn contains_column(&self, key: &str) -> bool {
        self.elements.iter().any(|e| e.columns().contains(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_keys() {
        let ix = Index::new("ix_name", ["last", "first"])
            .with_expression("lower(email)", ["email"])
            .with_expression("coalesce(first, last)", ["first", "last"])
            .unique();

        assert!(ix.unique);
        assert_eq!(ix.column_keys(), vec!["last", "first", "email"]);
        assert!(ix.contains_column("email"));
        assert!(!ix.contains_column("id"));
    }

    #[test]
    fn test_unnamed() {
        let ix = Index::unnamed(["a"]);
        assert!(ix.name.is_none());
        assert!(ix.table().is_none());
    }
}
