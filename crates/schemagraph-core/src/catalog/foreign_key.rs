//! Foreign key markers.
//!
//! A [`ForeignKey`] names its target either as a string spec
//! (`"[schema.]table[.column]"`) or as a direct [`ColumnRef`]. String specs
//! stay pending until the target column attaches to the registry; see
//! [`super::MetaData::referred_column`].

use super::item::{ColumnRef, TableKey};
use crate::error::{Error, Result};
use crate::identifier::Identifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parsed tokens of a foreign key column spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnSpec {
    /// Schema, when given.
    pub schema: Option<String>,
    /// Referenced table name.
    pub table: String,
    /// Referenced column key; `None` means "same key as the referencing column".
    pub column: Option<String>,
}

impl ColumnSpec {
    /// Parse a `"[schema.]table[.column]"` spec.
    ///
    /// The last part is the column and the one before it the table, unless
    /// only one part is given. Everything before those is the schema.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts: Vec<&str> = spec.split('.').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::argument(format!(
                "Invalid foreign key column specification: '{}'",
                spec
            )));
        }

        let (table, column) = if parts.len() == 1 {
            (parts.remove(0).to_string(), None)
        } else {
            let column = parts.pop().map(str::to_string);
            let table = parts.pop().map(str::to_string).unwrap_or_default();
            (table, column)
        };
        let schema = if parts.is_empty() {
            None
        } else {
            Some(parts.join("."))
        };

        Ok(Self {
            schema,
            table,
            column,
        })
    }

    /// Registry key of the referenced table.
    pub fn table_key(&self, default_schema: Option<&str>) -> TableKey {
        TableKey::new(self.schema.as_deref().or(default_schema), self.table.clone())
    }
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{}.", schema)?;
        }
        f.write_str(&self.table)?;
        if let Some(column) = &self.column {
            write!(f, ".{}", column)?;
        }
        Ok(())
    }
}

/// Resolution state of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FkTarget {
    /// Target not yet located.
    #[default]
    Pending,
    /// Target column found.
    Resolved(ColumnRef),
}

impl FkTarget {
    /// The resolved column, if any.
    pub fn column(&self) -> Option<ColumnRef> {
        match self {
            FkTarget::Pending => None,
            FkTarget::Resolved(col) => Some(*col),
        }
    }
}

/// ON UPDATE / ON DELETE behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    /// No action.
    NoAction,
    /// Reject the change.
    Restrict,
    /// Propagate the change.
    Cascade,
    /// Set referencing columns to NULL.
    SetNull,
    /// Set referencing columns to their defaults.
    SetDefault,
}

impl ReferentialAction {
    /// SQL keyword form.
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// MATCH clause of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    /// MATCH SIMPLE.
    Simple,
    /// MATCH PARTIAL.
    Partial,
    /// MATCH FULL.
    Full,
}

#[derive(Debug, Clone, PartialEq)]
enum TargetSpec {
    Text(String),
    Column { table: TableKey, column: String },
}

/// A reference from one column to a column of another table.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    target_spec: TargetSpec,
    pub(crate) parent: Option<String>,
    pub(crate) target: FkTarget,
    /// Constraint name.
    pub name: Option<Identifier>,
    /// Only ever add or drop through ALTER.
    pub use_alter: bool,
    /// ON UPDATE action.
    pub on_update: Option<ReferentialAction>,
    /// ON DELETE action.
    pub on_delete: Option<ReferentialAction>,
    /// DEFERRABLE flag.
    pub deferrable: Option<bool>,
    /// INITIALLY clause.
    pub initially: Option<String>,
    /// MATCH clause.
    pub match_type: Option<MatchType>,
}

impl ForeignKey {
    /// Create a marker from a `"[schema.]table[.column]"` spec.
    pub fn new(spec: impl Into<String>) -> Self {
        Self::with_target(TargetSpec::Text(spec.into()), FkTarget::Pending)
    }

    /// Create a marker pointing at an already attached column.
    pub fn to_column(table: TableKey, column_key: impl Into<String>, column: ColumnRef) -> Self {
        Self::with_target(
            TargetSpec::Column {
                table,
                column: column_key.into(),
            },
            FkTarget::Resolved(column),
        )
    }

    fn with_target(target_spec: TargetSpec, target: FkTarget) -> Self {
        Self {
            target_spec,
            parent: None,
            target,
            name: None,
            use_alter: false,
            on_update: None,
            on_delete: None,
            deferrable: None,
            initially: None,
            match_type: None,
        }
    }

    /// Set the constraint name.
    pub fn with_name(mut self, name: impl Into<Identifier>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Defer this constraint to ALTER statements.
    pub fn with_use_alter(mut self) -> Self {
        self.use_alter = true;
        self
    }

    /// Set ON UPDATE.
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }

    /// Set ON DELETE.
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Set DEFERRABLE.
    pub fn deferrable(mut self, deferrable: bool) -> Self {
        self.deferrable = Some(deferrable);
        self
    }

    /// Set INITIALLY.
    pub fn initially(mut self, initially: impl Into<String>) -> Self {
        self.initially = Some(initially.into());
        self
    }

    /// Set MATCH.
    pub fn match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = Some(match_type);
        self
    }

    /// The spec text as declared.
    pub fn target_fullname(&self) -> String {
        match &self.target_spec {
            TargetSpec::Text(text) => text.clone(),
            TargetSpec::Column { table, column } => format!("{}.{}", table, column),
        }
    }

    /// Parsed spec tokens.
    pub fn column_spec(&self) -> Result<ColumnSpec> {
        match &self.target_spec {
            TargetSpec::Text(text) => ColumnSpec::parse(text),
            TargetSpec::Column { table, column } => Ok(ColumnSpec {
                schema: table.schema.clone(),
                table: table.name.clone(),
                column: Some(column.clone()),
            }),
        }
    }

    /// Key of the referencing column, once attached.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Current resolution state.
    pub fn target(&self) -> FkTarget {
        self.target
    }

    /// Check whether the target column has been located.
    pub fn is_resolved(&self) -> bool {
        matches!(self.target, FkTarget::Resolved(_))
    }

    /// Registry key and column key this marker waits for.
    pub(crate) fn lookup_key(&self, default_schema: Option<&str>) -> Result<(TableKey, String)> {
        let spec = self.column_spec()?;
        let column = match (&spec.column, &self.parent) {
            (Some(column), _) => column.clone(),
            (None, Some(parent)) => parent.clone(),
            (None, None) => {
                return Err(Error::argument(format!(
                    "Foreign key '{}' names no column and is not attached to one",
                    self.target_fullname()
                )))
            }
        };
        Ok((spec.table_key(default_schema), column))
    }
}
