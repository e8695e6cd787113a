//! Table constraints.
//!
//! One closed variant set: primary key, unique, check and foreign key.
//! All variants share an ordered, duplicate-free list of column keys.

use super::foreign_key::{ForeignKey, MatchType, ReferentialAction};
use crate::identifier::Identifier;

/// Payload of a foreign key constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyConstraint {
    /// One marker per constrained column, in the same order.
    pub elements: Vec<ForeignKey>,
    /// ON UPDATE action.
    pub on_update: Option<ReferentialAction>,
    /// ON DELETE action.
    pub on_delete: Option<ReferentialAction>,
    /// Only add or drop through ALTER.
    pub use_alter: bool,
    /// MATCH clause.
    pub match_type: Option<MatchType>,
}

/// Constraint kind and kind-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    /// PRIMARY KEY.
    PrimaryKey,
    /// UNIQUE.
    Unique,
    /// CHECK with its expression text.
    Check {
        /// Boolean SQL expression.
        expression: String,
    },
    /// FOREIGN KEY.
    ForeignKey(ForeignKeyConstraint),
}

impl ConstraintKind {
    /// Short label used in diagnostics and naming conventions.
    pub fn label(&self) -> &'static str {
        match self {
            ConstraintKind::PrimaryKey => "pk",
            ConstraintKind::Unique => "uq",
            ConstraintKind::Check { .. } => "ck",
            ConstraintKind::ForeignKey(_) => "fk",
        }
    }
}

/// A table-level constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Constraint name.
    pub name: Option<Identifier>,
    /// Kind and payload.
    pub kind: ConstraintKind,
    pub(crate) columns: Vec<String>,
    /// DEFERRABLE flag.
    pub deferrable: Option<bool>,
    /// INITIALLY clause.
    pub initially: Option<String>,
}

impl Constraint {
    fn with_kind<I, S>(kind: ConstraintKind, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Self {
            name: None,
            kind,
            columns: Vec::new(),
            deferrable: None,
            initially: None,
        };
        for column in columns {
            out.push_column(column.into());
        }
        out
    }

    /// PRIMARY KEY over the given column keys.
    pub fn primary_key<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(ConstraintKind::PrimaryKey, columns)
    }

    /// UNIQUE over the given column keys.
    pub fn unique<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(ConstraintKind::Unique, columns)
    }

    /// CHECK with an expression and the column keys it mentions.
    pub fn check<I, S>(expression: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(
            ConstraintKind::Check {
                expression: expression.into(),
            },
            columns,
        )
    }

    /// FOREIGN KEY from local column keys to `"[schema.]table.column"` specs.
    ///
    /// Both lists must have the same length; this is checked on attach.
    pub fn foreign_key<I, S, R, T>(columns: I, referred: R) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        R: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let elements = referred.into_iter().map(ForeignKey::new).collect();
        Self::with_kind(
            ConstraintKind::ForeignKey(ForeignKeyConstraint {
                elements,
                on_update: None,
                on_delete: None,
                use_alter: false,
                match_type: None,
            }),
            columns,
        )
    }

    /// Wrap a column-level marker in its own single-column constraint.
    pub(crate) fn from_column_fk(column_key: &str, mut fk: ForeignKey) -> Self {
        fk.parent = Some(column_key.to_string());
        let mut constraint = Self::with_kind(
            ConstraintKind::ForeignKey(ForeignKeyConstraint {
                on_update: fk.on_update,
                on_delete: fk.on_delete,
                use_alter: fk.use_alter,
                match_type: fk.match_type,
                elements: Vec::new(),
            }),
            [column_key],
        );
        constraint.name = fk.name.clone();
        constraint.deferrable = fk.deferrable;
        constraint.initially = fk.initially.clone();
        if let ConstraintKind::ForeignKey(payload) = &mut constraint.kind {
            payload.elements.push(fk);
        }
        constraint
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<Identifier>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set DEFERRABLE.
    pub fn with_deferrable(mut self, deferrable: bool) -> Self {
        self.deferrable = Some(deferrable);
        self
    }

    /// Set INITIALLY.
    pub fn with_initially(mut self, initially: impl Into<String>) -> Self {
        self.initially = Some(initially.into());
        self
    }

    /// Defer a foreign key to ALTER statements. No effect on other kinds.
    pub fn with_use_alter(mut self) -> Self {
        if let ConstraintKind::ForeignKey(payload) = &mut self.kind {
            payload.use_alter = true;
        }
        self
    }

    /// Set referential actions. No effect on other kinds.
    pub fn with_actions(
        mut self,
        on_update: Option<ReferentialAction>,
        on_delete: Option<ReferentialAction>,
    ) -> Self {
        if let ConstraintKind::ForeignKey(payload) = &mut self.kind {
            payload.on_update = on_update;
            payload.on_delete = on_delete;
        }
        self
    }

    /// Column keys in declaration order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Check if the constraint covers a column key.
    pub fn contains_column(&self, key: &str) -> bool {
        self.columns.iter().any(|c| c == key)
    }

    pub(crate) fn push_column(&mut self, key: String) {
        if !self.contains_column(&key) {
            self.columns.push(key);
        }
    }

    /// Check if this is the primary key.
    pub fn is_primary_key(&self) -> bool {
        matches!(self.kind, ConstraintKind::PrimaryKey)
    }

    /// Foreign key payload, if this is a foreign key.
    pub fn as_foreign_key(&self) -> Option<&ForeignKeyConstraint> {
        match &self.kind {
            ConstraintKind::ForeignKey(payload) => Some(payload),
            _ => None,
        }
    }

    pub(crate) fn as_foreign_key_mut(&mut self) -> Option<&mut ForeignKeyConstraint> {
        match &mut self.kind {
            ConstraintKind::ForeignKey(payload) => Some(payload),
            _ => None,
        }
    }

    /// Check if this is a foreign key that is only ever added through ALTER.
    pub fn is_use_alter(&self) -> bool {
        self.as_foreign_key().is_some_and(|fk| fk.use_alter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_are_deduplicated() {
        let pk = Constraint::primary_key(["a", "b", "a"]);
        assert_eq!(pk.columns(), &["a".to_string(), "b".to_string()]);
        assert!(pk.is_primary_key());
        assert_eq!(pk.kind.label(), "pk");
    }

    #[test]
    fn test_foreign_key_constraint() {
        let fk = Constraint::foreign_key(["a_id", "a_rev"], ["a.id", "a.rev"])
            .with_name("fk_a")
            .with_use_alter();
        let payload = fk.as_foreign_key().unwrap();
        assert_eq!(payload.elements.len(), 2);
        assert!(fk.is_use_alter());
        assert!(fk.contains_column("a_rev"));
    }

    #[test]
    fn test_from_column_fk_copies_options() {
        let marker = ForeignKey::new("users.id")
            .with_name("fk_user")
            .on_delete(ReferentialAction::SetNull)
            .deferrable(true);
        let constraint = Constraint::from_column_fk("user_id", marker);

        assert_eq!(constraint.name.as_ref().unwrap(), "fk_user");
        assert_eq!(constraint.deferrable, Some(true));
        let payload = constraint.as_foreign_key().unwrap();
        assert_eq!(payload.on_delete, Some(ReferentialAction::SetNull));
        assert_eq!(payload.elements[0].parent(), Some("user_id"));
    }

    #[test]
    fn test_check_has_no_foreign_key() {
        let ck = Constraint::check("qty > 0", ["qty"]).with_use_alter();
        assert!(ck.as_foreign_key().is_none());
        assert!(!ck.is_use_alter());
    }
}
