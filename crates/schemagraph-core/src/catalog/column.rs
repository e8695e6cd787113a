//! Column definitions.

use super::foreign_key::ForeignKey;
use super::item::TableId;
use super::sequence::Sequence;
use super::types::SqlType;
use crate::error::{Error, Result};
use crate::identifier::Identifier;

/// Client-side value generator for a column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    /// Literal value.
    Value(serde_json::Value),
    /// SQL expression evaluated by the client at execution time.
    Expression(String),
    /// Next value of a sequence.
    Sequence(Sequence),
}

impl ColumnDefault {
    /// The sequence behind this default, if any.
    pub fn sequence(&self) -> Option<&Sequence> {
        match self {
            ColumnDefault::Sequence(seq) => Some(seq),
            _ => None,
        }
    }
}

/// Server-side default or on-update marker.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerDefault {
    /// DEFAULT clause text rendered into the DDL.
    Text(String),
    /// Value produced by the server through a trigger or similar.
    FetchedValue,
    /// GENERATED ... AS IDENTITY.
    Identity(Identity),
    /// GENERATED ALWAYS AS (expression).
    Computed(Computed),
}

impl ServerDefault {
    fn validate(&self, column: &Identifier) -> Result<()> {
        match self {
            ServerDefault::Identity(identity) if identity.increment == Some(0) => {
                Err(Error::argument(format!(
                    "Identity on column '{}' has an increment of zero",
                    column
                )))
            }
            ServerDefault::Computed(computed) if computed.expression.trim().is_empty() => {
                Err(Error::argument(format!(
                    "Computed column '{}' has no expression",
                    column
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Identity column options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// GENERATED ALWAYS rather than BY DEFAULT.
    pub always: bool,
    /// Generate a value when NULL is inserted.
    pub on_null: bool,
    /// First value.
    pub start: Option<i64>,
    /// Step between values.
    pub increment: Option<i64>,
}

impl Identity {
    /// GENERATED BY DEFAULT AS IDENTITY.
    pub fn by_default() -> Self {
        Self::default()
    }

    /// GENERATED ALWAYS AS IDENTITY.
    pub fn always() -> Self {
        Self {
            always: true,
            ..Self::default()
        }
    }

    /// Set the first value.
    pub fn with_start(mut self, start: i64) -> Self {
        self.start = Some(start);
        self
    }

    /// Set the step.
    pub fn with_increment(mut self, increment: i64) -> Self {
        self.increment = Some(increment);
        self
    }

    /// Generate on explicit NULL.
    pub fn on_null(mut self) -> Self {
        self.on_null = true;
        self
    }
}

/// Generated column expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Computed {
    /// SQL expression.
    pub expression: String,
    /// STORED / VIRTUAL; `None` leaves it to the backend.
    pub persisted: Option<bool>,
}

impl Computed {
    /// Generated column computed from `expression`.
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            persisted: None,
        }
    }

    /// Store the value rather than computing it on read.
    pub fn persisted(mut self, persisted: bool) -> Self {
        self.persisted = Some(persisted);
        self
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name.
    pub name: Identifier,
    key: Option<String>,
    /// Column type.
    pub sql_type: SqlType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Create an index on this column when attached.
    pub index: bool,
    /// Unique values only.
    pub unique: bool,
    /// Client-side default.
    pub default: Option<ColumnDefault>,
    /// Client-side on-update value.
    pub onupdate: Option<ColumnDefault>,
    /// Server-side default.
    pub server_default: Option<ServerDefault>,
    /// Server-side on-update marker.
    pub server_onupdate: Option<ServerDefault>,
    /// Column comment.
    pub comment: Option<String>,
    pub(crate) foreign_keys: Vec<ForeignKey>,
    pub(crate) table: Option<TableId>,
}

impl Column {
    /// Create a nullable column.
    pub fn new(name: impl Into<Identifier>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            key: None,
            sql_type,
            nullable: true,
            primary_key: false,
            index: false,
            unique: false,
            default: None,
            onupdate: None,
            server_default: None,
            server_onupdate: None,
            comment: None,
            foreign_keys: Vec::new(),
            table: None,
        }
    }

    /// Set a key distinct from the name.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Mark as primary key. Primary key columns are NOT NULL.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Set nullability.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Request an index on this column.
    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    /// Require unique values.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the client-side default.
    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    /// Use a sequence as the client-side default.
    pub fn with_sequence(self, sequence: Sequence) -> Self {
        self.with_default(ColumnDefault::Sequence(sequence))
    }

    /// Set the client-side on-update value.
    pub fn with_onupdate(mut self, onupdate: ColumnDefault) -> Self {
        self.onupdate = Some(onupdate);
        self
    }

    /// Set the server-side default.
    pub fn with_server_default(mut self, default: ServerDefault) -> Self {
        self.server_default = Some(default);
        self
    }

    /// Set the server-side on-update marker.
    pub fn with_server_onupdate(mut self, onupdate: ServerDefault) -> Self {
        self.server_onupdate = Some(onupdate);
        self
    }

    /// Generate values with an identity. The column becomes NOT NULL.
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.server_default = Some(ServerDefault::Identity(identity));
        self.nullable = false;
        self
    }

    /// Make this a generated column. The expression also covers updates.
    pub fn with_computed(mut self, computed: Computed) -> Self {
        self.server_default = Some(ServerDefault::Computed(computed.clone()));
        self.server_onupdate = Some(ServerDefault::Computed(computed));
        self
    }

    /// Identity options, if the column has one.
    pub fn identity(&self) -> Option<&Identity> {
        match &self.server_default {
            Some(ServerDefault::Identity(identity)) => Some(identity),
            _ => None,
        }
    }

    /// Generation expression, if the column is computed.
    pub fn computed(&self) -> Option<&Computed> {
        match &self.server_default {
            Some(ServerDefault::Computed(computed)) => Some(computed),
            _ => None,
        }
    }

    /// Set the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Add a foreign key from a string spec.
    pub fn references(self, spec: impl Into<String>) -> Self {
        self.with_foreign_key(ForeignKey::new(spec))
    }

    /// Add a foreign key marker.
    pub fn with_foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Slot key within the owning table; defaults to the name.
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or_else(|| self.name.as_str())
    }

    /// Owning table, once attached.
    pub fn table(&self) -> Option<TableId> {
        self.table
    }

    /// Foreign key markers not yet attached.
    pub fn pending_foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Check the server-side markers.
    pub(crate) fn validate(&self) -> Result<()> {
        for marker in self.server_default.iter().chain(self.server_onupdate.iter()) {
            marker.validate(&self.name)?;
        }
        Ok(())
    }

    /// Sequences used by the client-side generators.
    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.default
            .iter()
            .chain(self.onupdate.iter())
            .filter_map(ColumnDefault::sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_defaults_to_name() {
        let col = Column::new("user_id", SqlType::Integer);
        assert_eq!(col.key(), "user_id");

        let col = col.with_key("uid");
        assert_eq!(col.key(), "uid");
        assert_eq!(col.name, "user_id");
    }

    #[test]
    fn test_primary_key_is_not_null() {
        let col = Column::new("id", SqlType::BigInt).primary_key();
        assert!(col.primary_key);
        assert!(!col.nullable);
    }

    #[test]
    fn test_sequences() {
        let col = Column::new("id", SqlType::Integer)
            .with_sequence(Sequence::new("id_seq"))
            .with_onupdate(ColumnDefault::Expression("now()".into()));
        let names: Vec<_> = col.sequences().map(|s| s.key()).collect();
        assert_eq!(names, vec!["id_seq"]);
    }

    #[test]
    fn test_identity_and_computed_markers() {
        let col = Column::new("id", SqlType::BigInt).with_identity(Identity::always().with_start(100));
        assert!(!col.nullable);
        assert_eq!(col.identity().and_then(|i| i.start), Some(100));
        assert!(col.computed().is_none());
        col.validate().unwrap();

        let col = Column::new("id", SqlType::BigInt)
            .with_identity(Identity::by_default())
            .nullable(true);
        assert!(col.nullable);

        let area = Column::new("area", SqlType::Integer)
            .with_computed(Computed::new("side * side").persisted(true));
        assert!(area.nullable);
        assert_eq!(area.server_onupdate, area.server_default);
        assert_eq!(area.computed().unwrap().persisted, Some(true));

        let err = Column::new("id", SqlType::BigInt)
            .with_identity(Identity::by_default().with_increment(0))
            .validate()
            .unwrap_err();
        assert!(err.is_argument());
        assert!(Column::new("x", SqlType::Integer)
            .with_computed(Computed::new(" "))
            .validate()
            .is_err());
    }

    #[test]
    fn test_references_collects_markers() {
        let col = Column::new("order_id", SqlType::Null).references("orders.id");
        assert_eq!(col.pending_foreign_keys().len(), 1);
        assert!(col.table().is_none());
    }
}
