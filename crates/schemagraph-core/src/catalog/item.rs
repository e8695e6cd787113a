//! Handles into the registry arena.
//!
//! Tables live in a slot vector owned by [`super::MetaData`]; everything
//! else is addressed relative to its owning table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry key of a table: optional schema plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableKey {
    /// Schema name.
    pub schema: Option<String>,
    /// Table name.
    pub name: String,
}

impl TableKey {
    /// Create a table key.
    pub fn new(schema: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.into(),
        }
    }

    /// Parse `schema.name` or `name`.
    pub fn parse(key: &str) -> Self {
        match key.rsplit_once('.') {
            Some((schema, name)) => Self::new(Some(schema), name),
            None => Self::new(None, key),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Arena slot of a table within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(pub(crate) usize);

impl TableId {
    /// Slot index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A column within a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Owning table.
    pub table: TableId,
    /// Position in the table's column list.
    pub index: usize,
}

/// Slot of a constraint within its table. Slot 0 is the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstraintId(pub(crate) usize);

impl ConstraintId {
    /// The primary key slot.
    pub const PRIMARY_KEY: ConstraintId = ConstraintId(0);
}

/// A constraint within a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstraintRef {
    /// Owning table.
    pub table: TableId,
    /// Slot in the table's constraint list.
    pub constraint: ConstraintId,
}

/// An index within a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexRef {
    /// Owning table.
    pub table: TableId,
    /// Position in the table's index list.
    pub index: usize,
}

/// One element of a foreign key constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Owning table.
    pub table: TableId,
    /// The foreign key constraint.
    pub constraint: ConstraintId,
    /// Element position inside the constraint.
    pub element: usize,
}

impl ForeignKeyRef {
    /// The constraint this element belongs to.
    pub fn constraint_ref(&self) -> ConstraintRef {
        ConstraintRef {
            table: self.table,
            constraint: self.constraint,
        }
    }
}

/// Any attachable schema item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaItemRef {
    /// The registry itself.
    Registry,
    /// A table.
    Table(TableId),
    /// A column.
    Column(ColumnRef),
    /// A constraint.
    Constraint(ConstraintRef),
    /// An index.
    Index(IndexRef),
    /// A sequence, by registry key.
    Sequence(String),
}

impl SchemaItemRef {
    /// The table this item belongs to, if any.
    pub fn table(&self) -> Option<TableId> {
        match self {
            SchemaItemRef::Table(id) => Some(*id),
            SchemaItemRef::Column(c) => Some(c.table),
            SchemaItemRef::Constraint(c) => Some(c.table),
            SchemaItemRef::Index(i) => Some(i.table),
            SchemaItemRef::Registry | SchemaItemRef::Sequence(_) => None,
        }
    }
}
