//! Self-describing DDL requests handed to a compiler.

use crate::catalog::{
    ColumnRef, ConstraintId, ConstraintRef, DdlEventKind, IndexRef, SchemaItemRef, TableId,
    TableKey,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One DDL step to compile and execute.
///
/// Every variant carries the handles a compiler needs to look the item up in
/// the registry, plus the names it needs to render without a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DdlIntent {
    /// CREATE SEQUENCE.
    CreateSequence {
        /// Registry key.
        key: String,
        /// Sequence name.
        name: String,
        /// Schema.
        schema: Option<String>,
    },
    /// DROP SEQUENCE.
    DropSequence {
        /// Registry key.
        key: String,
        /// Sequence name.
        name: String,
        /// Schema.
        schema: Option<String>,
    },
    /// CREATE TYPE ... AS ENUM.
    CreateType {
        /// Type name.
        name: String,
        /// Schema.
        schema: Option<String>,
        /// Enum variants.
        variants: Vec<String>,
    },
    /// DROP TYPE.
    DropType {
        /// Type name.
        name: String,
        /// Schema.
        schema: Option<String>,
    },
    /// CREATE TABLE, with the foreign keys to render inline.
    CreateTable {
        /// Table handle.
        table: TableId,
        /// Table key.
        key: TableKey,
        /// Foreign key constraints rendered inside the statement.
        include_foreign_keys: Vec<ConstraintId>,
    },
    /// DROP TABLE.
    DropTable {
        /// Table handle.
        table: TableId,
        /// Table key.
        key: TableKey,
    },
    /// CREATE VIEW.
    CreateView {
        /// Table handle.
        table: TableId,
        /// Table key.
        key: TableKey,
    },
    /// DROP VIEW.
    DropView {
        /// Table handle.
        table: TableId,
        /// Table key.
        key: TableKey,
    },
    /// CREATE INDEX.
    CreateIndex {
        /// Index handle.
        index: IndexRef,
        /// Owning table.
        table: TableKey,
        /// Index name.
        name: String,
        /// UNIQUE index.
        unique: bool,
    },
    /// DROP INDEX.
    DropIndex {
        /// Index handle.
        index: IndexRef,
        /// Owning table.
        table: TableKey,
        /// Index name.
        name: String,
    },
    /// ALTER TABLE ADD CONSTRAINT.
    AddConstraint {
        /// Constraint handle.
        constraint: ConstraintRef,
        /// Owning table.
        table: TableKey,
        /// Constraint name.
        name: Option<String>,
    },
    /// ALTER TABLE DROP CONSTRAINT.
    DropConstraint {
        /// Constraint handle.
        constraint: ConstraintRef,
        /// Owning table.
        table: TableKey,
        /// Constraint name.
        name: Option<String>,
    },
    /// COMMENT ON TABLE.
    SetTableComment {
        /// Table handle.
        table: TableId,
        /// Table key.
        key: TableKey,
    },
    /// COMMENT ON COLUMN.
    SetColumnComment {
        /// Column handle.
        column: ColumnRef,
        /// Owning table.
        table: TableKey,
        /// Column key.
        column_key: String,
    },
}

impl DdlIntent {
    /// Event kind dispatched around this step.
    pub fn event_kind(&self) -> DdlEventKind {
        match self {
            DdlIntent::CreateSequence { .. }
            | DdlIntent::CreateType { .. }
            | DdlIntent::CreateTable { .. }
            | DdlIntent::CreateView { .. }
            | DdlIntent::CreateIndex { .. } => DdlEventKind::Create,
            DdlIntent::DropSequence { .. }
            | DdlIntent::DropType { .. }
            | DdlIntent::DropTable { .. }
            | DdlIntent::DropView { .. }
            | DdlIntent::DropIndex { .. } => DdlEventKind::Drop,
            DdlIntent::AddConstraint { .. } => DdlEventKind::AddConstraint,
            DdlIntent::DropConstraint { .. } => DdlEventKind::DropConstraint,
            DdlIntent::SetTableComment { .. } | DdlIntent::SetColumnComment { .. } => {
                DdlEventKind::Comment
            }
        }
    }

    /// Item this step operates on. Types have no registry item and report
    /// the registry itself.
    pub fn target(&self) -> SchemaItemRef {
        match self {
            DdlIntent::CreateSequence { key, .. } | DdlIntent::DropSequence { key, .. } => {
                SchemaItemRef::Sequence(key.clone())
            }
            DdlIntent::CreateType { .. } | DdlIntent::DropType { .. } => SchemaItemRef::Registry,
            DdlIntent::CreateTable { table, .. }
            | DdlIntent::DropTable { table, .. }
            | DdlIntent::CreateView { table, .. }
            | DdlIntent::DropView { table, .. }
            | DdlIntent::SetTableComment { table, .. } => SchemaItemRef::Table(*table),
            DdlIntent::CreateIndex { index, .. } | DdlIntent::DropIndex { index, .. } => {
                SchemaItemRef::Index(*index)
            }
            DdlIntent::AddConstraint { constraint, .. }
            | DdlIntent::DropConstraint { constraint, .. } => SchemaItemRef::Constraint(*constraint),
            DdlIntent::SetColumnComment { column, .. } => SchemaItemRef::Column(*column),
        }
    }

    /// Table this step touches, if any.
    pub fn table_key(&self) -> Option<&TableKey> {
        match self {
            DdlIntent::CreateTable { key, .. }
            | DdlIntent::DropTable { key, .. }
            | DdlIntent::CreateView { key, .. }
            | DdlIntent::DropView { key, .. }
            | DdlIntent::SetTableComment { key, .. } => Some(key),
            DdlIntent::CreateIndex { table, .. }
            | DdlIntent::DropIndex { table, .. }
            | DdlIntent::AddConstraint { table, .. }
            | DdlIntent::DropConstraint { table, .. }
            | DdlIntent::SetColumnComment { table, .. } => Some(table),
            _ => None,
        }
    }

    /// Check if this step creates something.
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            DdlIntent::CreateSequence { .. }
                | DdlIntent::CreateType { .. }
                | DdlIntent::CreateTable { .. }
                | DdlIntent::CreateView { .. }
                | DdlIntent::CreateIndex { .. }
                | DdlIntent::AddConstraint { .. }
        )
    }

    /// Short statement-like description, e.g. `CREATE TABLE orders`.
    pub fn description(&self) -> String {
        self.to_string()
    }
}

fn qualified(name: &str, schema: Option<&str>) -> String {
    match schema {
        Some(schema) => format!("{}.{}", schema, name),
        None => name.to_string(),
    }
}

impl fmt::Display for DdlIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DdlIntent::CreateSequence { key, .. } => write!(f, "CREATE SEQUENCE {}", key),
            DdlIntent::DropSequence { key, .. } => write!(f, "DROP SEQUENCE {}", key),
            DdlIntent::CreateType { name, schema, .. } => {
                write!(f, "CREATE TYPE {} AS ENUM", qualified(name, schema.as_deref()))
            }
            DdlIntent::DropType { name, schema } => {
                write!(f, "DROP TYPE {}", qualified(name, schema.as_deref()))
            }
            DdlIntent::CreateTable { key, .. } => write!(f, "CREATE TABLE {}", key),
            DdlIntent::DropTable { key, .. } => write!(f, "DROP TABLE {}", key),
            DdlIntent::CreateView { key, .. } => write!(f, "CREATE VIEW {}", key),
            DdlIntent::DropView { key, .. } => write!(f, "DROP VIEW {}", key),
            DdlIntent::CreateIndex {
                table, name, unique, ..
            } => {
                let unique = if *unique { "UNIQUE " } else { "" };
                write!(f, "CREATE {}INDEX {} ON {}", unique, name, table)
            }
            DdlIntent::DropIndex { name, table, .. } => {
                write!(f, "DROP INDEX {}", qualified(name, table.schema.as_deref()))
            }
            DdlIntent::AddConstraint { table, name, .. } => write!(
                f,
                "ALTER TABLE {} ADD CONSTRAINT {}",
                table,
                name.as_deref().unwrap_or("<unnamed>")
            ),
            DdlIntent::DropConstraint { table, name, .. } => write!(
                f,
                "ALTER TABLE {} DROP CONSTRAINT {}",
                table,
                name.as_deref().unwrap_or("<unnamed>")
            ),
            DdlIntent::SetTableComment { key, .. } => write!(f, "COMMENT ON TABLE {}", key),
            DdlIntent::SetColumnComment {
                table, column_key, ..
            } => write!(f, "COMMENT ON COLUMN {}.{}", table, column_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> TableKey {
        TableKey::new(None, name)
    }

    #[test]
    fn test_descriptions() {
        let create = DdlIntent::CreateTable {
            table: TableId(0),
            key: key("orders"),
            include_foreign_keys: Vec::new(),
        };
        assert_eq!(create.description(), "CREATE TABLE orders");

        let index = DdlIntent::CreateIndex {
            index: IndexRef {
                table: TableId(0),
                index: 0,
            },
            table: TableKey::new(Some("shop"), "orders"),
            name: "ix_orders_user_id".into(),
            unique: true,
        };
        assert_eq!(
            index.description(),
            "CREATE UNIQUE INDEX ix_orders_user_id ON shop.orders"
        );

        let drop_index = DdlIntent::DropIndex {
            index: IndexRef {
                table: TableId(0),
                index: 0,
            },
            table: TableKey::new(Some("shop"), "orders"),
            name: "ix_orders_user_id".into(),
        };
        assert_eq!(drop_index.description(), "DROP INDEX shop.ix_orders_user_id");
    }

    #[test]
    fn test_event_kinds_and_targets() {
        let add = DdlIntent::AddConstraint {
            constraint: ConstraintRef {
                table: TableId(2),
                constraint: ConstraintId(1),
            },
            table: key("x"),
            name: Some("fk_x_y".into()),
        };
        assert_eq!(add.event_kind(), DdlEventKind::AddConstraint);
        assert_eq!(add.target().table(), Some(TableId(2)));
        assert!(add.is_create());

        let seq = DdlIntent::DropSequence {
            key: "s".into(),
            name: "s".into(),
            schema: None,
        };
        assert_eq!(seq.event_kind(), DdlEventKind::Drop);
        assert_eq!(seq.target(), SchemaItemRef::Sequence("s".into()));
        assert!(seq.table_key().is_none());
    }

    #[test]
    fn test_serializes_with_op_tag() {
        let intent = DdlIntent::DropType {
            name: "mood".into(),
            schema: None,
        };
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["op"], "drop_type");
        let back: DdlIntent = serde_json::from_value(json).unwrap();
        assert_eq!(back, intent);
    }
}
