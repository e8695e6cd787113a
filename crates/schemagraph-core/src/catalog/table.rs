//! Table definitions.
//!
//! [`TableDef`] is the unattached builder; [`super::MetaData::add_table`]
//! turns it into a registered [`Table`].

use super::column::Column;
use super::constraint::Constraint;
use super::foreign_key::ForeignKey;
use super::index::Index;
use super::item::{ColumnRef, ConstraintId, ForeignKeyRef, TableId, TableKey};
use super::options::TableOptions;
use crate::identifier::Identifier;
use std::collections::HashMap;

/// What to do when a table key is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Redefine {
    /// Fail with a duplicate-table error.
    #[default]
    Error,
    /// Return the existing table unchanged.
    Keep,
    /// Add the new columns, constraints and indexes to the existing table.
    Extend,
    /// Remove the existing table and register the new definition.
    Replace,
}

/// How a derived table gets its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedKind {
    /// CREATE VIEW.
    View,
    /// CREATE TABLE ... AS SELECT.
    CreateTableAs,
}

/// Source query of a view or create-table-as table.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedSource {
    /// View or table.
    pub kind: DerivedKind,
    /// SELECT text.
    pub definition: String,
    /// Tables the query reads; each is created before this one.
    pub sources: Vec<TableKey>,
}

/// An unattached table definition.
#[derive(Debug, Clone, Default)]
pub struct TableDef {
    pub(crate) name: String,
    pub(crate) schema: Option<String>,
    pub(crate) columns: Vec<Column>,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) indexes: Vec<Index>,
    pub(crate) depends_on: Vec<TableKey>,
    pub(crate) derived: Option<DerivedSource>,
    pub(crate) comment: Option<String>,
    pub(crate) options: TableOptions,
}

impl TableDef {
    /// Start a definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Add a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Add a table-level constraint.
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Add an index.
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Require another table to be created first.
    pub fn depends_on(mut self, table: TableKey) -> Self {
        self.depends_on.push(table);
        self
    }

    /// Make this a view over the given source tables.
    pub fn as_view<I>(mut self, definition: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = TableKey>,
    {
        self.derived = Some(DerivedSource {
            kind: DerivedKind::View,
            definition: definition.into(),
            sources: sources.into_iter().collect(),
        });
        self
    }

    /// Make this a create-table-as table over the given source tables.
    pub fn as_select<I>(mut self, definition: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = TableKey>,
    {
        self.derived = Some(DerivedSource {
            kind: DerivedKind::CreateTableAs,
            definition: definition.into(),
            sources: sources.into_iter().collect(),
        });
        self
    }

    /// Set the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Set backend options.
    pub fn with_options(mut self, options: TableOptions) -> Self {
        self.options = options;
        self
    }

    /// Check if the definition only names a table.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
            && self.constraints.is_empty()
            && self.indexes.is_empty()
            && self.depends_on.is_empty()
            && self.derived.is_none()
            && self.comment.is_none()
            && self.options.is_empty()
    }
}

/// A table registered in a [`super::MetaData`].
#[derive(Debug, Clone)]
pub struct Table {
    pub(crate) id: TableId,
    pub(crate) name: Identifier,
    pub(crate) schema: Option<Identifier>,
    pub(crate) key: TableKey,
    pub(crate) columns: Vec<Column>,
    pub(crate) column_slots: HashMap<String, usize>,
    pub(crate) primary_key: Constraint,
    /// Slot 0 stays empty; it is addressed through `primary_key`.
    pub(crate) constraints: Vec<Option<Constraint>>,
    pub(crate) indexes: Vec<Index>,
    pub(crate) extra_dependencies: Vec<TableKey>,
    pub(crate) derived: Option<DerivedSource>,
    pub(crate) comment: Option<String>,
    pub(crate) options: TableOptions,
}

impl Table {
    pub(crate) fn new(id: TableId, key: TableKey) -> Self {
        Self {
            id,
            name: Identifier::new(key.name.clone()),
            schema: key.schema.clone().map(Identifier::new),
            key,
            columns: Vec::new(),
            column_slots: HashMap::new(),
            primary_key: Constraint::primary_key(Vec::<String>::new()),
            constraints: vec![None],
            indexes: Vec::new(),
            extra_dependencies: Vec::new(),
            derived: None,
            comment: None,
            options: TableOptions::default(),
        }
    }

    /// Arena handle.
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Table name.
    pub fn name(&self) -> &Identifier {
        &self.name
    }

    /// Schema name.
    pub fn schema(&self) -> Option<&Identifier> {
        self.schema.as_ref()
    }

    /// Registry key.
    pub fn key(&self) -> &TableKey {
        &self.key
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column by key.
    pub fn column(&self, key: &str) -> Option<&Column> {
        self.column_slots.get(key).map(|&i| &self.columns[i])
    }

    /// Handle of a column by key.
    pub fn column_ref(&self, key: &str) -> Option<ColumnRef> {
        self.column_slots.get(key).map(|&index| ColumnRef {
            table: self.id,
            index,
        })
    }

    pub(crate) fn column_at_mut(&mut self, index: usize) -> Option<&mut Column> {
        self.columns.get_mut(index)
    }

    /// Check if a column key exists.
    pub fn has_column(&self, key: &str) -> bool {
        self.column_slots.contains_key(key)
    }

    /// The primary key. Present on every table, possibly with no columns.
    pub fn primary_key(&self) -> &Constraint {
        &self.primary_key
    }

    /// Live constraints with their slots, primary key first.
    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        let rest = self
            .constraints
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(i, c)| c.as_ref().map(|c| (ConstraintId(i), c)));
        std::iter::once((ConstraintId::PRIMARY_KEY, &self.primary_key)).chain(rest)
    }

    /// Constraint by slot.
    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        if id == ConstraintId::PRIMARY_KEY {
            return Some(&self.primary_key);
        }
        self.constraints.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn constraint_mut(&mut self, id: ConstraintId) -> Option<&mut Constraint> {
        if id == ConstraintId::PRIMARY_KEY {
            return Some(&mut self.primary_key);
        }
        self.constraints.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Foreign key constraints with their slots.
    pub fn foreign_key_constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints().filter(|(_, c)| c.as_foreign_key().is_some())
    }

    /// Every foreign key element with its handle.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (ForeignKeyRef, &ForeignKey)> {
        let table = self.id;
        self.foreign_key_constraints().flat_map(move |(cid, c)| {
            c.as_foreign_key()
                .into_iter()
                .flat_map(|payload| payload.elements.iter().enumerate())
                .map(move |(element, fk)| {
                    (
                        ForeignKeyRef {
                            table,
                            constraint: cid,
                            element,
                        },
                        fk,
                    )
                })
        })
    }

    pub(crate) fn foreign_key_mut(&mut self, fk: ForeignKeyRef) -> Option<&mut ForeignKey> {
        self.constraint_mut(fk.constraint)
            .and_then(Constraint::as_foreign_key_mut)
            .and_then(|payload| payload.elements.get_mut(fk.element))
    }

    /// Foreign key element by handle.
    pub fn foreign_key(&self, fk: ForeignKeyRef) -> Option<&ForeignKey> {
        self.constraint(fk.constraint)
            .and_then(Constraint::as_foreign_key)
            .and_then(|payload| payload.elements.get(fk.element))
    }

    /// Foreign keys whose referencing column is `key`.
    pub fn foreign_keys_for(&self, key: &str) -> Vec<ForeignKeyRef> {
        self.foreign_keys()
            .filter(|(_, fk)| fk.parent() == Some(key))
            .map(|(r, _)| r)
            .collect()
    }

    /// Constraints that cover a column key.
    pub fn constraints_for(&self, key: &str) -> Vec<ConstraintId> {
        self.constraints()
            .filter(|(_, c)| c.contains_column(key))
            .map(|(id, _)| id)
            .collect()
    }

    /// Indexes in declaration order.
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Tables that must exist before this one, beyond foreign keys.
    pub fn extra_dependencies(&self) -> &[TableKey] {
        &self.extra_dependencies
    }

    /// Source query, for views and create-table-as tables.
    pub fn derived(&self) -> Option<&DerivedSource> {
        self.derived.as_ref()
    }

    /// Check if this is a view.
    pub fn is_view(&self) -> bool {
        self.derived
            .as_ref()
            .is_some_and(|d| d.kind == DerivedKind::View)
    }

    /// Table comment.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Backend options.
    pub fn options(&self) -> &TableOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::SqlType;

    #[test]
    fn test_table_def_builder() {
        let def = TableDef::new("orders")
            .with_schema("sales")
            .column(Column::new("id", SqlType::Integer).primary_key())
            .with_comment("customer orders");
        assert!(!def.is_empty());
        assert_eq!(def.schema.as_deref(), Some("sales"));
        assert!(TableDef::new("orders").is_empty());
    }

    #[test]
    fn test_new_table_has_implicit_primary_key() {
        let table = Table::new(TableId(0), TableKey::new(None, "t"));
        assert!(table.primary_key().is_primary_key());
        assert!(table.primary_key().columns().is_empty());
        assert_eq!(table.constraints().count(), 1);
        assert_eq!(table.foreign_keys().count(), 0);
    }

    #[test]
    fn test_primary_key_slot_addresses_primary_key() {
        let mut table = Table::new(TableId(0), TableKey::new(None, "t"));
        table.constraints.push(Some(Constraint::unique(["a"])));
        table
            .constraint_mut(ConstraintId::PRIMARY_KEY)
            .unwrap()
            .push_column("id".to_string());

        assert_eq!(table.primary_key().columns(), ["id".to_string()]);
        assert!(table
            .constraint(ConstraintId::PRIMARY_KEY)
            .unwrap()
            .is_primary_key());
        let slots: Vec<ConstraintId> = table.constraints().map(|(id, _)| id).collect();
        assert_eq!(slots, vec![ConstraintId::PRIMARY_KEY, ConstraintId(1)]);
    }

    #[test]
    fn test_view_flag() {
        let users = TableKey::new(None, "users");
        let def = TableDef::new("active_users").as_view("SELECT * FROM users", [users]);
        assert_eq!(def.derived.as_ref().map(|d| d.kind), Some(DerivedKind::View));
    }
}
