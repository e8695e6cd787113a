//! The metadata registry.
//!
//! [`MetaData`] owns every table in a slot vector addressed by [`TableId`].
//! Foreign keys whose target has not attached yet wait in a pending memo
//! keyed by `(table key, column key)`; the memo entry is drained when a
//! matching column attaches.

use super::column::Column;
use super::constraint::Constraint;
use super::events::{AttachEvent, DdlEvent, ObserverScope, Observers, SchemaObserver};
use super::foreign_key::{FkTarget, ForeignKey};
use super::index::Index;
use super::item::{
    ColumnRef, ConstraintId, ConstraintRef, ForeignKeyRef, IndexRef, SchemaItemRef, TableId,
    TableKey,
};
use super::naming::{NameContext, NamingConvention};
use super::sequence::Sequence;
use super::table::{Redefine, Table, TableDef};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::error::{Error, Result};
use crate::identifier::Identifier;
use crate::sort::TableSorter;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

type MemoKey = (TableKey, String);

/// Registry of tables, sequences and pending foreign key references.
#[derive(Debug, Clone, Default)]
pub struct MetaData {
    tables: Vec<Option<Table>>,
    keys: HashMap<TableKey, TableId>,
    schemas: BTreeSet<String>,
    sequences: BTreeMap<String, Sequence>,
    fk_memo: HashMap<MemoKey, Vec<ForeignKeyRef>>,
    default_schema: Option<String>,
    naming: NamingConvention,
    observers: Observers,
}

impl MetaData {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the schema applied to tables and foreign key specs that name none.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = Some(schema.into());
        self
    }

    /// Set the naming convention.
    pub fn with_naming_convention(mut self, naming: NamingConvention) -> Self {
        self.naming = naming;
        self
    }

    /// Default schema.
    pub fn default_schema(&self) -> Option<&str> {
        self.default_schema.as_deref()
    }

    /// Naming convention.
    pub fn naming_convention(&self) -> &NamingConvention {
        &self.naming
    }

    /// Register an observer. Observers accumulate; none is ever replaced.
    pub fn add_observer(&mut self, scope: ObserverScope, observer: Arc<dyn SchemaObserver>) {
        self.observers.add(scope, observer);
    }

    /// Registered observers.
    pub fn observers(&self) -> &Observers {
        &self.observers
    }

    // ---- lookup -------------------------------------------------------

    /// Table by handle.
    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id.0).and_then(Option::as_ref)
    }

    fn table_mut(&mut self, id: TableId) -> Result<&mut Table> {
        self.tables
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| missing_table(id))
    }

    fn table_or_err(&self, id: TableId) -> Result<&Table> {
        self.table(id).ok_or_else(|| missing_table(id))
    }

    /// Handle of a table by key.
    pub fn table_id(&self, key: &TableKey) -> Option<TableId> {
        self.keys.get(key).copied()
    }

    /// Table by name; a missing schema means the default schema.
    pub fn get_table(&self, name: &str, schema: Option<&str>) -> Option<&Table> {
        let key = TableKey::new(schema.or(self.default_schema.as_deref()), name);
        self.table_id(&key).and_then(|id| self.table(id))
    }

    /// Tables in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().flatten()
    }

    /// Handles of all tables in registration order.
    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables().map(Table::id).collect()
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if no table is registered.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Column by handle.
    pub fn column(&self, col: ColumnRef) -> Option<&Column> {
        self.table(col.table).and_then(|t| t.columns.get(col.index))
    }

    fn column_mut(&mut self, col: ColumnRef) -> Option<&mut Column> {
        self.tables
            .get_mut(col.table.0)
            .and_then(Option::as_mut)
            .and_then(|t| t.column_at_mut(col.index))
    }

    /// Constraint by handle.
    pub fn constraint(&self, c: ConstraintRef) -> Option<&Constraint> {
        self.table(c.table).and_then(|t| t.constraint(c.constraint))
    }

    /// Index by handle.
    pub fn index(&self, ix: IndexRef) -> Option<&Index> {
        self.table(ix.table).and_then(|t| t.indexes.get(ix.index))
    }

    /// Foreign key element by handle.
    pub fn foreign_key(&self, fk: ForeignKeyRef) -> Option<&ForeignKey> {
        self.table(fk.table).and_then(|t| t.foreign_key(fk))
    }

    /// Sequence by registry key.
    pub fn sequence(&self, key: &str) -> Option<&Sequence> {
        self.sequences.get(key)
    }

    /// All known sequences, column-owned and registry-level, in key order.
    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.values()
    }

    /// Schema names used by registered tables.
    pub fn schemas(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(String::as_str)
    }

    /// Number of foreign key elements not yet resolved.
    pub fn pending_references(&self) -> usize {
        self.tables()
            .flat_map(Table::foreign_keys)
            .filter(|(_, fk)| !fk.is_resolved())
            .count()
    }

    /// The table a foreign key constraint points at, once every element resolved.
    pub fn referred_table(&self, c: ConstraintRef) -> Option<TableId> {
        let payload = self.constraint(c)?.as_foreign_key()?;
        let mut referred = None;
        for fk in &payload.elements {
            let target = fk.target().column()?.table;
            match referred {
                None => referred = Some(target),
                Some(t) if t != target => return None,
                Some(_) => {}
            }
        }
        referred
    }

    /// Build a foreign key marker that points straight at an attached column.
    pub fn foreign_key_to(&self, col: ColumnRef) -> Result<ForeignKey> {
        let table = self.table_or_err(col.table)?;
        let column = table.columns.get(col.index).ok_or_else(|| {
            Error::InvalidRequest(format!("table '{}' has no column #{}", table.key, col.index))
        })?;
        Ok(ForeignKey::to_column(table.key.clone(), column.key(), col))
    }

    // ---- registration -------------------------------------------------

    /// Register a table definition.
    ///
    /// An empty redeclaration of a registered key returns the existing table
    /// under every policy.
    pub fn add_table(&mut self, def: TableDef, policy: Redefine) -> Result<TableId> {
        if def.name.trim().is_empty() {
            return Err(Error::argument("Table must have a non-blank name"));
        }
        let schema = def.schema.clone().or_else(|| self.default_schema.clone());
        let key = TableKey::new(schema.as_deref(), def.name.clone());

        if let Some(existing) = self.table_id(&key) {
            if def.is_empty() {
                return Ok(existing);
            }
            match policy {
                Redefine::Error => return Err(Error::DuplicateTable(key)),
                Redefine::Keep => return Ok(existing),
                Redefine::Extend => return self.extend_table(existing, def),
                Redefine::Replace => {
                    return self.atomically(|meta| {
                        meta.remove_table(existing)?;
                        meta.register_table(key, def)
                    });
                }
            }
        }
        self.register_table(key, def)
    }

    fn register_table(&mut self, key: TableKey, def: TableDef) -> Result<TableId> {
        let id = TableId(self.tables.len());
        let mut table = Table::new(id, key.clone());
        table.comment = def.comment;
        table.options = def.options;
        table.derived = def.derived;
        table.extra_dependencies = def.depends_on;

        let event = AttachEvent {
            child: SchemaItemRef::Table(id),
            parent: SchemaItemRef::Registry,
        };
        self.observers.before_attach(&event, Some(&key), None);

        self.tables.push(Some(table));
        self.keys.insert(key.clone(), id);
        if let Some(schema) = &key.schema {
            self.schemas.insert(schema.clone());
        }

        if let Err(err) = self.attach_items(id, def.columns, def.constraints, def.indexes) {
            warn!(table = %key, error = %err, "table attach failed; unregistering");
            self.remove_table(id)?;
            return Err(err);
        }

        self.observers.after_attach(&event, Some(&key), None);
        debug!(table = %key, id = id.0, "table registered");
        Ok(id)
    }

    /// Run `f`, restoring the registry if it fails.
    fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }

    fn extend_table(&mut self, id: TableId, def: TableDef) -> Result<TableId> {
        self.atomically(|meta| meta.extend_items(id, def))?;
        debug!(table = %self.table_or_err(id)?.key, "table extended");
        Ok(id)
    }

    fn extend_items(&mut self, id: TableId, def: TableDef) -> Result<()> {
        let table = self.table_mut(id)?;
        if def.comment.is_some() {
            table.comment = def.comment;
        }
        if !def.options.is_empty() {
            table.options = def.options;
        }
        if def.derived.is_some() {
            table.derived = def.derived;
        }
        for dep in def.depends_on {
            if !table.extra_dependencies.contains(&dep) {
                table.extra_dependencies.push(dep);
            }
        }
        self.attach_items(id, def.columns, def.constraints, def.indexes)
    }

    fn attach_items(
        &mut self,
        id: TableId,
        columns: Vec<Column>,
        constraints: Vec<Constraint>,
        indexes: Vec<Index>,
    ) -> Result<()> {
        for column in columns {
            self.attach_column(id, column)?;
        }
        for constraint in constraints {
            self.attach_constraint(id, constraint)?;
        }
        for index in indexes {
            self.attach_index(id, index)?;
        }
        let table = self.table_or_err(id)?;
        table
            .options
            .validate(&table.key.to_string(), !table.primary_key().columns().is_empty())
    }

    /// Unregister a table.
    ///
    /// Its own pending markers leave the memo; markers in other tables that
    /// were resolved against it go back to pending.
    pub fn remove_table(&mut self, id: TableId) -> Result<Table> {
        let table = self
            .tables
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or_else(|| missing_table(id))?;
        self.keys.remove(&table.key);

        for refs in self.fk_memo.values_mut() {
            refs.retain(|r| r.table != id);
        }
        self.fk_memo.retain(|_, refs| !refs.is_empty());

        let mut reverted = Vec::new();
        for other in self.tables.iter_mut().flatten() {
            let hits: Vec<ForeignKeyRef> = other
                .foreign_keys()
                .filter(|(_, fk)| fk.target().column().is_some_and(|c| c.table == id))
                .map(|(r, _)| r)
                .collect();
            for r in hits {
                if let Some(fk) = other.foreign_key_mut(r) {
                    fk.target = FkTarget::Pending;
                    reverted.push(r);
                }
            }
        }
        for r in reverted {
            self.file_pending(r)?;
        }

        self.sequences
            .retain(|_, seq| seq.column.map_or(true, |c| c.table != id));
        self.schemas = self
            .tables()
            .filter_map(|t| t.key.schema.clone())
            .collect();

        debug!(table = %table.key, "table removed");
        Ok(table)
    }

    /// Remove every table and sequence.
    pub fn clear(&mut self) {
        self.tables.clear();
        self.keys.clear();
        self.schemas.clear();
        self.sequences.clear();
        self.fk_memo.clear();
    }

    /// All tables in dependency order, ties broken by key.
    ///
    /// Foreign keys removed to break cycles are discarded.
    pub fn sorted_tables(&self) -> Result<Vec<TableId>> {
        let mut ids = self.table_ids();
        ids.sort_by(|a, b| {
            let ka = self.table(*a).map(Table::key);
            let kb = self.table(*b).map(Table::key);
            ka.cmp(&kb)
        });
        let sorted = TableSorter::new(self, &ids).sort()?;
        Ok(sorted.table_ids())
    }

    /// Register a sequence that is not owned by a column.
    pub fn add_sequence(&mut self, mut sequence: Sequence) -> Result<()> {
        sequence.validate()?;
        sequence.column = None;
        let key = sequence.key();
        let event = AttachEvent {
            child: SchemaItemRef::Sequence(key.clone()),
            parent: SchemaItemRef::Registry,
        };
        self.observers.before_attach(&event, None, Some(&key));
        self.sequences.insert(key.clone(), sequence);
        self.observers.after_attach(&event, None, Some(&key));
        debug!(sequence = %key, "sequence registered");
        Ok(())
    }

    /// Attach a column to a registered table.
    ///
    /// On error the table is left as it was, including any column the new
    /// one would have replaced.
    pub fn append_column(&mut self, table: TableId, column: Column) -> Result<ColumnRef> {
        self.atomically(|meta| meta.attach_column(table, column))
    }

    /// Attach a constraint to a registered table.
    pub fn append_constraint(
        &mut self,
        table: TableId,
        constraint: Constraint,
    ) -> Result<ConstraintRef> {
        self.atomically(|meta| meta.attach_constraint(table, constraint))
    }

    /// Attach an index to a registered table.
    pub fn add_index(&mut self, table: TableId, index: Index) -> Result<IndexRef> {
        self.atomically(|meta| meta.attach_index(table, index))
    }

    /// Require `other` to be created before `table`.
    pub fn add_is_dependent_on(&mut self, table: TableId, other: TableId) -> Result<()> {
        if table == other {
            return Err(Error::argument("A table cannot depend on itself"));
        }
        let other_key = self.table_or_err(other)?.key.clone();
        let table = self.table_mut(table)?;
        if !table.extra_dependencies.contains(&other_key) {
            table.extra_dependencies.push(other_key);
        }
        Ok(())
    }

    // ---- attach protocol ----------------------------------------------

    fn attach_column(&mut self, id: TableId, mut column: Column) -> Result<ColumnRef> {
        if column.name.is_blank() {
            return Err(Error::argument(
                "Column must have a non-blank name before it is added to a table",
            ));
        }
        let table = self.table_or_err(id)?;
        if let Some(owner) = column.table.filter(|owner| *owner != id) {
            let owner = self
                .table(owner)
                .map(|t| t.key.to_string())
                .unwrap_or_else(|| format!("#{}", owner.0));
            return Err(Error::argument(format!(
                "Column '{}' is already assigned to table '{}'",
                column.name, owner
            )));
        }
        column.validate()?;
        for seq in column.sequences() {
            seq.validate()?;
        }

        let key = column.key().to_string();
        let table_key = table.key.clone();
        let existing = table.column_slots.get(&key).copied();
        if existing.is_some() && table.primary_key().contains_column(&key) && !column.primary_key {
            return Err(Error::argument(format!(
                "Trying to redefine primary-key column '{}' as a non-primary-key column on table '{}'",
                key, table_key
            )));
        }

        let index = existing.unwrap_or(table.columns.len());
        let colref = ColumnRef { table: id, index };
        let event = AttachEvent {
            child: SchemaItemRef::Column(colref),
            parent: SchemaItemRef::Table(id),
        };
        self.observers.before_attach(&event, Some(&table_key), None);

        if existing.is_some() {
            self.remove_column_dependents(id, &key)?;
        }

        let foreign_keys = std::mem::take(&mut column.foreign_keys);
        let sequences: Vec<Sequence> = column.sequences().cloned().collect();
        let (primary, want_index, unique) = (column.primary_key, column.index, column.unique);
        let typed = !column.sql_type.is_null();
        column.table = Some(id);

        let table = self.table_mut(id)?;
        match existing {
            Some(slot) => table.columns[slot] = column,
            None => {
                table.columns.push(column);
                table.column_slots.insert(key.clone(), index);
            }
        }
        if primary {
            table.primary_key.push_column(key.clone());
        }

        if want_index {
            let mut ix = Index::unnamed([key.clone()]);
            ix.unique = unique;
            self.attach_index(id, ix)?;
        } else if unique {
            self.attach_constraint(id, Constraint::unique([key.clone()]))?;
        }
        for fk in foreign_keys {
            self.attach_constraint(id, Constraint::from_column_fk(&key, fk))?;
        }
        for mut seq in sequences {
            seq.column = Some(colref);
            self.sequences.entry(seq.key()).or_insert(seq);
        }

        self.drain_pending(&table_key, &key)?;
        if existing.is_some() && typed {
            self.propagate_type(colref);
        }

        self.observers.after_attach(&event, Some(&table_key), None);
        debug!(table = %table_key, column = %key, replaced = existing.is_some(), "column attached");
        Ok(colref)
    }

    fn remove_column_dependents(&mut self, id: TableId, key: &str) -> Result<()> {
        let table = self.table_mut(id)?;
        let mut removed = Vec::new();
        for (slot, entry) in table.constraints.iter_mut().enumerate().skip(1) {
            if entry.as_ref().is_some_and(|c| c.contains_column(key)) {
                if let Some(constraint) = entry.take() {
                    warn!(
                        table = %table.key,
                        column = key,
                        constraint = ?constraint.name.as_ref().map(Identifier::as_str),
                        kind = constraint.kind.label(),
                        "constraint orphaned by column replacement; removed"
                    );
                    removed.push(ConstraintId(slot));
                }
            }
        }
        let before = table.indexes.len();
        table.indexes.retain(|ix| !ix.contains_column(key));
        if table.indexes.len() != before {
            warn!(
                table = %table.key,
                column = key,
                count = before - table.indexes.len(),
                "indexes orphaned by column replacement; removed"
            );
        }

        for refs in self.fk_memo.values_mut() {
            refs.retain(|r| !(r.table == id && removed.contains(&r.constraint)));
        }
        self.fk_memo.retain(|_, refs| !refs.is_empty());
        Ok(())
    }

    fn attach_constraint(
        &mut self,
        id: TableId,
        mut constraint: Constraint,
    ) -> Result<ConstraintRef> {
        let table = self.table_or_err(id)?;
        let table_key = table.key.clone();
        if let Some(unknown) = constraint.columns().iter().find(|c| !table.has_column(c)) {
            return Err(Error::argument(format!(
                "{} constraint on table '{}' names unknown column '{}'",
                constraint.kind.label(),
                table_key,
                unknown
            )));
        }

        let columns = constraint.columns().to_vec();
        if let Some(payload) = constraint.as_foreign_key_mut() {
            if columns.is_empty() || payload.elements.len() != columns.len() {
                return Err(Error::argument(format!(
                    "Foreign key constraint on table '{}' has {} column(s) but {} referred column(s)",
                    table_key,
                    columns.len(),
                    payload.elements.len()
                )));
            }
            for (fk, column) in payload.elements.iter_mut().zip(&columns) {
                fk.parent = Some(column.clone());
            }
        }
        self.validate_dest_table(&table_key, &constraint)?;
        self.apply_naming(&table_key, &mut constraint)?;

        if constraint.is_primary_key() {
            return self.replace_primary_key(id, constraint);
        }

        let table = self.table_mut(id)?;
        let cid = ConstraintId(table.constraints.len());
        let cref = ConstraintRef {
            table: id,
            constraint: cid,
        };
        let elements = constraint.as_foreign_key().map_or(0, |p| p.elements.len());
        let event = AttachEvent {
            child: SchemaItemRef::Constraint(cref),
            parent: SchemaItemRef::Table(id),
        };
        self.observers.before_attach(&event, Some(&table_key), None);
        self.table_mut(id)?.constraints.push(Some(constraint));

        for element in 0..elements {
            let r = ForeignKeyRef {
                table: id,
                constraint: cid,
                element,
            };
            if !self.try_resolve(r)? {
                self.file_pending(r)?;
            }
        }

        self.observers.after_attach(&event, Some(&table_key), None);
        Ok(cref)
    }

    fn validate_dest_table(&self, table_key: &TableKey, constraint: &Constraint) -> Result<()> {
        let Some(payload) = constraint.as_foreign_key() else {
            return Ok(());
        };
        let mut first: Option<TableKey> = None;
        for fk in &payload.elements {
            let (target, _) = fk.lookup_key(self.default_schema.as_deref())?;
            match &first {
                None => first = Some(target),
                Some(prev) if *prev != target => {
                    return Err(Error::argument(format!(
                        "Foreign key constraint on table '{}' ({}) refers to multiple remote tables: {} and {}",
                        table_key,
                        constraint.columns().join(", "),
                        prev,
                        target
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn apply_naming(&self, table_key: &TableKey, constraint: &mut Constraint) -> Result<()> {
        let (referred_table, referred_columns) = match constraint.as_foreign_key() {
            Some(payload) => {
                let mut table = None;
                let mut columns = Vec::new();
                for fk in &payload.elements {
                    let spec = fk.column_spec()?;
                    columns.push(spec.column.clone().or_else(|| fk.parent.clone()).unwrap_or_default());
                    table = Some(spec.table);
                }
                (table, columns)
            }
            None => (None, Vec::new()),
        };
        let explicit = constraint.name.as_ref().map(|n| n.as_str().to_string());
        let ctx = NameContext {
            table: &table_key.name,
            columns: constraint.columns(),
            referred_table: referred_table.as_deref(),
            referred_columns: &referred_columns,
            constraint: explicit.as_deref(),
        };
        if let Some(name) = self.naming.apply(constraint.kind.label(), &ctx)? {
            constraint.name = Some(Identifier::new(name));
        }
        Ok(())
    }

    fn replace_primary_key(&mut self, id: TableId, pk: Constraint) -> Result<ConstraintRef> {
        let cref = ConstraintRef {
            table: id,
            constraint: ConstraintId::PRIMARY_KEY,
        };
        let event = AttachEvent {
            child: SchemaItemRef::Constraint(cref),
            parent: SchemaItemRef::Table(id),
        };
        let table_key = self.table_or_err(id)?.key.clone();
        self.observers.before_attach(&event, Some(&table_key), None);

        let table = self.table_mut(id)?;
        for column in table.columns.iter_mut() {
            let key = column.key().to_string();
            if pk.contains_column(&key) {
                column.primary_key = true;
                column.nullable = false;
            } else if column.primary_key {
                column.primary_key = false;
                warn!(
                    table = %table.key,
                    column = %key,
                    "column flagged primary_key is not part of the declared primary key; flag cleared"
                );
            }
        }
        table.primary_key = pk;

        self.observers.after_attach(&event, Some(&table_key), None);
        Ok(cref)
    }

    fn attach_index(&mut self, id: TableId, mut index: Index) -> Result<IndexRef> {
        let table = self.table_or_err(id)?;
        let table_key = table.key.clone();
        if index.elements.is_empty() {
            return Err(Error::argument(format!(
                "Index on table '{}' has no elements",
                table_key
            )));
        }
        let keys = index.column_keys();
        if let Some(unknown) = keys.iter().find(|k| !table.has_column(k)) {
            return Err(Error::argument(format!(
                "Index on table '{}' names unknown column '{}'",
                table_key, unknown
            )));
        }
        if index.name.is_none() {
            let ctx = NameContext {
                table: &table_key.name,
                columns: &keys,
                ..Default::default()
            };
            index.name = self.naming.apply("ix", &ctx)?.map(Identifier::new);
        }
        let name = index.name.clone().ok_or_else(|| {
            Error::argument(format!(
                "Index on table '{}' has no name and no naming convention applies",
                table_key
            ))
        })?;
        index
            .options
            .validate(name.as_str(), &keys, |c| table.has_column(c))?;

        let ixref = IndexRef {
            table: id,
            index: table.indexes.len(),
        };
        let event = AttachEvent {
            child: SchemaItemRef::Index(ixref),
            parent: SchemaItemRef::Table(id),
        };
        self.observers.before_attach(&event, Some(&table_key), None);
        index.table = Some(id);
        self.table_mut(id)?.indexes.push(index);
        self.observers.after_attach(&event, Some(&table_key), None);
        debug!(table = %table_key, index = %name, "index attached");
        Ok(ixref)
    }

    // ---- resolution ---------------------------------------------------

    fn file_pending(&mut self, r: ForeignKeyRef) -> Result<()> {
        let fk = self.foreign_key(r).ok_or_else(|| missing_fk(r))?;
        let memo_key = fk.lookup_key(self.default_schema.as_deref())?;
        debug!(target_table = %memo_key.0, target_column = %memo_key.1, "foreign key pending");
        let refs = self.fk_memo.entry(memo_key).or_default();
        if !refs.contains(&r) {
            refs.push(r);
        }
        Ok(())
    }

    fn drain_pending(&mut self, table: &TableKey, column: &str) -> Result<()> {
        let memo_key = (table.clone(), column.to_string());
        let Some(refs) = self.fk_memo.remove(&memo_key) else {
            return Ok(());
        };
        let mut still_pending = Vec::new();
        for r in refs {
            if self.foreign_key(r).is_none() {
                continue;
            }
            if !self.try_resolve(r)? {
                still_pending.push(r);
            }
        }
        if !still_pending.is_empty() {
            self.fk_memo.insert(memo_key, still_pending);
        }
        Ok(())
    }

    /// Locate the target column of one marker. `Ok(false)` means not yet present.
    fn try_resolve(&mut self, r: ForeignKeyRef) -> Result<bool> {
        let fk = self.foreign_key(r).ok_or_else(|| missing_fk(r))?;
        let parent = fk
            .parent()
            .and_then(|p| self.table(r.table).and_then(|t| t.column_ref(p)));

        let target = match fk.target() {
            FkTarget::Resolved(col) => {
                if self.column(col).is_none() {
                    return Err(Error::argument(format!(
                        "Foreign key '{}' points at a column that is not attached",
                        fk.target_fullname()
                    )));
                }
                col
            }
            FkTarget::Pending => {
                let (table_key, column_key) = fk.lookup_key(self.default_schema.as_deref())?;
                let found = self
                    .table_id(&table_key)
                    .and_then(|tid| self.table(tid))
                    .and_then(|t| t.column_ref(&column_key));
                let Some(col) = found else {
                    return Ok(false);
                };
                if let Some(fk) = self.table_mut(r.table)?.foreign_key_mut(r) {
                    fk.target = FkTarget::Resolved(col);
                }
                debug!(target_table = %table_key, target_column = %column_key, "foreign key resolved");
                col
            }
        };

        if let Some(parent) = parent {
            self.inherit_type(parent, target);
        }
        Ok(true)
    }

    fn inherit_type(&mut self, parent: ColumnRef, target: ColumnRef) {
        let Some(sql_type) = self.column(target).map(|c| c.sql_type.clone()) else {
            return;
        };
        if sql_type.is_null() {
            return;
        }
        match self.column_mut(parent) {
            Some(column) if column.sql_type.is_null() => column.sql_type = sql_type,
            _ => return,
        }
        self.propagate_type(parent);
    }

    /// Push a column's type onto null-typed columns whose foreign keys point at it.
    fn propagate_type(&mut self, from: ColumnRef) {
        let mut queue = vec![from];
        while let Some(src) = queue.pop() {
            let Some(sql_type) = self.column(src).map(|c| c.sql_type.clone()) else {
                continue;
            };
            if sql_type.is_null() {
                continue;
            }
            let mut untyped = Vec::new();
            for table in self.tables() {
                for (_, fk) in table.foreign_keys() {
                    if fk.target().column() != Some(src) {
                        continue;
                    }
                    if let Some(parent) = fk.parent().and_then(|p| table.column_ref(p)) {
                        if table.columns[parent.index].sql_type.is_null() {
                            untyped.push(parent);
                        }
                    }
                }
            }
            for parent in untyped {
                if let Some(column) = self.column_mut(parent) {
                    if column.sql_type.is_null() {
                        column.sql_type = sql_type.clone();
                        queue.push(parent);
                    }
                }
            }
        }
    }

    /// Force resolution of one marker.
    pub fn referred_column(&mut self, fk: ForeignKeyRef) -> Result<ColumnRef> {
        if self.try_resolve(fk)? {
            return self
                .foreign_key(fk)
                .and_then(|m| m.target().column())
                .ok_or_else(|| missing_fk(fk));
        }
        Err(self.unresolved_error(fk))
    }

    fn unresolved_error(&self, r: ForeignKeyRef) -> Error {
        let Some(fk) = self.foreign_key(r) else {
            return missing_fk(r);
        };
        let (table_key, column_key) = match fk.lookup_key(self.default_schema.as_deref()) {
            Ok(key) => key,
            Err(err) => return err,
        };
        let parent_table = self
            .table(r.table)
            .map(|t| t.key.to_string())
            .unwrap_or_default();
        if self.table_id(&table_key).is_some() {
            Error::NoReferencedColumn {
                spec: fk.target_fullname(),
                parent_table,
                table: table_key.to_string(),
                column: column_key,
            }
        } else {
            Error::NoReferencedTable {
                column: format!("{}.{}", parent_table, fk.parent().unwrap_or_default()),
                table: table_key.to_string(),
                target: column_key,
            }
        }
    }

    /// Retry every pending marker and report the ones still unresolved.
    ///
    /// Unresolved markers stay pending; each one is returned as a diagnostic
    /// and logged as a warning.
    pub fn finalize(&mut self) -> Vec<Diagnostic> {
        let memo: BTreeMap<MemoKey, Vec<ForeignKeyRef>> = std::mem::take(&mut self.fk_memo)
            .into_iter()
            .collect();
        let mut diagnostics = Vec::new();
        for (memo_key, refs) in memo {
            let mut still_pending = Vec::new();
            for r in refs {
                match self.try_resolve(r) {
                    Ok(true) => {}
                    Ok(false) => still_pending.push(r),
                    Err(err) => {
                        warn!(error = %err, "foreign key could not be resolved");
                        still_pending.push(r);
                    }
                }
            }
            for r in &still_pending {
                let message = self.unresolved_error(*r).to_string();
                let parent = self.table(r.table).map(|t| t.key.clone());
                warn!(target_table = %memo_key.0, target_column = %memo_key.1, "{}", message);
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnresolvedReference,
                    message,
                    parent.into_iter().chain([memo_key.0.clone()]).collect(),
                ));
            }
            if !still_pending.is_empty() {
                self.fk_memo.insert(memo_key, still_pending);
            }
        }
        diagnostics
    }

    /// Resolve every pending marker or fail on the first that cannot be.
    pub fn resolve_all(&mut self) -> Result<()> {
        let pending: Vec<ForeignKeyRef> = self
            .tables()
            .flat_map(Table::foreign_keys)
            .filter(|(_, fk)| !fk.is_resolved())
            .map(|(r, _)| r)
            .collect();
        for r in pending {
            self.referred_column(r)?;
        }
        self.fk_memo.clear();
        Ok(())
    }

    // ---- event dispatch -----------------------------------------------

    fn event_scope(&self, item: &SchemaItemRef) -> (Option<TableKey>, Option<String>) {
        let table = item
            .table()
            .and_then(|id| self.table(id))
            .map(|t| t.key.clone());
        let sequence = match item {
            SchemaItemRef::Sequence(key) => Some(key.clone()),
            _ => None,
        };
        (table, sequence)
    }

    pub(crate) fn notify_before_ddl(&self, event: &DdlEvent) {
        let (table, sequence) = self.event_scope(&event.target);
        self.observers
            .before_ddl(event, table.as_ref(), sequence.as_deref());
    }

    pub(crate) fn notify_after_ddl(&self, event: &DdlEvent) {
        let (table, sequence) = self.event_scope(&event.target);
        self.observers
            .after_ddl(event, table.as_ref(), sequence.as_deref());
    }
}

fn missing_table(id: TableId) -> Error {
    Error::NoSuchTable(format!("#{}", id.0))
}

fn missing_fk(r: ForeignKeyRef) -> Error {
    Error::InvalidRequest(format!(
        "no foreign key at table #{} constraint #{} element {}",
        r.table.0, r.constraint.0, r.element
    ))
}
