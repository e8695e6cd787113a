//! Turning a registry into an ordered list of DDL steps.
//!
//! Planning is pure: it reads the registry and backend capabilities and
//! never touches the backend. Existence checks that depend on live state are
//! attached to steps as guards and evaluated by the runner.

use super::backend::ExistenceProbe;
use super::intent::DdlIntent;
use crate::catalog::{
    Column, ColumnRef, ConstraintId, ConstraintRef, IndexRef, MetaData, Sequence, SqlType, Table,
    TableId,
};
use crate::config::{BackendConfig, CheckFirst};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::error::{Error, Result};
use crate::identifier::Identifier;
use crate::sort::{FkDisposition, TableSorter};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Skip a step depending on what the backend already has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistenceGuard {
    /// Query to run.
    pub probe: ExistenceProbe,
    /// Skip when the item exists (create) or when it is missing (drop).
    pub skip_when_present: bool,
}

impl ExistenceGuard {
    /// Guard for a CREATE: skip if already there.
    pub fn create(probe: ExistenceProbe) -> Self {
        Self {
            probe,
            skip_when_present: true,
        }
    }

    /// Guard for a DROP: skip if not there.
    pub fn drop(probe: ExistenceProbe) -> Self {
        Self {
            probe,
            skip_when_present: false,
        }
    }

    /// Decide from the probe result.
    pub fn should_skip(&self, present: bool) -> bool {
        present == self.skip_when_present
    }
}

/// One planned step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlStep {
    /// Optional existence check.
    pub guard: Option<ExistenceGuard>,
    /// What to do.
    pub intent: DdlIntent,
}

impl DdlStep {
    /// An unconditional step.
    pub fn new(intent: DdlIntent) -> Self {
        Self {
            guard: None,
            intent,
        }
    }

    /// A step that runs only if the guard allows it.
    pub fn guarded(intent: DdlIntent, guard: Option<ExistenceGuard>) -> Self {
        Self { guard, intent }
    }
}

/// An ordered list of steps plus what planning found along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DdlPlan {
    /// Steps in execution order.
    pub steps: Vec<DdlStep>,
    /// Foreign keys issued as separate ALTER statements.
    pub residual: Vec<ConstraintRef>,
    /// Non-fatal findings.
    pub diagnostics: Vec<Diagnostic>,
}

impl DdlPlan {
    /// Intents in order.
    pub fn intents(&self) -> impl Iterator<Item = &DdlIntent> {
        self.steps.iter().map(|s| &s.intent)
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Plan CREATE for `tables` and every registry-level sequence.
pub fn plan_create(
    meta: &MetaData,
    tables: &[TableId],
    config: &BackendConfig,
    checkfirst: &CheckFirst,
) -> Result<DdlPlan> {
    validate_identifiers(meta, tables, config)?;
    let sorted = TableSorter::new(meta, tables).sort()?;

    let mut plan = DdlPlan {
        diagnostics: sorted.diagnostics,
        ..Default::default()
    };
    let mut inline: HashMap<TableId, Vec<ConstraintId>> = HashMap::new();
    if config.supports_alter {
        plan.residual = sorted.residual;
    } else if !sorted.residual.is_empty() {
        let mut keys = Vec::new();
        for c in &sorted.residual {
            inline.entry(c.table).or_default().push(c.constraint);
            if let Some(table) = meta.table(c.table) {
                if !keys.contains(table.key()) {
                    keys.push(table.key().clone());
                }
            }
        }
        plan.diagnostics.push(Diagnostic::new(
            DiagnosticKind::ResidualInlined,
            format!(
                "backend '{}' does not support ALTER; {} deferred foreign key(s) rendered inline",
                config.name,
                sorted.residual.len()
            ),
            keys,
        ));
    }

    let mut emitter = Emitter::new(meta, config, checkfirst);
    for sequence in meta.sequences().filter(|s| s.column().is_none()) {
        emitter.create_sequence(sequence, &mut plan);
    }
    for (id, mut fks) in sorted.tables {
        if let Some(extra) = inline.remove(&id) {
            fks.extend(extra);
        }
        emitter.create_table(id, fks, &mut plan)?;
    }
    for c in plan.residual.clone() {
        plan.steps.push(DdlStep::new(add_constraint(meta, c)?));
    }

    debug!(steps = plan.len(), residual = plan.residual.len(), "create plan built");
    Ok(plan)
}

/// Plan CREATE for one table, its sequences, types, indexes and comments.
///
/// Foreign keys marked for ALTER become separate steps when the backend
/// supports it, and render inline otherwise.
pub fn plan_create_table(
    meta: &MetaData,
    id: TableId,
    config: &BackendConfig,
    checkfirst: &CheckFirst,
) -> Result<DdlPlan> {
    validate_identifiers(meta, &[id], config)?;
    let table = meta.table(id).ok_or_else(|| missing(id))?;

    let mut plan = DdlPlan::default();
    let mut inline = Vec::new();
    for (cid, constraint) in table.foreign_key_constraints() {
        if constraint.is_use_alter() && config.supports_alter {
            plan.residual.push(ConstraintRef {
                table: id,
                constraint: cid,
            });
        } else {
            inline.push(cid);
        }
    }

    let mut emitter = Emitter::new(meta, config, checkfirst);
    emitter.create_table(id, inline, &mut plan)?;
    for c in plan.residual.clone() {
        plan.steps.push(DdlStep::new(add_constraint(meta, c)?));
    }
    Ok(plan)
}

/// Plan DROP for `tables` and every registry-level sequence.
///
/// Only named foreign keys can be dropped separately, and only on backends
/// with ALTER; every other foreign key is a hard ordering edge. Sequences and
/// types go once no remaining table uses them.
///
/// A cycle that can't be broken is an error, except on backends without
/// ALTER, where the tables are dropped in the given order with a diagnostic.
pub fn plan_drop(
    meta: &MetaData,
    tables: &[TableId],
    config: &BackendConfig,
    checkfirst: &CheckFirst,
) -> Result<DdlPlan> {
    validate_identifiers(meta, tables, config)?;
    let supports_alter = config.supports_alter;
    let sorted = TableSorter::new(meta, tables)
        .with_filter(move |_, _, constraint| {
            if !supports_alter || constraint.name.is_none() {
                FkDisposition::IncludeAlways
            } else {
                FkDisposition::IncludeUnlessCyclic
            }
        })
        .sort();

    let mut plan = DdlPlan::default();
    let order = match sorted {
        Ok(sorted) => {
            plan.diagnostics = sorted.diagnostics.clone();
            if supports_alter {
                for c in &sorted.residual {
                    plan.steps.push(DdlStep::new(drop_constraint(meta, *c)?));
                }
                plan.residual = sorted.residual.clone();
            }
            sorted.drop_order()
        }
        Err(cycle) if !supports_alter => {
            warn!(tables = %cycle, "dropping tables unsorted");
            plan.diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnsortedDrop,
                format!(
                    "can't sort tables for DROP: {}; backend '{}' does not support ALTER, \
                     so tables are dropped in the order given. Mark the foreign keys on the \
                     cycle with use_alter to restore a partial sort",
                    cycle, config.name
                ),
                cycle.tables.clone(),
            ));
            let mut seen = HashSet::new();
            tables.iter().copied().filter(|id| seen.insert(*id)).collect()
        }
        Err(cycle) => return Err(cycle.into()),
    };

    let mut emitter = Emitter::new(meta, config, checkfirst);
    let mut remaining: HashSet<TableId> = meta.table_ids().into_iter().collect();
    for id in order {
        remaining.remove(&id);
        emitter.drop_table(id, &remaining, &mut plan)?;
    }
    for sequence in meta.sequences().filter(|s| s.column().is_none()) {
        emitter.drop_sequence(sequence, &mut plan);
    }

    debug!(steps = plan.len(), residual = plan.residual.len(), "drop plan built");
    Ok(plan)
}

/// Plan DROP for one table and whatever only it used.
pub fn plan_drop_table(
    meta: &MetaData,
    id: TableId,
    config: &BackendConfig,
    checkfirst: &CheckFirst,
) -> Result<DdlPlan> {
    validate_identifiers(meta, &[id], config)?;
    let table = meta.table(id).ok_or_else(|| missing(id))?;

    let mut plan = DdlPlan::default();
    if config.supports_alter {
        for (cid, constraint) in table.foreign_key_constraints() {
            if constraint.is_use_alter() && constraint.name.is_some() {
                let c = ConstraintRef {
                    table: id,
                    constraint: cid,
                };
                plan.steps.push(DdlStep::new(drop_constraint(meta, c)?));
                plan.residual.push(c);
            }
        }
    }

    let mut remaining: HashSet<TableId> = meta.table_ids().into_iter().collect();
    remaining.remove(&id);
    Emitter::new(meta, config, checkfirst).drop_table(id, &remaining, &mut plan)?;
    Ok(plan)
}

/// Plan CREATE or DROP for a single index.
pub fn plan_index(meta: &MetaData, index: IndexRef, create: bool, checkfirst: &CheckFirst) -> Result<DdlPlan> {
    let table = meta.table(index.table).ok_or_else(|| missing(index.table))?;
    let step = index_step(table, index, create, checkfirst)?;
    Ok(DdlPlan {
        steps: vec![step],
        ..Default::default()
    })
}

/// Plan CREATE or DROP for a single sequence. Backends without sequences get
/// an empty plan.
pub fn plan_sequence(
    meta: &MetaData,
    key: &str,
    create: bool,
    config: &BackendConfig,
    checkfirst: &CheckFirst,
) -> Result<DdlPlan> {
    let sequence = meta
        .sequence(key)
        .ok_or_else(|| Error::InvalidRequest(format!("no sequence '{}' in registry", key)))?;
    check_identifier(sequence.name.as_str(), "sequence", config)?;

    let mut plan = DdlPlan::default();
    let mut emitter = Emitter::new(meta, config, checkfirst);
    if create {
        emitter.create_sequence(sequence, &mut plan);
    } else {
        emitter.drop_sequence(sequence, &mut plan);
    }
    Ok(plan)
}

/// Check if a sequence should be created on this backend.
pub fn can_create_sequence(config: &BackendConfig, sequence: &Sequence) -> bool {
    config.supports_sequences && !(config.sequences_optional && sequence.optional)
}

struct Emitter<'a> {
    meta: &'a MetaData,
    config: &'a BackendConfig,
    checkfirst: &'a CheckFirst,
    sequences: HashSet<String>,
    types: HashSet<(Option<String>, String)>,
}

impl<'a> Emitter<'a> {
    fn new(meta: &'a MetaData, config: &'a BackendConfig, checkfirst: &'a CheckFirst) -> Self {
        Self {
            meta,
            config,
            checkfirst,
            sequences: HashSet::new(),
            types: HashSet::new(),
        }
    }

    fn sequence_guard(&self, sequence: &Sequence, create: bool) -> Option<ExistenceGuard> {
        self.checkfirst.sequences.then(|| {
            let probe = ExistenceProbe::Sequence {
                name: sequence.name.as_str().to_string(),
                schema: sequence.schema.as_ref().map(|s| s.as_str().to_string()),
            };
            if create {
                ExistenceGuard::create(probe)
            } else {
                ExistenceGuard::drop(probe)
            }
        })
    }

    fn type_guard(&self, name: &str, schema: Option<&str>, create: bool) -> Option<ExistenceGuard> {
        self.checkfirst.types.then(|| {
            let probe = ExistenceProbe::Type {
                name: name.to_string(),
                schema: schema.map(str::to_string),
            };
            if create {
                ExistenceGuard::create(probe)
            } else {
                ExistenceGuard::drop(probe)
            }
        })
    }

    fn sequence_allowed(&self, sequence: &Sequence, plan: &mut DdlPlan) -> bool {
        if can_create_sequence(self.config, sequence) {
            return true;
        }
        if self.config.supports_sequences {
            plan.diagnostics.push(Diagnostic::new(
                DiagnosticKind::SequenceSkipped,
                format!(
                    "optional sequence '{}' skipped on backend '{}'",
                    sequence.key(),
                    self.config.name
                ),
                Vec::new(),
            ));
        }
        false
    }

    fn create_sequence(&mut self, sequence: &Sequence, plan: &mut DdlPlan) {
        let key = sequence.key();
        if self.sequences.contains(&key) || !self.sequence_allowed(sequence, plan) {
            return;
        }
        let intent = DdlIntent::CreateSequence {
            key: key.clone(),
            name: sequence.name.as_str().to_string(),
            schema: sequence.schema.as_ref().map(|s| s.as_str().to_string()),
        };
        plan.steps
            .push(DdlStep::guarded(intent, self.sequence_guard(sequence, true)));
        self.sequences.insert(key);
    }

    fn drop_sequence(&mut self, sequence: &Sequence, plan: &mut DdlPlan) {
        let key = sequence.key();
        if self.sequences.contains(&key) || !self.sequence_allowed(sequence, plan) {
            return;
        }
        let intent = DdlIntent::DropSequence {
            key: key.clone(),
            name: sequence.name.as_str().to_string(),
            schema: sequence.schema.as_ref().map(|s| s.as_str().to_string()),
        };
        plan.steps
            .push(DdlStep::guarded(intent, self.sequence_guard(sequence, false)));
        self.sequences.insert(key);
    }

    fn create_table(&mut self, id: TableId, fks: Vec<ConstraintId>, plan: &mut DdlPlan) -> Result<()> {
        let meta = self.meta;
        let table = meta.table(id).ok_or_else(|| missing(id))?;

        for column in table.columns() {
            for sequence in column.sequences() {
                // registry-level sequences are emitted once, up front
                let owned = meta
                    .sequence(&sequence.key())
                    .map_or(true, |s| s.column().is_some());
                if owned {
                    self.create_sequence(sequence, plan);
                }
            }
            if self.config.supports_native_enum {
                self.create_type(column, plan);
            }
        }

        let key = table.key().clone();
        let intent = if table.is_view() {
            DdlIntent::CreateView { table: id, key }
        } else {
            DdlIntent::CreateTable {
                table: id,
                key,
                include_foreign_keys: fks,
            }
        };
        plan.steps.push(DdlStep::new(intent));

        if !table.is_view() {
            for i in 0..table.indexes().len() {
                let index = IndexRef { table: id, index: i };
                plan.steps
                    .push(index_step(table, index, true, self.checkfirst)?);
            }
        }

        if self.config.separate_comments() {
            if table.comment().is_some() {
                plan.steps.push(DdlStep::new(DdlIntent::SetTableComment {
                    table: id,
                    key: table.key().clone(),
                }));
            }
            for (i, column) in table.columns().iter().enumerate() {
                if column.comment.is_some() {
                    plan.steps.push(DdlStep::new(DdlIntent::SetColumnComment {
                        column: ColumnRef { table: id, index: i },
                        table: table.key().clone(),
                        column_key: column.key().to_string(),
                    }));
                }
            }
        }
        Ok(())
    }

    fn create_type(&mut self, column: &Column, plan: &mut DdlPlan) {
        let SqlType::Enum {
            name: Some(name),
            schema,
            variants,
        } = &column.sql_type
        else {
            return;
        };
        let type_key = (schema.clone(), name.clone());
        if self.types.contains(&type_key) {
            return;
        }
        let intent = DdlIntent::CreateType {
            name: name.clone(),
            schema: schema.clone(),
            variants: variants.clone(),
        };
        let guard = self.type_guard(name, schema.as_deref(), true);
        plan.steps.push(DdlStep::guarded(intent, guard));
        self.types.insert(type_key);
    }

    fn drop_table(&mut self, id: TableId, remaining: &HashSet<TableId>, plan: &mut DdlPlan) -> Result<()> {
        let meta = self.meta;
        let table = meta.table(id).ok_or_else(|| missing(id))?;
        let key = table.key().clone();
        let intent = if table.is_view() {
            DdlIntent::DropView { table: id, key }
        } else {
            DdlIntent::DropTable { table: id, key }
        };
        plan.steps.push(DdlStep::new(intent));

        let still_used = |pred: &dyn Fn(&Column) -> bool| {
            remaining
                .iter()
                .filter_map(|t| meta.table(*t))
                .any(|t| t.columns().iter().any(pred))
        };

        for column in table.columns() {
            for sequence in column.sequences() {
                let key = sequence.key();
                let owned = meta.sequence(&key).map_or(true, |s| s.column().is_some());
                if owned && !still_used(&|c: &Column| c.sequences().any(|s| s.key() == key)) {
                    self.drop_sequence(sequence, plan);
                }
            }
            if !self.config.supports_native_enum {
                continue;
            }
            let Some((name, schema)) = column.sql_type.server_type() else {
                continue;
            };
            let type_key = (schema.map(str::to_string), name.to_string());
            if self.types.contains(&type_key)
                || still_used(&|c: &Column| c.sql_type.server_type() == Some((name, schema)))
            {
                continue;
            }
            let intent = DdlIntent::DropType {
                name: name.to_string(),
                schema: schema.map(str::to_string),
            };
            let guard = self.type_guard(name, schema, false);
            plan.steps.push(DdlStep::guarded(intent, guard));
            self.types.insert(type_key);
        }
        Ok(())
    }
}

fn index_step(table: &Table, index: IndexRef, create: bool, checkfirst: &CheckFirst) -> Result<DdlStep> {
    let ix = table.indexes().get(index.index).ok_or_else(|| {
        Error::InvalidRequest(format!("no index #{} on table '{}'", index.index, table.key()))
    })?;
    let name = ix
        .name
        .as_ref()
        .map(|n| n.as_str().to_string())
        .ok_or_else(|| {
            Error::argument(format!("index on table '{}' has no name", table.key()))
        })?;
    let probe = ExistenceProbe::Index {
        table: table.key().clone(),
        name: name.clone(),
    };
    let step = if create {
        DdlStep::guarded(
            DdlIntent::CreateIndex {
                index,
                table: table.key().clone(),
                name,
                unique: ix.unique,
            },
            checkfirst.indexes.then(|| ExistenceGuard::create(probe)),
        )
    } else {
        DdlStep::guarded(
            DdlIntent::DropIndex {
                index,
                table: table.key().clone(),
                name,
            },
            checkfirst.indexes.then(|| ExistenceGuard::drop(probe)),
        )
    };
    Ok(step)
}

fn add_constraint(meta: &MetaData, c: ConstraintRef) -> Result<DdlIntent> {
    let table = meta.table(c.table).ok_or_else(|| missing(c.table))?;
    let constraint = table.constraint(c.constraint).ok_or_else(|| {
        Error::InvalidRequest(format!("no constraint #{} on table '{}'", c.constraint.0, table.key()))
    })?;
    Ok(DdlIntent::AddConstraint {
        constraint: c,
        table: table.key().clone(),
        name: constraint.name.as_ref().map(|n| n.as_str().to_string()),
    })
}

fn drop_constraint(meta: &MetaData, c: ConstraintRef) -> Result<DdlIntent> {
    let table = meta.table(c.table).ok_or_else(|| missing(c.table))?;
    let constraint = table.constraint(c.constraint).ok_or_else(|| {
        Error::InvalidRequest(format!("no constraint #{} on table '{}'", c.constraint.0, table.key()))
    })?;
    let name = constraint.name.as_ref().ok_or_else(|| {
        Error::argument(format!(
            "can't emit DROP CONSTRAINT for an unnamed foreign key on table '{}'; \
             give the constraint a name to drop it separately",
            table.key()
        ))
    })?;
    Ok(DdlIntent::DropConstraint {
        constraint: c,
        table: table.key().clone(),
        name: Some(name.as_str().to_string()),
    })
}

fn check_identifier(name: &str, what: &str, config: &BackendConfig) -> Result<()> {
    if config.identifier_fits(&Identifier::new(name)) {
        return Ok(());
    }
    Err(Error::argument(format!(
        "{} name '{}' is too long; backend '{}' allows at most {} characters",
        what, name, config.name, config.max_identifier_length
    )))
}

fn validate_identifiers(meta: &MetaData, tables: &[TableId], config: &BackendConfig) -> Result<()> {
    for id in tables {
        let table = meta.table(*id).ok_or_else(|| missing(*id))?;
        check_identifier(table.name().as_str(), "table", config)?;
        if let Some(schema) = table.schema() {
            check_identifier(schema.as_str(), "schema", config)?;
        }
        for column in table.columns() {
            check_identifier(column.name.as_str(), "column", config)?;
            for sequence in column.sequences() {
                check_identifier(sequence.name.as_str(), "sequence", config)?;
            }
        }
        for (_, constraint) in table.constraints() {
            if let Some(name) = &constraint.name {
                check_identifier(name.as_str(), "constraint", config)?;
            }
        }
        for index in table.indexes() {
            if let Some(name) = &index.name {
                check_identifier(name.as_str(), "index", config)?;
            }
        }
    }
    Ok(())
}

fn missing(id: TableId) -> Error {
    Error::NoSuchTable(format!("#{}", id.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        Column, Constraint, ForeignKey, Index, Redefine, Sequence, SqlType, TableDef,
    };

    fn id_col() -> Column {
        Column::new("id", SqlType::Integer).primary_key()
    }

    fn abc() -> (MetaData, Vec<TableId>) {
        let mut meta = MetaData::new();
        let a = meta
            .add_table(TableDef::new("a").column(id_col()), Redefine::Error)
            .unwrap();
        let b = meta
            .add_table(
                TableDef::new("b")
                    .column(id_col())
                    .column(Column::new("a_id", SqlType::Integer).references("a.id").indexed()),
                Redefine::Error,
            )
            .unwrap();
        let c = meta
            .add_table(
                TableDef::new("c")
                    .column(id_col())
                    .column(Column::new("b_id", SqlType::Integer).references("b.id")),
                Redefine::Error,
            )
            .unwrap();
        (meta, vec![c, b, a])
    }

    fn descriptions(plan: &DdlPlan) -> Vec<String> {
        plan.intents().map(|i| i.description()).collect()
    }

    #[test]
    fn test_create_order_and_indexes() {
        let (meta, ids) = abc();
        let plan = plan_create(&meta, &ids, &BackendConfig::default(), &CheckFirst::none()).unwrap();
        assert_eq!(
            descriptions(&plan),
            vec![
                "CREATE TABLE a",
                "CREATE TABLE b",
                "CREATE INDEX ix_b_a_id ON b",
                "CREATE TABLE c",
            ]
        );
        assert!(plan.residual.is_empty());
        assert!(plan.steps.iter().all(|s| s.guard.is_none()));
    }

    #[test]
    fn test_drop_is_reverse() {
        let (meta, ids) = abc();
        let plan = plan_drop(&meta, &ids, &BackendConfig::default(), &CheckFirst::none()).unwrap();
        assert_eq!(
            descriptions(&plan),
            vec!["DROP TABLE c", "DROP TABLE b", "DROP TABLE a"]
        );
    }

    fn cyclic(named: bool) -> MetaData {
        let mut meta = MetaData::new();
        let mut x_fk = ForeignKey::new("y.id");
        let mut y_fk = ForeignKey::new("x.id");
        if named {
            x_fk = x_fk.with_name("fk_x_y");
            y_fk = y_fk.with_name("fk_y_x");
        }
        meta.add_table(
            TableDef::new("x")
                .column(id_col())
                .column(Column::new("y_id", SqlType::Integer).with_foreign_key(x_fk)),
            Redefine::Error,
        )
        .unwrap();
        meta.add_table(
            TableDef::new("y")
                .column(id_col())
                .column(Column::new("x_id", SqlType::Integer).with_foreign_key(y_fk)),
            Redefine::Error,
        )
        .unwrap();
        meta
    }

    #[test]
    fn test_cycle_gets_alter() {
        let meta = cyclic(true);
        let ids = meta.table_ids();
        let plan = plan_create(&meta, &ids, &BackendConfig::default(), &CheckFirst::none()).unwrap();
        assert_eq!(plan.residual.len(), 1);
        assert_eq!(plan.diagnostics[0].kind, DiagnosticKind::CycleBroken);
        let last = &plan.steps.last().unwrap().intent;
        assert!(matches!(last, DdlIntent::AddConstraint { .. }));
    }

    #[test]
    fn test_cycle_inlined_without_alter() {
        let meta = cyclic(true);
        let ids = meta.table_ids();
        let plan = plan_create(&meta, &ids, &BackendConfig::sqlite(), &CheckFirst::none()).unwrap();
        assert!(plan.residual.is_empty());
        assert!(plan
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::ResidualInlined));
        let inline: usize = plan
            .intents()
            .map(|i| match i {
                DdlIntent::CreateTable {
                    include_foreign_keys,
                    ..
                } => include_foreign_keys.len(),
                _ => 0,
            })
            .sum();
        assert_eq!(inline, 2);
    }

    #[test]
    fn test_drop_cycle_named_and_unnamed() {
        let meta = cyclic(true);
        let ids = meta.table_ids();
        let plan = plan_drop(&meta, &ids, &BackendConfig::default(), &CheckFirst::none()).unwrap();
        assert!(matches!(
            plan.steps[0].intent,
            DdlIntent::DropConstraint { .. }
        ));

        let meta = cyclic(false);
        let ids = meta.table_ids();
        let err = plan_drop(&meta, &ids, &BackendConfig::default(), &CheckFirst::none()).unwrap_err();
        match err {
            Error::Cycle(cycle) => assert_eq!(cycle.tables.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unnamed_use_alter_drop_is_argument_error() {
        let mut meta = MetaData::new();
        meta.add_table(TableDef::new("p").column(id_col()), Redefine::Error)
            .unwrap();
        meta.add_table(
            TableDef::new("q").column(id_col()).column(
                Column::new("p_id", SqlType::Integer)
                    .with_foreign_key(ForeignKey::new("p.id").with_use_alter()),
            ),
            Redefine::Error,
        )
        .unwrap();
        let ids = meta.table_ids();
        let err = plan_drop(&meta, &ids, &BackendConfig::default(), &CheckFirst::none()).unwrap_err();
        assert!(err.is_argument());

        // without ALTER the key goes with its table
        let plan = plan_drop(&meta, &ids, &BackendConfig::sqlite(), &CheckFirst::none()).unwrap();
        assert_eq!(descriptions(&plan), vec!["DROP TABLE q", "DROP TABLE p"]);
    }

    #[test]
    fn test_guards_follow_checkfirst() {
        let (meta, ids) = abc();
        let plan = plan_create(&meta, &ids, &BackendConfig::default(), &CheckFirst::all()).unwrap();
        let guarded: Vec<_> = plan.steps.iter().filter(|s| s.guard.is_some()).collect();
        assert_eq!(guarded.len(), 1);
        assert!(guarded[0].guard.as_ref().unwrap().should_skip(true));
    }

    #[test]
    fn test_sequences_and_types() {
        let mut meta = MetaData::new();
        meta.add_sequence(Sequence::new("global_seq")).unwrap();
        meta.add_table(
            TableDef::new("t")
                .column(id_col().with_sequence(Sequence::new("t_id_seq")))
                .column(Column::new("mood", SqlType::named_enum("mood", ["ok", "sad"])))
                .with_comment("things"),
            Redefine::Error,
        )
        .unwrap();
        meta.add_table(
            TableDef::new("u")
                .column(id_col())
                .column(Column::new("mood", SqlType::named_enum("mood", ["ok", "sad"]))),
            Redefine::Error,
        )
        .unwrap();
        let ids = meta.table_ids();
        let pg = BackendConfig::postgres();

        let plan = plan_create(&meta, &ids, &pg, &CheckFirst::none()).unwrap();
        assert_eq!(
            descriptions(&plan),
            vec![
                "CREATE SEQUENCE global_seq",
                "CREATE SEQUENCE t_id_seq",
                "CREATE TYPE mood AS ENUM",
                "CREATE TABLE t",
                "COMMENT ON TABLE t",
                "CREATE TABLE u",
            ]
        );

        let plan = plan_drop(&meta, &ids, &pg, &CheckFirst::none()).unwrap();
        assert_eq!(
            descriptions(&plan),
            vec![
                "DROP TABLE u",
                "DROP TABLE t",
                "DROP SEQUENCE t_id_seq",
                "DROP TYPE mood",
                "DROP SEQUENCE global_seq",
            ]
        );

        let plan = plan_create(&meta, &ids, &BackendConfig::sqlite(), &CheckFirst::none()).unwrap();
        assert_eq!(descriptions(&plan), vec!["CREATE TABLE t", "CREATE TABLE u"]);
    }

    #[test]
    fn test_optional_sequence_skipped() {
        let mut meta = MetaData::new();
        meta.add_sequence(Sequence::new("opt").optional()).unwrap();
        let plan = plan_create(&meta, &[], &BackendConfig::postgres(), &CheckFirst::none()).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.diagnostics[0].kind, DiagnosticKind::SequenceSkipped);

        let config = BackendConfig::postgres().with_sequences(true, false);
        let plan = plan_create(&meta, &[], &config, &CheckFirst::none()).unwrap();
        assert_eq!(descriptions(&plan), vec!["CREATE SEQUENCE opt"]);
    }

    #[test]
    fn test_identifier_length() {
        let mut meta = MetaData::new();
        let id = meta
            .add_table(TableDef::new("x".repeat(70)).column(id_col()), Redefine::Error)
            .unwrap();
        let err = plan_create(&meta, &[id], &BackendConfig::postgres(), &CheckFirst::none()).unwrap_err();
        assert!(err.is_argument());
        assert!(plan_create(&meta, &[id], &BackendConfig::sqlite(), &CheckFirst::none()).is_ok());
    }

    #[test]
    fn test_single_table_use_alter() {
        let mut meta = MetaData::new();
        meta.add_table(TableDef::new("p").column(id_col()), Redefine::Error)
            .unwrap();
        let q = meta
            .add_table(
                TableDef::new("q")
                    .column(id_col())
                    .column(Column::new("p_id", SqlType::Integer))
                    .constraint(
                        Constraint::foreign_key(["p_id"], ["p.id"])
                            .with_name("fk_q_p")
                            .with_use_alter(),
                    )
                    .index(Index::new("ix_q_p", ["p_id"])),
                Redefine::Error,
            )
            .unwrap();
        let plan = plan_create_table(&meta, q, &BackendConfig::default(), &CheckFirst::none()).unwrap();
        assert_eq!(
            descriptions(&plan),
            vec![
                "CREATE TABLE q",
                "CREATE INDEX ix_q_p ON q",
                "ALTER TABLE q ADD CONSTRAINT fk_q_p",
            ]
        );

        let plan = plan_drop_table(&meta, q, &BackendConfig::default(), &CheckFirst::none()).unwrap();
        assert_eq!(
            descriptions(&plan),
            vec!["ALTER TABLE q DROP CONSTRAINT fk_q_p", "DROP TABLE q"]
        );
    }
}
