//! Executing plans against a backend.

use super::backend::{Collaborators, ExistenceProbe};
use super::intent::DdlIntent;
use super::plan::{self, DdlPlan};
use crate::catalog::{DdlEvent, DdlEventKind, IndexRef, MetaData, SchemaItemRef, TableId};
use crate::config::{BackendConfig, CheckFirst};
use crate::diagnostic::Diagnostic;
use crate::error::{Error, Result};
use tracing::{debug, info, instrument};

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Intents executed, in order.
    pub executed: Vec<DdlIntent>,
    /// Intents skipped by an existence check.
    pub skipped: Vec<DdlIntent>,
    /// Non-fatal findings from planning.
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    /// Check if nothing was executed.
    pub fn is_noop(&self) -> bool {
        self.executed.is_empty()
    }

    /// Descriptions of executed intents.
    pub fn statements(&self) -> Vec<String> {
        self.executed.iter().map(DdlIntent::description).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Create,
    Drop,
}

struct Run<'a, 'b> {
    meta: &'a MetaData,
    config: &'a BackendConfig,
    checkfirst: CheckFirst,
    backend: Collaborators<'b>,
    direction: Direction,
}

impl Run<'_, '_> {
    fn run_event(&self, target: SchemaItemRef) -> DdlEvent {
        DdlEvent {
            kind: match self.direction {
                Direction::Create => DdlEventKind::CreateRun,
                Direction::Drop => DdlEventKind::DropRun,
            },
            target,
            intent: None,
            backend: self.config.name.clone(),
            checkfirst: self.checkfirst,
        }
    }

    /// Keep the tables whose existence allows this run to touch them.
    fn probe_tables(&self, tables: &[TableId]) -> Result<Vec<TableId>> {
        let mut kept = Vec::with_capacity(tables.len());
        for id in tables {
            let table = self
                .meta
                .table(*id)
                .ok_or_else(|| Error::NoSuchTable(format!("#{}", id.index())))?;
            let check = if table.is_view() {
                self.checkfirst.views
            } else {
                self.checkfirst.tables
            };
            if !check {
                kept.push(*id);
                continue;
            }
            let present = ExistenceProbe::Table(table.key().clone()).check(self.backend.existence)?;
            let wanted = match self.direction {
                Direction::Create => !present,
                Direction::Drop => present,
            };
            if wanted {
                kept.push(*id);
            } else {
                debug!(table = %table.key(), present, "table skipped by existence check");
            }
        }
        Ok(kept)
    }

    /// Dispatch run events around the plan and execute each step.
    fn execute(&self, target: SchemaItemRef, plan: DdlPlan) -> Result<RunReport> {
        let run_event = self.run_event(target);
        self.meta.notify_before_ddl(&run_event);

        let mut report = RunReport {
            diagnostics: plan.diagnostics,
            ..Default::default()
        };
        for step in plan.steps {
            if let Some(guard) = &step.guard {
                let present = guard.probe.check(self.backend.existence)?;
                if guard.should_skip(present) {
                    debug!(intent = %step.intent, present, "step skipped by existence check");
                    report.skipped.push(step.intent);
                    continue;
                }
            }

            let event = DdlEvent {
                kind: step.intent.event_kind(),
                target: step.intent.target(),
                intent: Some(step.intent.clone()),
                backend: self.config.name.clone(),
                checkfirst: self.checkfirst,
            };
            self.meta.notify_before_ddl(&event);
            let compiled = self.backend.compiler.compile(self.meta, &step.intent)?;
            self.backend.executor.execute(&compiled, &step.intent)?;
            debug!(statement = %compiled.text, "ddl executed");
            self.meta.notify_after_ddl(&event);
            report.executed.push(step.intent);
        }

        self.meta.notify_after_ddl(&run_event);
        info!(
            backend = %self.config.name,
            executed = report.executed.len(),
            skipped = report.skipped.len(),
            diagnostics = report.diagnostics.len(),
            "ddl run finished"
        );
        Ok(report)
    }
}

/// Issues CREATE statements for a registry.
///
/// ```ignore
/// let backend = MemoryBackend::new();
/// let report = SchemaGenerator::new(&meta, &BackendConfig::postgres())
///     .with_checkfirst(CheckFirst::all())
///     .create_all(Collaborators::from_backend(&backend))?;
/// ```
pub struct SchemaGenerator<'a> {
    meta: &'a MetaData,
    config: &'a BackendConfig,
    checkfirst: CheckFirst,
}

impl<'a> SchemaGenerator<'a> {
    /// Generator with no existence checks.
    pub fn new(meta: &'a MetaData, config: &'a BackendConfig) -> Self {
        Self {
            meta,
            config,
            checkfirst: CheckFirst::none(),
        }
    }

    /// Set the existence-check policy.
    pub fn with_checkfirst(mut self, checkfirst: CheckFirst) -> Self {
        self.checkfirst = checkfirst;
        self
    }

    fn run<'b>(&self, backend: Collaborators<'b>) -> Run<'a, 'b> {
        Run {
            meta: self.meta,
            config: self.config,
            checkfirst: self.checkfirst,
            backend,
            direction: Direction::Create,
        }
    }

    /// Create every table and sequence in the registry.
    #[instrument(skip_all, fields(backend = %self.config.name))]
    pub fn create_all(&self, backend: Collaborators<'_>) -> Result<RunReport> {
        let tables = self.meta.table_ids();
        self.create_tables(&tables, backend)
    }

    /// Create a subset of tables, plus every registry-level sequence.
    #[instrument(skip_all, fields(backend = %self.config.name, tables = tables.len()))]
    pub fn create_tables(&self, tables: &[TableId], backend: Collaborators<'_>) -> Result<RunReport> {
        let run = self.run(backend);
        let tables = run.probe_tables(tables)?;
        let plan = plan::plan_create(self.meta, &tables, self.config, &self.checkfirst)?;
        run.execute(SchemaItemRef::Registry, plan)
    }

    /// Create one table with its sequences, types, indexes and comments.
    #[instrument(skip_all, fields(backend = %self.config.name))]
    pub fn create_table(&self, table: TableId, backend: Collaborators<'_>) -> Result<RunReport> {
        let run = self.run(backend);
        let plan = if run.probe_tables(&[table])?.is_empty() {
            DdlPlan::default()
        } else {
            plan::plan_create_table(self.meta, table, self.config, &self.checkfirst)?
        };
        run.execute(SchemaItemRef::Table(table), plan)
    }

    /// Create one index.
    #[instrument(skip_all, fields(backend = %self.config.name))]
    pub fn create_index(&self, index: IndexRef, backend: Collaborators<'_>) -> Result<RunReport> {
        let plan = plan::plan_index(self.meta, index, true, &self.checkfirst)?;
        self.run(backend).execute(SchemaItemRef::Index(index), plan)
    }

    /// Create one sequence by registry key.
    #[instrument(skip_all, fields(backend = %self.config.name, sequence = key))]
    pub fn create_sequence(&self, key: &str, backend: Collaborators<'_>) -> Result<RunReport> {
        let plan = plan::plan_sequence(self.meta, key, true, self.config, &self.checkfirst)?;
        self.run(backend)
            .execute(SchemaItemRef::Sequence(key.to_string()), plan)
    }
}

/// Issues DROP statements for a registry.
pub struct SchemaDropper<'a> {
    meta: &'a MetaData,
    config: &'a BackendConfig,
    checkfirst: CheckFirst,
}

impl<'a> SchemaDropper<'a> {
    /// Dropper with no existence checks.
    pub fn new(meta: &'a MetaData, config: &'a BackendConfig) -> Self {
        Self {
            meta,
            config,
            checkfirst: CheckFirst::none(),
        }
    }

    /// Set the existence-check policy.
    pub fn with_checkfirst(mut self, checkfirst: CheckFirst) -> Self {
        self.checkfirst = checkfirst;
        self
    }

    fn run<'b>(&self, backend: Collaborators<'b>) -> Run<'a, 'b> {
        Run {
            meta: self.meta,
            config: self.config,
            checkfirst: self.checkfirst,
            backend,
            direction: Direction::Drop,
        }
    }

    /// Drop every table and sequence in the registry.
    #[instrument(skip_all, fields(backend = %self.config.name))]
    pub fn drop_all(&self, backend: Collaborators<'_>) -> Result<RunReport> {
        let tables = self.meta.table_ids();
        self.drop_tables(&tables, backend)
    }

    /// Drop a subset of tables, plus every registry-level sequence.
    #[instrument(skip_all, fields(backend = %self.config.name, tables = tables.len()))]
    pub fn drop_tables(&self, tables: &[TableId], backend: Collaborators<'_>) -> Result<RunReport> {
        let run = self.run(backend);
        let tables = run.probe_tables(tables)?;
        let plan = plan::plan_drop(self.meta, &tables, self.config, &self.checkfirst)?;
        run.execute(SchemaItemRef::Registry, plan)
    }

    /// Drop one table and whatever only it used.
    #[instrument(skip_all, fields(backend = %self.config.name))]
    pub fn drop_table(&self, table: TableId, backend: Collaborators<'_>) -> Result<RunReport> {
        let run = self.run(backend);
        let plan = if run.probe_tables(&[table])?.is_empty() {
            DdlPlan::default()
        } else {
            plan::plan_drop_table(self.meta, table, self.config, &self.checkfirst)?
        };
        run.execute(SchemaItemRef::Table(table), plan)
    }

    /// Drop one index.
    #[instrument(skip_all, fields(backend = %self.config.name))]
    pub fn drop_index(&self, index: IndexRef, backend: Collaborators<'_>) -> Result<RunReport> {
        let plan = plan::plan_index(self.meta, index, false, &self.checkfirst)?;
        self.run(backend).execute(SchemaItemRef::Index(index), plan)
    }

    /// Drop one sequence by registry key.
    #[instrument(skip_all, fields(backend = %self.config.name, sequence = key))]
    pub fn drop_sequence(&self, key: &str, backend: Collaborators<'_>) -> Result<RunReport> {
        let plan = plan::plan_sequence(self.meta, key, false, self.config, &self.checkfirst)?;
        self.run(backend)
            .execute(SchemaItemRef::Sequence(key.to_string()), plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, MemoryObserver, ObserverScope, Redefine, SqlType, TableDef};
    use crate::ddl::MemoryBackend;
    use std::sync::Arc;

    fn registry() -> MetaData {
        let mut meta = MetaData::new();
        meta.add_table(
            TableDef::new("users").column(Column::new("id", SqlType::Integer).primary_key()),
            Redefine::Error,
        )
        .unwrap();
        meta.add_table(
            TableDef::new("orders")
                .column(Column::new("id", SqlType::Integer).primary_key())
                .column(
                    Column::new("user_id", SqlType::Integer)
                        .references("users.id")
                        .indexed(),
                ),
            Redefine::Error,
        )
        .unwrap();
        meta
    }

    #[test]
    fn test_create_then_drop() {
        let meta = registry();
        let backend = MemoryBackend::new();
        let config = BackendConfig::default();

        let report = SchemaGenerator::new(&meta, &config)
            .create_all(Collaborators::from_backend(&backend))
            .unwrap();
        assert_eq!(
            report.statements(),
            vec![
                "CREATE TABLE users",
                "CREATE TABLE orders",
                "CREATE INDEX ix_orders_user_id ON orders",
            ]
        );
        assert_eq!(backend.table_count(), 2);

        let report = SchemaDropper::new(&meta, &config)
            .drop_all(Collaborators::from_backend(&backend))
            .unwrap();
        assert_eq!(report.statements(), vec!["DROP TABLE orders", "DROP TABLE users"]);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_checkfirst_makes_create_idempotent() {
        let meta = registry();
        let backend = MemoryBackend::new();
        let config = BackendConfig::default();
        let generator = SchemaGenerator::new(&meta, &config).with_checkfirst(CheckFirst::all());

        generator.create_all(Collaborators::from_backend(&backend)).unwrap();
        let again = generator.create_all(Collaborators::from_backend(&backend)).unwrap();
        assert!(again.is_noop());

        let err = SchemaGenerator::new(&meta, &config)
            .create_all(Collaborators::from_backend(&backend))
            .unwrap_err();
        assert!(matches!(err, crate::Error::Backend(_)));
    }

    #[test]
    fn test_run_and_item_events() {
        let mut meta = registry();
        let observer = MemoryObserver::new();
        meta.add_observer(ObserverScope::Registry, Arc::new(observer.clone()));
        observer.clear();

        let backend = MemoryBackend::new();
        let config = BackendConfig::default();
        SchemaGenerator::new(&meta, &config)
            .create_all(Collaborators::from_backend(&backend))
            .unwrap();

        let events = observer.ddl_events();
        // run bracket plus three items, before and after each
        assert_eq!(events.len(), 8);
        assert!(events[0].0);
        assert_eq!(events[0].1.kind, DdlEventKind::CreateRun);
        assert_eq!(events[7].1.kind, DdlEventKind::CreateRun);
        assert!(!events[7].0);
        assert_eq!(events[1].1.kind, DdlEventKind::Create);
    }

    #[test]
    fn test_single_items() {
        let meta = registry();
        let backend = MemoryBackend::new();
        let config = BackendConfig::default();
        let users = meta.get_table("users", None).unwrap().id();
        let orders = meta.get_table("orders", None).unwrap().id();
        let generator = SchemaGenerator::new(&meta, &config).with_checkfirst(CheckFirst::tables());

        generator
            .create_table(users, Collaborators::from_backend(&backend))
            .unwrap();
        let report = generator
            .create_table(orders, Collaborators::from_backend(&backend))
            .unwrap();
        assert_eq!(report.executed.len(), 2);
        assert!(generator
            .create_table(orders, Collaborators::from_backend(&backend))
            .unwrap()
            .is_noop());

        let index = IndexRef {
            table: orders,
            index: 0,
        };
        let dropper = SchemaDropper::new(&meta, &config);
        dropper
            .drop_index(index, Collaborators::from_backend(&backend))
            .unwrap();
        assert_eq!(backend.index_count(), 0);
        generator
            .create_index(index, Collaborators::from_backend(&backend))
            .unwrap();
        assert_eq!(backend.index_count(), 1);
    }
}
