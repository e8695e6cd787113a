//! In-memory backend for tests and dry runs.

use super::backend::{
    BackendError, CompiledDdl, DdlCompiler, DdlExecutor, ExistenceCheck,
};
use super::intent::DdlIntent;
use crate::catalog::{MetaData, TableKey};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

type Named = (Option<String>, String);

#[derive(Debug, Default)]
struct State {
    tables: BTreeSet<TableKey>,
    indexes: BTreeMap<Named, TableKey>,
    sequences: BTreeSet<Named>,
    types: BTreeSet<Named>,
    constraints: BTreeSet<(TableKey, String)>,
    comments: usize,
    statements: Vec<String>,
    probes: usize,
    fail_on: Option<String>,
    fail_probes: bool,
}

/// A backend that tracks created objects in memory.
///
/// Compiles every intent to its description. Creating something that exists,
/// or dropping something that doesn't, fails the way a real database would.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any statement whose text contains `pattern`.
    pub fn fail_on(self, pattern: impl Into<String>) -> Self {
        self.state.lock().fail_on = Some(pattern.into());
        self
    }

    /// Fail every existence check.
    pub fn fail_probes(self) -> Self {
        self.state.lock().fail_probes = true;
        self
    }

    /// Executed statements, in order.
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    /// Forget the statement log.
    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.statements.clear();
        state.probes = 0;
    }

    /// Number of existence checks answered.
    pub fn probe_count(&self) -> usize {
        self.state.lock().probes
    }

    /// Number of tables and views.
    pub fn table_count(&self) -> usize {
        self.state.lock().tables.len()
    }

    /// Number of indexes.
    pub fn index_count(&self) -> usize {
        self.state.lock().indexes.len()
    }

    /// Number of sequences.
    pub fn sequence_count(&self) -> usize {
        self.state.lock().sequences.len()
    }

    /// Number of server-side types.
    pub fn type_count(&self) -> usize {
        self.state.lock().types.len()
    }

    /// Number of constraints added with ALTER.
    pub fn constraint_count(&self) -> usize {
        self.state.lock().constraints.len()
    }

    /// Number of comment statements applied.
    pub fn comment_count(&self) -> usize {
        self.state.lock().comments
    }

    /// Check if a table exists.
    pub fn contains_table(&self, key: &TableKey) -> bool {
        self.state.lock().tables.contains(key)
    }

    /// Check if no schema object exists.
    pub fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.tables.is_empty()
            && state.indexes.is_empty()
            && state.sequences.is_empty()
            && state.types.is_empty()
            && state.constraints.is_empty()
    }
}

fn named(name: &str, schema: Option<&str>) -> Named {
    (schema.map(str::to_string), name.to_string())
}

fn fail(statement: &str, message: impl Into<String>) -> BackendError {
    BackendError::Execution {
        statement: statement.to_string(),
        message: message.into(),
    }
}

impl MemoryBackend {
    fn probe(
        &self,
        what: &str,
        name: &str,
        found: impl FnOnce(&State) -> bool,
    ) -> Result<bool, BackendError> {
        let mut state = self.state.lock();
        state.probes += 1;
        if state.fail_probes {
            return Err(BackendError::Existence(format!(
                "could not look up {} \"{}\"",
                what, name
            )));
        }
        Ok(found(&*state))
    }
}

impl ExistenceCheck for MemoryBackend {
    fn has_table(&self, name: &str, schema: Option<&str>) -> Result<bool, BackendError> {
        let key = TableKey::new(schema, name);
        self.probe("relation", name, |state| state.tables.contains(&key))
    }

    fn has_index(
        &self,
        _table: &str,
        name: &str,
        schema: Option<&str>,
    ) -> Result<bool, BackendError> {
        let ix = named(name, schema);
        self.probe("index", name, |state| state.indexes.contains_key(&ix))
    }

    fn has_sequence(&self, name: &str, schema: Option<&str>) -> Result<bool, BackendError> {
        let seq = named(name, schema);
        self.probe("sequence", name, |state| state.sequences.contains(&seq))
    }

    fn has_type(&self, name: &str, schema: Option<&str>) -> Result<bool, BackendError> {
        let ty = named(name, schema);
        self.probe("type", name, |state| state.types.contains(&ty))
    }
}

impl DdlCompiler for MemoryBackend {
    fn compile(&self, _meta: &MetaData, intent: &DdlIntent) -> Result<CompiledDdl, BackendError> {
        Ok(CompiledDdl::text(intent.description()))
    }
}

impl DdlExecutor for MemoryBackend {
    fn execute(&self, ddl: &CompiledDdl, intent: &DdlIntent) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let text = ddl.text.as_str();
        if let Some(pattern) = &state.fail_on {
            if text.contains(pattern.as_str()) {
                return Err(fail(text, "injected failure"));
            }
        }

        match intent {
            DdlIntent::CreateTable { key, .. } | DdlIntent::CreateView { key, .. } => {
                if !state.tables.insert(key.clone()) {
                    return Err(fail(text, format!("relation \"{}\" already exists", key)));
                }
            }
            DdlIntent::DropTable { key, .. } | DdlIntent::DropView { key, .. } => {
                if !state.tables.remove(key) {
                    return Err(fail(text, format!("relation \"{}\" does not exist", key)));
                }
                state.indexes.retain(|_, table| *table != *key);
                state.constraints.retain(|(table, _)| table != key);
            }
            DdlIntent::CreateIndex { table, name, .. } => {
                if !state.tables.contains(table) {
                    return Err(fail(text, format!("relation \"{}\" does not exist", table)));
                }
                let ix = named(name, table.schema.as_deref());
                if state.indexes.contains_key(&ix) {
                    return Err(fail(text, format!("index \"{}\" already exists", name)));
                }
                state.indexes.insert(ix, table.clone());
            }
            DdlIntent::DropIndex { table, name, .. } => {
                if state
                    .indexes
                    .remove(&named(name, table.schema.as_deref()))
                    .is_none()
                {
                    return Err(fail(text, format!("index \"{}\" does not exist", name)));
                }
            }
            DdlIntent::CreateSequence { name, schema, .. } => {
                if !state.sequences.insert(named(name, schema.as_deref())) {
                    return Err(fail(text, format!("sequence \"{}\" already exists", name)));
                }
            }
            DdlIntent::DropSequence { name, schema, .. } => {
                if !state.sequences.remove(&named(name, schema.as_deref())) {
                    return Err(fail(text, format!("sequence \"{}\" does not exist", name)));
                }
            }
            DdlIntent::CreateType { name, schema, .. } => {
                if !state.types.insert(named(name, schema.as_deref())) {
                    return Err(fail(text, format!("type \"{}\" already exists", name)));
                }
            }
            DdlIntent::DropType { name, schema } => {
                if !state.types.remove(&named(name, schema.as_deref())) {
                    return Err(fail(text, format!("type \"{}\" does not exist", name)));
                }
            }
            DdlIntent::AddConstraint {
                table,
                name,
                constraint,
            } => {
                if !state.tables.contains(table) {
                    return Err(fail(text, format!("relation \"{}\" does not exist", table)));
                }
                let name = name
                    .clone()
                    .unwrap_or_else(|| format!("#{}", constraint.constraint.0));
                if !state.constraints.insert((table.clone(), name.clone())) {
                    return Err(fail(text, format!("constraint \"{}\" already exists", name)));
                }
            }
            DdlIntent::DropConstraint { table, name, .. } => {
                let name = name.clone().unwrap_or_default();
                if !state.constraints.remove(&(table.clone(), name.clone())) {
                    return Err(fail(text, format!("constraint \"{}\" does not exist", name)));
                }
            }
            DdlIntent::SetTableComment { key: table, .. }
            | DdlIntent::SetColumnComment { table, .. } => {
                if !state.tables.contains(table) {
                    return Err(fail(text, format!("relation \"{}\" does not exist", table)));
                }
                state.comments += 1;
            }
        }

        state.statements.push(ddl.text.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableId;

    fn create(name: &str) -> DdlIntent {
        DdlIntent::CreateTable {
            table: TableId(0),
            key: TableKey::new(None, name),
            include_foreign_keys: Vec::new(),
        }
    }

    fn run(backend: &MemoryBackend, intent: &DdlIntent) -> Result<(), BackendError> {
        let ddl = backend.compile(&MetaData::new(), intent)?;
        backend.execute(&ddl, intent)
    }

    #[test]
    fn test_create_twice_fails() {
        let backend = MemoryBackend::new();
        run(&backend, &create("t")).unwrap();
        assert!(backend.has_table("t", None).unwrap());
        let err = run(&backend, &create("t")).unwrap_err();
        assert!(matches!(err, BackendError::Execution { .. }));
        assert_eq!(backend.statements(), vec!["CREATE TABLE t"]);
        assert_eq!(backend.probe_count(), 1);
    }

    #[test]
    fn test_drop_table_takes_indexes() {
        let backend = MemoryBackend::new();
        run(&backend, &create("t")).unwrap();
        let index = DdlIntent::CreateIndex {
            index: crate::catalog::IndexRef {
                table: TableId(0),
                index: 0,
            },
            table: TableKey::new(None, "t"),
            name: "ix_t".into(),
            unique: false,
        };
        run(&backend, &index).unwrap();
        assert!(backend.has_index("t", "ix_t", None).unwrap());

        run(
            &backend,
            &DdlIntent::DropTable {
                table: TableId(0),
                key: TableKey::new(None, "t"),
            },
        )
        .unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn test_injected_failure() {
        let backend = MemoryBackend::new().fail_on("CREATE TABLE b");
        run(&backend, &create("a")).unwrap();
        assert!(run(&backend, &create("b")).is_err());
        assert_eq!(backend.table_count(), 1);
    }

    #[test]
    fn test_failing_existence_checks() {
        let backend = MemoryBackend::new().fail_probes();
        let err = backend.has_sequence("s", Some("shop")).unwrap_err();
        assert!(matches!(err, BackendError::Existence(ref msg) if msg.contains("\"s\"")));
        assert!(backend.has_table("t", None).is_err());
        assert_eq!(backend.probe_count(), 2);
    }
}
