//! Collaborator interfaces at the backend boundary.
//!
//! This layer never renders SQL or talks to a database itself. A run asks an
//! [`ExistenceCheck`] what is already there, hands each intent to a
//! [`DdlCompiler`] and passes the result to a [`DdlExecutor`].

use super::intent::DdlIntent;
use crate::catalog::{MetaData, TableKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a collaborator. Always fatal for the current run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// An existence query failed.
    #[error("existence check failed: {0}")]
    Existence(String),

    /// An intent could not be compiled.
    #[error("could not compile '{intent}': {message}")]
    Compile {
        /// Description of the intent.
        intent: String,
        /// Reason.
        message: String,
    },

    /// A compiled statement failed to execute.
    #[error("execution of '{statement}' failed: {message}")]
    Execution {
        /// Statement text.
        statement: String,
        /// Reason.
        message: String,
    },
}

/// Idempotent, read-only queries against live backend state.
pub trait ExistenceCheck {
    /// Check if a table or view exists.
    fn has_table(&self, name: &str, schema: Option<&str>) -> Result<bool, BackendError>;

    /// Check if an index exists.
    fn has_index(&self, table: &str, name: &str, schema: Option<&str>)
        -> Result<bool, BackendError>;

    /// Check if a sequence exists.
    fn has_sequence(&self, name: &str, schema: Option<&str>) -> Result<bool, BackendError>;

    /// Check if a server-side type exists.
    fn has_type(&self, name: &str, schema: Option<&str>) -> Result<bool, BackendError>;
}

/// Renderable output of a compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledDdl {
    /// Statement text.
    pub text: String,
    /// Bind parameters.
    pub params: Vec<serde_json::Value>,
}

impl CompiledDdl {
    /// A statement without parameters.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }
}

/// Turns an intent into a renderable statement.
pub trait DdlCompiler {
    /// Compile one intent. `meta` is the registry the intent was planned from.
    fn compile(&self, meta: &MetaData, intent: &DdlIntent) -> Result<CompiledDdl, BackendError>;
}

/// Executes compiled statements.
pub trait DdlExecutor {
    /// Execute one statement.
    fn execute(&self, ddl: &CompiledDdl, intent: &DdlIntent) -> Result<(), BackendError>;
}

/// The three collaborators a run talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// Existence checks.
    pub existence: &'a dyn ExistenceCheck,
    /// Compiler.
    pub compiler: &'a dyn DdlCompiler,
    /// Executor.
    pub executor: &'a dyn DdlExecutor,
}

impl<'a> Collaborators<'a> {
    /// Combine separate collaborators.
    pub fn new(
        existence: &'a dyn ExistenceCheck,
        compiler: &'a dyn DdlCompiler,
        executor: &'a dyn DdlExecutor,
    ) -> Self {
        Self {
            existence,
            compiler,
            executor,
        }
    }

    /// Use one backend for all three roles.
    pub fn from_backend<B>(backend: &'a B) -> Self
    where
        B: ExistenceCheck + DdlCompiler + DdlExecutor,
    {
        Self::new(backend, backend, backend)
    }
}

/// One existence query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExistenceProbe {
    /// `has_table`.
    Table(TableKey),
    /// `has_index`.
    Index {
        /// Owning table.
        table: TableKey,
        /// Index name.
        name: String,
    },
    /// `has_sequence`.
    Sequence {
        /// Sequence name.
        name: String,
        /// Schema.
        schema: Option<String>,
    },
    /// `has_type`.
    Type {
        /// Type name.
        name: String,
        /// Schema.
        schema: Option<String>,
    },
}

impl ExistenceProbe {
    /// Ask the collaborator.
    pub fn check(&self, existence: &dyn ExistenceCheck) -> Result<bool, BackendError> {
        match self {
            ExistenceProbe::Table(key) => existence.has_table(&key.name, key.schema.as_deref()),
            ExistenceProbe::Index { table, name } => {
                existence.has_index(&table.name, name, table.schema.as_deref())
            }
            ExistenceProbe::Sequence { name, schema } => {
                existence.has_sequence(name, schema.as_deref())
            }
            ExistenceProbe::Type { name, schema } => existence.has_type(name, schema.as_deref()),
        }
    }
}
