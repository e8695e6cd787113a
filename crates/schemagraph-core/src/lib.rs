//! SchemaGraph Core - schema registry, dependency ordering, and DDL planning.
//!
//! This crate models a relational schema as a registry of tables, columns,
//! constraints, indexes and sequences, resolves foreign keys between them
//! (including forward references), orders tables by dependency, and turns
//! the result into CREATE and DROP steps for a pluggable backend.

pub mod catalog;
pub mod config;
pub mod ddl;
pub mod diagnostic;
pub mod error;
pub mod identifier;
pub mod sort;

pub use catalog::{
    Column, ColumnDefault, ColumnRef, Computed, Constraint, ConstraintId, ConstraintKind,
    ConstraintRef, ForeignKey, ForeignKeyRef, Identity, Index, IndexRef, MetaData,
    NamingConvention, ObserverScope, Redefine, SchemaItemRef, SchemaObserver, Sequence, SqlType,
    Table, TableDef, TableId, TableKey,
};
pub use config::{BackendConfig, CheckFirst};
pub use ddl::{
    BackendError, Collaborators, DdlCompiler, DdlExecutor, DdlIntent, DdlPlan, ExistenceCheck,
    MemoryBackend, RunReport, SchemaDropper, SchemaGenerator,
};
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use error::{Error, Result};
pub use identifier::{Identifier, QuotePolicy};
pub use sort::{CycleError, FkDisposition, SortedTables, TableSorter};
