//! DDL planning and execution.
//!
//! A run sorts the requested tables, plans one intent per statement and
//! hands each intent to the backend collaborators, with observer events
//! around every step and around the run as a whole.

mod backend;
mod intent;
mod memory;
mod plan;
mod runner;

pub use backend::{
    BackendError, Collaborators, CompiledDdl, DdlCompiler, DdlExecutor, ExistenceCheck,
    ExistenceProbe,
};
pub use intent::DdlIntent;
pub use memory::MemoryBackend;
pub use plan::{
    can_create_sequence, plan_create, plan_create_table, plan_drop, plan_drop_table, plan_index,
    plan_sequence, DdlPlan, DdlStep, ExistenceGuard,
};
pub use runner::{RunReport, SchemaDropper, SchemaGenerator};
