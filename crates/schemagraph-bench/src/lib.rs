//! SchemaGraph Benchmark Suite
//!
//! Criterion benchmarks for the registry, the dependency sorter and the DDL
//! planner.
//!
//! # Benchmark Categories
//!
//! - **Sort**: Dependency ordering over acyclic and cyclic foreign key graphs
//! - **DDL**: Plan construction and full create/drop runs against the in-memory backend

pub mod fixtures;

pub use fixtures::{build_registry, GraphShape, Scale};
