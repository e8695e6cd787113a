//! Schema generation for benchmarks.
//!
//! Generators are seeded so every run sees the same graphs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schemagraph_core::catalog::ForeignKey;
use schemagraph_core::{Column, Index, MetaData, Redefine, SqlType, TableDef};

/// Scale factor for generated schemas.
#[derive(Clone, Copy, Debug, Default)]
pub enum Scale {
    /// 20 tables. Use for quick iteration.
    Tiny,
    /// 100 tables.
    Small,
    /// 500 tables.
    #[default]
    Medium,
    /// 2,000 tables.
    Large,
}

impl Scale {
    /// Number of tables at this scale.
    pub fn tables(&self) -> usize {
        match self {
            Scale::Tiny => 20,
            Scale::Small => 100,
            Scale::Medium => 500,
            Scale::Large => 2_000,
        }
    }

    /// Upper bound on foreign keys per table.
    pub fn max_foreign_keys(&self) -> usize {
        match self {
            Scale::Tiny => 2,
            Scale::Small | Scale::Medium => 3,
            Scale::Large => 4,
        }
    }

    /// Label for benchmark ids.
    pub fn label(&self) -> &'static str {
        match self {
            Scale::Tiny => "tiny",
            Scale::Small => "small",
            Scale::Medium => "medium",
            Scale::Large => "large",
        }
    }
}

/// Shape of the generated foreign key graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphShape {
    /// Every foreign key points at an earlier table.
    Acyclic,
    /// Acyclic, plus one back-reference every `n` tables.
    Cyclic {
        /// Spacing of back-references.
        every: usize,
    },
}

/// Build a registry of `scale.tables()` tables.
///
/// Tables are registered in reverse so most references start out pending
/// and resolve as their targets attach.
pub fn build_registry(scale: Scale, shape: GraphShape, seed: u64) -> MetaData {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = scale.tables();
    let mut meta = MetaData::new();

    for i in (0..n).rev() {
        let mut def = TableDef::new(table_name(i))
            .column(Column::new("id", SqlType::BigInt).primary_key())
            .column(Column::new("label", SqlType::varchar(64)).indexed());

        if i > 0 {
            let fks = rng.gen_range(0..=scale.max_foreign_keys().min(i));
            for k in 0..fks {
                let target = rng.gen_range(0..i);
                def = def.column(
                    Column::new(format!("ref_{k}"), SqlType::Null)
                        .references(format!("{}.id", table_name(target))),
                );
            }
        }

        if let GraphShape::Cyclic { every } = shape {
            if every > 0 && i % every == every - 1 && i + 1 < n {
                let target = rng.gen_range(i + 1..n);
                def = def
                    .column(Column::new("back_ref", SqlType::Null).with_foreign_key(
                        ForeignKey::new(format!("{}.id", table_name(target)))
                            .with_name(format!("fk_{}_back", table_name(i))),
                    ))
                    .index(Index::new(format!("ix_{}_back", table_name(i)), ["back_ref"]));
            }
        }

        if let Err(err) = meta.add_table(def, Redefine::Error) {
            tracing::warn!(error = %err, table = i, "fixture table rejected");
        }
    }
    meta
}

fn table_name(i: usize) -> String {
    format!("t{:05}", i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_is_deterministic_and_resolved() {
        let a = build_registry(Scale::Tiny, GraphShape::Cyclic { every: 5 }, 7);
        let b = build_registry(Scale::Tiny, GraphShape::Cyclic { every: 5 }, 7);
        assert_eq!(a.len(), Scale::Tiny.tables());
        assert_eq!(a.pending_references(), 0);
        let fks = |m: &MetaData| m.tables().map(|t| t.foreign_keys().count()).sum::<usize>();
        assert_eq!(fks(&a), fks(&b));
    }
}
