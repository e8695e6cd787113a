//! DDL planning and run benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use schemagraph_bench::fixtures::{build_registry, GraphShape, Scale};
use schemagraph_core::ddl::{plan_create, plan_drop};
use schemagraph_core::{
    BackendConfig, CheckFirst, Collaborators, MemoryBackend, SchemaDropper, SchemaGenerator,
};

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("ddl/plan");
    let config = BackendConfig::postgres();

    for scale in [Scale::Small, Scale::Medium] {
        let meta = build_registry(scale, GraphShape::Cyclic { every: 25 }, 7);
        let ids = meta.table_ids();

        group.bench_with_input(BenchmarkId::new("create", scale.label()), &ids, |b, ids| {
            b.iter(|| {
                black_box(plan_create(&meta, ids, &config, &CheckFirst::none()).unwrap());
            });
        });

        group.bench_with_input(BenchmarkId::new("drop", scale.label()), &ids, |b, ids| {
            b.iter(|| {
                black_box(plan_drop(&meta, ids, &config, &CheckFirst::none()).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_create_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("ddl/run");
    let config = BackendConfig::postgres();
    let meta = build_registry(Scale::Small, GraphShape::Cyclic { every: 25 }, 7);

    group.bench_function("create_all", |b| {
        b.iter_batched(
            MemoryBackend::new,
            |backend| {
                let report = SchemaGenerator::new(&meta, &config)
                    .create_all(Collaborators::from_backend(&backend))
                    .unwrap();
                black_box(report);
            },
            BatchSize::SmallInput,
        );
    });

    // existence checks on a fully created backend skip every table
    group.bench_function("create_all_checkfirst_noop", |b| {
        let backend = MemoryBackend::new();
        SchemaGenerator::new(&meta, &config)
            .create_all(Collaborators::from_backend(&backend))
            .unwrap();
        let generator = SchemaGenerator::new(&meta, &config).with_checkfirst(CheckFirst::all());

        b.iter(|| {
            black_box(
                generator
                    .create_all(Collaborators::from_backend(&backend))
                    .unwrap(),
            );
        });
    });

    group.bench_function("create_then_drop", |b| {
        b.iter_batched(
            MemoryBackend::new,
            |backend| {
                SchemaGenerator::new(&meta, &config)
                    .create_all(Collaborators::from_backend(&backend))
                    .unwrap();
                let report = SchemaDropper::new(&meta, &config)
                    .drop_all(Collaborators::from_backend(&backend))
                    .unwrap();
                black_box(report);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_plan, bench_create_all);
criterion_main!(benches);
