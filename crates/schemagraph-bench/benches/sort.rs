//! Dependency sort benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use schemagraph_bench::fixtures::{build_registry, GraphShape, Scale};
use schemagraph_core::TableSorter;

fn bench_sort_acyclic(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort/acyclic");

    for scale in [Scale::Small, Scale::Medium, Scale::Large] {
        let meta = build_registry(scale, GraphShape::Acyclic, 42);
        let ids = meta.table_ids();

        group.bench_with_input(BenchmarkId::from_parameter(scale.label()), &ids, |b, ids| {
            b.iter(|| {
                black_box(TableSorter::new(&meta, ids).sort().unwrap());
            });
        });
    }

    group.finish();
}

fn bench_sort_cyclic(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort/cyclic");

    for every in [50, 10] {
        let meta = build_registry(Scale::Medium, GraphShape::Cyclic { every }, 42);
        let ids = meta.table_ids();

        group.bench_with_input(BenchmarkId::new("back_ref_every", every), &ids, |b, ids| {
            b.iter(|| {
                black_box(TableSorter::new(&meta, ids).sort().unwrap());
            });
        });
    }

    group.finish();
}

fn bench_registry_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort/registry");
    group.sample_size(20);

    // forward references resolve through the pending memo
    group.bench_function("build_medium", |b| {
        b.iter(|| {
            black_box(build_registry(Scale::Medium, GraphShape::Acyclic, 42));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_sort_acyclic,
    bench_sort_cyclic,
    bench_registry_build
);
criterion_main!(benches);
