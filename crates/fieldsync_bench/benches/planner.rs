//! Query planner and predicate benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fieldsync_bench::wire_record;
use fieldsync_protocol::{AccessScope, CollectionPath, QueryPlanner, RemoteRecord, ScopeFilter};

fn collection() -> CollectionPath {
    CollectionPath::locate("acme", "clients")
}

/// Benchmark planning scoped pulls across scope sizes.
fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    let planner = QueryPlanner::new();

    for size in [1i64, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let scope = AccessScope::restricted(1..=size);
            b.iter(|| {
                let plan = planner.plan(
                    collection(),
                    Some("routeId"),
                    black_box(&scope),
                    "lastModified",
                    1_700_000_000_000,
                    false,
                );
                black_box(plan);
            });
        });
    }

    group.finish();
}

/// Benchmark the admin short-circuit against a wide restricted scope.
fn bench_plan_admin(c: &mut Criterion) {
    let planner = QueryPlanner::new();
    let scope = AccessScope::admin();

    c.bench_function("plan/admin", |b| {
        b.iter(|| {
            let plan = planner.plan(
                collection(),
                Some("routeId"),
                black_box(&scope),
                "lastModified",
                0,
                false,
            );
            black_box(plan);
        });
    });
}

/// Benchmark predicate evaluation over a pulled batch.
fn bench_admits(c: &mut Criterion) {
    let mut group = c.benchmark_group("admits");

    let records: Vec<RemoteRecord> = (0..1000)
        .map(|i| wire_record(i, 1_700_000_000_000 + i, i % 20))
        .collect();
    let query = fieldsync_protocol::RecordQuery::new(collection(), "lastModified")
        .with_cursor(1_700_000_000_500)
        .with_scope(ScopeFilter::AnyOf {
            field: "routeId".to_string(),
            values: (0..10).collect(),
        });

    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("batch_1000", |b| {
        b.iter(|| {
            let admitted = records
                .iter()
                .filter(|record| query.admits(black_box(record)))
                .count();
            black_box(admitted);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_plan, bench_plan_admin, bench_admits);
criterion_main!(benches);
