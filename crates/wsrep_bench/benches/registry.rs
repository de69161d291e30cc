//! Transaction registry benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use wsrep_bench::{random_statement, random_trx_ids};
use wsrep_core::{ConnId, NodeId, TrxId, TrxRegistry};

/// Benchmark lookups of existing transactions.
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("trx_lookup");

    for keys in [16u64, 1024, 65536].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(keys), keys, |b, &keys| {
            let registry = TrxRegistry::new();
            let source = NodeId::random();
            for id in 0..keys {
                let trx = registry.get_or_create_trx(source, TrxId::new(id), true).unwrap();
                registry.release_trx(trx);
            }
            let ids = random_trx_ids(1024, keys);

            let mut next = 0;
            b.iter(|| {
                let id = ids[next % ids.len()];
                next += 1;
                let trx = registry.get_or_create_trx(source, black_box(id), false).unwrap();
                registry.release_trx(trx);
            });
        });
    }
    group.finish();
}

/// Benchmark a full transaction lifetime: create, append, release, discard.
fn bench_lifecycle(c: &mut Criterion) {
    let registry = TrxRegistry::new();
    let source = NodeId::random();
    let statement = random_statement(128);
    let mut next = 0u64;

    c.bench_function("trx_lifecycle", |b| {
        b.iter(|| {
            let id = TrxId::new(next);
            next += 1;
            let trx = registry.get_or_create_trx(source, id, true).unwrap();
            trx.write_set().append(black_box(&statement));
            registry.release_trx(trx);
            registry.discard_trx(id);
        });
    });
}

/// Benchmark connection transactions seeded with a default database.
fn bench_conn_trx(c: &mut Criterion) {
    let mut group = c.benchmark_group("conn_trx");

    for size in [16usize, 256, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let registry = TrxRegistry::new();
            let source = NodeId::random();
            let conn = ConnId::new(1);
            registry.set_conn_default_database(conn, &random_statement(size));

            b.iter(|| {
                let trx = registry.get_or_create_conn_trx(source, conn, true).unwrap();
                black_box(trx.write_set().len());
                registry.discard_conn_trx(conn);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lookup, bench_lifecycle, bench_conn_trx);
criterion_main!(benches);
