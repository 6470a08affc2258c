//! Benchmarks for insert paths: appended rows vs reused free-list slots.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strata_core::schema::{TableBuilder, TableSchema};
use strata_core::{Row, Value, ValueType};
use strata_storage::{delete, insert, StorageOptions, Table};
use tempfile::TempDir;

fn bench_schema() -> TableSchema {
    TableBuilder::new("quotes")
        .unwrap()
        .add_column("id", ValueType::Number)
        .unwrap()
        .add_column("symbol", ValueType::Text)
        .unwrap()
        .add_column("day", ValueType::Date)
        .unwrap()
        .build()
        .unwrap()
}

fn bench_rows(count: u64) -> Vec<Row> {
    (0..count)
        .map(|i| {
            let mut row = Row::new("quotes");
            row.set("id", Value::number(i as i64))
                .set("symbol", Value::from(format!("SYM{:04}", i % 500)))
                .set("day", Value::date(2024, 1, 1 + (i % 28) as u32));
            row
        })
        .collect()
}

fn fresh_table() -> (TempDir, Table) {
    let dir = TempDir::new().unwrap();
    let table =
        Table::create(dir.path(), bench_schema(), 1, StorageOptions::default()).unwrap();
    (dir, table)
}

/// Benchmark: appending rows into an empty partition.
fn insert_append_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_append");
    for count in [100u64, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter_batched(
                || (fresh_table(), bench_rows(count)),
                |((dir, table), mut rows)| {
                    insert(&table, "p0", &mut rows).unwrap();
                    black_box((dir, table))
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// Benchmark: re-inserting rows after a full delete, so every slot comes
/// from the free-list instead of the file tail.
fn insert_reuse_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_reuse");
    for count in [100u64, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter_batched(
                || {
                    let (dir, table) = fresh_table();
                    let mut rows = bench_rows(count);
                    insert(&table, "p0", &mut rows).unwrap();
                    delete(&table, &rows).unwrap();
                    (dir, table, bench_rows(count))
                },
                |(dir, table, mut rows)| {
                    insert(&table, "p0", &mut rows).unwrap();
                    black_box((dir, table))
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, insert_append_benchmark, insert_reuse_benchmark);
criterion_main!(benches);
