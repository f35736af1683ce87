//! Performance benchmarks for csvql
//!
//! **Benchmarks Included:**
//! - `resolve_names`: table name resolution over 100, 1000 and 10000 paths
//! - `store_load`: replacing a table of 100, 1000 and 10000 rows
//! - `needs_update`: staleness check against the metadata cache
//! - `initial_scan`: scanning and loading a tree of 50 small files
//!
//! **Run benchmarks:**
//! ```bash
//! cargo bench                     # Run all benchmarks
//! cargo bench -- store_load       # Load throughput only
//! ```

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use csvql::resolver::resolve;
use csvql::storage::{FileRecord, ModStamp, Store};
use csvql::watcher::Synchronizer;
use tempfile::TempDir;

/// Paths spread over 20 directories, with every tenth base name repeated.
fn sample_paths(count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let name = if i % 10 == 0 { "shared".to_string() } else { format!("file_{i}") };
            PathBuf::from(format!("/data/dir_{}/{name}.csv", i % 20))
        })
        .collect()
}

fn sample_rows(count: usize) -> Vec<Vec<String>> {
    (0..count)
        .map(|i| vec![i.to_string(), format!("name {i}"), format!("{}.5", i % 100)])
        .collect()
}

fn sample_record(stamp: i64) -> FileRecord {
    FileRecord {
        path: PathBuf::from("/data/bench.csv"),
        table_name: "bench".to_string(),
        delimiter: b',',
        header_fields: vec!["id".to_string(), "name".to_string(), "score".to_string()],
        mod_stamp: ModStamp::from_nanos(stamp),
    }
}

/// Benchmark: name resolution at various tree sizes.
fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_names");

    for count in &[100, 1000, 10000] {
        let paths = sample_paths(*count);
        let root = PathBuf::from("/data");
        group.bench_with_input(BenchmarkId::from_parameter(count), &paths, |b, paths| {
            b.iter(|| black_box(resolve(paths, &root)));
        });
    }

    group.finish();
}

/// Benchmark: full table replacement.
fn bench_store_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_load");
    group.sample_size(10);
    group.measurement_time(std::time::Duration::from_secs(5));

    for count in &[100, 1000, 10000] {
        let store = Store::open_in_memory().expect("failed to open store");
        let mut stamp = 0;
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter_batched(
                || {
                    stamp += 1;
                    (sample_record(stamp), sample_rows(count))
                },
                |(record, rows)| {
                    black_box(store.load(&record, rows).expect("load failed"));
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark: staleness check hit and miss.
fn bench_needs_update(c: &mut Criterion) {
    let store = Store::open_in_memory().expect("failed to open store");
    store
        .load(&sample_record(42), sample_rows(10))
        .expect("load failed");

    let mut group = c.benchmark_group("needs_update");
    group.bench_function("current", |b| {
        b.iter(|| black_box(store.needs_update("bench", ModStamp::from_nanos(42))));
    });
    group.bench_function("stale", |b| {
        b.iter(|| black_box(store.needs_update("bench", ModStamp::from_nanos(43))));
    });
    group.finish();
}

/// Benchmark: initial scan of a fresh tree.
fn bench_initial_scan(c: &mut Criterion) {
    let tmp = TempDir::new().expect("failed to create temp dir");
    for i in 0..50 {
        let dir = tmp.path().join(format!("dir_{}", i % 5));
        fs::create_dir_all(&dir).expect("failed to create dir");
        fs::write(dir.join(format!("file_{i}.csv")), "id,value\n1,a\n2,b\n3,c\n")
            .expect("failed to write file");
    }

    let mut group = c.benchmark_group("initial_scan");
    group.sample_size(10);
    group.bench_function("50_files", |b| {
        b.iter_batched(
            || {
                let store = Arc::new(Store::open_in_memory().expect("failed to open store"));
                Synchronizer::new(tmp.path(), store)
            },
            |sync| black_box(sync.initial_scan().expect("scan failed")),
            criterion::BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_resolve,
    bench_store_load,
    bench_needs_update,
    bench_initial_scan
);
criterion_main!(benches);
