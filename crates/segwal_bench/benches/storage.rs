//! Page store benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use segwal_bench::utils::random_data;
use segwal_storage::{FileBackend, InMemoryBackend, PageStore};
use tempfile::TempDir;

/// Benchmark InMemoryBackend page writes.
fn bench_inmemory_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("inmemory_write");

    for size in [512, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let backend = InMemoryBackend::new(size);
            let page = random_data(size);
            let mut index = 0u64;

            b.iter(|| {
                backend.write_page(black_box(index % 1024), black_box(&page)).unwrap();
                index += 1;
            });
        });
    }

    group.finish();
}

/// Benchmark FileBackend page writes.
fn bench_file_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_write");
    group.sample_size(50);

    for size in [512, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let backend = FileBackend::open(&temp_dir.path().join("bench.1.wal"), size).unwrap();
            let page = random_data(size);
            let mut index = 0u64;

            b.iter(|| {
                backend.write_page(black_box(index % 1024), black_box(&page)).unwrap();
                index += 1;
            });
        });
    }

    group.finish();
}

/// Benchmark FileBackend page reads.
fn bench_file_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_read");
    group.sample_size(50);

    for size in [512, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let backend = FileBackend::open(&temp_dir.path().join("bench.1.wal"), size).unwrap();
            let page = random_data(size);
            for index in 0..64 {
                backend.write_page(index, &page).unwrap();
            }
            backend.sync().unwrap();

            let mut index = 0u64;
            b.iter(|| {
                let result = backend.read_page(black_box((index * 7) % 64)).unwrap();
                index += 1;
                black_box(result);
            });
        });
    }

    group.finish();
}

/// Benchmark FileBackend sync after a page write.
fn bench_file_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_sync");
    group.sample_size(20); // Sync is slow

    let temp_dir = TempDir::new().unwrap();
    let backend = FileBackend::open(&temp_dir.path().join("bench.1.wal"), 4096).unwrap();
    let page = random_data(4096);

    group.bench_function("after_4kb_page", |b| {
        b.iter(|| {
            backend.write_page(0, &page).unwrap();
            backend.sync().unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_inmemory_write,
    bench_file_write,
    bench_file_read,
    bench_file_sync
);
criterion_main!(benches);
