//! Benchmark utilities.

use rand::Rng;
use segwal_core::{RecordRegistry, RecordType, WalConfig, WalRecord, WriteAheadLog};
use std::path::Path;

/// Record type logged by the benchmarks.
pub const BENCH_RECORD_TYPE: RecordType = RecordType::new(4096);

/// Generate random payload bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate records with random payloads of the specified size.
pub fn generate_records(count: usize, payload_size: usize) -> Vec<WalRecord> {
    (0..count)
        .map(|_| WalRecord::data(BENCH_RECORD_TYPE, random_data(payload_size)))
        .collect()
}

/// Configuration for a benchmark log in `dir`.
///
/// Background passes skip fsync so `log` timings measure the append path.
pub fn bench_config(dir: &Path, page_size: usize) -> WalConfig {
    let registry = RecordRegistry::new()
        .with_type(BENCH_RECORD_TYPE, "bench")
        .expect("bench record type registers");
    WalConfig::new("bench", dir)
        .page_size(page_size)
        .call_fsync(false)
        .record_types(registry)
}

/// Opens a benchmark log in `dir`.
pub fn open_log(dir: &Path, page_size: usize) -> WriteAheadLog {
    WriteAheadLog::open(bench_config(dir, page_size)).expect("open bench log")
}
