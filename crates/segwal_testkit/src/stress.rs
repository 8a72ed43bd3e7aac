//! Stress tests for segwal.
//!
//! These helpers drive a log with many appends, from one or many threads,
//! and read the records back.

use crate::fixtures::test_record;
use segwal_core::{Lsn, WriteAheadLog};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of records to log.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Payload size in bytes, at least 9.
    pub payload_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            payload_size: 128,
        }
    }
}

/// Builds a payload that identifies its writer thread and sequence number.
pub fn stress_payload(thread: usize, index: usize, size: usize) -> Vec<u8> {
    let mut payload = vec![thread as u8];
    payload.extend_from_slice(&(index as u64).to_le_bytes());
    payload.resize(size.max(9), (index % 251) as u8);
    payload
}

/// Logs records from the calling thread. Returns the LSNs in log order.
pub fn stress_sequential_logging(
    wal: &WriteAheadLog,
    config: &StressConfig,
) -> (StressTestResult, Vec<Lsn>) {
    let mut lsns = Vec::with_capacity(config.operations);
    let mut failed = 0;
    let start = Instant::now();

    for i in 0..config.operations {
        match wal.log(&test_record(stress_payload(0, i, config.payload_size))) {
            Ok(lsn) => lsns.push(lsn),
            Err(_) => failed += 1,
        }
    }

    (StressTestResult::new(lsns.len(), failed, start.elapsed()), lsns)
}

/// Logs records from `config.threads` threads at once.
///
/// Returns the LSNs of each thread, in the order that thread logged them.
pub fn stress_concurrent_logging(
    wal: Arc<WriteAheadLog>,
    config: &StressConfig,
) -> (StressTestResult, Vec<Vec<Lsn>>) {
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads.max(1);
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let wal = Arc::clone(&wal);
            let failed = Arc::clone(&failed);
            let payload_size = config.payload_size;

            thread::spawn(move || {
                let mut lsns = Vec::with_capacity(ops_per_thread);
                for i in 0..ops_per_thread {
                    match wal.log(&test_record(stress_payload(t, i, payload_size))) {
                        Ok(lsn) => lsns.push(lsn),
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                lsns
            })
        })
        .collect();

    let per_thread: Vec<Vec<Lsn>> = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .collect();
    let successful = per_thread.iter().map(Vec::len).sum();

    (
        StressTestResult::new(successful, failed.load(Ordering::Relaxed), start.elapsed()),
        per_thread,
    )
}

/// Reads every LSN back and checks it holds the payload `thread` logged as
/// its `index`-th record.
pub fn stress_read_back(
    wal: &WriteAheadLog,
    thread: usize,
    lsns: &[Lsn],
    config: &StressConfig,
) -> StressTestResult {
    let mut successful = 0;
    let mut failed = 0;
    let start = Instant::now();

    for (i, lsn) in lsns.iter().enumerate() {
        let expected = stress_payload(thread, i, config.payload_size);
        match wal.read(*lsn, 1) {
            Ok(records) if records.first().map(|r| r.record.payload()) == Some(&expected[..]) => {
                successful += 1;
            }
            _ => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Logs from several threads while another thread flushes in a loop.
///
/// Counts a failure whenever the flushed LSN moves backwards.
pub fn stress_logging_with_flushes(
    wal: Arc<WriteAheadLog>,
    config: &StressConfig,
) -> (StressTestResult, Vec<Vec<Lsn>>) {
    let done = Arc::new(AtomicUsize::new(0));
    let regressions = Arc::new(AtomicUsize::new(0));

    let flusher = {
        let wal = Arc::clone(&wal);
        let done = Arc::clone(&done);
        let regressions = Arc::clone(&regressions);
        thread::spawn(move || {
            let mut last = None;
            while done.load(Ordering::Acquire) == 0 {
                if wal.flush().is_err() {
                    regressions.fetch_add(1, Ordering::Relaxed);
                }
                let flushed = wal.flushed_lsn().ok().flatten();
                if flushed < last {
                    regressions.fetch_add(1, Ordering::Relaxed);
                }
                last = flushed;
            }
        })
    };

    let (result, lsns) = stress_concurrent_logging(wal, config);
    done.store(1, Ordering::Release);
    flusher.join().expect("Flusher panicked");

    let failed = result.failed_ops + regressions.load(Ordering::Relaxed);
    (
        StressTestResult::new(result.successful_ops, failed, result.duration),
        lsns,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestWal;

    #[test]
    fn test_sequential_logging() {
        let test_wal = TestWal::new();
        let config = StressConfig {
            operations: 1_000,
            payload_size: 40,
            ..Default::default()
        };

        let (result, lsns) = stress_sequential_logging(&test_wal, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 1_000);
        assert!(lsns.windows(2).all(|w| w[0] < w[1]));

        let read = stress_read_back(&test_wal, 0, &lsns, &config);
        assert_eq!(read.failed_ops, 0);
    }

    #[test]
    fn test_concurrent_logging() {
        let test_wal = TestWal::with_config(|c| c.max_segment_size(4096));
        let config = StressConfig {
            operations: 2_000,
            threads: 4,
            payload_size: 50,
        };

        let wal = Arc::new(test_wal.wal);
        let (result, per_thread) = stress_concurrent_logging(Arc::clone(&wal), &config);
        assert_eq!(result.failed_ops, 0);

        let mut all: Vec<Lsn> = per_thread.iter().flatten().copied().collect();
        let count = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), count, "LSNs must be unique");

        for (t, lsns) in per_thread.iter().enumerate() {
            assert!(lsns.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(stress_read_back(&wal, t, lsns, &config).failed_ops, 0);
        }
    }

    #[test]
    fn test_logging_with_flushes() {
        let test_wal = TestWal::new();
        let config = StressConfig {
            operations: 800,
            threads: 2,
            payload_size: 20,
        };

        let wal = Arc::new(test_wal.wal);
        let (result, per_thread) = stress_logging_with_flushes(Arc::clone(&wal), &config);
        assert_eq!(result.failed_ops, 0);

        wal.flush().unwrap();
        let last = per_thread.iter().flatten().max().copied();
        assert!(wal.flushed_lsn().unwrap() >= last);
    }
}
