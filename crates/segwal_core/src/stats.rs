//! Log statistics and telemetry.
//!
//! Provides counters for monitoring append, flush and retention activity.
//!
//! # Usage
//!
//! ```rust,ignore
//! let wal = WriteAheadLog::open(config)?;
//! wal.log(&record)?;
//! wal.flush()?;
//!
//! let stats = wal.stats();
//! println!("Records: {}", stats.records_logged);
//! println!("Fsyncs: {}", stats.fsyncs);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Log statistics.
///
/// All counters are atomic and can be read while operations are in progress.
/// Values only grow, except `max_fsync_micros` which tracks a maximum.
#[derive(Debug, Default)]
pub struct WalStats {
    records_logged: AtomicU64,
    bytes_logged: AtomicU64,
    pages_written: AtomicU64,
    flush_passes: AtomicU64,
    fsyncs: AtomicU64,
    fsync_micros: AtomicU64,
    max_fsync_micros: AtomicU64,
    segments_created: AtomicU64,
    segments_removed: AtomicU64,
    checksum_failures: AtomicU64,
}

impl WalStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_logged(&self, bytes: u64) {
        self.records_logged.fetch_add(1, Ordering::Relaxed);
        self.bytes_logged.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_flush_pass(&self, pages: u64) {
        self.flush_passes.fetch_add(1, Ordering::Relaxed);
        self.pages_written.fetch_add(pages, Ordering::Relaxed);
    }

    pub(crate) fn record_fsync(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.fsyncs.fetch_add(1, Ordering::Relaxed);
        self.fsync_micros.fetch_add(micros, Ordering::Relaxed);
        self.max_fsync_micros.fetch_max(micros, Ordering::Relaxed);
    }

    pub(crate) fn record_segment_created(&self) {
        self.segments_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_segments_removed(&self, count: u64) {
        self.segments_removed.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_checksum_failure(&self) {
        self.checksum_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_logged: self.records_logged.load(Ordering::Relaxed),
            bytes_logged: self.bytes_logged.load(Ordering::Relaxed),
            pages_written: self.pages_written.load(Ordering::Relaxed),
            flush_passes: self.flush_passes.load(Ordering::Relaxed),
            fsyncs: self.fsyncs.load(Ordering::Relaxed),
            fsync_micros: self.fsync_micros.load(Ordering::Relaxed),
            max_fsync_micros: self.max_fsync_micros.load(Ordering::Relaxed),
            segments_created: self.segments_created.load(Ordering::Relaxed),
            segments_removed: self.segments_removed.load(Ordering::Relaxed),
            checksum_failures: self.checksum_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of log statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Records appended.
    pub records_logged: u64,
    /// Encoded bytes appended (headers included).
    pub bytes_logged: u64,
    /// Page images written to segment files.
    pub pages_written: u64,
    /// Flush passes run by the flush worker.
    pub flush_passes: u64,
    /// Segment fsyncs issued.
    pub fsyncs: u64,
    /// Total time spent in fsync.
    pub fsync_micros: u64,
    /// Longest single fsync.
    pub max_fsync_micros: u64,
    /// Segments opened for writing.
    pub segments_created: u64,
    /// Segments deleted by retention.
    pub segments_removed: u64,
    /// Pages that failed verification while reading.
    pub checksum_failures: u64,
}

impl StatsSnapshot {
    /// Returns the mean fsync time in microseconds.
    #[must_use]
    pub fn mean_fsync_micros(&self) -> u64 {
        self.fsync_micros.checked_div(self.fsyncs).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = WalStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn record_operations() {
        let stats = WalStats::new();

        stats.record_logged(100);
        stats.record_logged(50);
        stats.record_flush_pass(3);
        stats.record_segment_created();
        stats.record_segments_removed(2);
        stats.record_checksum_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.records_logged, 2);
        assert_eq!(snapshot.bytes_logged, 150);
        assert_eq!(snapshot.flush_passes, 1);
        assert_eq!(snapshot.pages_written, 3);
        assert_eq!(snapshot.segments_created, 1);
        assert_eq!(snapshot.segments_removed, 2);
        assert_eq!(snapshot.checksum_failures, 1);
    }

    #[test]
    fn fsync_timing() {
        let stats = WalStats::new();
        stats.record_fsync(Duration::from_micros(100));
        stats.record_fsync(Duration::from_micros(300));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.fsyncs, 2);
        assert_eq!(snapshot.max_fsync_micros, 300);
        assert_eq!(snapshot.mean_fsync_micros(), 200);
        assert_eq!(StatsSnapshot::default().mean_fsync_micros(), 0);
    }
}
