//! Test fixtures and log helpers.
//!
//! Provides convenience functions for setting up temporary logs with a
//! registered test record type.

use segwal_core::{RecordRegistry, RecordType, WalConfig, WalRecord, WriteAheadLog};
use std::path::Path;
use tempfile::TempDir;

/// Record type registered by every fixture.
pub const TEST_RECORD_TYPE: RecordType = RecordType::new(1024);

/// Name of fixture logs.
pub const TEST_LOG_NAME: &str = "walTest";

/// Page size of fixture logs. Small, so tests cross pages and segments
/// with little data.
pub const TEST_PAGE_SIZE: usize = 64;

/// Returns a registry holding [`TEST_RECORD_TYPE`].
pub fn test_registry() -> RecordRegistry {
    RecordRegistry::new()
        .with_type(TEST_RECORD_TYPE, "test-record")
        .expect("test record type registers")
}

/// Returns the fixture configuration for a log stored in `dir`.
///
/// Background passes skip fsync; explicit flushes still sync.
pub fn test_config(dir: &Path) -> WalConfig {
    WalConfig::new(TEST_LOG_NAME, dir)
        .page_size(TEST_PAGE_SIZE)
        .call_fsync(false)
        .record_types(test_registry())
}

/// Builds a record of [`TEST_RECORD_TYPE`].
pub fn test_record(payload: impl Into<Vec<u8>>) -> WalRecord {
    WalRecord::data(TEST_RECORD_TYPE, payload)
}

/// A log in a temporary directory, removed on drop.
pub struct TestWal {
    /// The log instance.
    pub wal: WriteAheadLog,
    config: WalConfig,
    temp_dir: TempDir,
}

impl TestWal {
    /// Opens a log with the fixture configuration.
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    /// Opens a log with the fixture configuration adjusted by `adjust`.
    pub fn with_config(adjust: impl FnOnce(WalConfig) -> WalConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = adjust(test_config(temp_dir.path()));
        let wal = WriteAheadLog::open(config.clone()).expect("Failed to open log");
        Self {
            wal,
            config,
            temp_dir,
        }
    }

    /// Closes the log and opens it again from the same directory.
    pub fn reopen(self) -> Self {
        let Self {
            wal,
            config,
            temp_dir,
        } = self;
        wal.close().expect("Failed to close log");
        drop(wal);
        let wal = WriteAheadLog::open(config.clone()).expect("Failed to reopen log");
        Self {
            wal,
            config,
            temp_dir,
        }
    }

    /// Returns the log directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the configuration the log was opened with.
    pub fn config(&self) -> &WalConfig {
        &self.config
    }
}

impl Default for TestWal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestWal {
    type Target = WriteAheadLog;

    fn deref(&self) -> &Self::Target {
        &self.wal
    }
}

/// Runs a test with a temporary log.
///
/// # Example
///
/// ```rust,ignore
/// use segwal_testkit::{test_record, with_temp_wal};
///
/// #[test]
/// fn my_test() {
///     with_temp_wal(|wal| {
///         wal.log(&test_record(vec![7])).unwrap();
///     });
/// }
/// ```
pub fn with_temp_wal<F, R>(f: F) -> R
where
    F: FnOnce(&WriteAheadLog) -> R,
{
    let test_wal = TestWal::new();
    f(&test_wal.wal)
}
