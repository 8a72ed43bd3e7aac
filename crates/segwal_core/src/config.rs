//! Log configuration.

use crate::crypto::{EncryptionKey, PageCipher};
use crate::error::{CoreError, CoreResult};
use crate::wal::{RecordRegistry, MAX_PAGE_SIZE, RECORDS_OFFSET, RECORD_HEADER_SIZE};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cache size substituted when `max_pages_cache_size * page_size` overflows.
pub const DEFAULT_MAX_CACHE_SIZE: i32 = i32::MAX;

/// Configuration for opening a log.
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Storage name, used in diagnostics and as the default segment name.
    pub name: String,

    /// Primary storage directory; free-space checks are made against it.
    pub storage_dir: PathBuf,

    /// Directory holding segment files and the LOCK file.
    pub wal_dir: PathBuf,

    /// Base name of segment files (`<segment_name>.<id>.wal`).
    ///
    /// Falls back to `name` when unset.
    pub segment_name: Option<String>,

    /// Target write cache size in pages.
    pub max_pages_cache_size: i32,

    /// Page size in bytes.
    pub page_size: usize,

    /// Key for page encryption. Requires `encryption_iv`.
    pub encryption_key: Option<EncryptionKey>,

    /// IV for page encryption. Requires `encryption_key`.
    pub encryption_iv: Option<Vec<u8>>,

    /// Age after which the active segment rotates on the next append.
    pub segments_interval: Option<Duration>,

    /// Size after which the active segment rotates.
    pub max_segment_size: u64,

    /// Cadence of background flush passes.
    pub commit_delay: Duration,

    /// Skip unrelated files in the log directory instead of failing open.
    pub filter_wal_files: bool,

    /// Locale tag used in diagnostic output only.
    pub locale: String,

    /// Free bytes to keep on `storage_dir` (`<= 0` disables the check).
    pub free_space_limit: i64,

    /// Total log size above which a checkpoint is requested (`<= 0` disables).
    pub wal_size_hard_limit: i64,

    /// Minimum spacing of background fsyncs.
    pub fsync_interval: Duration,

    /// Request a checkpoint whenever non-active segments exist.
    pub keep_single_segment: bool,

    /// Whether background flush passes fsync. Explicit flushes always do.
    pub call_fsync: bool,

    /// Periodically log performance statistics.
    pub print_performance_statistics: bool,

    /// Period of the statistics log.
    pub statistics_print_interval: Duration,

    /// Record types the log accepts.
    pub record_types: RecordRegistry,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            name: "wal".to_string(),
            storage_dir: PathBuf::from("."),
            wal_dir: PathBuf::from("."),
            segment_name: None,
            max_pages_cache_size: 4096,
            page_size: 4096,
            encryption_key: None,
            encryption_iv: None,
            segments_interval: None,
            max_segment_size: 128 * 1024 * 1024, // 128 MB
            commit_delay: Duration::from_millis(20),
            filter_wal_files: true,
            locale: "en-US".to_string(),
            free_space_limit: -1,    // disabled
            wal_size_hard_limit: -1, // disabled
            fsync_interval: Duration::from_millis(1000),
            keep_single_segment: false,
            call_fsync: true,
            print_performance_statistics: false,
            statistics_print_interval: Duration::from_secs(10),
            record_types: RecordRegistry::new(),
        }
    }
}

impl WalConfig {
    /// Creates a configuration for a log named `name` stored in `dir`.
    #[must_use]
    pub fn new(name: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            storage_dir: dir.as_ref().to_path_buf(),
            wal_dir: dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Sets the primary storage directory.
    #[must_use]
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    /// Sets the directory holding segment files.
    #[must_use]
    pub fn wal_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.wal_dir = dir.into();
        self
    }

    /// Sets the segment file base name.
    #[must_use]
    pub fn segment_name(mut self, name: impl Into<String>) -> Self {
        self.segment_name = Some(name.into());
        self
    }

    /// Sets the target write cache size in pages.
    #[must_use]
    pub fn max_pages_cache_size(mut self, pages: i32) -> Self {
        self.max_pages_cache_size = pages;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Enables page encryption.
    #[must_use]
    pub fn encryption(mut self, key: EncryptionKey, iv: impl Into<Vec<u8>>) -> Self {
        self.encryption_key = Some(key);
        self.encryption_iv = Some(iv.into());
        self
    }

    /// Sets the age after which the active segment rotates.
    #[must_use]
    pub fn segments_interval(mut self, interval: Duration) -> Self {
        self.segments_interval = Some(interval);
        self
    }

    /// Sets the maximum segment size.
    #[must_use]
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.max_segment_size = size;
        self
    }

    /// Sets the background flush cadence.
    #[must_use]
    pub fn commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = delay;
        self
    }

    /// Sets whether unrelated files in the log directory are ignored.
    #[must_use]
    pub fn filter_wal_files(mut self, value: bool) -> Self {
        self.filter_wal_files = value;
        self
    }

    /// Sets the diagnostic locale tag.
    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Sets the free space to keep on the storage directory.
    #[must_use]
    pub fn free_space_limit(mut self, bytes: i64) -> Self {
        self.free_space_limit = bytes;
        self
    }

    /// Sets the total log size that triggers a checkpoint request.
    #[must_use]
    pub fn wal_size_hard_limit(mut self, bytes: i64) -> Self {
        self.wal_size_hard_limit = bytes;
        self
    }

    /// Sets the minimum spacing of background fsyncs.
    #[must_use]
    pub fn fsync_interval(mut self, interval: Duration) -> Self {
        self.fsync_interval = interval;
        self
    }

    /// Sets whether a checkpoint is requested while non-active segments exist.
    #[must_use]
    pub fn keep_single_segment(mut self, value: bool) -> Self {
        self.keep_single_segment = value;
        self
    }

    /// Sets whether background flush passes fsync.
    #[must_use]
    pub fn call_fsync(mut self, value: bool) -> Self {
        self.call_fsync = value;
        self
    }

    /// Enables periodic statistics logging every `interval`.
    #[must_use]
    pub fn print_performance_statistics(mut self, value: bool, interval: Duration) -> Self {
        self.print_performance_statistics = value;
        self.statistics_print_interval = interval;
        self
    }

    /// Sets the accepted record types.
    #[must_use]
    pub fn record_types(mut self, registry: RecordRegistry) -> Self {
        self.record_types = registry;
        self
    }

    /// Returns the base name of segment files.
    #[must_use]
    pub fn segment_base_name(&self) -> &str {
        self.segment_name.as_deref().unwrap_or(&self.name)
    }

    /// Returns the write cache limit in bytes.
    ///
    /// Computed as `max_pages_cache_size * page_size` in `i32`. An overflow
    /// yields [`DEFAULT_MAX_CACHE_SIZE`]. A negative product that does not
    /// overflow is returned unchanged; it makes every append ask for a flush.
    #[must_use]
    pub fn max_cache_size(&self) -> i32 {
        i32::try_from(self.page_size)
            .ok()
            .and_then(|page_size| self.max_pages_cache_size.checked_mul(page_size))
            .unwrap_or(DEFAULT_MAX_CACHE_SIZE)
    }

    /// Checks that the configuration can be used to open a log.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an unusable page or segment size, or when
    /// only one of key and IV is set.
    pub fn validate(&self) -> CoreResult<()> {
        let min_page = RECORDS_OFFSET + RECORD_HEADER_SIZE;
        if self.page_size <= min_page || self.page_size > MAX_PAGE_SIZE {
            return Err(CoreError::invalid_config(format!(
                "page size {} outside {}..={}",
                self.page_size,
                min_page + 1,
                MAX_PAGE_SIZE
            )));
        }
        if self.max_segment_size == 0 {
            return Err(CoreError::invalid_config("max segment size must be positive"));
        }
        if self.segment_base_name().is_empty() {
            return Err(CoreError::invalid_config("segment name must not be empty"));
        }
        if self.encryption_key.is_some() != self.encryption_iv.is_some() {
            return Err(CoreError::invalid_config(
                "encryption needs both a key and an IV",
            ));
        }
        Ok(())
    }

    /// Builds the page cipher, if encryption is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the IV has the wrong size or encryption support
    /// is not compiled in.
    pub fn cipher(&self) -> CoreResult<Option<PageCipher>> {
        match (&self.encryption_key, &self.encryption_iv) {
            (Some(key), Some(iv)) => Ok(Some(PageCipher::new(key, iv)?)),
            _ => Ok(None),
        }
    }
}
