//! Read-only access to a log directory.
//!
//! [`LogReader`] opens segment files without taking the directory lock and
//! never writes. It is meant for inspection tools and for tests that look at
//! what a closed log left on disk.

use crate::config::WalConfig;
use crate::crypto::PageCipher;
use crate::error::CoreResult;
use crate::segment::SegmentStore;
use crate::types::Lsn;
use crate::wal::page::{Page, RECORDS_OFFSET};
use crate::wal::reader::{PageFetch, PageSource, RecordScanner};
use crate::wal::record::{LoggedRecord, RecordRegistry};
use crate::wal::recovery::{scan_segment, SegmentScan};

/// Read-only view of the segments in a log directory.
#[derive(Debug)]
pub struct LogReader {
    store: SegmentStore,
    cipher: Option<PageCipher>,
    registry: RecordRegistry,
    segments: Vec<u64>,
}

impl LogReader {
    /// Opens the segments described by `config`.
    ///
    /// The reader decodes the record types registered in `config`; pass a
    /// [`RecordRegistry::permissive`] registry to decode everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the directory
    /// cannot be listed.
    pub fn open(config: &WalConfig) -> CoreResult<Self> {
        config.validate()?;
        let cipher = config.cipher()?;
        let store = SegmentStore::new(&config.wal_dir, config.segment_base_name(), config.page_size);
        let segments = store.discover(config.filter_wal_files)?;
        store.open_existing(&segments)?;
        Ok(Self {
            store,
            cipher,
            registry: config.record_types.clone(),
            segments,
        })
    }

    /// Returns the segment ids on disk, in ascending order.
    #[must_use]
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// Returns the LSN of the first possible record, if any segment exists.
    #[must_use]
    pub fn begin(&self) -> Option<Lsn> {
        self.segments
            .first()
            .map(|&segment| Lsn::new(segment, RECORDS_OFFSET as u64))
    }

    /// Returns the length of a segment file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn segment_len(&self, segment: u64) -> CoreResult<u64> {
        Ok(self.store.byte_len(segment)?.unwrap_or(0))
    }

    /// Verifies every page of a segment.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn scan(&self, segment: u64) -> CoreResult<SegmentScan> {
        scan_segment(&self.store, self.cipher.as_ref(), segment, false)
    }

    /// Reads up to `limit` records starting at `lsn` inclusive.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn read(&self, lsn: Lsn, limit: usize) -> CoreResult<Vec<LoggedRecord>> {
        RecordScanner::new(self, &self.registry).read(lsn, limit)
    }

    /// Reads up to `limit` records after the record at `lsn`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn next(&self, lsn: Lsn, limit: usize) -> CoreResult<Vec<LoggedRecord>> {
        RecordScanner::new(self, &self.registry).next(lsn, limit)
    }

    /// Reads up to `limit` records from the start of the log.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn records(&self, limit: usize) -> CoreResult<Vec<LoggedRecord>> {
        match self.begin() {
            Some(begin) => self.read(begin, limit),
            None => Ok(Vec::new()),
        }
    }
}

impl PageSource for LogReader {
    fn page_size(&self) -> usize {
        self.store.page_size()
    }

    fn fetch(&self, segment: u64, index: u64) -> CoreResult<PageFetch> {
        let Some(raw) = self.store.read_page(segment, index)? else {
            return Ok(PageFetch::Missing);
        };
        Ok(match Page::open(raw, self.cipher.as_ref(), segment, index) {
            Some(page) => PageFetch::Page(page),
            None => PageFetch::Corrupt,
        })
    }
}
