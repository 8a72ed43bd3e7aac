//! The write-ahead log handle.

use crate::config::WalConfig;
use crate::crypto::PageCipher;
use crate::dir::{available_space, WalDir};
use crate::error::{CoreError, CoreResult};
use crate::segment::SegmentStore;
use crate::stats::{StatsSnapshot, WalStats};
use crate::types::Lsn;
use crate::wal::events::{Listeners, WalListener};
use crate::wal::flush::FlushWorker;
use crate::wal::page::Page;
use crate::wal::reader::{PageFetch, PageSource, RecordScanner};
use crate::wal::record::{LoggedRecord, WalRecord};
use crate::wal::recovery::{self, Recovered};
use crate::wal::retention::CutTillLimits;
use crate::wal::writer::{PageId, WriterState};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// State owned by flush passes and retention.
#[derive(Debug)]
struct FlushState {
    operation_id: u32,
    /// Segments written since their last fsync.
    unsynced: BTreeSet<u64>,
}

/// State shared between log handles and the flush worker.
///
/// Lock order: `flush`, then `state`, then `limits`.
#[derive(Debug)]
pub(crate) struct Shared {
    config: WalConfig,
    page_size: usize,
    max_cache_size: i32,
    cipher: Option<PageCipher>,
    segments: SegmentStore,
    state: Mutex<WriterState>,
    flush: Mutex<FlushState>,
    limits: Mutex<CutTillLimits>,
    flushed: Mutex<Option<Lsn>>,
    stats: WalStats,
    listeners: Listeners,
}

impl Shared {
    pub(crate) fn config(&self) -> &WalConfig {
        &self.config
    }

    /// Writes every dirty page, fsyncing when `sync` is set.
    ///
    /// Returns the number of pages written.
    pub(crate) fn flush_pass(&self, sync: bool) -> CoreResult<usize> {
        let mut flush = self.flush.lock();
        let snapshot = self.state.lock().take_dirty();
        let ids: Vec<PageId> = snapshot.pages.iter().map(|(id, _)| *id).collect();

        for ((segment, index), page) in &snapshot.pages {
            flush.operation_id = flush.operation_id.wrapping_add(1);
            let raw = page.seal(flush.operation_id, self.cipher.as_ref(), *segment, *index);
            if let Err(err) = self.segments.write_page(*segment, *index, &raw) {
                self.state.lock().restore_dirty(ids);
                return Err(err);
            }
            flush.unsynced.insert(*segment);
        }

        if sync {
            let pending: Vec<u64> = flush.unsynced.iter().copied().collect();
            for segment in pending {
                let started = Instant::now();
                if let Err(err) = self.segments.sync(segment) {
                    self.state.lock().restore_dirty(ids);
                    return Err(err);
                }
                self.stats.record_fsync(started.elapsed());
                flush.unsynced.remove(&segment);
            }
            if let Some(last) = snapshot.last {
                *self.flushed.lock() = Some(last);
            }
        }

        let written = ids.len();
        self.state.lock().release(ids);
        self.stats.record_flush_pass(written as u64);
        if written > 0 {
            tracing::trace!(pages = written, sync, "flush pass");
        }
        Ok(written)
    }

    /// Raises listener events for the size and free space limits.
    pub(crate) fn check_thresholds(&self) {
        let (size, has_older) = {
            let state = self.state.lock();
            let size = self.allocated_size(&state);
            (size, !state.non_active_segments().is_empty())
        };

        let hard_limit = self.config.wal_size_hard_limit;
        if hard_limit > 0 && size > hard_limit as u64 {
            tracing::warn!(size, limit = hard_limit, "log exceeds its hard size limit");
            self.listeners.checkpoint_request(size);
        } else if self.config.keep_single_segment && has_older {
            self.listeners.checkpoint_request(size);
        }

        let free_limit = self.config.free_space_limit;
        if free_limit > 0 {
            match available_space(&self.config.storage_dir) {
                Ok(available) if available < free_limit as u64 => {
                    tracing::warn!(available, limit = free_limit, "low disk space");
                    self.listeners.low_disk_space(available, free_limit as u64);
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "cannot query free space"),
            }
        }
    }

    pub(crate) fn print_statistics(&self) {
        let stats = self.stats.snapshot();
        tracing::info!(
            log = %self.config.name,
            locale = %self.config.locale,
            records = stats.records_logged,
            bytes = stats.bytes_logged,
            pages = stats.pages_written,
            fsyncs = stats.fsyncs,
            mean_fsync_us = stats.mean_fsync_micros(),
            max_fsync_us = stats.max_fsync_micros,
            "log statistics"
        );
    }

    /// Sum of segment sizes rounded up to whole pages.
    fn allocated_size(&self, state: &WriterState) -> u64 {
        let page_size = self.page_size as u64;
        state
            .segment_sizes()
            .values()
            .map(|used| used.div_ceil(page_size) * page_size)
            .sum()
    }

    fn append(&self, record: &WalRecord) -> CoreResult<Lsn> {
        let bytes = record.encode()?;
        let appended = self.state.lock().append(
            &bytes,
            self.config.max_segment_size,
            self.config.segments_interval,
        );

        self.stats.record_logged(bytes.len() as u64);
        if let Some(segment) = appended.rotated_to {
            self.stats.record_segment_created();
            tracing::debug!(segment, "rotated to new segment");
        }
        Ok(appended.lsn)
    }

    fn over_cache_limit(&self) -> bool {
        let cached = self.state.lock().cached_bytes();
        i64::try_from(cached).map_or(true, |cached| cached > i64::from(self.max_cache_size))
    }
}

impl PageSource for Shared {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn fetch(&self, segment: u64, index: u64) -> CoreResult<PageFetch> {
        {
            let state = self.state.lock();
            if segment < state.begin().segment() {
                return Ok(PageFetch::Missing);
            }
            if let Some(page) = state.page(segment, index) {
                return Ok(PageFetch::Page(page.clone()));
            }
        }

        let Some(raw) = self.segments.read_page(segment, index)? else {
            return Ok(PageFetch::Missing);
        };
        Ok(match Page::open(raw, self.cipher.as_ref(), segment, index) {
            Some(page) => PageFetch::Page(page),
            None => {
                self.stats.record_checksum_failure();
                tracing::warn!(segment, page = index, "page failed verification");
                PageFetch::Corrupt
            }
        })
    }
}

/// A segmented, paginated write-ahead log.
///
/// Appends are serialized behind a short critical section and land in an
/// in-memory page cache. A background worker writes pages out; [`flush`]
/// forces a synchronous write and fsync. All methods take `&self`, so the
/// log can be shared across threads behind an `Arc`.
///
/// Once [`close`] or [`delete`] has run, every operation except the plain
/// accessors fails with [`CoreError::LogClosed`].
///
/// # Example
///
/// ```rust,ignore
/// use segwal_core::{RecordRegistry, RecordType, WalConfig, WalRecord, WriteAheadLog};
///
/// let registry = RecordRegistry::new().with_type(RecordType::new(1024), "put")?;
/// let wal = WriteAheadLog::open(WalConfig::new("db", "/var/lib/db/wal").record_types(registry))?;
///
/// let lsn = wal.log(&WalRecord::data(RecordType::new(1024), b"hello".to_vec()))?;
/// wal.flush()?;
/// assert!(wal.flushed_lsn()? >= Some(lsn));
/// ```
///
/// [`flush`]: WriteAheadLog::flush
/// [`close`]: WriteAheadLog::close
/// [`delete`]: WriteAheadLog::delete
pub struct WriteAheadLog {
    shared: Arc<Shared>,
    worker: FlushWorker,
    dir: Mutex<WalDir>,
    is_open: RwLock<bool>,
}

impl WriteAheadLog {
    /// Opens the log described by `config`, recovering any existing segments.
    ///
    /// On a directory with segments `first..=last`, writing resumes in a new
    /// segment `last + 1` that starts with an empty record, and that record
    /// is flushed before `open` returns.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid (`InvalidConfig`, key or IV size)
    /// - Another process holds the log directory (`LogLocked`)
    /// - The directory holds foreign segment files while filtering is off
    /// - I/O errors occur
    pub fn open(config: WalConfig) -> CoreResult<Self> {
        config.validate()?;
        let cipher = config.cipher()?;
        let page_size = config.page_size;
        let max_cache_size = config.max_cache_size();

        let dir = WalDir::open(&config.wal_dir)?;
        let segments = SegmentStore::new(dir.path(), config.segment_base_name(), page_size);
        let recovered = recovery::recover(&segments, cipher.as_ref(), config.filter_wal_files)?;
        let resumed = recovered.last_segment().is_some();
        let next_operation_id = recovered.next_operation_id;
        let state = initial_state(page_size, recovered);

        let shared = Arc::new(Shared {
            page_size,
            max_cache_size,
            cipher,
            segments,
            state: Mutex::new(state),
            flush: Mutex::new(FlushState {
                operation_id: next_operation_id,
                unsynced: BTreeSet::new(),
            }),
            limits: Mutex::new(CutTillLimits::default()),
            flushed: Mutex::new(None),
            stats: WalStats::new(),
            listeners: Listeners::default(),
            config,
        });
        let worker = FlushWorker::spawn(Arc::clone(&shared))?;

        let wal = Self {
            shared,
            worker,
            dir: Mutex::new(dir),
            is_open: RwLock::new(true),
        };

        if resumed {
            wal.shared.append(&WalRecord::Empty)?;
            wal.flush()?;
        }

        tracing::info!(
            log = %wal.shared.config.name,
            dir = %wal.shared.config.wal_dir.display(),
            begin = %wal.begin()?,
            end = %wal.end()?,
            encrypted = wal.shared.cipher.is_some(),
            "opened write-ahead log"
        );
        Ok(wal)
    }

    /// Appends a record and returns its LSN.
    ///
    /// The record is durable only after a flush covers it; see
    /// [`flushed_lsn`](Self::flushed_lsn).
    ///
    /// # Errors
    ///
    /// Returns `UnknownRecordType` for an unregistered type, `LogClosed` on a
    /// closed log.
    pub fn log(&self, record: &WalRecord) -> CoreResult<Lsn> {
        // Held until the record is cached, so close() flushes it.
        let _open = self.open_guard()?;
        self.shared.config.record_types.check(record)?;
        let lsn = self.shared.append(record)?;
        if self.shared.over_cache_limit() {
            self.worker.nudge();
        }
        Ok(lsn)
    }

    /// Reads up to `limit` records starting at `lsn` inclusive.
    ///
    /// The result is empty when no record starts exactly at `lsn`, or when
    /// `lsn` lies in a segment that has been cut. A page that fails
    /// verification ends the result early.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or a closed log.
    pub fn read(&self, lsn: Lsn, limit: usize) -> CoreResult<Vec<LoggedRecord>> {
        self.ensure_open()?;
        if lsn < self.shared.state.lock().begin() {
            return Ok(Vec::new());
        }
        RecordScanner::new(&*self.shared, &self.shared.config.record_types).read(lsn, limit)
    }

    /// Reads up to `limit` records strictly after the record at `lsn`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or a closed log.
    pub fn next(&self, lsn: Lsn, limit: usize) -> CoreResult<Vec<LoggedRecord>> {
        self.ensure_open()?;
        if lsn < self.shared.state.lock().begin() {
            return Ok(Vec::new());
        }
        RecordScanner::new(&*self.shared, &self.shared.config.record_types).next(lsn, limit)
    }

    /// Writes all cached pages and fsyncs them.
    ///
    /// On return, [`flushed_lsn`](Self::flushed_lsn) is at least the LSN of
    /// every record logged before the call.
    ///
    /// # Errors
    ///
    /// Returns an error if a write or fsync fails.
    pub fn flush(&self) -> CoreResult<()> {
        let _open = self.open_guard()?;
        self.worker.flush()
    }

    /// Returns the highest LSN known to be durable, if any.
    ///
    /// # Errors
    ///
    /// Returns `LogClosed` on a closed log.
    pub fn flushed_lsn(&self) -> CoreResult<Option<Lsn>> {
        self.ensure_open()?;
        Ok(*self.shared.flushed.lock())
    }

    /// Returns the lowest retained LSN.
    ///
    /// # Errors
    ///
    /// Returns `LogClosed` on a closed log.
    pub fn begin(&self) -> CoreResult<Lsn> {
        self.ensure_open()?;
        Ok(self.shared.state.lock().begin())
    }

    /// Returns the LSN of the most recent record, or `begin` if none.
    ///
    /// # Errors
    ///
    /// Returns `LogClosed` on a closed log.
    pub fn end(&self) -> CoreResult<Lsn> {
        self.ensure_open()?;
        Ok(self.shared.state.lock().end())
    }

    /// Closes the active segment and starts the next one.
    ///
    /// Both segments receive an empty record when they hold none, so each
    /// segment id ends up as a file on disk. Returns the new active segment.
    ///
    /// # Errors
    ///
    /// Returns `LogClosed` on a closed log.
    pub fn append_new_segment(&self) -> CoreResult<u64> {
        self.ensure_open()?;
        let bytes = WalRecord::Empty.encode()?;
        let max_segment_size = self.shared.config.max_segment_size;
        let (segment, logged) = {
            let mut state = self.shared.state.lock();
            let mut logged = 1;
            if !state.active_has_records() {
                state.append(&bytes, max_segment_size, None);
                logged += 1;
            }
            let segment = state.rotate();
            state.append(&bytes, max_segment_size, None);
            (segment, logged)
        };
        for _ in 0..logged {
            self.shared.stats.record_logged(bytes.len() as u64);
        }
        self.shared.stats.record_segment_created();
        tracing::debug!(segment, "appended new segment");
        Ok(segment)
    }

    /// Moves writing past `lsn`, so the next record logged gets a larger LSN.
    ///
    /// Used after restoring data logged elsewhere: when the active segment
    /// is not already beyond `lsn.segment()`, appends jump to segment
    /// `lsn.segment() + 1`, which starts with an empty record. Skipped
    /// segment ids never get a file, so scans do not cross the jump.
    ///
    /// # Errors
    ///
    /// Returns `LogClosed` on a closed log.
    pub fn move_lsn_after(&self, lsn: Lsn) -> CoreResult<()> {
        let _open = self.open_guard()?;
        let target = lsn.segment().saturating_add(1);
        let bytes = WalRecord::Empty.encode()?;
        let marker = {
            let mut state = self.shared.state.lock();
            if !state.skip_to(target) {
                return Ok(());
            }
            state.append(&bytes, self.shared.config.max_segment_size, None).lsn
        };
        self.shared.stats.record_logged(bytes.len() as u64);
        self.shared.stats.record_segment_created();
        tracing::info!(after = %lsn, marker = %marker, "moved log position");
        Ok(())
    }

    /// Returns the id of the segment receiving appends.
    ///
    /// # Errors
    ///
    /// Returns `LogClosed` on a closed log.
    pub fn active_segment(&self) -> CoreResult<u64> {
        self.ensure_open()?;
        Ok(self.shared.state.lock().active_segment())
    }

    /// Returns the ids of retained segments other than the active one.
    ///
    /// # Errors
    ///
    /// Returns `LogClosed` on a closed log.
    pub fn non_active_segments(&self) -> CoreResult<Vec<u64>> {
        self.ensure_open()?;
        Ok(self.shared.state.lock().non_active_segments())
    }

    /// Registers an LSN that cuts must not pass.
    ///
    /// Limits are counted; each registration needs its own removal.
    ///
    /// # Errors
    ///
    /// Returns `LogClosed` on a closed log.
    pub fn add_cut_till_limit(&self, lsn: Lsn) -> CoreResult<()> {
        self.ensure_open()?;
        self.shared.limits.lock().add(lsn);
        Ok(())
    }

    /// Drops one registration of a cut-till limit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `lsn` is not registered, `LogClosed` on
    /// a closed log.
    pub fn remove_cut_till_limit(&self, lsn: Lsn) -> CoreResult<()> {
        self.ensure_open()?;
        self.shared.limits.lock().remove(lsn)
    }

    /// Removes every segment wholly below the segment of `lsn`.
    ///
    /// Returns true if any segment was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment file cannot be removed.
    pub fn cut_till(&self, lsn: Lsn) -> CoreResult<bool> {
        self.cut_all_segments_smaller_than(lsn.segment())
    }

    /// Removes every segment with an id below `segment`.
    ///
    /// The active segment and the segment of the lowest cut-till limit are
    /// never removed, nor is anything after them. Returns true if any
    /// segment was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment file cannot be removed.
    pub fn cut_all_segments_smaller_than(&self, segment: u64) -> CoreResult<bool> {
        self.ensure_open()?;
        let shared = &self.shared;
        let _flush = shared.flush.lock();

        let floor = {
            let mut state = shared.state.lock();
            let floor = shared.limits.lock().floor(segment, state.active_segment());
            if floor <= state.begin().segment() {
                return Ok(false);
            }
            state.cut_below(floor);
            floor
        };

        let removed = shared.segments.remove_below(floor)?;
        shared.stats.record_segments_removed(removed.len() as u64);
        tracing::info!(floor, removed = removed.len(), "cut log segments");
        Ok(!removed.is_empty())
    }

    /// Returns the on-disk footprint of retained segments, in whole pages.
    ///
    /// # Errors
    ///
    /// Returns `LogClosed` on a closed log.
    pub fn size(&self) -> CoreResult<u64> {
        self.ensure_open()?;
        let state = self.shared.state.lock();
        Ok(self.shared.allocated_size(&state))
    }

    /// Returns the bytes occupied by retained segments up to the end of the
    /// last record of each.
    ///
    /// # Errors
    ///
    /// Returns `LogClosed` on a closed log.
    pub fn seg_size(&self) -> CoreResult<u64> {
        self.ensure_open()?;
        Ok(self.shared.state.lock().segment_sizes().values().sum())
    }

    /// Registers a listener for checkpoint and disk space events.
    pub fn add_listener(&self, listener: Arc<dyn WalListener>) {
        self.shared.listeners.add(listener);
    }

    /// Unregisters a listener previously passed to
    /// [`add_listener`](Self::add_listener).
    pub fn remove_listener(&self, listener: &Arc<dyn WalListener>) {
        self.shared.listeners.remove(listener);
    }

    /// Flushes, stops the flush worker, and releases the directory lock.
    ///
    /// Closing an already closed log does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails. The log is closed either
    /// way.
    pub fn close(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        *is_open = false;

        let result = self.worker.shutdown(true);
        self.shared.segments.close();
        self.dir.lock().release();
        tracing::info!(log = %self.shared.config.name, "closed write-ahead log");
        result
    }

    /// Discards unflushed records and removes every segment file and the
    /// LOCK file. The directory itself is kept.
    ///
    /// # Errors
    ///
    /// Returns `LogClosed` if the log was already closed, or an error if a
    /// file cannot be removed.
    pub fn delete(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Err(CoreError::LogClosed);
        }
        *is_open = false;

        if let Err(err) = self.worker.shutdown(false) {
            tracing::warn!(error = %err, "flush worker did not stop cleanly");
        }
        let removed = self.shared.segments.remove_all()?;
        self.dir.lock().remove_lock()?;
        tracing::info!(
            log = %self.shared.config.name,
            segments = removed.len(),
            "deleted write-ahead log"
        );
        Ok(())
    }

    /// Returns true until the log is closed or deleted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    /// Returns the page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.shared.page_size
    }

    /// Returns the write cache limit in bytes.
    #[must_use]
    pub fn max_cache_size(&self) -> i32 {
        self.shared.max_cache_size
    }

    /// Returns a snapshot of the log statistics.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Returns the configuration the log was opened with.
    #[must_use]
    pub fn config(&self) -> &WalConfig {
        &self.shared.config
    }

    fn ensure_open(&self) -> CoreResult<()> {
        self.open_guard().map(drop)
    }

    /// Read guard on the open flag; `close` and `delete` wait for it.
    fn open_guard(&self) -> CoreResult<RwLockReadGuard<'_, bool>> {
        let guard = self.is_open.read();
        if *guard {
            Ok(guard)
        } else {
            Err(CoreError::LogClosed)
        }
    }
}

fn initial_state(page_size: usize, recovered: Recovered) -> WriterState {
    match (recovered.first_segment(), recovered.last_segment()) {
        (Some(first), Some(last)) => {
            WriterState::recovered(page_size, first, last + 1, recovered.segment_sizes)
        }
        _ => WriterState::new(page_size, 1),
    }
}

impl std::fmt::Debug for WriteAheadLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteAheadLog")
            .field("name", &self.shared.config.name)
            .field("is_open", &self.is_open())
            .field("page_size", &self.shared.page_size)
            .finish_non_exhaustive()
    }
}

impl Drop for WriteAheadLog {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "error closing write-ahead log");
        }
    }
}
