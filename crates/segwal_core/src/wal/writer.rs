//! Writer state: LSN allocation, page assembly, and the write cache.
//!
//! Everything here runs under the log's state mutex. Callers encode records
//! before taking the lock, so the critical section is a position computation
//! plus a memcpy into cached pages.

use crate::types::Lsn;
use crate::wal::page::{Page, RECORDS_OFFSET};
use crate::wal::record::RECORD_HEADER_SIZE;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

/// `(segment, page index)`.
pub(crate) type PageId = (u64, u64);

/// Outcome of one append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Appended {
    pub(crate) lsn: Lsn,
    /// Set when the append opened a new segment.
    pub(crate) rotated_to: Option<u64>,
}

/// Pages handed to a flush pass.
#[derive(Debug, Default)]
pub(crate) struct DirtyPages {
    pub(crate) pages: Vec<(PageId, Page)>,
    /// Last LSN logged when the snapshot was taken.
    pub(crate) last: Option<Lsn>,
}

/// Mutable state of the append path.
#[derive(Debug)]
pub(crate) struct WriterState {
    page_size: usize,
    /// Pages not yet written, plus the tail page of the active segment.
    pages: BTreeMap<PageId, Page>,
    /// Pages changed since the last flush snapshot.
    dirty: BTreeSet<PageId>,
    active_segment: u64,
    /// Pages allocated in the active segment.
    active_pages: u64,
    segment_started: Instant,
    /// Used bytes per retained segment.
    segment_sizes: BTreeMap<u64, u64>,
    begin: Lsn,
    last: Option<Lsn>,
}

impl WriterState {
    /// State for a log without segments on disk.
    pub(crate) fn new(page_size: usize, first_segment: u64) -> Self {
        Self::recovered(page_size, first_segment, first_segment, BTreeMap::new())
    }

    /// State resuming in `next_segment` after recovery.
    pub(crate) fn recovered(
        page_size: usize,
        begin_segment: u64,
        next_segment: u64,
        segment_sizes: BTreeMap<u64, u64>,
    ) -> Self {
        Self {
            page_size,
            pages: BTreeMap::new(),
            dirty: BTreeSet::new(),
            active_segment: next_segment,
            active_pages: 0,
            segment_started: Instant::now(),
            segment_sizes,
            begin: Lsn::new(begin_segment, RECORDS_OFFSET as u64),
            last: None,
        }
    }

    pub(crate) fn begin(&self) -> Lsn {
        self.begin
    }

    pub(crate) fn end(&self) -> Lsn {
        self.last.unwrap_or(self.begin)
    }

    pub(crate) fn active_segment(&self) -> u64 {
        self.active_segment
    }

    /// Returns true if the active segment holds at least one record.
    pub(crate) fn active_has_records(&self) -> bool {
        self.active_pages > 0
    }

    pub(crate) fn page(&self, segment: u64, index: u64) -> Option<&Page> {
        self.pages.get(&(segment, index))
    }

    pub(crate) fn cached_bytes(&self) -> u64 {
        (self.pages.len() * self.page_size) as u64
    }

    pub(crate) fn segment_sizes(&self) -> &BTreeMap<u64, u64> {
        &self.segment_sizes
    }

    /// Retained segments below the active one.
    pub(crate) fn non_active_segments(&self) -> Vec<u64> {
        self.segment_sizes
            .range(..self.active_segment)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Appends encoded record bytes, rotating first if the active segment
    /// has records and either is too old or would grow past
    /// `max_segment_size`.
    pub(crate) fn append(
        &mut self,
        bytes: &[u8],
        max_segment_size: u64,
        segments_interval: Option<Duration>,
    ) -> Appended {
        let mut rotated_to = None;
        if self.active_has_records() {
            let expired =
                segments_interval.is_some_and(|interval| self.segment_started.elapsed() >= interval);
            if expired || self.would_exceed(bytes.len(), max_segment_size) {
                rotated_to = Some(self.rotate());
            }
        }
        Appended {
            lsn: self.write(bytes),
            rotated_to,
        }
    }

    /// Closes the active segment to writes and opens the next one.
    pub(crate) fn rotate(&mut self) -> u64 {
        self.active_segment += 1;
        self.active_pages = 0;
        self.segment_started = Instant::now();
        self.active_segment
    }

    /// Opens `segment` for appends when it lies beyond the active one.
    ///
    /// Returns false if the active segment is already at or past it. A log
    /// that holds no records yet begins at `segment`.
    pub(crate) fn skip_to(&mut self, segment: u64) -> bool {
        if segment <= self.active_segment {
            return false;
        }
        if self.segment_sizes.is_empty() {
            self.begin = Lsn::new(segment, RECORDS_OFFSET as u64);
        }
        self.active_segment = segment;
        self.active_pages = 0;
        self.segment_started = Instant::now();
        true
    }

    /// Where the next record would start: `(page index, offset)`, and
    /// whether that page still has to be allocated.
    fn next_start(&self) -> (u64, usize, bool) {
        if self.active_pages == 0 {
            return (0, RECORDS_OFFSET, true);
        }
        let tail = self.active_pages - 1;
        match self.pages.get(&(self.active_segment, tail)) {
            Some(page) if page.free() >= RECORD_HEADER_SIZE => (tail, page.used(), false),
            _ => (self.active_pages, RECORDS_OFFSET, true),
        }
    }

    fn would_exceed(&self, len: usize, max_segment_size: u64) -> bool {
        let (mut index, mut used, _) = self.next_start();
        let mut remaining = len;
        loop {
            let room = self.page_size - used;
            if remaining <= room {
                break;
            }
            remaining -= room;
            index += 1;
            used = RECORDS_OFFSET;
        }
        (index + 1) * self.page_size as u64 > max_segment_size
    }

    fn allocate(&mut self) -> u64 {
        let index = self.active_pages;
        self.pages
            .insert((self.active_segment, index), Page::new(self.page_size));
        self.active_pages += 1;
        index
    }

    fn write(&mut self, bytes: &[u8]) -> Lsn {
        let (mut index, offset, fresh) = self.next_start();
        if fresh {
            index = self.allocate();
        }
        let segment = self.active_segment;
        let lsn = Lsn::from_page(segment, index, offset, self.page_size);

        let mut rest = bytes;
        let mut used = offset;
        loop {
            if let Some(page) = self.pages.get_mut(&(segment, index)) {
                let n = page.append(rest);
                rest = &rest[n..];
                used = page.used();
            }
            self.dirty.insert((segment, index));
            if rest.is_empty() {
                break;
            }
            index = self.allocate();
        }

        self.segment_sizes
            .insert(segment, index * self.page_size as u64 + used as u64);
        self.last = Some(lsn);
        lsn
    }

    /// Takes a copy of every dirty page for a flush pass.
    pub(crate) fn take_dirty(&mut self) -> DirtyPages {
        let dirty = std::mem::take(&mut self.dirty);
        let pages = dirty
            .into_iter()
            .filter_map(|id| self.pages.get(&id).map(|page| (id, page.clone())))
            .collect();
        DirtyPages {
            pages,
            last: self.last,
        }
    }

    /// Marks pages dirty again after a failed flush pass.
    pub(crate) fn restore_dirty(&mut self, ids: impl IntoIterator<Item = PageId>) {
        for id in ids {
            if self.pages.contains_key(&id) {
                self.dirty.insert(id);
            }
        }
    }

    /// Drops written pages from the cache.
    ///
    /// The active tail and pages changed since the snapshot stay cached.
    pub(crate) fn release(&mut self, written: impl IntoIterator<Item = PageId>) {
        let tail = self
            .active_pages
            .checked_sub(1)
            .map(|index| (self.active_segment, index));
        for id in written {
            if Some(id) != tail && !self.dirty.contains(&id) {
                self.pages.remove(&id);
            }
        }
    }

    /// Forgets every segment below `floor` and moves `begin` to it.
    pub(crate) fn cut_below(&mut self, floor: u64) {
        self.begin = Lsn::new(floor, RECORDS_OFFSET as u64);
        self.pages = self.pages.split_off(&(floor, 0));
        self.dirty = self.dirty.split_off(&(floor, 0));
        self.segment_sizes = self.segment_sizes.split_off(&floor);
    }
}
