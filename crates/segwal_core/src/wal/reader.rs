//! Forward record scanning over pages.
//!
//! The scanner only needs one primitive: fetch page `(segment, index)`. Where
//! the page comes from (write cache, segment file, a test fixture) is up to
//! the [`PageSource`].
//!
//! Starting from an LSN, the next record begins
//! - at the current offset, if the page has written bytes there,
//! - else at `RECORDS_OFFSET` of the next page of the same segment,
//! - else at `RECORDS_OFFSET` of page 0 of the next segment,
//! - else the log is exhausted.
//!
//! A page that fails verification ends the scan. So does a header with an
//! unregistered type, or a payload whose continuation page is missing. None
//! of these is an error; the caller sees a shorter result.

use crate::error::CoreResult;
use crate::types::Lsn;
use crate::wal::page::{Page, RECORDS_OFFSET};
use crate::wal::record::{
    LoggedRecord, RecordHeader, RecordRegistry, WalRecord, RECORD_HEADER_SIZE,
};

/// Result of fetching one page.
#[derive(Debug)]
pub enum PageFetch {
    /// A verified plaintext page.
    Page(Page),
    /// The page does not exist.
    Missing,
    /// The page exists but failed verification.
    Corrupt,
}

/// Provider of verified pages.
pub trait PageSource {
    /// Returns the page size of the log.
    fn page_size(&self) -> usize;

    /// Fetches page `index` of `segment`.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures; absence and corruption are
    /// reported through [`PageFetch`].
    fn fetch(&self, segment: u64, index: u64) -> CoreResult<PageFetch>;
}

/// Position of the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    segment: u64,
    index: u64,
    offset: usize,
}

impl Cursor {
    fn at(lsn: Lsn, page_size: usize) -> Self {
        Self {
            segment: lsn.segment(),
            index: lsn.page_index(page_size),
            offset: lsn.page_offset(page_size),
        }
    }

    fn lsn(self, page_size: usize) -> Lsn {
        Lsn::from_page(self.segment, self.index, self.offset, page_size)
    }
}

/// Scanner over one [`PageSource`].
pub struct RecordScanner<'a, S: PageSource + ?Sized> {
    source: &'a S,
    registry: &'a RecordRegistry,
    page_size: usize,
    page: Option<(u64, u64, Page)>,
}

impl<'a, S: PageSource + ?Sized> RecordScanner<'a, S> {
    /// Creates a scanner.
    pub fn new(source: &'a S, registry: &'a RecordRegistry) -> Self {
        Self {
            source,
            registry,
            page_size: source.page_size(),
            page: None,
        }
    }

    /// Reads up to `limit` records starting at `lsn` inclusive.
    ///
    /// # Errors
    ///
    /// Returns an error if the page source hits an I/O failure.
    pub fn read(&mut self, lsn: Lsn, limit: usize) -> CoreResult<Vec<LoggedRecord>> {
        self.scan(lsn, limit, false)
    }

    /// Reads up to `limit` records strictly after the record at `lsn`.
    ///
    /// If no record can be decoded at `lsn` the result is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the page source hits an I/O failure.
    pub fn next(&mut self, lsn: Lsn, limit: usize) -> CoreResult<Vec<LoggedRecord>> {
        self.scan(lsn, limit, true)
    }

    fn scan(&mut self, lsn: Lsn, limit: usize, skip_first: bool) -> CoreResult<Vec<LoggedRecord>> {
        let mut records = Vec::new();
        if lsn.page_offset(self.page_size) < RECORDS_OFFSET {
            return Ok(records);
        }

        let wanted = if skip_first { limit.saturating_add(1) } else { limit };
        let mut cursor = Cursor::at(lsn, self.page_size);
        let mut first = true;

        while records.len() < wanted {
            let Some(start) = self.locate(cursor, first)? else {
                break;
            };
            if first && start != cursor {
                // Nothing is written exactly at the requested LSN.
                break;
            }
            first = false;

            let Some((record, end)) = self.decode_at(start)? else {
                break;
            };
            records.push(LoggedRecord {
                lsn: start.lsn(self.page_size),
                record,
            });
            cursor = end;
        }

        if skip_first && !records.is_empty() {
            records.remove(0);
        }
        Ok(records)
    }

    fn page(&mut self, segment: u64, index: u64) -> CoreResult<Option<&Page>> {
        let cached = matches!(&self.page, Some((s, i, _)) if *s == segment && *i == index);
        if !cached {
            match self.source.fetch(segment, index)? {
                PageFetch::Page(page) => self.page = Some((segment, index, page)),
                PageFetch::Missing | PageFetch::Corrupt => {
                    self.page = None;
                    return Ok(None);
                }
            }
        }
        Ok(self.page.as_ref().map(|(_, _, page)| page))
    }

    fn is_missing(&self, segment: u64, index: u64) -> CoreResult<bool> {
        Ok(matches!(self.source.fetch(segment, index)?, PageFetch::Missing))
    }

    /// Finds where the next record starts at or after `cursor`.
    fn locate(&mut self, mut cursor: Cursor, first: bool) -> CoreResult<Option<Cursor>> {
        let mut crossed = !first;
        loop {
            let page_size = self.page_size;
            match self.page(cursor.segment, cursor.index)? {
                Some(page) => {
                    if cursor.offset < page.used() && cursor.offset + RECORD_HEADER_SIZE <= page_size
                    {
                        return Ok(Some(cursor));
                    }
                    cursor = Cursor {
                        segment: cursor.segment,
                        index: cursor.index + 1,
                        offset: RECORDS_OFFSET,
                    };
                    crossed = true;
                }
                None => {
                    // Only a page that is absent, after a page we have seen,
                    // moves the scan on to the next segment.
                    if !crossed
                        || cursor.index == 0
                        || !self.is_missing(cursor.segment, cursor.index)?
                    {
                        return Ok(None);
                    }
                    cursor = Cursor {
                        segment: cursor.segment + 1,
                        index: 0,
                        offset: RECORDS_OFFSET,
                    };
                }
            }
        }
    }

    /// Decodes the record starting at `start` and returns it with the
    /// position just past its last byte.
    fn decode_at(&mut self, start: Cursor) -> CoreResult<Option<(WalRecord, Cursor)>> {
        let page_size = self.page_size;
        let header = match self.page(start.segment, start.index)? {
            Some(page) => {
                let bytes = page.slice(start.offset, start.offset + RECORD_HEADER_SIZE);
                match RecordHeader::parse(bytes) {
                    Some(header) => header,
                    None => return Ok(None),
                }
            }
            None => return Ok(None),
        };
        if !self.registry.accepts(&header) {
            return Ok(None);
        }

        let mut payload = Vec::with_capacity(header.payload_len.min(16 * page_size));
        let mut cursor = Cursor {
            offset: start.offset + RECORD_HEADER_SIZE,
            ..start
        };

        while payload.len() < header.payload_len {
            if cursor.offset >= page_size {
                cursor = Cursor {
                    segment: cursor.segment,
                    index: cursor.index + 1,
                    offset: RECORDS_OFFSET,
                };
            }
            let Some(page) = self.page(cursor.segment, cursor.index)? else {
                return Ok(None);
            };
            let want = (header.payload_len - payload.len()).min(page_size - cursor.offset);
            let chunk = page.slice(cursor.offset, cursor.offset + want);
            if chunk.len() != want {
                return Ok(None);
            }
            payload.extend_from_slice(chunk);
            cursor.offset += want;
        }

        Ok(Some((RecordRegistry::decode(&header, payload), cursor)))
    }
}
