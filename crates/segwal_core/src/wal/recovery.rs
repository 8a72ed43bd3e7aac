//! Startup recovery of segment metadata.
//!
//! Recovery never rewrites or truncates segment files. It only works out
//! where writing resumes and how many bytes each segment holds:
//!
//! 1. Segment files are discovered and opened in id order.
//! 2. Every page of the last segment is verified. The first page that fails
//!    ends the readable log; a warning is logged and later pages are left
//!    alone.
//! 3. For older segments only the final page is inspected, to size them.
//! 4. The highest operation id seen seeds the page operation counter.

use crate::crypto::PageCipher;
use crate::error::CoreResult;
use crate::segment::SegmentStore;
use crate::wal::page::Page;
use std::collections::BTreeMap;

/// Verification summary of one segment file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentScan {
    /// Segment id.
    pub segment: u64,
    /// Whole pages in the file.
    pub pages: u64,
    /// Pages that passed verification.
    pub valid_pages: u64,
    /// Index of the first page that failed verification.
    pub first_invalid: Option<u64>,
    /// Highest page operation id among valid pages.
    pub max_operation_id: u32,
    /// Bytes up to the end of the last record before `first_invalid`.
    pub used_bytes: u64,
}

impl SegmentScan {
    /// Returns true if every page verified.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.first_invalid.is_none()
    }
}

/// Verifies every page of `segment`.
///
/// With `stop_at_invalid`, scanning ends at the first bad page.
///
/// # Errors
///
/// Returns an error on I/O failure.
pub fn scan_segment(
    store: &SegmentStore,
    cipher: Option<&PageCipher>,
    segment: u64,
    stop_at_invalid: bool,
) -> CoreResult<SegmentScan> {
    let page_size = store.page_size() as u64;
    let pages = store.page_count(segment)?.unwrap_or(0);
    let mut scan = SegmentScan {
        segment,
        pages,
        ..SegmentScan::default()
    };

    for index in 0..pages {
        let Some(raw) = store.read_page(segment, index)? else {
            break;
        };
        match Page::open(raw, cipher, segment, index) {
            Some(page) => {
                scan.valid_pages += 1;
                scan.max_operation_id = scan.max_operation_id.max(page.operation_id());
                if scan.first_invalid.is_none() {
                    scan.used_bytes = index * page_size + page.used() as u64;
                }
            }
            None => {
                if scan.first_invalid.is_none() {
                    scan.first_invalid = Some(index);
                }
                if stop_at_invalid {
                    break;
                }
            }
        }
    }
    Ok(scan)
}

/// Sizes a segment from its final page.
fn last_page_size(
    store: &SegmentStore,
    cipher: Option<&PageCipher>,
    segment: u64,
) -> CoreResult<u64> {
    let page_size = store.page_size() as u64;
    let pages = store.page_count(segment)?.unwrap_or(0);
    if pages == 0 {
        return Ok(0);
    }
    let last = pages - 1;
    let used = store
        .read_page(segment, last)?
        .and_then(|raw| Page::open(raw, cipher, segment, last))
        .map_or(page_size, |page| page.used() as u64);
    Ok(last * page_size + used)
}

/// What recovery learned about the segments on disk.
#[derive(Debug, Default)]
pub(crate) struct Recovered {
    /// Used bytes per segment, in id order.
    pub(crate) segment_sizes: BTreeMap<u64, u64>,
    /// Next page operation id.
    pub(crate) next_operation_id: u32,
}

impl Recovered {
    pub(crate) fn first_segment(&self) -> Option<u64> {
        self.segment_sizes.keys().next().copied()
    }

    pub(crate) fn last_segment(&self) -> Option<u64> {
        self.segment_sizes.keys().next_back().copied()
    }
}

/// Discovers and opens the segments in the store.
///
/// # Errors
///
/// Returns an error on I/O failure, or if `filter` is off and the directory
/// holds files that are not segments of this log.
pub(crate) fn recover(
    store: &SegmentStore,
    cipher: Option<&PageCipher>,
    filter: bool,
) -> CoreResult<Recovered> {
    let ids = store.discover(filter)?;
    store.open_existing(&ids)?;

    let mut recovered = Recovered::default();
    let Some((&last, older)) = ids.split_last() else {
        return Ok(recovered);
    };

    for &segment in older {
        let size = last_page_size(store, cipher, segment)?;
        recovered.segment_sizes.insert(segment, size);
    }

    let scan = scan_segment(store, cipher, last, true)?;
    if let Some(index) = scan.first_invalid {
        tracing::warn!(
            segment = last,
            page = index,
            pages = scan.pages,
            "invalid page in last segment; log is readable up to this page"
        );
    }
    recovered.segment_sizes.insert(last, scan.used_bytes);
    recovered.next_operation_id = scan.max_operation_id.wrapping_add(1);

    tracing::debug!(
        segments = ids.len(),
        first = ids[0],
        last,
        "recovered segments"
    );
    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::page::RECORDS_OFFSET;
    use tempfile::tempdir;

    const PAGE: usize = 64;

    fn write_pages(store: &SegmentStore, segment: u64, fills: &[usize]) {
        for (index, &fill) in fills.iter().enumerate() {
            let mut page = Page::new(PAGE);
            page.append(&vec![7u8; fill]);
            let raw = page.seal(index as u32 + 10, None, segment, index as u64);
            store.write_page(segment, index as u64, &raw).unwrap();
        }
    }

    #[test]
    fn empty_directory() {
        let dir = tempdir().unwrap();
        let store = SegmentStore::new(dir.path(), "walTest", PAGE);
        let recovered = recover(&store, None, true).unwrap();
        assert!(recovered.first_segment().is_none());
        assert_eq!(recovered.next_operation_id, 0);
    }

    #[test]
    fn sizes_and_operation_id() {
        let dir = tempdir().unwrap();
        {
            let store = SegmentStore::new(dir.path(), "walTest", PAGE);
            write_pages(&store, 1, &[42, 42, 10]);
            write_pages(&store, 2, &[42, 5]);
        }

        let store = SegmentStore::new(dir.path(), "walTest", PAGE);
        let recovered = recover(&store, None, true).unwrap();
        assert_eq!(recovered.first_segment(), Some(1));
        assert_eq!(recovered.last_segment(), Some(2));
        assert_eq!(
            recovered.segment_sizes[&1],
            2 * PAGE as u64 + (RECORDS_OFFSET + 10) as u64
        );
        assert_eq!(
            recovered.segment_sizes[&2],
            PAGE as u64 + (RECORDS_OFFSET + 5) as u64
        );
        assert_eq!(recovered.next_operation_id, 12);
    }

    #[test]
    fn scan_reports_first_invalid_page() {
        let dir = tempdir().unwrap();
        let store = SegmentStore::new(dir.path(), "walTest", PAGE);
        write_pages(&store, 1, &[42, 42, 42, 42]);

        // Flip a record byte of page 1.
        let mut raw = store.read_page(1, 1).unwrap().unwrap();
        raw[40] ^= 0xFF;
        store.write_page(1, 1, &raw).unwrap();

        let full = scan_segment(&store, None, 1, false).unwrap();
        assert_eq!(full.pages, 4);
        assert_eq!(full.valid_pages, 3);
        assert_eq!(full.first_invalid, Some(1));
        assert_eq!(full.used_bytes, (RECORDS_OFFSET + 42) as u64);
        assert!(!full.is_clean());

        let stopped = scan_segment(&store, None, 1, true).unwrap();
        assert_eq!(stopped.valid_pages, 1);
    }

    #[test]
    fn recovery_leaves_files_untouched() {
        let dir = tempdir().unwrap();
        {
            let store = SegmentStore::new(dir.path(), "walTest", PAGE);
            write_pages(&store, 1, &[42, 42]);
            let mut raw = store.read_page(1, 1).unwrap().unwrap();
            raw[0] ^= 0xFF;
            store.write_page(1, 1, &raw).unwrap();
        }
        let path = dir.path().join("walTest.1.wal");
        let before = std::fs::read(&path).unwrap();

        let store = SegmentStore::new(dir.path(), "walTest", PAGE);
        let recovered = recover(&store, None, true).unwrap();
        assert_eq!(recovered.segment_sizes[&1], (RECORDS_OFFSET + 42) as u64);
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
