//! End-to-end properties of the append, read and flush paths.

use proptest::prelude::*;
use segwal_core::{CoreError, Lsn, RecordType, WalRecord, DEFAULT_MAX_CACHE_SIZE};
use segwal_testkit::prelude::*;
use std::time::Duration;

const RECORDS_OFFSET: u64 = 22;

#[test]
fn fresh_log_positions() {
    let wal = TestWal::new();
    let start = Lsn::new(1, RECORDS_OFFSET);

    assert_eq!(wal.begin().unwrap(), start);
    assert_eq!(wal.end().unwrap(), start);
    assert_eq!(wal.flushed_lsn().unwrap(), None);
    assert_eq!(wal.active_segment().unwrap(), 1);
    assert!(wal.non_active_segments().unwrap().is_empty());
    assert!(wal.read(start, 10).unwrap().is_empty());
    assert!(wal.next(start, 10).unwrap().is_empty());
}

#[test]
fn lsns_increase_and_end_follows() {
    let wal = TestWal::new();
    let records = RecordWorkload::new(11, 300, 150).records();

    let mut previous = wal.begin().unwrap();
    for (i, record) in records.iter().enumerate() {
        let lsn = wal.log(record).unwrap();
        if i > 0 {
            assert!(lsn > previous, "record {i}: {lsn} <= {previous}");
        }
        assert_eq!(wal.end().unwrap(), lsn);
        previous = lsn;
    }
}

#[test]
fn records_round_trip_across_pages() {
    let wal = TestWal::new();
    let records = RecordWorkload::new(5, 120, 400).records();
    let lsns: Vec<Lsn> = records.iter().map(|r| wal.log(r).unwrap()).collect();

    // From the cache.
    for (record, lsn) in records.iter().zip(&lsns) {
        let back = wal.read(*lsn, 1).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].lsn, *lsn);
        assert_eq!(&back[0].record, record);
    }

    // From the segment files.
    wal.flush().unwrap();
    let all = wal.read(lsns[0], usize::MAX).unwrap();
    assert_eq!(all.len(), records.len());
    for ((logged, record), lsn) in all.iter().zip(&records).zip(&lsns) {
        assert_eq!(logged.lsn, *lsn);
        assert_eq!(&logged.record, record);
    }
}

#[test]
fn next_skips_the_record_at_lsn() {
    let wal = TestWal::new();
    let a = wal.log(&test_record(vec![1; 10])).unwrap();
    let b = wal.log(&test_record(vec![2; 10])).unwrap();
    let c = wal.log(&test_record(vec![3; 10])).unwrap();

    let after_a: Vec<Lsn> = wal.next(a, 10).unwrap().iter().map(|r| r.lsn).collect();
    assert_eq!(after_a, vec![b, c]);
    // Last record of a live log: nothing yet.
    assert!(wal.next(c, 10).unwrap().is_empty());
}

#[test]
fn read_respects_limit() {
    let wal = TestWal::new();
    let first = wal.log(&test_record(vec![0; 5])).unwrap();
    for i in 1..10u8 {
        wal.log(&test_record(vec![i; 5])).unwrap();
    }

    assert_eq!(wal.read(first, 4).unwrap().len(), 4);
    assert!(wal.read(first, 0).unwrap().is_empty());
}

#[test]
fn read_between_records_is_empty() {
    let wal = TestWal::new();
    let lsn = wal.log(&test_record(vec![9; 20])).unwrap();
    wal.flush().unwrap();

    // Inside the payload, where no header can be decoded.
    let inside = Lsn::new(lsn.segment(), lsn.position() + 8);
    assert!(wal.read(inside, 1).unwrap().is_empty());
    assert!(wal.read(Lsn::new(7, RECORDS_OFFSET), 1).unwrap().is_empty());
}

#[test]
fn flush_is_idempotent() {
    let wal = TestWal::new();
    let lsn = wal.log(&test_record(vec![4; 30])).unwrap();

    wal.flush().unwrap();
    let flushed = wal.flushed_lsn().unwrap();
    assert_eq!(flushed, Some(lsn));

    wal.flush().unwrap();
    assert_eq!(wal.flushed_lsn().unwrap(), flushed);
}

#[test]
fn flushed_lsn_covers_background_writes() {
    // Background passes write without fsync; only flush() moves the watermark.
    let wal = TestWal::with_config(|c| c.commit_delay(Duration::from_millis(1)));
    let lsn = wal.log(&test_record(vec![6; 100])).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(wal.flushed_lsn().unwrap(), None);

    wal.flush().unwrap();
    assert_eq!(wal.flushed_lsn().unwrap(), Some(lsn));
}

#[test]
fn unregistered_type_is_rejected() {
    let wal = TestWal::new();
    let err = wal
        .log(&WalRecord::data(RecordType::new(7), vec![1, 2, 3]))
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownRecordType { .. }));
    assert_eq!(wal.end().unwrap(), wal.begin().unwrap());
}

#[test]
fn empty_records_can_be_logged() {
    let wal = TestWal::new();
    let lsn = wal.log(&WalRecord::Empty).unwrap();
    let back = wal.read(lsn, 1).unwrap();
    assert_eq!(back[0].record, WalRecord::Empty);
}

#[test]
fn size_accounting() {
    let wal = TestWal::new();
    assert_eq!(wal.size().unwrap(), 0);
    assert_eq!(wal.seg_size().unwrap(), 0);

    // 6 byte header + 10 byte payload after the page header.
    wal.log(&test_record(vec![1; 10])).unwrap();
    assert_eq!(wal.seg_size().unwrap(), RECORDS_OFFSET + 16);
    assert_eq!(wal.size().unwrap(), TEST_PAGE_SIZE as u64);

    // Spills into a second page.
    wal.log(&test_record(vec![2; 40])).unwrap();
    assert_eq!(wal.size().unwrap(), 2 * TEST_PAGE_SIZE as u64);
    assert!(wal.seg_size().unwrap() <= wal.size().unwrap());
}

#[test]
fn cache_size_is_clamped_on_overflow() {
    let max = TestWal::with_config(|c| c.max_pages_cache_size(i32::MAX));
    assert_eq!(max.max_cache_size(), DEFAULT_MAX_CACHE_SIZE);

    let min = TestWal::with_config(|c| c.max_pages_cache_size(i32::MIN));
    assert_eq!(min.max_cache_size(), DEFAULT_MAX_CACHE_SIZE);

    let fits = TestWal::with_config(|c| c.max_pages_cache_size(100));
    assert_eq!(fits.max_cache_size(), 100 * TEST_PAGE_SIZE as i32);
}

#[test]
fn negative_cache_size_still_logs_and_flushes() {
    let wal = TestWal::with_config(|c| c.max_pages_cache_size(-27));
    assert_eq!(wal.max_cache_size(), -27 * TEST_PAGE_SIZE as i32);

    let lsns: Vec<Lsn> = (0..50u8)
        .map(|i| wal.log(&test_record(vec![i; 25])).unwrap())
        .collect();
    wal.flush().unwrap();
    assert_eq!(wal.read(lsns[0], 100).unwrap().len(), 50);
}

#[test]
fn stats_follow_activity() {
    let wal = TestWal::new();
    for i in 0..10u8 {
        wal.log(&test_record(vec![i; 10])).unwrap();
    }
    wal.flush().unwrap();

    let stats = wal.stats();
    assert_eq!(stats.records_logged, 10);
    assert_eq!(stats.bytes_logged, 160);
    assert!(stats.pages_written >= 4);
    assert!(stats.fsyncs >= 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn batches_read_back_in_order(batch in record_batch_strategy(300, 40)) {
        let wal = TestWal::new();
        let lsns: Vec<Lsn> = batch.iter().map(|r| wal.log(r).unwrap()).collect();
        wal.flush().unwrap();

        let back = wal.read(lsns[0], batch.len()).unwrap();
        prop_assert_eq!(back.len(), batch.len());
        for ((logged, record), lsn) in back.iter().zip(&batch).zip(&lsns) {
            prop_assert_eq!(logged.lsn, *lsn);
            prop_assert_eq!(&logged.record, record);
        }
    }
}
