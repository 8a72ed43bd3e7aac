//! Segment rotation, retention, deletion and listeners.

use segwal_core::{CoreError, Lsn, WalListener, WalRecord, WriteAheadLog};
use segwal_testkit::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const RECORDS_OFFSET: u64 = 22;

/// Opens a log with segments 1..=4, one data record in each of 1..=3.
fn four_segments() -> (TestWal, Vec<Lsn>) {
    let wal = TestWal::new();
    let mut lsns = Vec::new();
    for i in 0..3u8 {
        lsns.push(wal.log(&test_record(vec![i; 12])).unwrap());
        wal.append_new_segment().unwrap();
    }
    wal.flush().unwrap();
    (wal, lsns)
}

#[test]
fn append_new_segment_switches_the_active_segment() {
    let wal = TestWal::new();
    assert_eq!(wal.append_new_segment().unwrap(), 2);
    assert_eq!(wal.active_segment().unwrap(), 2);
    assert_eq!(wal.non_active_segments().unwrap(), vec![1]);

    // The new segment opens with an empty record.
    let end = wal.end().unwrap();
    assert_eq!(end, Lsn::new(2, RECORDS_OFFSET));
    assert_eq!(wal.read(end, 1).unwrap()[0].record, WalRecord::Empty);

    let lsn = wal.log(&test_record(vec![5; 5])).unwrap();
    assert_eq!(lsn.segment(), 2);
    assert!(lsn > end);
}

#[test]
fn every_segment_reaches_disk() {
    let wal = TestWal::new();
    for _ in 0..4 {
        wal.append_new_segment().unwrap();
    }
    wal.flush().unwrap();

    assert_eq!(wal.active_segment().unwrap(), 5);
    assert_eq!(segment_files(wal.path()).unwrap().len(), 5);
    let reopened = wal.reopen();
    assert_eq!(reopened.active_segment().unwrap(), 6);
}

#[test]
fn reads_cross_segment_boundaries() {
    let (wal, lsns) = four_segments();
    let back = wal.read(lsns[0], usize::MAX).unwrap();
    let data: Vec<Lsn> = back
        .iter()
        .filter(|r| !r.record.is_empty())
        .map(|r| r.lsn)
        .collect();
    assert_eq!(data, lsns);
}

#[test]
fn rotation_by_size_keeps_records_whole() {
    let wal = TestWal::with_config(|c| c.max_segment_size(10 * TEST_PAGE_SIZE as u64));
    let records = RecordWorkload::new(21, 80, 90).records();
    let lsns: Vec<Lsn> = records.iter().map(|r| wal.log(r).unwrap()).collect();
    wal.flush().unwrap();

    let active = wal.active_segment().unwrap();
    assert!(active > 2);
    assert_eq!(
        wal.non_active_segments().unwrap(),
        (1..active).collect::<Vec<_>>()
    );
    for file in segment_files(wal.path()).unwrap() {
        let len = std::fs::metadata(file).unwrap().len();
        assert!(len <= 10 * TEST_PAGE_SIZE as u64);
    }

    let back = wal.read(lsns[0], usize::MAX).unwrap();
    assert_eq!(back.len(), records.len());
    for ((logged, record), lsn) in back.iter().zip(&records).zip(&lsns) {
        assert_eq!(logged.lsn, *lsn);
        assert_eq!(&logged.record, record);
    }
}

#[test]
fn rotation_by_interval() {
    let wal = TestWal::with_config(|c| c.segments_interval(Duration::from_millis(30)));
    let first = wal.log(&test_record(vec![1; 4])).unwrap();
    std::thread::sleep(Duration::from_millis(60));
    let second = wal.log(&test_record(vec![2; 4])).unwrap();

    assert_eq!(first.segment(), 1);
    assert_eq!(second, Lsn::new(2, RECORDS_OFFSET));
}

#[test]
fn move_lsn_after_jumps_past_a_restored_position() {
    let wal = TestWal::new();
    let first = wal.log(&test_record(vec![1; 10])).unwrap();
    let restored = Lsn::new(7, 500);

    wal.move_lsn_after(restored).unwrap();
    assert_eq!(wal.active_segment().unwrap(), 8);
    assert_eq!(wal.end().unwrap(), Lsn::new(8, RECORDS_OFFSET));
    assert_eq!(wal.read(wal.end().unwrap(), 1).unwrap()[0].record, WalRecord::Empty);

    let next = wal.log(&test_record(vec![2; 10])).unwrap();
    assert!(next > restored);
    assert_eq!(next.segment(), 8);
    assert_eq!(wal.non_active_segments().unwrap(), vec![1]);
    assert_eq!(wal.read(first, 1).unwrap()[0].record.payload(), &[1u8; 10]);

    // Already past it: nothing moves.
    wal.move_lsn_after(Lsn::new(3, RECORDS_OFFSET)).unwrap();
    assert_eq!(wal.active_segment().unwrap(), 8);
    assert_eq!(wal.end().unwrap(), next);

    let wal = wal.reopen();
    assert_eq!(wal.begin().unwrap().segment(), 1);
    assert_eq!(wal.active_segment().unwrap(), 9);
    assert_eq!(wal.read(next, 1).unwrap()[0].record.payload(), &[2u8; 10]);
}

#[test]
fn move_lsn_after_on_a_fresh_log() {
    let wal = TestWal::new();
    wal.move_lsn_after(Lsn::new(4, 1000)).unwrap();
    assert_eq!(wal.begin().unwrap(), Lsn::new(5, RECORDS_OFFSET));
    assert!(wal.log(&test_record(vec![3; 3])).unwrap() > Lsn::new(4, 1000));
    assert!(wal.non_active_segments().unwrap().is_empty());
}

#[test]
fn cut_till_respects_limits() {
    let (wal, lsns) = four_segments();
    let limit = lsns[1];
    let target = Lsn::new(4, RECORDS_OFFSET);

    wal.add_cut_till_limit(limit).unwrap();
    assert!(wal.cut_till(target).unwrap());
    assert_eq!(wal.begin().unwrap(), Lsn::new(2, RECORDS_OFFSET));
    assert_eq!(wal.non_active_segments().unwrap(), vec![2, 3]);
    assert!(wal.read(lsns[0], 1).unwrap().is_empty());
    assert_eq!(wal.read(limit, 1).unwrap()[0].lsn, limit);

    // Still pinned: nothing to cut.
    assert!(!wal.cut_till(target).unwrap());

    wal.remove_cut_till_limit(limit).unwrap();
    assert!(wal.cut_till(target).unwrap());
    assert_eq!(wal.begin().unwrap().segment(), 4);
    assert!(wal.non_active_segments().unwrap().is_empty());
    assert_eq!(segment_files(wal.path()).unwrap().len(), 1);
}

#[test]
fn cut_till_limits_are_counted() {
    let (wal, lsns) = four_segments();
    let limit = lsns[0];
    wal.add_cut_till_limit(limit).unwrap();
    wal.add_cut_till_limit(limit).unwrap();

    wal.remove_cut_till_limit(limit).unwrap();
    assert!(!wal.cut_all_segments_smaller_than(3).unwrap());

    wal.remove_cut_till_limit(limit).unwrap();
    assert!(wal.cut_all_segments_smaller_than(3).unwrap());
    assert_eq!(wal.begin().unwrap().segment(), 3);

    assert!(matches!(
        wal.remove_cut_till_limit(limit),
        Err(CoreError::InvalidOperation { .. })
    ));
}

#[test]
fn cutting_never_removes_the_active_segment() {
    let (wal, _) = four_segments();
    assert!(wal.cut_all_segments_smaller_than(100).unwrap());
    assert_eq!(wal.begin().unwrap().segment(), 4);
    assert_eq!(wal.active_segment().unwrap(), 4);

    let lsn = wal.log(&test_record(vec![8; 8])).unwrap();
    wal.flush().unwrap();
    assert_eq!(wal.read(lsn, 1).unwrap().len(), 1);
}

#[test]
fn cut_survives_reopen() {
    let (wal, _) = four_segments();
    wal.cut_all_segments_smaller_than(3).unwrap();
    let wal = wal.reopen();
    assert_eq!(wal.begin().unwrap(), Lsn::new(3, RECORDS_OFFSET));
    assert_eq!(wal.active_segment().unwrap(), 5);
}

#[test]
fn size_shrinks_after_cut() {
    let (wal, _) = four_segments();
    let before = wal.size().unwrap();
    let seg_before = wal.seg_size().unwrap();
    wal.cut_all_segments_smaller_than(3).unwrap();
    assert!(wal.size().unwrap() < before);
    assert!(wal.seg_size().unwrap() < seg_before);
}

#[test]
fn delete_empties_the_directory() {
    let (wal, _) = four_segments();
    wal.log(&test_record(vec![1; 100])).unwrap();
    let dir = wal.path().to_path_buf();

    wal.delete().unwrap();
    assert!(!wal.is_open());
    assert!(dir.is_dir());
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

    // The directory can host a new log.
    let fresh = WriteAheadLog::open(test_config(&dir)).unwrap();
    assert_eq!(fresh.begin().unwrap(), Lsn::new(1, RECORDS_OFFSET));
    assert!(fresh.non_active_segments().unwrap().is_empty());
}

#[derive(Default)]
struct Counter {
    checkpoints: AtomicU64,
    last_size: AtomicU64,
}

impl WalListener for Counter {
    fn on_checkpoint_request(&self, wal_size: u64) {
        self.checkpoints.fetch_add(1, Ordering::SeqCst);
        self.last_size.store(wal_size, Ordering::SeqCst);
    }
}

fn wait_for(counter: &AtomicU64) -> u64 {
    let deadline = Instant::now() + Duration::from_secs(5);
    while counter.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    counter.load(Ordering::SeqCst)
}

#[test]
fn hard_limit_requests_a_checkpoint() {
    let wal = TestWal::with_config(|c| c.wal_size_hard_limit(4 * TEST_PAGE_SIZE as i64));
    let counter = Arc::new(Counter::default());
    wal.add_listener(counter.clone());

    for i in 0..30u8 {
        wal.log(&test_record(vec![i; 30])).unwrap();
    }
    wal.flush().unwrap();

    assert!(wait_for(&counter.checkpoints) >= 1);
    assert!(counter.last_size.load(Ordering::SeqCst) > 4 * TEST_PAGE_SIZE as u64);
}

#[test]
fn single_segment_mode_requests_a_checkpoint() {
    let wal = TestWal::with_config(|c| c.keep_single_segment(true));
    let counter = Arc::new(Counter::default());
    let listener: Arc<dyn WalListener> = counter.clone();
    wal.add_listener(Arc::clone(&listener));

    wal.log(&test_record(vec![1; 10])).unwrap();
    wal.flush().unwrap();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(counter.checkpoints.load(Ordering::SeqCst), 0);

    wal.append_new_segment().unwrap();
    wal.flush().unwrap();
    assert!(wait_for(&counter.checkpoints) >= 1);

    // The owner checkpoints and cuts; no older segments remain.
    wal.remove_listener(&listener);
    wal.cut_till(wal.end().unwrap()).unwrap();
    assert!(wal.non_active_segments().unwrap().is_empty());
}
