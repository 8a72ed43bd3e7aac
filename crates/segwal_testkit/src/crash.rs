//! Crash recovery testing for segwal.
//!
//! A crash is simulated by copying the segment files of a live log into a
//! fresh directory (a "crash image") and opening the copy. Whatever the
//! flush worker had written at that moment is what a restart would see.
//! Damage is simulated by flipping or truncating bytes of segment files.
//!
//! ## Test Strategy
//!
//! 1. **Flushed records survive** - everything up to the flushed LSN reads back
//! 2. **Damaged page bounds reads** - records before the bad page read back,
//!    the rest does not
//! 3. **Torn tail** - a truncated last segment opens and resumes writing
//! 4. **Resume segment** - a reopened log continues in a new segment
//!
//! ## Usage
//!
//! ```rust,ignore
//! use segwal_testkit::crash::CrashRecoveryHarness;
//!
//! let mut harness = CrashRecoveryHarness::with_temp_dir()?;
//! harness.run_all_tests();
//! assert!(harness.all_passed(), "{}", harness.summary());
//! ```

use crate::fixtures::{test_config, test_record, TEST_PAGE_SIZE};
use segwal_core::{Lsn, WalRecord, WriteAheadLog};
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Lists segment files (`*.wal`) in `dir`, sorted by name.
pub fn segment_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "wal"))
        .collect();
    files.sort();
    Ok(files)
}

/// Copies the segment files of `src` into `dst`, leaving the LOCK file
/// behind. Returns the number of files copied.
pub fn crash_image(src: &Path, dst: &Path) -> io::Result<usize> {
    fs::create_dir_all(dst)?;
    let files = segment_files(src)?;
    for file in &files {
        if let Some(name) = file.file_name() {
            fs::copy(file, dst.join(name))?;
        }
    }
    Ok(files.len())
}

/// Flips every bit of the byte at `offset`.
pub fn corrupt_byte(path: &Path, offset: u64) -> io::Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut byte)?;
    byte[0] ^= 0xFF;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&byte)?;
    file.sync_all()
}

/// Truncates a file to `len` bytes.
pub fn truncate_file(path: &Path, len: u64) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    file.sync_all()
}

/// Result of a crash recovery test.
#[derive(Debug, Clone)]
pub struct CrashRecoveryResult {
    /// Whether the test passed.
    pub passed: bool,
    /// Description of what was tested.
    pub description: String,
    /// Expected readable records after recovery.
    pub expected_records: usize,
    /// Actual readable records after recovery.
    pub actual_records: usize,
    /// Any error message.
    pub error: Option<String>,
}

impl CrashRecoveryResult {
    /// Creates a passing result.
    pub fn pass(description: &str, records: usize) -> Self {
        Self {
            passed: true,
            description: description.to_string(),
            expected_records: records,
            actual_records: records,
            error: None,
        }
    }

    /// Creates a failing result.
    pub fn fail(description: &str, expected: usize, actual: usize, error: &str) -> Self {
        Self {
            passed: false,
            description: description.to_string(),
            expected_records: expected,
            actual_records: actual,
            error: Some(error.to_string()),
        }
    }

    fn check(description: &str, expected: usize, actual: usize) -> Self {
        if expected == actual {
            Self::pass(description, actual)
        } else {
            Self::fail(description, expected, actual, "record count mismatch")
        }
    }
}

/// Runs crash scenarios in scratch directories below one root.
pub struct CrashRecoveryHarness {
    root: PathBuf,
    _temp_dir: Option<TempDir>,
    results: Vec<CrashRecoveryResult>,
    next_dir: usize,
}

impl CrashRecoveryHarness {
    /// Creates a harness working below `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            _temp_dir: None,
            results: Vec::new(),
            next_dir: 0,
        }
    }

    /// Creates a harness working in a temporary directory.
    pub fn with_temp_dir() -> io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let mut harness = Self::new(temp_dir.path());
        harness._temp_dir = Some(temp_dir);
        Ok(harness)
    }

    fn scratch(&mut self) -> PathBuf {
        self.next_dir += 1;
        self.root.join(format!("case-{}", self.next_dir))
    }

    fn count_from(wal: &WriteAheadLog, lsn: Lsn) -> Result<usize, String> {
        wal.read(lsn, usize::MAX)
            .map(|records| records.iter().filter(|r| !r.record.is_empty()).count())
            .map_err(|e| e.to_string())
    }

    fn record(&mut self, result: CrashRecoveryResult) -> CrashRecoveryResult {
        self.results.push(result.clone());
        result
    }

    /// Records flushed before the crash read back from the crash image.
    pub fn test_flushed_records_survive(&mut self) -> CrashRecoveryResult {
        const DESC: &str = "flushed records survive a crash";
        let live = self.scratch();
        let image = self.scratch();

        let outcome = (|| -> Result<(usize, usize), String> {
            let wal = WriteAheadLog::open(test_config(&live)).map_err(|e| e.to_string())?;
            let mut first = None;
            for i in 0..40u8 {
                let lsn = wal
                    .log(&test_record(vec![i; 20]))
                    .map_err(|e| e.to_string())?;
                first.get_or_insert(lsn);
            }
            wal.flush().map_err(|e| e.to_string())?;
            crash_image(&live, &image).map_err(|e| e.to_string())?;
            wal.close().map_err(|e| e.to_string())?;

            let recovered = WriteAheadLog::open(test_config(&image)).map_err(|e| e.to_string())?;
            let first = first.ok_or("nothing logged")?;
            Ok((40, Self::count_from(&recovered, first)?))
        })();

        let result = match outcome {
            Ok((expected, actual)) => CrashRecoveryResult::check(DESC, expected, actual),
            Err(e) => CrashRecoveryResult::fail(DESC, 40, 0, &e),
        };
        self.record(result)
    }

    /// A damaged page ends the readable log; earlier records stay readable.
    pub fn test_damaged_page_bounds_reads(&mut self) -> CrashRecoveryResult {
        const DESC: &str = "damaged page bounds reads";
        let dir = self.scratch();

        let outcome = (|| -> Result<(usize, usize), String> {
            let lsns: Vec<Lsn> = {
                let wal = WriteAheadLog::open(test_config(&dir)).map_err(|e| e.to_string())?;
                let lsns = (0..30u8)
                    .map(|i| wal.log(&test_record(vec![i; 20])))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| e.to_string())?;
                wal.close().map_err(|e| e.to_string())?;
                lsns
            };

            let page = 5u64;
            let segment = segment_files(&dir).map_err(|e| e.to_string())?;
            let first_file = segment.first().ok_or("no segment files")?;
            corrupt_byte(first_file, page * TEST_PAGE_SIZE as u64 + 30)
                .map_err(|e| e.to_string())?;

            // Records wholly before the damaged page.
            let expected = lsns
                .iter()
                .zip(lsns.iter().skip(1))
                .filter(|(_, next)| next.page_index(TEST_PAGE_SIZE) < page)
                .count();

            let wal = WriteAheadLog::open(test_config(&dir)).map_err(|e| e.to_string())?;
            Ok((expected, Self::count_from(&wal, lsns[0])?))
        })();

        // A record ending exactly at the damaged page boundary is still readable.
        let result = match outcome {
            Ok((expected, actual)) if actual == expected || actual == expected + 1 => {
                CrashRecoveryResult::pass(DESC, actual)
            }
            Ok((expected, actual)) => {
                CrashRecoveryResult::fail(DESC, expected, actual, "unexpected readable prefix")
            }
            Err(e) => CrashRecoveryResult::fail(DESC, 0, 0, &e),
        };
        self.record(result)
    }

    /// A last segment cut short mid-page still opens and accepts appends.
    pub fn test_torn_tail(&mut self) -> CrashRecoveryResult {
        const DESC: &str = "torn tail recovers";
        let dir = self.scratch();

        let outcome = (|| -> Result<(usize, usize), String> {
            {
                let wal = WriteAheadLog::open(test_config(&dir)).map_err(|e| e.to_string())?;
                for i in 0..10u8 {
                    wal.log(&test_record(vec![i; 30]))
                        .map_err(|e| e.to_string())?;
                }
                wal.close().map_err(|e| e.to_string())?;
            }
            let files = segment_files(&dir).map_err(|e| e.to_string())?;
            let last = files.last().ok_or("no segment files")?;
            let len = fs::metadata(last).map_err(|e| e.to_string())?.len();
            truncate_file(last, len - TEST_PAGE_SIZE as u64 / 2).map_err(|e| e.to_string())?;

            let wal = WriteAheadLog::open(test_config(&dir)).map_err(|e| e.to_string())?;
            let lsn = wal
                .log(&test_record(vec![0xAB; 8]))
                .map_err(|e| e.to_string())?;
            wal.flush().map_err(|e| e.to_string())?;
            let back = wal.read(lsn, 1).map_err(|e| e.to_string())?;
            Ok((1, back.len()))
        })();

        let result = match outcome {
            Ok((expected, actual)) => CrashRecoveryResult::check(DESC, expected, actual),
            Err(e) => CrashRecoveryResult::fail(DESC, 1, 0, &e),
        };
        self.record(result)
    }

    /// Reopening continues in segment `last + 1` with an empty record.
    pub fn test_resume_segment(&mut self) -> CrashRecoveryResult {
        const DESC: &str = "reopen resumes in the next segment";
        let dir = self.scratch();

        let outcome = (|| -> Result<bool, String> {
            {
                let wal = WriteAheadLog::open(test_config(&dir)).map_err(|e| e.to_string())?;
                wal.log(&test_record(vec![1; 10]))
                    .map_err(|e| e.to_string())?;
                wal.append_new_segment().map_err(|e| e.to_string())?;
                wal.close().map_err(|e| e.to_string())?;
            }
            let wal = WriteAheadLog::open(test_config(&dir)).map_err(|e| e.to_string())?;
            let end = wal.end().map_err(|e| e.to_string())?;
            let tail = wal.read(end, 1).map_err(|e| e.to_string())?;
            Ok(end == Lsn::new(3, 22)
                && tail.first().map(|r| &r.record) == Some(&WalRecord::Empty))
        })();

        let result = match outcome {
            Ok(true) => CrashRecoveryResult::pass(DESC, 1),
            Ok(false) => CrashRecoveryResult::fail(DESC, 1, 0, "wrong resume position"),
            Err(e) => CrashRecoveryResult::fail(DESC, 1, 0, &e),
        };
        self.record(result)
    }

    /// Runs every scenario.
    pub fn run_all_tests(&mut self) -> Vec<CrashRecoveryResult> {
        vec![
            self.test_flushed_records_survive(),
            self.test_damaged_page_bounds_reads(),
            self.test_torn_tail(),
            self.test_resume_segment(),
        ]
    }

    /// Returns a printable summary of all results so far.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            let mark = if result.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!(
                "[{mark}] {} (expected {}, got {})",
                result.description, result.expected_records, result.actual_records
            ));
            if let Some(error) = &result.error {
                out.push_str(&format!(": {error}"));
            }
            out.push('\n');
        }
        out
    }

    /// Returns true if every scenario run so far passed.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }
}
