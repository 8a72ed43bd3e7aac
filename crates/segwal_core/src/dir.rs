//! Log directory management.
//!
//! This module handles the file system layout of a log:
//!
//! ```text
//! <wal_dir>/
//! ├─ LOCK              # Advisory lock for single-writer
//! ├─ <name>.1.wal      # Segment 1
//! ├─ <name>.2.wal      # Segment 2
//! └─ ...
//! ```
//!
//! The LOCK file ensures only one process writes to the log at a time.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// File name of the directory lock.
pub const LOCK_FILE: &str = "LOCK";

/// Extension of segment files.
pub const SEGMENT_EXTENSION: &str = "wal";

/// Manages the log directory and its exclusive lock.
///
/// # Thread Safety
///
/// The `WalDir` holds an exclusive lock on the directory. Only one `WalDir`
/// instance can exist per directory at a time.
#[derive(Debug)]
pub struct WalDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    lock_file: Option<File>,
}

impl WalDir {
    /// Opens or creates a log directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path exists but is not a directory
    /// - Another process holds the lock (returns `LogLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_config(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        // Non-blocking: a held lock means another writer is live.
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::LogLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock_file: Some(lock_file),
        })
    }

    /// Returns the path to the log directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the lock, leaving the LOCK file in place.
    pub fn release(&mut self) {
        if let Some(file) = self.lock_file.take() {
            let _ = file.unlock();
        }
    }

    /// Releases the lock and removes the LOCK file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    pub fn remove_lock(&mut self) -> CoreResult<()> {
        if let Some(file) = self.lock_file.take() {
            // Dropping the handle releases the lock as well.
            let _ = file.unlock();
        }
        let lock_path = self.path.join(LOCK_FILE);
        if lock_path.exists() {
            fs::remove_file(&lock_path)?;
        }
        sync_directory(&self.path)
    }
}

/// Returns the file name of a segment.
#[must_use]
pub fn segment_file_name(base: &str, segment: u64) -> String {
    format!("{base}.{segment}.{SEGMENT_EXTENSION}")
}

/// Parses a segment id out of a file name of the form `<base>.<id>.wal`.
#[must_use]
pub fn parse_segment_file_name(base: &str, file_name: &str) -> Option<u64> {
    let rest = file_name.strip_prefix(base)?.strip_prefix('.')?;
    let id = rest.strip_suffix(SEGMENT_EXTENSION)?.strip_suffix('.')?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}

/// Returns the free space of the file system holding `path`.
///
/// # Errors
///
/// Returns an error if the file system cannot be queried.
pub fn available_space(path: &Path) -> CoreResult<u64> {
    Ok(fs2::available_space(path)?)
}

/// Syncs a directory so that created and removed entries are durable.
///
/// On Windows, directory fsync is not supported in the same way as Unix;
/// NTFS journaling covers metadata durability, so this is a no-op there.
#[cfg(unix)]
pub(crate) fn sync_directory(path: &Path) -> CoreResult<()> {
    let dir = File::open(path)?;
    dir.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn sync_directory(_path: &Path) -> CoreResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let wal_path = temp.path().join("new_wal");

        assert!(!wal_path.exists());

        let dir = WalDir::open(&wal_path).unwrap();
        assert!(wal_path.is_dir());
        assert!(wal_path.join(LOCK_FILE).exists());
        assert_eq!(dir.path(), wal_path);
    }

    #[test]
    fn open_fails_on_regular_file() {
        let temp = tempdir().unwrap();
        let file_path = temp.path().join("file");
        fs::write(&file_path, b"x").unwrap();

        let result = WalDir::open(&file_path);
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();

        let _dir1 = WalDir::open(temp.path()).unwrap();

        let result = WalDir::open(temp.path());
        assert!(matches!(result, Err(CoreError::LogLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();

        {
            let _dir = WalDir::open(temp.path()).unwrap();
        }

        let _dir2 = WalDir::open(temp.path()).unwrap();
    }

    #[test]
    fn release_allows_reopen() {
        let temp = tempdir().unwrap();

        let mut dir = WalDir::open(temp.path()).unwrap();
        dir.release();
        assert!(temp.path().join(LOCK_FILE).exists());

        let _dir2 = WalDir::open(temp.path()).unwrap();
    }

    #[test]
    fn remove_lock_deletes_file() {
        let temp = tempdir().unwrap();

        let mut dir = WalDir::open(temp.path()).unwrap();
        dir.remove_lock().unwrap();

        assert!(!temp.path().join(LOCK_FILE).exists());
        assert!(temp.path().exists());
    }

    #[test]
    fn segment_names() {
        assert_eq!(segment_file_name("walTest", 1), "walTest.1.wal");
        assert_eq!(parse_segment_file_name("walTest", "walTest.17.wal"), Some(17));
        assert_eq!(parse_segment_file_name("walTest", "walTest.wal"), None);
        assert_eq!(parse_segment_file_name("walTest", "walTest.x1.wal"), None);
        assert_eq!(parse_segment_file_name("walTest", "walTest.+1.wal"), None);
        assert_eq!(parse_segment_file_name("walTest", "other.1.wal"), None);
        assert_eq!(parse_segment_file_name("walTest", "walTest.1.wal.tmp"), None);
        assert_eq!(parse_segment_file_name("wal", "walTest.1.wal"), None);
    }

    #[test]
    fn available_space_reports_something() {
        let temp = tempdir().unwrap();
        assert!(available_space(temp.path()).unwrap() > 0);
    }
}
