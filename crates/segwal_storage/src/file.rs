//! File-based page store for one segment file.

use crate::backend::PageStore;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based page store.
///
/// Each instance owns one segment file. Pages are written in place at
/// `index * page_size`, so a page can be rewritten while it is still the tail
/// of the log and later pages can be appended without touching earlier ones.
///
/// # Durability
///
/// - `write_page()` hands the page to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
/// Internal locking keeps seek and transfer of one page atomic.
///
/// # Example
///
/// ```no_run
/// use segwal_storage::{PageStore, FileBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("wal.1.wal"), 4096).unwrap();
/// backend.write_page(0, &[0u8; 4096]).unwrap();
/// backend.sync().unwrap();  // Ensure the page is durable
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    page_size: usize,
    file: RwLock<File>,
    len: RwLock<u64>,
}

impl FileBackend {
    /// Opens or creates a segment file at the given path.
    ///
    /// An existing file is opened without truncation.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path, page_size: usize) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            page_size,
            file: RwLock::new(file),
            len: RwLock::new(len),
        })
    }

    /// Opens an existing segment file, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be opened.
    pub fn open_existing(path: &Path, page_size: usize) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            page_size,
            file: RwLock::new(file),
            len: RwLock::new(len),
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageStore for FileBackend {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, index: u64) -> StorageResult<Vec<u8>> {
        let count = self.page_count()?;
        if index >= count {
            return Err(StorageError::ReadPastEnd { index, count });
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(index * self.page_size as u64))?;

        let mut buffer = vec![0u8; self.page_size];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn write_page(&self, index: u64, page: &[u8]) -> StorageResult<()> {
        if page.len() != self.page_size {
            return Err(StorageError::PageSizeMismatch {
                expected: self.page_size,
                actual: page.len(),
            });
        }

        let mut file = self.file.write();
        let mut len = self.len.write();

        let offset = index * self.page_size as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page)?;
        *len = (*len).max(offset + self.page_size as u64);

        Ok(())
    }

    fn page_count(&self) -> StorageResult<u64> {
        Ok(*self.len.read() / self.page_size as u64)
    }

    fn byte_len(&self) -> StorageResult<u64> {
        Ok(*self.len.read())
    }

    fn sync(&self) -> StorageResult<()> {
        let file = self.file.write();
        file.sync_all()?;
        Ok(())
    }
}
