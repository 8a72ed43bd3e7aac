//! Segment file store.

use crate::dir::{parse_segment_file_name, segment_file_name, sync_directory, SEGMENT_EXTENSION};
use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;
use segwal_storage::{FileBackend, PageStore};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Owns the open segment files of one log.
///
/// Handles are shared out as `Arc`s for the duration of a single page
/// transfer, so removing a segment never invalidates a read in progress; the
/// reader simply finishes against the unlinked file.
#[derive(Debug)]
pub struct SegmentStore {
    dir: PathBuf,
    base_name: String,
    page_size: usize,
    files: RwLock<BTreeMap<u64, Arc<FileBackend>>>,
}

impl SegmentStore {
    /// Creates a store over `dir` with no segments opened yet.
    #[must_use]
    pub fn new(dir: &Path, base_name: &str, page_size: usize) -> Self {
        Self {
            dir: dir.to_path_buf(),
            base_name: base_name.to_string(),
            page_size,
            files: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the page size of segment files.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the path of a segment file.
    #[must_use]
    pub fn segment_path(&self, segment: u64) -> PathBuf {
        self.dir.join(segment_file_name(&self.base_name, segment))
    }

    /// Lists segment ids present in the directory, in ascending order.
    ///
    /// Files that are not segments of this log are skipped when `filter` is
    /// set. Without it, any other `*.wal` file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read, or on a foreign
    /// `*.wal` file when `filter` is off.
    pub fn discover(&self, filter: bool) -> CoreResult<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            match parse_segment_file_name(&self.base_name, name) {
                Some(id) => ids.push(id),
                None if !filter && name.ends_with(&format!(".{SEGMENT_EXTENSION}")) => {
                    return Err(CoreError::invalid_operation(format!(
                        "unexpected file in log directory: {name}"
                    )));
                }
                None => {}
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Opens existing segment files.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be opened.
    pub fn open_existing(&self, ids: &[u64]) -> CoreResult<()> {
        let mut files = self.files.write();
        for &id in ids {
            let backend = FileBackend::open_existing(&self.segment_path(id), self.page_size)?;
            files.insert(id, Arc::new(backend));
        }
        Ok(())
    }

    fn handle(&self, segment: u64) -> Option<Arc<FileBackend>> {
        self.files.read().get(&segment).cloned()
    }

    fn handle_or_create(&self, segment: u64) -> CoreResult<Arc<FileBackend>> {
        if let Some(handle) = self.handle(segment) {
            return Ok(handle);
        }
        let mut files = self.files.write();
        if let Some(handle) = files.get(&segment) {
            return Ok(Arc::clone(handle));
        }
        let handle = Arc::new(FileBackend::open(&self.segment_path(segment), self.page_size)?);
        files.insert(segment, Arc::clone(&handle));
        drop(files);
        sync_directory(&self.dir)?;
        tracing::debug!(segment, "created segment file");
        Ok(handle)
    }

    /// Returns true if the segment is open.
    #[must_use]
    pub fn contains(&self, segment: u64) -> bool {
        self.files.read().contains_key(&segment)
    }

    /// Returns the ids of open segments, in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<u64> {
        self.files.read().keys().copied().collect()
    }

    /// Reads a raw page, or `None` if the segment or page does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn read_page(&self, segment: u64, index: u64) -> CoreResult<Option<Vec<u8>>> {
        let Some(handle) = self.handle(segment) else {
            return Ok(None);
        };
        if index >= handle.page_count()? {
            return Ok(None);
        }
        Ok(Some(handle.read_page(index)?))
    }

    /// Writes a raw page, creating the segment file on first use.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn write_page(&self, segment: u64, index: u64, page: &[u8]) -> CoreResult<()> {
        self.handle_or_create(segment)?.write_page(index, page)?;
        Ok(())
    }

    /// Syncs one segment file.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self, segment: u64) -> CoreResult<()> {
        if let Some(handle) = self.handle(segment) {
            handle.sync()?;
        }
        Ok(())
    }

    /// Returns the number of whole pages in a segment, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn page_count(&self, segment: u64) -> CoreResult<Option<u64>> {
        match self.handle(segment) {
            Some(handle) => Ok(Some(handle.page_count()?)),
            None => Ok(None),
        }
    }

    /// Returns the file length of a segment in bytes, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn byte_len(&self, segment: u64) -> CoreResult<Option<u64>> {
        match self.handle(segment) {
            Some(handle) => Ok(Some(handle.byte_len()?)),
            None => Ok(None),
        }
    }

    /// Closes and deletes every segment below `floor`.
    ///
    /// Returns the removed ids.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be removed.
    pub fn remove_below(&self, floor: u64) -> CoreResult<Vec<u64>> {
        let removed: Vec<u64> = {
            let mut files = self.files.write();
            let keep = files.split_off(&floor);
            let removed = std::mem::replace(&mut *files, keep);
            removed.into_keys().collect()
        };
        self.remove_files(&removed)?;
        Ok(removed)
    }

    /// Closes and deletes every segment.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be removed.
    pub fn remove_all(&self) -> CoreResult<Vec<u64>> {
        let removed: Vec<u64> = std::mem::take(&mut *self.files.write())
            .into_keys()
            .collect();
        self.remove_files(&removed)?;
        Ok(removed)
    }

    /// Closes all handles without touching the files.
    pub fn close(&self) {
        self.files.write().clear();
    }

    fn remove_files(&self, ids: &[u64]) -> CoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        for &id in ids {
            let path = self.segment_path(id);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        sync_directory(&self.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_creates_segment_file() {
        let temp = tempdir().unwrap();
        let store = SegmentStore::new(temp.path(), "walTest", 64);

        store.write_page(1, 0, &[1u8; 64]).unwrap();

        assert!(temp.path().join("walTest.1.wal").exists());
        assert!(store.contains(1));
        assert_eq!(store.page_count(1).unwrap(), Some(1));
        assert_eq!(store.read_page(1, 0).unwrap(), Some(vec![1u8; 64]));
    }

    #[test]
    fn missing_reads_are_none() {
        let temp = tempdir().unwrap();
        let store = SegmentStore::new(temp.path(), "walTest", 64);
        store.write_page(1, 0, &[1u8; 64]).unwrap();

        assert_eq!(store.read_page(1, 1).unwrap(), None);
        assert_eq!(store.read_page(2, 0).unwrap(), None);
        assert_eq!(store.page_count(2).unwrap(), None);
    }

    #[test]
    fn discover_filters_foreign_files() {
        let temp = tempdir().unwrap();
        for name in ["walTest.3.wal", "walTest.1.wal", "other.2.wal", "LOCK", "notes.txt"] {
            fs::write(temp.path().join(name), b"").unwrap();
        }

        let store = SegmentStore::new(temp.path(), "walTest", 64);
        assert_eq!(store.discover(true).unwrap(), vec![1, 3]);
        assert!(matches!(
            store.discover(false),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn open_existing_and_read_back() {
        let temp = tempdir().unwrap();
        {
            let store = SegmentStore::new(temp.path(), "walTest", 64);
            store.write_page(5, 0, &[9u8; 64]).unwrap();
            store.sync(5).unwrap();
        }

        let store = SegmentStore::new(temp.path(), "walTest", 64);
        let ids = store.discover(true).unwrap();
        store.open_existing(&ids).unwrap();
        assert_eq!(store.ids(), vec![5]);
        assert_eq!(store.read_page(5, 0).unwrap(), Some(vec![9u8; 64]));
    }

    #[test]
    fn remove_below_deletes_files() {
        let temp = tempdir().unwrap();
        let store = SegmentStore::new(temp.path(), "walTest", 64);
        for id in 1..=4 {
            store.write_page(id, 0, &[id as u8; 64]).unwrap();
        }

        assert_eq!(store.remove_below(3).unwrap(), vec![1, 2]);
        assert_eq!(store.ids(), vec![3, 4]);
        assert!(!store.segment_path(1).exists());
        assert!(!store.segment_path(2).exists());
        assert!(store.segment_path(3).exists());

        assert_eq!(store.remove_all().unwrap(), vec![3, 4]);
        assert!(store.ids().is_empty());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
