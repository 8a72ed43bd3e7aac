//! In-memory page store for testing.

use crate::backend::PageStore;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// An in-memory page store.
///
/// This backend keeps a segment's bytes in memory and is suitable for:
/// - Unit tests of the page and record codecs
/// - Corruption tests that need to poke at raw page bytes
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use segwal_storage::{PageStore, InMemoryBackend};
///
/// let backend = InMemoryBackend::new(32);
/// backend.write_page(1, &[1u8; 32]).unwrap();
/// assert_eq!(backend.page_count().unwrap(), 2);
/// assert_eq!(backend.read_page(0).unwrap(), vec![0u8; 32]);
/// ```
#[derive(Debug)]
pub struct InMemoryBackend {
    page_size: usize,
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory store with the given page size.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self::with_data(page_size, Vec::new())
    }

    /// Creates a new in-memory store with pre-existing bytes.
    ///
    /// Useful for testing recovery scenarios such as torn tail pages.
    #[must_use]
    pub fn with_data(page_size: usize, data: Vec<u8>) -> Self {
        Self {
            page_size,
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of all bytes in the store.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Flips the bits of one byte, simulating media corruption.
    ///
    /// Offsets past the end are ignored.
    pub fn corrupt_byte(&self, offset: usize) {
        if let Some(byte) = self.data.write().get_mut(offset) {
            *byte ^= 0xFF;
        }
    }
}

impl PageStore for InMemoryBackend {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, index: u64) -> StorageResult<Vec<u8>> {
        let count = self.page_count()?;
        if index >= count {
            return Err(StorageError::ReadPastEnd { index, count });
        }

        let start = index as usize * self.page_size;
        Ok(self.data.read()[start..start + self.page_size].to_vec())
    }

    fn write_page(&self, index: u64, page: &[u8]) -> StorageResult<()> {
        if page.len() != self.page_size {
            return Err(StorageError::PageSizeMismatch {
                expected: self.page_size,
                actual: page.len(),
            });
        }

        let mut data = self.data.write();
        let start = index as usize * self.page_size;
        let end = start + self.page_size;
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(page);
        Ok(())
    }

    fn page_count(&self) -> StorageResult<u64> {
        Ok((self.data.read().len() / self.page_size) as u64)
    }

    fn byte_len(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&self) -> StorageResult<()> {
        // Nothing to persist
        Ok(())
    }
}
