//! Page store trait definition.

use crate::error::StorageResult;

/// A low-level page store for one log segment.
///
/// Page stores are **opaque page containers**. They read and write fixed-size
/// pages by index and report how many whole pages they hold. The log owns all
/// page format interpretation - stores do not understand headers, checksums,
/// or records.
///
/// # Invariants
///
/// - Every page has exactly `page_size()` bytes
/// - `read_page(i)` returns the bytes most recently written with `write_page(i, ..)`
/// - `page_count()` is one past the highest page index ever written
/// - After `sync` returns, every written page survives process termination
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait PageStore: Send + Sync {
    /// Returns the fixed page size of this store in bytes.
    fn page_size(&self) -> usize;

    /// Reads the page at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `index` is not below `page_count()`
    /// - An I/O error occurs
    fn read_page(&self, index: u64) -> StorageResult<Vec<u8>>;

    /// Writes a full page at `index`, extending the store if needed.
    ///
    /// Writing past the current end leaves any skipped pages zero-filled.
    ///
    /// # Errors
    ///
    /// Returns an error if `page.len()` differs from `page_size()` or an
    /// I/O error occurs.
    fn write_page(&self, index: u64, page: &[u8]) -> StorageResult<()>;

    /// Returns the number of whole pages in the store.
    ///
    /// A trailing partial page (a torn write) is not counted.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn page_count(&self) -> StorageResult<u64>;

    /// Returns the size of the store in bytes, including any trailing
    /// partial page.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn byte_len(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&self) -> StorageResult<()>;
}
