//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read a page beyond the end of storage.
    #[error("read beyond end of storage: page {index}, page count {count}")]
    ReadPastEnd {
        /// The requested page index.
        index: u64,
        /// The current number of pages.
        count: u64,
    },

    /// A page buffer did not match the backend's page size.
    #[error("page size mismatch: expected {expected} bytes, got {actual}")]
    PageSizeMismatch {
        /// The backend's page size.
        expected: usize,
        /// The length of the supplied buffer.
        actual: usize,
    },
}
