//! Error types for the write-ahead log.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in write-ahead log operations.
///
/// Page corruption is deliberately absent: a page that fails its checksum
/// ends a read early instead of producing an error.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] segwal_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process holds the log directory lock.
    #[error("log locked: another process has exclusive access")]
    LogLocked,

    /// The log has been closed or deleted.
    #[error("log is closed")]
    LogClosed,

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the offending setting.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// An argument was rejected.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument.
        message: String,
    },

    /// A record type id that was never registered.
    #[error("unknown record type {id}")]
    UnknownRecordType {
        /// The unregistered type id.
        id: u16,
    },

    /// Encryption is not enabled.
    #[error("encryption feature not enabled")]
    EncryptionNotEnabled,

    /// Invalid key size.
    #[error("invalid key size: expected one of {expected:?} bytes, got {actual}")]
    InvalidKeySize {
        /// Accepted sizes in bytes.
        expected: &'static [usize],
        /// Actual size in bytes.
        actual: usize,
    },

    /// Invalid IV size.
    #[error("invalid IV size: expected {expected} bytes, got {actual}")]
    InvalidIvSize {
        /// Expected size in bytes.
        expected: usize,
        /// Actual size in bytes.
        actual: usize,
    },

    /// The background flush failed or is no longer running.
    #[error("flush failed: {message}")]
    FlushFailed {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an unknown record type error.
    pub fn unknown_record_type(id: u16) -> Self {
        Self::UnknownRecordType { id }
    }

    /// Creates an encryption not enabled error.
    pub fn encryption_not_enabled() -> Self {
        Self::EncryptionNotEnabled
    }

    /// Creates an invalid key size error.
    pub fn invalid_key_size(actual: usize, expected: &'static [usize]) -> Self {
        Self::InvalidKeySize { expected, actual }
    }

    /// Creates an invalid IV size error.
    pub fn invalid_iv_size(actual: usize, expected: usize) -> Self {
        Self::InvalidIvSize { expected, actual }
    }

    /// Creates a flush failed error.
    pub fn flush_failed(message: impl Into<String>) -> Self {
        Self::FlushFailed {
            message: message.into(),
        }
    }
}
