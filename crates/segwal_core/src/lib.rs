//! # segwal core
//!
//! A segmented, paginated, checksummed write-ahead log.
//!
//! This crate provides:
//! - Append-only logging of typed records with monotonically increasing LSNs
//! - A write cache drained by a background flush worker
//! - Durable flushes with a reported flushed LSN
//! - Segment rotation by size or age, and retention bounded by cut-till limits
//! - Per-page XXH3 checksums and optional AES-CTR page encryption
//! - Non-destructive recovery on open
//!
//! ## Example
//!
//! ```rust,ignore
//! use segwal_core::{RecordRegistry, RecordType, WalConfig, WalRecord, WriteAheadLog};
//!
//! const PUT: RecordType = RecordType::new(1024);
//!
//! let config = WalConfig::new("orders", "/var/lib/orders/wal")
//!     .record_types(RecordRegistry::new().with_type(PUT, "put")?);
//! let wal = WriteAheadLog::open(config)?;
//!
//! let lsn = wal.log(&WalRecord::data(PUT, b"order 17".to_vec()))?;
//! wal.flush()?;
//!
//! for logged in wal.read(lsn, 100)? {
//!     println!("{} {:?}", logged.lsn, logged.record);
//! }
//! wal.close()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
pub mod crypto;
pub mod dir;
mod error;
pub mod segment;
mod stats;
mod types;
pub mod wal;

pub use config::{WalConfig, DEFAULT_MAX_CACHE_SIZE};
pub use crypto::{EncryptionKey, PageCipher};
pub use error::{CoreError, CoreResult};
pub use stats::{StatsSnapshot, WalStats};
pub use types::{Lsn, RecordType};
pub use wal::{
    LogReader, LoggedRecord, RecordRegistry, SegmentScan, WalListener, WalRecord, WriteAheadLog,
};
