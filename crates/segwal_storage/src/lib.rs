//! # segwal storage
//!
//! Page-oriented storage backends for the segwal write-ahead log.
//!
//! A backend stores a run of fixed-size pages addressed by index. Backends are
//! **opaque page stores**: they never look inside the pages they hold.
//!
//! ## Design Principles
//!
//! - Backends read and write whole pages at an index
//! - No knowledge of page headers, checksums, records, or segments
//! - Must be `Send + Sync` for concurrent access
//! - The log owns all page format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - One segment file using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use segwal_storage::{PageStore, InMemoryBackend};
//!
//! let backend = InMemoryBackend::new(64);
//! backend.write_page(0, &[7u8; 64]).unwrap();
//! assert_eq!(backend.page_count().unwrap(), 1);
//! assert_eq!(backend.read_page(0).unwrap(), vec![7u8; 64]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::PageStore;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
