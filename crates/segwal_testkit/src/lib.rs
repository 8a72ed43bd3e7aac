//! # segwal testkit
//!
//! Test utilities for segwal.
//!
//! This crate provides:
//! - Test fixtures: temporary logs with a registered test record type
//! - Record generators, both proptest strategies and seeded workloads
//! - Crash simulation by copying and damaging segment files
//! - Stress helpers for concurrent loggers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use segwal_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_log() {
//!     with_temp_wal(|wal| {
//!         let lsn = wal.log(&test_record(vec![1, 2, 3])).unwrap();
//!         wal.flush().unwrap();
//!         assert_eq!(wal.flushed_lsn().unwrap(), Some(lsn));
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
