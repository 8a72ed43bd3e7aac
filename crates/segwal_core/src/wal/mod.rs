//! Segmented, paginated write-ahead log.
//!
//! Records are appended to fixed-size pages. Pages are grouped into numbered
//! segment files (`<name>.<segment>.wal`); only the newest segment receives
//! appends.
//!
//! ## Page Format
//!
//! ```text
//! | magic (8) | xxh3 (8) | op id (4) | payload len (2) | records ... | padding |
//! ```
//!
//! The checksum covers every byte from the operation id to the end of the
//! page, computed over plaintext. When encryption is on, bytes from offset 22
//! onward are encrypted with AES-CTR, keyed per `(segment, page)`.
//!
//! ## Record Format
//!
//! ```text
//! | type (2) | payload len (4) | payload (N) |
//! ```
//!
//! A record header never straddles two pages. A payload may continue over
//! any number of pages but never into the next segment.
//!
//! ## LSNs
//!
//! An [`Lsn`](crate::Lsn) is `(segment, position)` with position counted
//! from the start of the segment file. The first record of a segment sits at
//! position 22. LSNs order lexicographically and grow with every append.
//!
//! ## Recovery Policy
//!
//! Opening an existing log is non-destructive. The first page of the last
//! segment that fails verification marks the end of the readable log; the
//! failure is logged and nothing is truncated. Writing always resumes in a
//! fresh segment, so damaged bytes are never overwritten.
//!
//! Reads never fail on corruption either: a bad page, a missing page or an
//! unregistered record type ends the result early.
//!
//! ## Invariants
//!
//! - LSNs handed out by `log` strictly increase
//! - `begin <= end`, and `flushed_lsn <= end` once set
//! - After `flush` returns, every record logged before the call is durable
//! - Segments at or above the lowest cut-till limit are never removed

mod events;
mod flush;
mod log;
mod offline;
mod page;
mod reader;
mod record;
mod recovery;
mod retention;
mod writer;

pub use events::WalListener;
pub use log::WriteAheadLog;
pub use offline::LogReader;
pub use page::{page_checksum, Page, MAX_PAGE_SIZE, PAGE_MAGIC, RECORDS_OFFSET};
pub use reader::{PageFetch, PageSource, RecordScanner};
pub use record::{LoggedRecord, RecordRegistry, WalRecord, RECORD_HEADER_SIZE};
pub use recovery::{scan_segment, SegmentScan};
