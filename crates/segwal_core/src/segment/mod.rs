//! Segment files of the log.
//!
//! A segment is one file named `<name>.<id>.wal` holding a contiguous run of
//! pages. Ids start at 1 and only grow. The segment store owns every open
//! file handle; the write cache and the recovery scanner refer to segments
//! by id only.

mod store;

pub use store::SegmentStore;
