//! Core type definitions for the write-ahead log.

use std::fmt;

/// Log sequence number: the address of one record in the log.
///
/// An LSN names a segment and a byte position within that segment's page
/// stream. The position is `page_index * page_size + offset_in_page`, where
/// the offset is never smaller than the page header. LSNs order first by
/// segment, then by position, and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lsn {
    segment: u64,
    position: u64,
}

impl Lsn {
    /// Creates a new LSN.
    #[must_use]
    pub const fn new(segment: u64, position: u64) -> Self {
        Self { segment, position }
    }

    /// Creates the LSN of the byte at `offset` within page `index`.
    #[must_use]
    pub const fn from_page(segment: u64, index: u64, offset: usize, page_size: usize) -> Self {
        Self::new(segment, index * page_size as u64 + offset as u64)
    }

    /// Returns the segment id.
    #[must_use]
    pub const fn segment(self) -> u64 {
        self.segment
    }

    /// Returns the byte position within the segment.
    #[must_use]
    pub const fn position(self) -> u64 {
        self.position
    }

    /// Returns the index of the page holding this position.
    #[must_use]
    pub const fn page_index(self, page_size: usize) -> u64 {
        self.position / page_size as u64
    }

    /// Returns the offset of this position inside its page.
    #[must_use]
    pub const fn page_offset(self, page_size: usize) -> usize {
        (self.position % page_size as u64) as usize
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lsn:{}:{}", self.segment, self.position)
    }
}

/// Numeric tag selecting how a record payload is interpreted.
///
/// Type `0` is reserved for the empty record. Every other type must be
/// registered with a [`crate::RecordRegistry`] before it can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordType(pub u16);

impl RecordType {
    /// The reserved type of the empty record.
    pub const EMPTY: Self = Self(0);

    /// Creates a new record type.
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the raw type id.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type:{}", self.0)
    }
}
