//! WAL record types, the type registry, and record framing.

use crate::error::{CoreError, CoreResult};
use crate::types::{Lsn, RecordType};
use std::collections::BTreeMap;

/// Size of the record header that precedes every payload.
///
/// ```text
/// | type (2, LE) | payload length (4, LE) |
/// ```
///
/// A header never straddles a page boundary; the payload may.
pub const RECORD_HEADER_SIZE: usize = 6;

/// A record as handed to, and returned from, the log.
///
/// The log treats payloads as opaque bytes. The record type is only used to
/// check that the caller registered it and to decide how to decode it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// Zero-payload marker written at segment starts and by recovery.
    Empty,

    /// A caller record.
    Data {
        /// Registered record type.
        record_type: RecordType,
        /// Opaque payload bytes.
        payload: Vec<u8>,
    },
}

impl WalRecord {
    /// Maximum payload size, bounded by the 4-byte length field.
    pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

    /// Creates a data record.
    #[must_use]
    pub fn data(record_type: RecordType, payload: impl Into<Vec<u8>>) -> Self {
        Self::Data {
            record_type,
            payload: payload.into(),
        }
    }

    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Empty => RecordType::EMPTY,
            Self::Data { record_type, .. } => *record_type,
        }
    }

    /// Returns the payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match self {
            Self::Empty => &[],
            Self::Data { payload, .. } => payload,
        }
    }

    /// Returns true for the empty marker record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the number of bytes this record occupies in the page stream.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_SIZE + self.payload().len()
    }

    /// Serializes the record header and payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload exceeds [`Self::MAX_PAYLOAD_SIZE`], or
    /// if a data record uses the reserved empty type.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let payload = self.payload();
        if payload.len() > Self::MAX_PAYLOAD_SIZE {
            return Err(CoreError::invalid_argument(format!(
                "record payload too large: {} bytes exceeds maximum of {} bytes",
                payload.len(),
                Self::MAX_PAYLOAD_SIZE
            )));
        }
        if !self.is_empty() && self.record_type() == RecordType::EMPTY {
            return Err(CoreError::invalid_argument(
                "record type 0 is reserved for the empty record",
            ));
        }

        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&self.record_type().as_u16().to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(payload);
        Ok(buf)
    }
}

/// A record read back from the log together with its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedRecord {
    /// The LSN assigned when the record was logged.
    pub lsn: Lsn,
    /// The record itself.
    pub record: WalRecord,
}

/// Decoded record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordHeader {
    pub(crate) record_type: RecordType,
    pub(crate) payload_len: usize,
}

impl RecordHeader {
    /// Parses a header from the first [`RECORD_HEADER_SIZE`] bytes of `bytes`.
    pub(crate) fn parse(bytes: &[u8]) -> Option<Self> {
        let header = bytes.get(..RECORD_HEADER_SIZE)?;
        let record_type = RecordType::new(u16::from_le_bytes([header[0], header[1]]));
        let payload_len = u32::from_le_bytes([header[2], header[3], header[4], header[5]]);
        Some(Self {
            record_type,
            payload_len: payload_len as usize,
        })
    }
}

/// Table of record types a log accepts.
///
/// Registration happens once, before the log is opened. Logging a record of
/// an unregistered type is rejected, and reading one back is treated the same
/// way as a bad checksum: the read stops there.
///
/// # Example
///
/// ```rust
/// use segwal_core::{RecordRegistry, RecordType};
///
/// let mut registry = RecordRegistry::new();
/// registry.register(RecordType::new(1024), "test-record").unwrap();
/// assert!(registry.contains(RecordType::new(1024)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordRegistry {
    types: BTreeMap<RecordType, String>,
    accept_all: bool,
}

impl RecordRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that decodes every type it meets.
    ///
    /// Meant for offline inspection, where the record types of the writer
    /// are not known.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            types: BTreeMap::new(),
            accept_all: true,
        }
    }

    /// Registers a record type under a diagnostic name.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is the reserved empty type or is already
    /// registered.
    pub fn register(&mut self, record_type: RecordType, name: impl Into<String>) -> CoreResult<()> {
        if record_type == RecordType::EMPTY {
            return Err(CoreError::invalid_argument(
                "record type 0 is reserved for the empty record",
            ));
        }
        if self.types.contains_key(&record_type) {
            return Err(CoreError::invalid_argument(format!(
                "record {record_type} is already registered"
            )));
        }
        self.types.insert(record_type, name.into());
        Ok(())
    }

    /// Registers a record type, consuming and returning the registry.
    ///
    /// # Errors
    ///
    /// Same as [`Self::register`].
    pub fn with_type(mut self, record_type: RecordType, name: impl Into<String>) -> CoreResult<Self> {
        self.register(record_type, name)?;
        Ok(self)
    }

    /// Returns true if the type is registered.
    #[must_use]
    pub fn contains(&self, record_type: RecordType) -> bool {
        self.accept_all || self.types.contains_key(&record_type)
    }

    /// Returns the diagnostic name of a type, if registered.
    #[must_use]
    pub fn name(&self, record_type: RecordType) -> Option<&str> {
        if record_type == RecordType::EMPTY {
            return Some("empty");
        }
        self.types.get(&record_type).map(String::as_str)
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no type is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Checks that a record may be logged.
    pub(crate) fn check(&self, record: &WalRecord) -> CoreResult<()> {
        match record {
            WalRecord::Empty => Ok(()),
            WalRecord::Data { record_type, .. } if self.contains(*record_type) => Ok(()),
            WalRecord::Data { record_type, .. } => {
                Err(CoreError::unknown_record_type(record_type.as_u16()))
            }
        }
    }

    /// Validates a header read from a page.
    ///
    /// Returns `false` when the header cannot belong to a record this log
    /// wrote: an unregistered type, or an empty record carrying a payload.
    pub(crate) fn accepts(&self, header: &RecordHeader) -> bool {
        if header.record_type == RecordType::EMPTY {
            header.payload_len == 0
        } else {
            self.contains(header.record_type)
        }
    }

    /// Builds a record from a validated header and its payload.
    pub(crate) fn decode(header: &RecordHeader, payload: Vec<u8>) -> WalRecord {
        if header.record_type == RecordType::EMPTY {
            WalRecord::Empty
        } else {
            WalRecord::Data {
                record_type: header.record_type,
                payload,
            }
        }
    }
}
