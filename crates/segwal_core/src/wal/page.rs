//! Fixed-size log pages: layout, sealing, and verification.
//!
//! ```text
//! | magic (8) | checksum (8) | operation id (4) | payload length (2) | records ... |
//! 0           8              16                 20                   22
//! ```
//!
//! The checksum is XXH3-64 over bytes `16..page_size` of the plaintext page.
//! When a cipher is configured the records area is encrypted after the
//! checksum is taken, and decrypted before it is verified. A damaged page and
//! a page read with the wrong key therefore fail the same way.

use crate::crypto::PageCipher;
use xxhash_rust::xxh3::xxh3_64;

/// Magic constant at the start of every page.
pub const PAGE_MAGIC: u64 = 0x5345_4757_414C_5047;

const CHECKSUM_OFFSET: usize = 8;
const OPERATION_ID_OFFSET: usize = 16;
const PAYLOAD_LEN_OFFSET: usize = 20;

/// Offset of the first record byte within a page.
pub const RECORDS_OFFSET: usize = 22;

/// Largest supported page size.
pub const MAX_PAGE_SIZE: usize = 64 * 1024;

/// Computes the page checksum over `bytes`.
#[must_use]
pub fn page_checksum(bytes: &[u8]) -> u64 {
    xxh3_64(bytes)
}

/// A plaintext page.
///
/// Pages in the write cache are built up with [`Page::append`]; pages read
/// from disk come from [`Page::open`], which only succeeds for a page whose
/// checksum verifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    buf: Vec<u8>,
    used: usize,
    operation_id: u32,
}

impl Page {
    /// Creates an empty page.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            buf: vec![0u8; page_size],
            used: RECORDS_OFFSET,
            operation_id: 0,
        }
    }

    /// Returns the page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.buf.len()
    }

    /// Returns the offset one past the last written record byte.
    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Returns the number of bytes still free.
    #[must_use]
    pub fn free(&self) -> usize {
        self.buf.len() - self.used
    }

    /// Returns the operation id stored when the page was sealed.
    #[must_use]
    pub fn operation_id(&self) -> u32 {
        self.operation_id
    }

    /// Appends as much of `bytes` as fits and returns how many were copied.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.free());
        self.buf[self.used..self.used + n].copy_from_slice(&bytes[..n]);
        self.used += n;
        n
    }

    /// Returns the written bytes in `from..to`, clamped to the used region.
    #[must_use]
    pub fn slice(&self, from: usize, to: usize) -> &[u8] {
        let to = to.min(self.used);
        let from = from.min(to);
        &self.buf[from..to]
    }

    /// Produces the on-disk image of this page.
    #[must_use]
    pub fn seal(
        &self,
        operation_id: u32,
        cipher: Option<&PageCipher>,
        segment: u64,
        index: u64,
    ) -> Vec<u8> {
        let mut out = self.buf.clone();
        out[..CHECKSUM_OFFSET].copy_from_slice(&PAGE_MAGIC.to_le_bytes());
        out[OPERATION_ID_OFFSET..PAYLOAD_LEN_OFFSET].copy_from_slice(&operation_id.to_le_bytes());
        let payload_len = (self.used - RECORDS_OFFSET) as u16;
        out[PAYLOAD_LEN_OFFSET..RECORDS_OFFSET].copy_from_slice(&payload_len.to_le_bytes());

        let checksum = page_checksum(&out[OPERATION_ID_OFFSET..]);
        out[CHECKSUM_OFFSET..OPERATION_ID_OFFSET].copy_from_slice(&checksum.to_le_bytes());

        if let Some(cipher) = cipher {
            cipher.apply_keystream(segment, index, &mut out[RECORDS_OFFSET..]);
        }
        out
    }

    /// Decrypts and verifies an on-disk page image.
    ///
    /// Returns `None` if the magic, checksum, or payload length is invalid.
    #[must_use]
    pub fn open(
        mut raw: Vec<u8>,
        cipher: Option<&PageCipher>,
        segment: u64,
        index: u64,
    ) -> Option<Self> {
        if raw.len() <= RECORDS_OFFSET {
            return None;
        }
        let magic = u64::from_le_bytes(raw[..CHECKSUM_OFFSET].try_into().ok()?);
        if magic != PAGE_MAGIC {
            return None;
        }

        if let Some(cipher) = cipher {
            cipher.apply_keystream(segment, index, &mut raw[RECORDS_OFFSET..]);
        }

        let stored = u64::from_le_bytes(raw[CHECKSUM_OFFSET..OPERATION_ID_OFFSET].try_into().ok()?);
        if page_checksum(&raw[OPERATION_ID_OFFSET..]) != stored {
            return None;
        }

        let operation_id =
            u32::from_le_bytes(raw[OPERATION_ID_OFFSET..PAYLOAD_LEN_OFFSET].try_into().ok()?);
        let payload_len =
            u16::from_le_bytes(raw[PAYLOAD_LEN_OFFSET..RECORDS_OFFSET].try_into().ok()?) as usize;
        let used = RECORDS_OFFSET + payload_len;
        if used > raw.len() {
            return None;
        }

        Some(Self {
            buf: raw,
            used,
            operation_id,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_page_is_empty() {
        let page = Page::new(64);
        assert_eq!(page.used(), RECORDS_OFFSET);
        assert_eq!(page.free(), 64 - RECORDS_OFFSET);
        assert!(page.slice(0, 64).len() == RECORDS_OFFSET);
    }

    #[test]
    fn append_stops_at_page_end() {
        let mut page = Page::new(32);
        assert_eq!(page.append(&[1u8; 6]), 6);
        assert_eq!(page.append(&[2u8; 10]), 4);
        assert_eq!(page.free(), 0);
        assert_eq!(page.slice(RECORDS_OFFSET, 32), &[1, 1, 1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn seal_and_open_roundtrip() {
        let mut page = Page::new(64);
        page.append(b"hello");

        let raw = page.seal(42, None, 1, 0);
        assert_eq!(raw.len(), 64);
        assert_eq!(&raw[..8], &PAGE_MAGIC.to_le_bytes());

        let opened = Page::open(raw, None, 1, 0).unwrap();
        assert_eq!(opened.operation_id(), 42);
        assert_eq!(opened.used(), RECORDS_OFFSET + 5);
        assert_eq!(opened.slice(RECORDS_OFFSET, 64), b"hello");
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut page = Page::new(64);
        page.append(b"hello world");

        for offset in [16, 20, 30, 63] {
            let mut raw = page.seal(1, None, 1, 0);
            raw[offset] ^= 0x01;
            assert!(Page::open(raw, None, 1, 0).is_none(), "offset {offset}");
        }
    }

    #[test]
    fn bad_magic_rejected() {
        let mut page = Page::new(64);
        page.append(b"x");
        let mut raw = page.seal(1, None, 1, 0);
        raw[0] ^= 0xFF;
        assert!(Page::open(raw, None, 1, 0).is_none());
    }

    #[test]
    fn zeroed_page_rejected() {
        assert!(Page::open(vec![0u8; 64], None, 1, 0).is_none());
        assert!(Page::open(vec![0u8; 10], None, 1, 0).is_none());
    }

    #[test]
    fn checksum_is_xxh3() {
        assert_eq!(page_checksum(b""), xxh3_64(b""));
        assert_ne!(page_checksum(b"a"), page_checksum(b"b"));
    }
}
