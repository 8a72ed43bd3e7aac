//! Page encryption for the write-ahead log.
//!
//! This module encrypts the record area of each page with AES in counter
//! mode. Encryption is optional and must be enabled via the `encryption`
//! feature.
//!
//! ## Security Model
//!
//! - AES-128, AES-192 or AES-256, selected by key length
//! - The keystream of a page is derived from the IV, the segment id and the
//!   page index, so no two pages of one log share keystream
//! - A page is rewritten in place while it is the log tail; every rewrite
//!   only appends bytes, so reused keystream never covers different plaintext
//!   at the same offset
//! - There is no authentication tag: integrity comes from the page checksum,
//!   which is computed over the plaintext and verified after decryption
//! - Keys are zeroized on drop
//!
//! ## Usage
//!
//! ```ignore
//! use segwal_core::crypto::{EncryptionKey, PageCipher};
//!
//! let key = EncryptionKey::generate(32)?;
//! let cipher = PageCipher::new(&key, &PageCipher::generate_iv()?)?;
//!
//! let mut payload = b"record bytes".to_vec();
//! cipher.apply_keystream(1, 0, &mut payload);
//! cipher.apply_keystream(1, 0, &mut payload);
//! assert_eq!(payload, b"record bytes");
//! ```

#[cfg(feature = "encryption")]
mod cipher;

#[cfg(feature = "encryption")]
pub use cipher::*;

/// Module contents when encryption feature is disabled.
#[cfg(not(feature = "encryption"))]
mod stub {
    use crate::error::{CoreError, CoreResult};

    /// Size of the counter-mode IV in bytes.
    pub const IV_SIZE: usize = 16;

    /// Accepted key sizes in bytes.
    pub const KEY_SIZES: &[usize] = &[16, 24, 32];

    /// Encryption key (stub when encryption disabled).
    #[derive(Debug, Clone)]
    pub struct EncryptionKey {
        _private: (),
    }

    impl EncryptionKey {
        /// Always returns an error when encryption is disabled.
        pub fn generate(_len: usize) -> CoreResult<Self> {
            Err(CoreError::encryption_not_enabled())
        }

        /// Always returns an error when encryption is disabled.
        pub fn from_bytes(_bytes: &[u8]) -> CoreResult<Self> {
            Err(CoreError::encryption_not_enabled())
        }
    }

    /// Page cipher (stub when encryption disabled).
    #[derive(Debug)]
    pub struct PageCipher {
        _private: (),
    }

    impl PageCipher {
        /// Always returns an error when encryption is disabled.
        pub fn new(_key: &EncryptionKey, _iv: &[u8]) -> CoreResult<Self> {
            Err(CoreError::encryption_not_enabled())
        }

        /// Always returns an error when encryption is disabled.
        pub fn generate_iv() -> CoreResult<[u8; IV_SIZE]> {
            Err(CoreError::encryption_not_enabled())
        }

        /// Never called: a stub cipher cannot be constructed.
        pub fn apply_keystream(&self, _segment: u64, _page_index: u64, _data: &mut [u8]) {}
    }
}

#[cfg(not(feature = "encryption"))]
pub use stub::*;
