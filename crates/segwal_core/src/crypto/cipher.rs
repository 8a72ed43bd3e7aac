//! AES counter-mode page cipher.

use crate::error::{CoreError, CoreResult};
use aes_gcm::aes::{Aes128, Aes192, Aes256};
use ctr::cipher::generic_array::GenericArray;
use ctr::cipher::{InnerIvInit, KeyInit, StreamCipher};
use ctr::{Ctr128BE, CtrCore};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the counter-mode IV in bytes.
pub const IV_SIZE: usize = 16;

/// Accepted key sizes in bytes (AES-128, AES-192, AES-256).
pub const KEY_SIZES: &[usize] = &[16, 24, 32];

/// Symmetric key for page encryption.
///
/// The key is automatically zeroized when dropped for security.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: Vec<u8>,
}

impl EncryptionKey {
    /// Generates a new random key of `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `len` is not one of [`KEY_SIZES`].
    pub fn generate(len: usize) -> CoreResult<Self> {
        if !KEY_SIZES.contains(&len) {
            return Err(CoreError::invalid_key_size(len, KEY_SIZES));
        }
        let mut bytes = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut bytes);
        Ok(Self { bytes })
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not 16, 24 or 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        if !KEY_SIZES.contains(&bytes.len()) {
            return Err(CoreError::invalid_key_size(bytes.len(), KEY_SIZES));
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Returns the key as a byte slice.
    ///
    /// # Security
    ///
    /// Be careful with this method - don't log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Expanded AES key, cloned into a fresh counter-mode stream per page.
#[derive(Clone)]
enum BlockCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl BlockCipher {
    fn new(key: &[u8]) -> CoreResult<Self> {
        let invalid = |_| CoreError::invalid_key_size(key.len(), KEY_SIZES);
        match key.len() {
            16 => Aes128::new_from_slice(key).map(Self::Aes128).map_err(invalid),
            24 => Aes192::new_from_slice(key).map(Self::Aes192).map_err(invalid),
            32 => Aes256::new_from_slice(key).map(Self::Aes256).map_err(invalid),
            other => Err(CoreError::invalid_key_size(other, KEY_SIZES)),
        }
    }

    fn apply_keystream(&self, counter: [u8; IV_SIZE], data: &mut [u8]) {
        let iv = GenericArray::from(counter);
        match self {
            Self::Aes128(aes) => {
                Ctr128BE::<Aes128>::from_core(CtrCore::inner_iv_init(aes.clone(), &iv)).apply_keystream(data);
            }
            Self::Aes192(aes) => {
                Ctr128BE::<Aes192>::from_core(CtrCore::inner_iv_init(aes.clone(), &iv)).apply_keystream(data);
            }
            Self::Aes256(aes) => {
                Ctr128BE::<Aes256>::from_core(CtrCore::inner_iv_init(aes.clone(), &iv)).apply_keystream(data);
            }
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Aes128(_) => "AES-128-CTR",
            Self::Aes192(_) => "AES-192-CTR",
            Self::Aes256(_) => "AES-256-CTR",
        }
    }
}

/// Encrypts and decrypts page record areas.
///
/// Counter mode makes encryption and decryption the same operation, and
/// keeps the ciphertext exactly as long as the plaintext so it fits in the
/// fixed page layout. The initial counter of a page is
/// `IV ^ (segment << 64 | page_index << 16)`; the low 16 bits count blocks
/// within the page, which is enough for pages up to 1 MiB.
pub struct PageCipher {
    cipher: BlockCipher,
    iv: u128,
}

impl PageCipher {
    /// Creates a cipher from a key and a 16-byte IV.
    ///
    /// # Errors
    ///
    /// Returns an error if the IV is not [`IV_SIZE`] bytes long.
    pub fn new(key: &EncryptionKey, iv: &[u8]) -> CoreResult<Self> {
        let iv: [u8; IV_SIZE] = iv
            .try_into()
            .map_err(|_| CoreError::invalid_iv_size(iv.len(), IV_SIZE))?;
        Ok(Self {
            cipher: BlockCipher::new(key.as_bytes())?,
            iv: u128::from_be_bytes(iv),
        })
    }

    /// Generates a random IV.
    ///
    /// # Errors
    ///
    /// Infallible when encryption is enabled; the signature matches the
    /// disabled-feature stub.
    pub fn generate_iv() -> CoreResult<[u8; IV_SIZE]> {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);
        Ok(iv)
    }

    /// XORs `data` with the keystream of one page.
    ///
    /// Applying it twice restores the input.
    pub fn apply_keystream(&self, segment: u64, page_index: u64, data: &mut [u8]) {
        let counter = self.iv ^ ((u128::from(segment) << 64) | (u128::from(page_index) << 16));
        self.cipher.apply_keystream(counter.to_be_bytes(), data);
    }
}

impl std::fmt::Debug for PageCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCipher")
            .field("cipher", &self.cipher.name())
            .finish_non_exhaustive()
    }
}
