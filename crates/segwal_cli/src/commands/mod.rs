//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod verify;

use segwal_core::{CoreError, EncryptionKey, LogReader, RecordRegistry, WalConfig};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The log could not be read.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A hex argument could not be decoded.
    #[error("invalid hex in --{arg}: {reason}")]
    InvalidHex {
        /// Argument name.
        arg: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The log directory does not exist.
    #[error("no log directory at {0}")]
    MissingDirectory(PathBuf),

    /// Verification found damaged pages.
    #[error("verification failed: {0} damaged page(s)")]
    VerificationFailed(u64),
}

/// Options locating and decoding a log.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Log directory.
    pub path: PathBuf,
    /// Segment base name.
    pub name: String,
    /// Page size.
    pub page_size: usize,
    /// Hex encryption key.
    pub key: Option<String>,
    /// Hex encryption IV.
    pub iv: Option<String>,
}

impl LogOptions {
    /// Builds the read-only configuration for these options.
    pub fn config(&self) -> Result<WalConfig, CliError> {
        let mut config = WalConfig::new(self.name.clone(), &self.path)
            .page_size(self.page_size)
            .record_types(RecordRegistry::permissive());
        if let (Some(key), Some(iv)) = (&self.key, &self.iv) {
            let key = EncryptionKey::from_bytes(&decode_hex("key", key)?)?;
            config = config.encryption(key, decode_hex("iv", iv)?);
        }
        Ok(config)
    }

    /// Opens a read-only view of the log.
    pub fn open(&self) -> Result<LogReader, CliError> {
        if !self.path.is_dir() {
            return Err(CliError::MissingDirectory(self.path.clone()));
        }
        tracing::debug!(path = %self.path.display(), name = %self.name, "opening log read-only");
        let reader = LogReader::open(&self.config()?)?;
        tracing::debug!(segments = reader.segments().len(), "discovered segments");
        Ok(reader)
    }
}

/// Decodes a hex string, ignoring an optional `0x` prefix.
pub fn decode_hex(arg: &'static str, text: &str) -> Result<Vec<u8>, CliError> {
    let text = text.strip_prefix("0x").unwrap_or(text);
    if !text.is_ascii() || text.len() % 2 != 0 {
        return Err(CliError::InvalidHex {
            arg,
            reason: "expected an even number of hex digits".to_string(),
        });
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16).map_err(|e| CliError::InvalidHex {
                arg,
                reason: e.to_string(),
            })
        })
        .collect()
}
