//! Derivation parameters
//!
//! Salt length, HKDF context label and output key length are carried in a
//! [`DerivationConfig`] value that is passed into every derivation, so tests
//! can exercise alternate parameters without touching global state.

use crate::crypto::KEY_SIZE;
use crate::error::{PairkeyError, PairkeyResult};

/// Default salt length in bytes
pub const DEFAULT_SALT_LEN: usize = 32;

/// Default HKDF expand label
pub const DEFAULT_INFO: &[u8] = b"ENCRYPTION";

/// HKDF-SHA256 can expand to at most 255 hash blocks
const HKDF_SHA256_MAX_OUTPUT: usize = 255 * 32;

/// Parameters for salt generation and shared-key derivation.
///
/// Both peers must use the same config, otherwise they derive different keys.
///
/// ```
/// use pairkey_core::DerivationConfig;
///
/// let config = DerivationConfig::default()
///     .with_info(b"SIGNING".to_vec())
///     .with_salt_len(16);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationConfig {
    salt_len: usize,
    info: Vec<u8>,
    key_len: usize,
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self {
            salt_len: DEFAULT_SALT_LEN,
            info: DEFAULT_INFO.to_vec(),
            key_len: KEY_SIZE,
        }
    }
}

impl DerivationConfig {
    /// Set the salt length used by key generation and expected by derivation.
    pub fn with_salt_len(mut self, salt_len: usize) -> Self {
        self.salt_len = salt_len;
        self
    }

    /// Set the HKDF expand label.
    pub fn with_info(mut self, info: impl Into<Vec<u8>>) -> Self {
        self.info = info.into();
        self
    }

    /// Set the derived key length.
    ///
    /// The envelope cipher only accepts [`KEY_SIZE`] byte keys; other lengths
    /// are usable for signing.
    pub fn with_key_len(mut self, key_len: usize) -> Self {
        self.key_len = key_len;
        self
    }

    pub fn salt_len(&self) -> usize {
        self.salt_len
    }

    pub fn info(&self) -> &[u8] {
        &self.info
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    /// Check that the parameters can drive a derivation.
    pub fn validate(&self) -> PairkeyResult<()> {
        if self.salt_len == 0 {
            return Err(PairkeyError::InvalidConfig(
                "salt length must be non-zero".to_string(),
            ));
        }
        if self.key_len == 0 || self.key_len > HKDF_SHA256_MAX_OUTPUT {
            return Err(PairkeyError::InvalidConfig(format!(
                "key length must be between 1 and {} bytes, got {}",
                HKDF_SHA256_MAX_OUTPUT, self.key_len
            )));
        }
        Ok(())
    }
}
