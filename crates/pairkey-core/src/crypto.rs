//! Envelope encryption using ChaCha20-Poly1305 AEAD
//!
//! Encrypts opaque byte payloads under a derived [`SharedKey`]. Every
//! envelope carries its own random nonce, so one key can seal any number of
//! payloads.

use crate::derive::SharedKey;
use crate::error::{PairkeyError, PairkeyResult};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

/// Key size for ChaCha20-Poly1305 (32 bytes)
pub const KEY_SIZE: usize = 32;

/// Nonce size for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Smallest possible envelope: nonce plus tag over an empty plaintext
pub const ENVELOPE_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// A sealed payload.
///
/// # Wire Format
///
/// `[nonce (12 bytes)] + [ciphertext] + [auth_tag (16 bytes)]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    bytes: Vec<u8>,
}

impl Envelope {
    /// Parse an envelope, checking only that it can hold a nonce and a tag.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> PairkeyResult<Self> {
        let bytes = bytes.into();
        if bytes.len() < ENVELOPE_OVERHEAD {
            return Err(PairkeyError::MalformedEnvelope(format!(
                "expected at least {} bytes, got {}",
                ENVELOPE_OVERHEAD,
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    /// The 12-byte nonce prefix.
    pub fn nonce(&self) -> &[u8] {
        &self.bytes[..NONCE_SIZE]
    }

    /// Ciphertext followed by the authentication tag.
    pub fn sealed(&self) -> &[u8] {
        &self.bytes[NONCE_SIZE..]
    }

    /// Length of the plaintext this envelope decrypts to.
    pub fn plaintext_len(&self) -> usize {
        self.bytes.len() - ENVELOPE_OVERHEAD
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Envelope cipher keyed by a shared key.
///
/// # Example
///
/// ```
/// use pairkey_core::{EnvelopeCipher, SharedKey};
///
/// let key = SharedKey::from_bytes([7u8; 32].to_vec()).unwrap();
/// let cipher = EnvelopeCipher::new(&key).unwrap();
///
/// let envelope = cipher.encrypt(b"hello world").unwrap();
/// let plaintext = cipher.decrypt(&envelope).unwrap();
///
/// assert_eq!(plaintext, b"hello world");
/// ```
pub struct EnvelopeCipher {
    cipher: ChaCha20Poly1305,
}

impl EnvelopeCipher {
    /// Create a cipher from a shared key.
    ///
    /// # Arguments
    ///
    /// * `key` - A derived shared key; must be exactly [`KEY_SIZE`] bytes
    ///
    /// # Returns
    ///
    /// The cipher, or [`PairkeyError::Crypto`] if the key has any other
    /// length.
    pub fn new(key: &SharedKey) -> PairkeyResult<Self> {
        let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes()).map_err(|_| {
            PairkeyError::Crypto(format!(
                "envelope key must be {} bytes, got {}",
                KEY_SIZE,
                key.len()
            ))
        })?;
        Ok(Self { cipher })
    }

    /// Encrypt a payload under a fresh random nonce.
    ///
    /// # Arguments
    ///
    /// * `plaintext` - The data to encrypt (any length, including empty)
    ///
    /// # Returns
    ///
    /// An [`Envelope`] of `plaintext.len() + ENVELOPE_OVERHEAD` bytes:
    /// nonce, ciphertext, tag.
    pub fn encrypt(&self, plaintext: &[u8]) -> PairkeyResult<Envelope> {
        let nonce_bytes = Self::generate_nonce();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| PairkeyError::Crypto(format!("Encryption failed: {}", e)))?;

        let mut bytes = Vec::with_capacity(NONCE_SIZE + sealed.len());
        bytes.extend_from_slice(&nonce_bytes);
        bytes.extend_from_slice(&sealed);

        Ok(Envelope { bytes })
    }

    /// Decrypt an envelope.
    ///
    /// Tag verification happens inside the AEAD in constant time.
    ///
    /// # Arguments
    ///
    /// * `envelope` - An envelope produced by [`EnvelopeCipher::encrypt`]
    ///
    /// # Returns
    ///
    /// The plaintext, or [`PairkeyError::AuthenticationFailed`] with no
    /// further detail if the key is wrong or any byte was altered.
    pub fn decrypt(&self, envelope: &Envelope) -> PairkeyResult<Vec<u8>> {
        let nonce = Nonce::from_slice(envelope.nonce());
        self.cipher
            .decrypt(nonce, envelope.sealed())
            .map_err(|_| PairkeyError::AuthenticationFailed("envelope did not verify"))
    }

    /// Parse raw bytes as an envelope and decrypt them.
    ///
    /// Inputs shorter than [`ENVELOPE_OVERHEAD`] fail with
    /// [`PairkeyError::MalformedEnvelope`] before any decryption is tried.
    pub fn open(&self, bytes: &[u8]) -> PairkeyResult<Vec<u8>> {
        let envelope = Envelope::from_bytes(bytes)?;
        self.decrypt(&envelope)
    }

    /// Generate a random 12-byte nonce from the thread-local CSPRNG.
    pub fn generate_nonce() -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce);
        nonce
    }
}

/// Convenience functions for one-off encryption/decryption.
///
/// These build a temporary cipher per call. For repeated operations with the
/// same key, prefer [`EnvelopeCipher`].
pub mod stateless {
    use super::*;

    /// Encrypt `plaintext` under `key`, returning the envelope bytes.
    pub fn encrypt(key: &SharedKey, plaintext: &[u8]) -> PairkeyResult<Vec<u8>> {
        Ok(EnvelopeCipher::new(key)?.encrypt(plaintext)?.into_bytes())
    }

    /// Decrypt envelope bytes under `key`.
    pub fn decrypt(key: &SharedKey, envelope: &[u8]) -> PairkeyResult<Vec<u8>> {
        EnvelopeCipher::new(key)?.open(envelope)
    }
}
