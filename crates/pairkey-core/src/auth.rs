//! Request authentication with HMAC-SHA256
//!
//! A request is identified by an ordered list of byte strings (method, path,
//! body, ...). The MAC covers a canonical encoding in which every component
//! is prefixed by its length, so `("AB", "C")` and `("A", "BC")` never
//! collide.
//!
//! ```text
//! canonical = len(c0) || c0 || len(c1) || c1 || ...     (len: u64 big-endian)
//! mac       = HMAC-SHA256(shared_key, canonical)
//! ```

use crate::derive::SharedKey;
use crate::error::{PairkeyError, PairkeyResult};
use base64::{engine::general_purpose::URL_SAFE, Engine};
use hmac::{Hmac, Mac as _};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 output size in bytes
pub const MAC_SIZE: usize = 32;

/// Ordered byte strings identifying one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageComponents {
    parts: Vec<Vec<u8>>,
}

impl MessageComponents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a component. Order matters.
    pub fn push(mut self, part: impl AsRef<[u8]>) -> Self {
        self.parts.push(part.as_ref().to_vec());
        self
    }

    /// The fixed set used by the `sign` command when no components are given.
    pub fn demo() -> Self {
        Self::new().push("GET").push("/media/0").push("test")
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.parts.iter().map(Vec::as_slice)
    }

    /// Length-prefixed concatenation of all components.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let total: usize = self.parts.iter().map(|p| 8 + p.len()).sum();
        let mut out = Vec::with_capacity(total);
        for part in &self.parts {
            out.extend_from_slice(&(part.len() as u64).to_be_bytes());
            out.extend_from_slice(part);
        }
        out
    }
}

impl<T: AsRef<[u8]>> FromIterator<T> for MessageComponents {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            parts: iter.into_iter().map(|p| p.as_ref().to_vec()).collect(),
        }
    }
}

/// A request MAC.
#[derive(Clone, Copy)]
pub struct Mac([u8; MAC_SIZE]);

impl Mac {
    pub fn from_bytes(bytes: &[u8]) -> PairkeyResult<Self> {
        let array: [u8; MAC_SIZE] = bytes.try_into().map_err(|_| {
            PairkeyError::Decode(format!("MAC must be {} bytes, got {}", MAC_SIZE, bytes.len()))
        })?;
        Ok(Self(array))
    }

    /// Parse the URL-safe base64 display form.
    pub fn from_base64(encoded: &str) -> PairkeyResult<Self> {
        let bytes = URL_SAFE
            .decode(encoded.trim())
            .map_err(|e| PairkeyError::Decode(format!("invalid base64 MAC: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MAC_SIZE] {
        &self.0
    }

    /// URL-safe base64, padded, no line wrapping.
    pub fn to_base64(&self) -> String {
        URL_SAFE.encode(self.0)
    }

    /// `"<scheme> <base64>"`, the shape of an `Authorization` header value.
    pub fn authorization_value(&self, scheme: &str) -> String {
        format!("{} {}", scheme, self.to_base64())
    }
}

impl PartialEq for Mac {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Mac {}

impl std::fmt::Debug for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Mac").field(&self.to_base64()).finish()
    }
}

fn keyed(key: &SharedKey) -> PairkeyResult<HmacSha256> {
    HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| PairkeyError::Crypto(format!("HMAC key rejected: {}", e)))
}

/// Compute the MAC of `components` under `key`.
pub fn sign(key: &SharedKey, components: &MessageComponents) -> PairkeyResult<Mac> {
    let mut mac = keyed(key)?;
    mac.update(&components.canonical_bytes());
    let out = mac.finalize().into_bytes();

    let mut bytes = [0u8; MAC_SIZE];
    bytes.copy_from_slice(&out);
    Ok(Mac(bytes))
}

/// Check `expected` against the MAC of `components` in constant time.
pub fn verify(
    key: &SharedKey,
    components: &MessageComponents,
    expected: &Mac,
) -> PairkeyResult<()> {
    let mut mac = keyed(key)?;
    mac.update(&components.canonical_bytes());
    mac.verify_slice(expected.as_bytes())
        .map_err(|_| PairkeyError::AuthenticationFailed("request MAC did not verify"))
}
