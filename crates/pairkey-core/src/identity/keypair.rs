//! Static X25519 key pair and its persisted record format

use crate::error::{PairkeyError, PairkeyResult};
use x25519_dalek::{PublicKey as X25519PublicKey, SharedSecret, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

/// Size of an X25519 private scalar in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of an X25519 public point in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

const RECORD_MAGIC: &[u8; 4] = b"PKKP";
const RECORD_VERSION: u8 = 1;
const RECORD_HEADER_LEN: usize = RECORD_MAGIC.len() + 1;

/// Public half of a key pair. Safe to share.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(X25519PublicKey);

impl PublicKey {
    /// Parse the fixed 32-byte public key encoding.
    ///
    /// Malformed input is a [`PairkeyError::Crypto`] failure since it comes
    /// from a counterpart and feeds straight into ECDH.
    pub fn from_bytes(bytes: &[u8]) -> PairkeyResult<Self> {
        let array: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
            PairkeyError::Crypto(format!(
                "invalid public key size, expected {}, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(X25519PublicKey::from(array)))
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// First 8 bytes as hex, for logs and display.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.as_bytes()[..8])
    }

    pub(crate) fn as_x25519(&self) -> &X25519PublicKey {
        &self.0
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_hex()).finish()
    }
}

/// One peer's static X25519 key pair.
///
/// The private scalar is wiped on drop and never printed by `Debug`.
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair from the OS random source.
    pub fn generate() -> PairkeyResult<Self> {
        let mut seed = [0u8; PRIVATE_KEY_SIZE];
        getrandom::getrandom(&mut seed)
            .map_err(|e| PairkeyError::Crypto(format!("Failed to generate key pair: {}", e)))?;
        let keypair = Self::from_secret_bytes(seed);
        seed.zeroize();
        Ok(keypair)
    }

    /// Build a key pair from a raw private scalar.
    pub fn from_secret_bytes(secret: [u8; PRIVATE_KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(secret);
        let public = PublicKey(X25519PublicKey::from(&secret));
        Self { secret, public }
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Raw ECDH with a counterpart's public key.
    ///
    /// Rejects non-contributory results (a low-order peer point forces the
    /// all-zero secret regardless of our scalar).
    pub fn diffie_hellman(&self, peer: &PublicKey) -> PairkeyResult<SharedSecret> {
        let shared = self.secret.diffie_hellman(peer.as_x25519());
        if !shared.was_contributory() {
            return Err(PairkeyError::Crypto(
                "ECDH result is non-contributory (low-order public key)".to_string(),
            ));
        }
        Ok(shared)
    }

    /// Serialize the key pair record.
    ///
    /// Format: `[magic "PKKP"][version: 1][len: u32 LE][private scalar][len: u32 LE][public point]`
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let secret = Zeroizing::new(self.secret.to_bytes());
        let public = self.public.as_bytes();

        let mut bytes = Zeroizing::new(Vec::with_capacity(
            RECORD_HEADER_LEN + 4 + secret.len() + 4 + public.len(),
        ));
        bytes.extend_from_slice(RECORD_MAGIC);
        bytes.push(RECORD_VERSION);
        bytes.extend_from_slice(&(secret.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&secret[..]);
        bytes.extend_from_slice(&(public.len() as u32).to_le_bytes());
        bytes.extend_from_slice(public);
        bytes
    }

    /// Deserialize a key pair record written by [`KeyPair::to_bytes`].
    ///
    /// The stored public point must match the one recomputed from the
    /// private scalar.
    pub fn from_bytes(bytes: &[u8]) -> PairkeyResult<Self> {
        if bytes.len() < RECORD_HEADER_LEN || &bytes[..RECORD_MAGIC.len()] != RECORD_MAGIC {
            return Err(PairkeyError::Decode(
                "not a key pair record (bad magic)".to_string(),
            ));
        }
        let version = bytes[RECORD_MAGIC.len()];
        if version != RECORD_VERSION {
            return Err(PairkeyError::Decode(format!(
                "unsupported key pair record version {}",
                version
            )));
        }

        let mut reader = FieldReader::new(&bytes[RECORD_HEADER_LEN..]);
        let secret_field = reader.field("private scalar")?;
        let public_field = reader.field("public point")?;
        if !reader.is_empty() {
            return Err(PairkeyError::Decode(
                "trailing bytes after key pair record".to_string(),
            ));
        }

        let mut secret: [u8; PRIVATE_KEY_SIZE] = secret_field.try_into().map_err(|_| {
            PairkeyError::Decode(format!(
                "private scalar must be {} bytes, got {}",
                PRIVATE_KEY_SIZE,
                secret_field.len()
            ))
        })?;
        let keypair = Self::from_secret_bytes(secret);
        secret.zeroize();

        if public_field != keypair.public.as_bytes() {
            return Err(PairkeyError::Decode(
                "stored public point does not match private scalar".to_string(),
            ));
        }

        Ok(keypair)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public.fingerprint())
            .finish_non_exhaustive()
    }
}

/// Reads `[len: u32 LE][bytes]` fields in sequence.
struct FieldReader<'a> {
    rest: &'a [u8],
}

impl<'a> FieldReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }

    fn field(&mut self, what: &str) -> PairkeyResult<&'a [u8]> {
        if self.rest.len() < 4 {
            return Err(PairkeyError::Decode(format!(
                "key pair record truncated (missing {} length)",
                what
            )));
        }
        let (len_bytes, rest) = self.rest.split_at(4);
        let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
            as usize;
        if rest.len() < len {
            return Err(PairkeyError::Decode(format!(
                "key pair record truncated (missing {})",
                what
            )));
        }
        let (field, rest) = rest.split_at(len);
        self.rest = rest;
        Ok(field)
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_produces_distinct_keys() {
        let a = KeyPair::generate().unwrap();
        let b = KeyPair::generate().unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_record_roundtrip() {
        let keypair = KeyPair::generate().unwrap();
        let bytes = keypair.to_bytes();

        let recovered = KeyPair::from_bytes(&bytes).unwrap();
        assert_eq!(keypair.public_key(), recovered.public_key());
    }

    #[test]
    fn test_record_layout() {
        let keypair = KeyPair::from_secret_bytes([9u8; 32]);
        let bytes = keypair.to_bytes();

        assert_eq!(&bytes[..4], b"PKKP");
        assert_eq!(bytes[4], 1);
        assert_eq!(&bytes[5..9], &32u32.to_le_bytes());
        assert_eq!(&bytes[9..41], &[9u8; 32]);
        assert_eq!(&bytes[41..45], &32u32.to_le_bytes());
        assert_eq!(&bytes[45..77], keypair.public_key().as_bytes());
        assert_eq!(bytes.len(), 77);
    }

    #[test]
    fn test_record_rejects_bad_magic() {
        let mut bytes = KeyPair::generate().unwrap().to_bytes().to_vec();
        bytes[0] = b'X';
        assert!(matches!(KeyPair::from_bytes(&bytes), Err(PairkeyError::Decode(_))));
    }

    #[test]
    fn test_record_rejects_truncation() {
        let bytes = KeyPair::generate().unwrap().to_bytes();
        for cut in [0, 4, 6, 20, 44, bytes.len() - 1] {
            assert!(
                KeyPair::from_bytes(&bytes[..cut]).is_err(),
                "truncated record of {} bytes should not decode",
                cut
            );
        }
    }

    #[test]
    fn test_record_rejects_mismatched_public() {
        let mut bytes = KeyPair::generate().unwrap().to_bytes().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let result = KeyPair::from_bytes(&bytes);
        assert!(matches!(result, Err(PairkeyError::Decode(msg)) if msg.contains("does not match")));
    }

    #[test]
    fn test_record_rejects_trailing_bytes() {
        let mut bytes = KeyPair::generate().unwrap().to_bytes().to_vec();
        bytes.push(0);
        assert!(KeyPair::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_ecdh_commutes() {
        let alice = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();

        let ab = alice.diffie_hellman(&bob.public_key()).unwrap();
        let ba = bob.diffie_hellman(&alice.public_key()).unwrap();

        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn test_ecdh_rejects_low_order_point() {
        let alice = KeyPair::generate().unwrap();
        let identity_point = PublicKey::from_bytes(&[0u8; 32]).unwrap();

        let result = alice.diffie_hellman(&identity_point);
        assert!(matches!(result, Err(PairkeyError::Crypto(_))));
    }

    #[test]
    fn test_public_key_wrong_length() {
        let result = PublicKey::from_bytes(&[1u8; 31]);
        assert!(matches!(result, Err(PairkeyError::Crypto(_))));
    }

    #[test]
    fn test_debug_hides_private_scalar() {
        let keypair = KeyPair::from_secret_bytes([0xAB; 32]);
        let debug = format!("{:?}", keypair);
        assert!(!debug.contains(&hex::encode([0xAB; 32])));
        assert!(debug.contains(&keypair.public_key().fingerprint()));
    }
}
