//! Shared-key derivation: X25519 + salted HKDF-SHA256
//!
//! ## Derivation
//!
//! ```text
//! 1. ikm  = X25519(my_secret, peer_public)
//! 2. salt = my_salt XOR peer_salt
//! 3. prk  = HKDF-Extract(salt, ikm)
//! 4. key  = HKDF-Expand(prk, info = "ENCRYPTION", key_len)
//! ```
//!
//! Both ECDH and XOR commute, so each side derives the same key from its own
//! private key plus the counterpart's public record. Neither the raw secret
//! nor the final key ever crosses the wire.

use crate::config::DerivationConfig;
use crate::error::{PairkeyError, PairkeyResult};
use crate::identity::{Identity, KeyPair, PublicRecord, Salt};
use hkdf::Hkdf;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroizing;

/// Symmetric key derived for one peer pair.
///
/// Wiped on drop. Equality is constant-time and `Debug` never prints the
/// bytes.
#[derive(Clone)]
pub struct SharedKey(Zeroizing<Vec<u8>>);

impl SharedKey {
    /// Wrap raw key bytes (for example, the contents of a `.skey` file).
    pub fn from_bytes(bytes: Vec<u8>) -> PairkeyResult<Self> {
        if bytes.is_empty() {
            return Err(PairkeyError::Crypto("shared key is empty".to_string()));
        }
        Ok(Self(Zeroizing::new(bytes)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for SharedKey {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes().ct_eq(other.as_bytes()).into()
    }
}

impl Eq for SharedKey {}

impl std::fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKey")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Combine two salts with byte-wise XOR.
///
/// Commutative and associative; both inputs must have the same length.
pub fn combine_salts(a: &Salt, b: &Salt) -> PairkeyResult<Salt> {
    if a.len() != b.len() {
        return Err(PairkeyError::Crypto(format!(
            "salt lengths differ ({} vs {})",
            a.len(),
            b.len()
        )));
    }
    let combined: Vec<u8> = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .map(|(x, y)| x ^ y)
        .collect();
    Ok(Salt::from_bytes(combined))
}

/// Derive the shared key between `keypair` (with `my_salt`) and a peer.
///
/// Steps run in a fixed order: ECDH, salt combination, HKDF extract, HKDF
/// expand. Swapping the roles of the two peers yields identical bytes.
///
/// # Arguments
///
/// * `keypair` - Our static key pair
/// * `my_salt` - Our salt, `config.salt_len()` bytes
/// * `peer` - The counterpart's public key and salt
/// * `config` - Salt length, HKDF label and output length
///
/// # Returns
///
/// A [`SharedKey`] of `config.key_len()` bytes. Fails with
/// [`PairkeyError::InvalidConfig`] for bad parameters and with
/// [`PairkeyError::Crypto`] for wrong salt lengths or a low-order peer key.
pub fn derive_shared_key(
    keypair: &KeyPair,
    my_salt: &Salt,
    peer: &PublicRecord,
    config: &DerivationConfig,
) -> PairkeyResult<SharedKey> {
    config.validate()?;
    my_salt.check_len(config)?;
    peer.salt.check_len(config)?;

    let ikm = keypair.diffie_hellman(&peer.public_key)?;
    let salt = combine_salts(my_salt, &peer.salt)?;

    let hkdf = Hkdf::<Sha256>::new(Some(salt.as_bytes()), ikm.as_bytes());
    let mut okm = Zeroizing::new(vec![0u8; config.key_len()]);
    hkdf.expand(config.info(), &mut okm)
        .map_err(|e| PairkeyError::Crypto(format!("HKDF expand failed: {}", e)))?;

    debug!(
        me = %keypair.public_key().fingerprint(),
        peer = %peer.public_key.fingerprint(),
        key_len = okm.len(),
        "Derived shared key"
    );

    Ok(SharedKey(okm))
}

/// Same as [`derive_shared_key`] for a full local identity.
pub fn derive_for_identity(
    me: &Identity,
    peer: &PublicRecord,
    config: &DerivationConfig,
) -> PairkeyResult<SharedKey> {
    derive_shared_key(&me.keypair, &me.salt, peer, config)
}
