//! Salts and the exportable public record

use super::keypair::{KeyPair, PublicKey};
use crate::config::DerivationConfig;
use crate::error::{PairkeyError, PairkeyResult};

/// Random bytes bound to one identity.
///
/// Not secret. Diversifies the derived key per peer pair and keeps a key pair
/// reused across relationships from producing the same shared key twice.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Generate `len` bytes from the OS random source.
    pub fn generate(len: usize) -> PairkeyResult<Self> {
        let mut bytes = vec![0u8; len];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| PairkeyError::Crypto(format!("Failed to generate salt: {}", e)))?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
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

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Fail unless this salt has the length `config` expects.
    pub fn check_len(&self, config: &DerivationConfig) -> PairkeyResult<()> {
        if self.len() != config.salt_len() {
            return Err(PairkeyError::Crypto(format!(
                "salt must be {} bytes, got {}",
                config.salt_len(),
                self.len()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Salt").field(&self.to_hex()).finish()
    }
}

/// The shareable half of an identity: public key plus salt.
///
/// Exported at generation time and handed to the counterpart over some
/// outside channel. Contains no private material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicRecord {
    pub public_key: PublicKey,
    pub salt: Salt,
}

impl PublicRecord {
    pub fn new(public_key: PublicKey, salt: Salt) -> Self {
        Self { public_key, salt }
    }

    /// Parse the raw `.pub` and `.salt` contents received from a counterpart.
    pub fn from_parts(
        public_key: &[u8],
        salt: &[u8],
        config: &DerivationConfig,
    ) -> PairkeyResult<Self> {
        let record = Self {
            public_key: PublicKey::from_bytes(public_key)?,
            salt: Salt::from_bytes(salt),
        };
        record.salt.check_len(config)?;
        Ok(record)
    }
}

/// Private key pair plus salt for one named peer.
#[derive(Debug, Clone)]
pub struct Identity {
    pub keypair: KeyPair,
    pub salt: Salt,
}

impl Identity {
    /// Fresh key pair and independent fresh salt.
    pub fn generate(config: &DerivationConfig) -> PairkeyResult<Self> {
        config.validate()?;
        Ok(Self {
            keypair: KeyPair::generate()?,
            salt: Salt::generate(config.salt_len())?,
        })
    }

    pub fn public_record(&self) -> PublicRecord {
        PublicRecord::new(self.keypair.public_key(), self.salt.clone())
    }
}
