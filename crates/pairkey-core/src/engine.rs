//! PairingEngine - the entry point behind every `pairkey` command
//!
//! Ties a [`KeyStore`] to a [`DerivationConfig`] and exposes one method per
//! operation:
//! - identity generation and public record import
//! - shared key derivation between two stored identities
//! - envelope encryption under a stored shared key
//! - request signing and verification
//!
//! # Example
//!
//! ```no_run
//! use pairkey_core::{MessageComponents, PairingEngine};
//!
//! let engine = PairingEngine::new("./keys");
//! engine.genkey("alice")?;
//! engine.genkey("bob")?;
//!
//! let key_path = engine.genshared("alice", "bob")?;
//! let envelope = engine.encrypt(&key_path, b"hello world")?;
//! let mac = engine.sign(&key_path, &MessageComponents::demo())?;
//! # Ok::<(), pairkey_core::PairkeyError>(())
//! ```

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::auth::{self, Mac, MessageComponents};
use crate::config::DerivationConfig;
use crate::crypto::EnvelopeCipher;
use crate::derive::derive_for_identity;
use crate::error::{PairkeyError, PairkeyResult};
use crate::framing;
use crate::identity::{Identity, PublicRecord};
use crate::keystore::KeyStore;

/// Main entry point for pairkey operations
#[derive(Debug, Clone)]
pub struct PairingEngine {
    /// Where key files live
    store: KeyStore,
    /// Salt length, HKDF label and key length
    config: DerivationConfig,
}

impl PairingEngine {
    /// Engine over `dir` with the default derivation parameters.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_config(dir, DerivationConfig::default())
    }

    pub fn with_config(dir: impl Into<PathBuf>, config: DerivationConfig) -> Self {
        Self {
            store: KeyStore::new(dir),
            config,
        }
    }

    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    pub fn config(&self) -> &DerivationConfig {
        &self.config
    }

    /// Generate and persist a fresh identity for `name`, replacing any
    /// existing one.
    ///
    /// # Arguments
    ///
    /// * `name` - Identity name; becomes `<name>.key`, `<name>.pub`, `<name>.salt`
    ///
    /// # Returns
    ///
    /// The public half (key and salt) that gets shared with the counterpart.
    pub fn genkey(&self, name: &str) -> PairkeyResult<PublicRecord> {
        let identity = Identity::generate(&self.config)?;
        self.store.save_identity(name, &identity)?;

        let record = identity.public_record();
        info!(name, fingerprint = %record.public_key.fingerprint(), "Generated identity");
        Ok(record)
    }

    /// Derive the shared key between local identity `me` and `peer`'s public
    /// record, write it to `<me>_<peer>.skey` and return that path.
    ///
    /// # Arguments
    ///
    /// * `me` - Name of an identity with a private `.key` in the store
    /// * `peer` - Name whose `.pub` and `.salt` are in the store
    ///
    /// # Returns
    ///
    /// Path of the written shared key file. Both sides of a pairing produce
    /// identical bytes.
    pub fn genshared(&self, me: &str, peer: &str) -> PairkeyResult<PathBuf> {
        let identity = self.store.load_identity(me)?;
        let record = self.store.load_public_record(peer)?;

        let key = derive_for_identity(&identity, &record, &self.config)?;
        let path = self.store.save_shared_key(me, peer, &key)?;

        info!(me, peer, path = %path.display(), "Derived shared key");
        Ok(path)
    }

    /// Seal `plaintext` under the key stored at `keyfile`.
    ///
    /// # Arguments
    ///
    /// * `keyfile` - Path to a shared key written by [`PairingEngine::genshared`]
    /// * `plaintext` - Data to encrypt
    ///
    /// # Returns
    ///
    /// Envelope bytes: nonce, ciphertext, tag.
    pub fn encrypt(
        &self,
        keyfile: impl AsRef<Path>,
        plaintext: &[u8],
    ) -> PairkeyResult<Vec<u8>> {
        let key = KeyStore::load_shared_key(keyfile)?;
        let envelope = EnvelopeCipher::new(&key)?.encrypt(plaintext)?;
        info!(
            plaintext_len = plaintext.len(),
            envelope_len = envelope.as_bytes().len(),
            "Encrypted"
        );
        Ok(envelope.into_bytes())
    }

    /// Open an envelope with the key stored at `keyfile`.
    ///
    /// # Arguments
    ///
    /// * `keyfile` - Path to a shared key written by [`PairingEngine::genshared`]
    /// * `envelope` - Bytes produced by [`PairingEngine::encrypt`]
    ///
    /// # Returns
    ///
    /// The plaintext, or [`PairkeyError::AuthenticationFailed`] /
    /// [`PairkeyError::MalformedEnvelope`] if the envelope is rejected.
    pub fn decrypt(
        &self,
        keyfile: impl AsRef<Path>,
        envelope: &[u8],
    ) -> PairkeyResult<Vec<u8>> {
        let key = KeyStore::load_shared_key(keyfile)?;
        let plaintext = EnvelopeCipher::new(&key)?.open(envelope).map_err(|e| {
            warn!(envelope_len = envelope.len(), "Envelope rejected");
            e
        })?;
        info!(plaintext_len = plaintext.len(), "Decrypted");
        Ok(plaintext)
    }

    /// [`PairingEngine::encrypt`] followed by end-marker framing, for
    /// transports that delimit messages with `00 00`.
    pub fn encrypt_framed(
        &self,
        keyfile: impl AsRef<Path>,
        plaintext: &[u8],
    ) -> PairkeyResult<Vec<u8>> {
        let envelope = self.encrypt(keyfile, plaintext)?;
        Ok(framing::encode(&envelope))
    }

    /// Strip end-marker framing, then [`PairingEngine::decrypt`].
    ///
    /// Input without the trailing marker fails with
    /// [`PairkeyError::Framing`] before the key file is read.
    pub fn decrypt_framed(
        &self,
        keyfile: impl AsRef<Path>,
        framed: &[u8],
    ) -> PairkeyResult<Vec<u8>> {
        let envelope = framing::decode(framed).map_err(|e| {
            warn!(framed_len = framed.len(), "Frame rejected");
            e
        })?;
        self.decrypt(keyfile, &envelope)
    }

    /// MAC `components` with the key stored at `keyfile`.
    ///
    /// # Arguments
    ///
    /// * `keyfile` - Path to a shared key
    /// * `components` - Ordered request parts (method, path, body, ...)
    ///
    /// # Returns
    ///
    /// The HMAC-SHA256 tag; [`Mac::to_base64`] gives the display form.
    pub fn sign(
        &self,
        keyfile: impl AsRef<Path>,
        components: &MessageComponents,
    ) -> PairkeyResult<Mac> {
        let key = KeyStore::load_shared_key(keyfile)?;
        let mac = auth::sign(&key, components)?;
        info!(components = components.len(), "Signed request");
        Ok(mac)
    }

    /// Check `mac` over `components` with the key stored at `keyfile`.
    ///
    /// # Arguments
    ///
    /// * `keyfile` - Path to a shared key
    /// * `components` - The request parts the MAC should cover
    /// * `mac` - Tag received from the counterpart
    ///
    /// # Returns
    ///
    /// `Ok(())` on a match, [`PairkeyError::AuthenticationFailed`] otherwise.
    pub fn verify(
        &self,
        keyfile: impl AsRef<Path>,
        components: &MessageComponents,
        mac: &Mac,
    ) -> PairkeyResult<()> {
        let key = KeyStore::load_shared_key(keyfile)?;
        auth::verify(&key, components, mac).map_err(|e| {
            warn!(components = components.len(), "Request MAC rejected");
            e
        })?;
        info!(components = components.len(), "Verified request");
        Ok(())
    }

    /// Store a counterpart's raw `.pub` and `.salt` contents under `name`.
    ///
    /// # Arguments
    ///
    /// * `name` - Name to file the record under; must not own a `.key`
    /// * `public_key` - 32 raw X25519 public key bytes
    /// * `salt` - Raw salt bytes of the configured length
    ///
    /// # Returns
    ///
    /// The validated record as written.
    pub fn import(
        &self,
        name: &str,
        public_key: &[u8],
        salt: &[u8],
    ) -> PairkeyResult<PublicRecord> {
        let record = PublicRecord::from_parts(public_key, salt, &self.config)?;
        self.store.import_public_record(name, &record, &self.config)?;
        info!(name, fingerprint = %record.public_key.fingerprint(), "Imported public record");
        Ok(record)
    }

    /// Public key and salt stored under `name`.
    pub fn show(&self, name: &str) -> PairkeyResult<PublicRecord> {
        let record = self.store.load_public_record(name)?;
        if record.salt.check_len(&self.config).is_err() {
            warn!(name, salt_len = record.salt.len(), "Stored salt has unexpected length");
        }
        Ok(record)
    }

    /// True if `<name>.key` exists in the store.
    pub fn has_identity(&self, name: &str) -> PairkeyResult<bool> {
        Ok(self.store.key_path(name)?.exists())
    }
}

impl Default for PairingEngine {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Parse a MAC given either as its base64 display form or as raw bytes.
pub fn parse_mac(input: &[u8]) -> PairkeyResult<Mac> {
    if let Ok(mac) = Mac::from_bytes(input) {
        return Ok(mac);
    }
    let text = std::str::from_utf8(input)
        .map_err(|_| PairkeyError::Decode("MAC is neither raw bytes nor base64".to_string()))?;
    Mac::from_base64(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_engine() -> (PairingEngine, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        (PairingEngine::new(temp_dir.path()), temp_dir)
    }

    #[test]
    fn test_genkey_then_show() {
        let (engine, _temp) = create_test_engine();
        let record = engine.genkey("alice").unwrap();

        assert!(engine.has_identity("alice").unwrap());
        assert_eq!(engine.show("alice").unwrap(), record);
    }

    #[test]
    fn test_genshared_is_symmetric() {
        let (engine, _temp) = create_test_engine();
        engine.genkey("alice").unwrap();
        engine.genkey("bob").unwrap();

        let ab = engine.genshared("alice", "bob").unwrap();
        let ba = engine.genshared("bob", "alice").unwrap();

        let ab_bytes = std::fs::read(&ab).unwrap();
        let ba_bytes = std::fs::read(&ba).unwrap();
        assert_eq!(ab_bytes, ba_bytes);
        assert_eq!(ab_bytes.len(), 32);
    }

    #[test]
    fn test_genshared_missing_peer() {
        let (engine, _temp) = create_test_engine();
        engine.genkey("alice").unwrap();

        let err = engine.genshared("alice", "ghost").unwrap_err();
        assert!(matches!(err, PairkeyError::NotFound(ref msg) if msg.contains("ghost")));
    }

    #[test]
    fn test_encrypt_decrypt_across_sides() {
        let (engine, _temp) = create_test_engine();
        engine.genkey("alice").unwrap();
        engine.genkey("bob").unwrap();
        let ab = engine.genshared("alice", "bob").unwrap();
        let ba = engine.genshared("bob", "alice").unwrap();

        let envelope = engine.encrypt(&ab, b"hello world").unwrap();
        assert_eq!(envelope.len(), b"hello world".len() + 28);
        assert_eq!(engine.decrypt(&ba, &envelope).unwrap(), b"hello world");
    }

    #[test]
    fn test_decrypt_with_wrong_key() {
        let (engine, _temp) = create_test_engine();
        for name in ["alice", "bob", "carol"] {
            engine.genkey(name).unwrap();
        }
        let ab = engine.genshared("alice", "bob").unwrap();
        let ac = engine.genshared("alice", "carol").unwrap();

        let envelope = engine.encrypt(&ab, b"for bob only").unwrap();
        let err = engine.decrypt(&ac, &envelope).unwrap_err();
        assert!(matches!(err, PairkeyError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_sign_and_verify() {
        let (engine, _temp) = create_test_engine();
        engine.genkey("alice").unwrap();
        engine.genkey("bob").unwrap();
        let ab = engine.genshared("alice", "bob").unwrap();
        let ba = engine.genshared("bob", "alice").unwrap();

        let mac = engine.sign(&ab, &MessageComponents::demo()).unwrap();
        engine.verify(&ba, &MessageComponents::demo(), &mac).unwrap();

        let other = MessageComponents::new().push("GET").push("/media/1").push("test");
        assert!(engine.verify(&ba, &other, &mac).is_err());
    }

    #[test]
    fn test_import_flow() {
        let alice_dir = TempDir::new().unwrap();
        let bob_dir = TempDir::new().unwrap();
        let alice = PairingEngine::new(alice_dir.path());
        let bob = PairingEngine::new(bob_dir.path());

        let alice_pub = alice.genkey("alice").unwrap();
        let bob_pub = bob.genkey("bob").unwrap();

        alice
            .import("bob", bob_pub.public_key.as_bytes(), bob_pub.salt.as_bytes())
            .unwrap();
        bob.import("alice", alice_pub.public_key.as_bytes(), alice_pub.salt.as_bytes())
            .unwrap();

        let ab = alice.genshared("alice", "bob").unwrap();
        let ba = bob.genshared("bob", "alice").unwrap();
        assert_eq!(std::fs::read(ab).unwrap(), std::fs::read(ba).unwrap());
    }

    #[test]
    fn test_import_rejects_bad_public_key() {
        let (engine, _temp) = create_test_engine();
        let result = engine.import("bob", &[0u8; 10], &[0u8; 32]);
        assert!(matches!(result, Err(PairkeyError::Crypto(_))));
    }

    #[test]
    fn test_custom_config_key_length() {
        let temp = TempDir::new().unwrap();
        let engine = PairingEngine::with_config(
            temp.path(),
            DerivationConfig::default().with_key_len(64),
        );
        engine.genkey("alice").unwrap();
        engine.genkey("bob").unwrap();

        let path = engine.genshared("alice", "bob").unwrap();
        assert_eq!(std::fs::read(path).unwrap().len(), 64);
    }

    #[test]
    fn test_parse_mac_forms() {
        let mac = Mac::from_bytes(&[3u8; 32]).unwrap();
        assert_eq!(parse_mac(mac.as_bytes()).unwrap(), mac);
        assert_eq!(parse_mac(mac.to_base64().as_bytes()).unwrap(), mac);
        assert!(parse_mac(b"not a mac").is_err());
    }

    #[test]
    fn test_framed_roundtrip() {
        let (engine, _temp) = create_test_engine();
        engine.genkey("alice").unwrap();
        engine.genkey("bob").unwrap();
        let ab = engine.genshared("alice", "bob").unwrap();
        let ba = engine.genshared("bob", "alice").unwrap();

        // Zeros in the plaintext must not end the frame early
        let plaintext = [0u8, 0, 1, 0, 0, 0xFF];
        let framed = engine.encrypt_framed(&ab, &plaintext).unwrap();
        assert!(framed.ends_with(&framing::END_MARKER));
        assert_eq!(engine.decrypt_framed(&ba, &framed).unwrap(), plaintext);
    }

    #[test]
    fn test_decrypt_framed_requires_marker() {
        let (engine, _temp) = create_test_engine();
        engine.genkey("alice").unwrap();
        engine.genkey("bob").unwrap();
        let ab = engine.genshared("alice", "bob").unwrap();

        let mut unframed = engine.encrypt(&ab, b"no marker").unwrap();
        unframed.push(0xFF);
        let result = engine.decrypt_framed(&ab, &unframed);
        assert!(matches!(result, Err(PairkeyError::Framing(_))));
    }
}
