//! Pairkey Core Library
//!
//! Pairwise key agreement and message protection for two peers that have
//! exchanged public records once.
//!
//! ## Overview
//!
//! Each peer generates a static X25519 key pair and an independent random
//! salt, then hands its public key and salt to the counterpart. Either side
//! can then derive the same symmetric key locally (ECDH, XOR-combined salts,
//! HKDF-SHA256) and use it to:
//!
//! - seal payloads into ChaCha20-Poly1305 envelopes (`nonce || ciphertext || tag`)
//! - authenticate requests with HMAC-SHA256 over length-prefixed components
//!
//! ## Quick Start
//!
//! ```rust
//! use pairkey_core::{derive_for_identity, DerivationConfig, EnvelopeCipher, Identity};
//!
//! let config = DerivationConfig::default();
//! let alice = Identity::generate(&config)?;
//! let bob = Identity::generate(&config)?;
//!
//! // Each side only needs the other's public record
//! let k_alice = derive_for_identity(&alice, &bob.public_record(), &config)?;
//! let k_bob = derive_for_identity(&bob, &alice.public_record(), &config)?;
//! assert_eq!(k_alice, k_bob);
//!
//! let envelope = EnvelopeCipher::new(&k_alice)?.encrypt(b"hello world")?;
//! let plaintext = EnvelopeCipher::new(&k_bob)?.decrypt(&envelope)?;
//! assert_eq!(plaintext, b"hello world");
//! # Ok::<(), pairkey_core::PairkeyError>(())
//! ```
//!
//! File-based workflows go through [`PairingEngine`], which stores key
//! material in a directory the way the `pairkey` binary does.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod derive;
pub mod engine;
pub mod error;
pub mod framing;
pub mod identity;
pub mod keystore;

// Re-exports
pub use auth::{Mac, MessageComponents, MAC_SIZE};
pub use config::DerivationConfig;
pub use crypto::{Envelope, EnvelopeCipher, ENVELOPE_OVERHEAD, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use derive::{combine_salts, derive_for_identity, derive_shared_key, SharedKey};
pub use engine::{parse_mac, PairingEngine};
pub use error::{PairkeyError, PairkeyResult};
pub use framing::FramingError;
pub use identity::{Identity, KeyPair, PublicKey, PublicRecord, Salt};
pub use keystore::KeyStore;
