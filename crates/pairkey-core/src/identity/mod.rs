//! Identity material for pairkey
//!
//! Each named peer owns:
//! - **KeyPair**: a static X25519 key pair; the private scalar stays local
//! - **Salt**: independent random bytes, public
//! - **PublicRecord**: public key plus salt, handed to the counterpart
//!
//! ## Example
//!
//! ```rust
//! use pairkey_core::identity::Identity;
//! use pairkey_core::DerivationConfig;
//!
//! let alice = Identity::generate(&DerivationConfig::default()).unwrap();
//! let record = alice.public_record();
//!
//! // Only the record leaves the machine
//! assert_eq!(record.public_key, alice.keypair.public_key());
//! assert_eq!(record.salt.len(), 32);
//! ```

mod keypair;
mod record;

pub use keypair::{KeyPair, PublicKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
pub use record::{Identity, PublicRecord, Salt};
