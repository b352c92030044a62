//! File-backed storage for identities, public records and shared keys.
//!
//! Layout under the store directory:
//!
//! ```text
//! <name>.key          key pair record (secret, mode 0600)
//! <name>.pub          raw 32-byte public key
//! <name>.salt         raw salt bytes
//! <me>_<peer>.skey    raw shared key bytes (secret, mode 0600)
//! ```
//!
//! Writes overwrite whatever is already there.

use crate::config::DerivationConfig;
use crate::derive::SharedKey;
use crate::error::{PairkeyError, PairkeyResult};
use crate::identity::{Identity, KeyPair, PublicKey, PublicRecord, Salt};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const KEY_EXT: &str = "key";
const PUB_EXT: &str = "pub";
const SALT_EXT: &str = "salt";
const SHARED_EXT: &str = "skey";
const PAIR_SEPARATOR: char = '_';

/// Directory of key files.
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    /// Store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Paths
    // ═══════════════════════════════════════════════════════════════════════

    pub fn key_path(&self, name: &str) -> PairkeyResult<PathBuf> {
        self.artifact_path(name, KEY_EXT)
    }

    pub fn pub_path(&self, name: &str) -> PairkeyResult<PathBuf> {
        self.artifact_path(name, PUB_EXT)
    }

    pub fn salt_path(&self, name: &str) -> PairkeyResult<PathBuf> {
        self.artifact_path(name, SALT_EXT)
    }

    /// `<me>_<peer>.skey`. Directional in name only; both files hold the
    /// same bytes.
    pub fn shared_key_path(&self, me: &str, peer: &str) -> PairkeyResult<PathBuf> {
        validate_name(me)?;
        validate_name(peer)?;
        Ok(self.dir.join(format!("{}{}{}.{}", me, PAIR_SEPARATOR, peer, SHARED_EXT)))
    }

    fn artifact_path(&self, name: &str, ext: &str) -> PairkeyResult<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{}.{}", name, ext)))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Identities
    // ═══════════════════════════════════════════════════════════════════════

    /// Write `<name>.key`, `<name>.pub` and `<name>.salt`.
    pub fn save_identity(&self, name: &str, identity: &Identity) -> PairkeyResult<()> {
        let key_path = self.key_path(name)?;
        write_secret(&key_path, &identity.keypair.to_bytes())?;
        self.save_public_record(name, &identity.public_record())?;
        debug!(name, path = %key_path.display(), "Saved identity");
        Ok(())
    }

    /// Load the private key pair and salt for `name`.
    pub fn load_identity(&self, name: &str) -> PairkeyResult<Identity> {
        let key_path = self.key_path(name)?;
        let bytes = read_artifact(&key_path, "key pair", name)?;
        let keypair = KeyPair::from_bytes(&bytes)?;
        let salt = Salt::from_bytes(read_artifact(&self.salt_path(name)?, "salt", name)?);
        Ok(Identity { keypair, salt })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Public records
    // ═══════════════════════════════════════════════════════════════════════

    pub fn save_public_record(&self, name: &str, record: &PublicRecord) -> PairkeyResult<()> {
        write_public(&self.pub_path(name)?, record.public_key.as_bytes())?;
        write_public(&self.salt_path(name)?, record.salt.as_bytes())?;
        Ok(())
    }

    /// Load `<name>.pub` and `<name>.salt`.
    pub fn load_public_record(&self, name: &str) -> PairkeyResult<PublicRecord> {
        let public = read_artifact(&self.pub_path(name)?, "public key", name)?;
        let salt = read_artifact(&self.salt_path(name)?, "salt", name)?;
        Ok(PublicRecord::new(
            PublicKey::from_bytes(&public)?,
            Salt::from_bytes(salt),
        ))
    }

    /// Store a counterpart's public record under `name` after checking it
    /// against `config`.
    ///
    /// Refuses to overwrite a local identity: if `<name>.key` exists the
    /// import would leave a `.pub` that no longer matches it.
    pub fn import_public_record(
        &self,
        name: &str,
        record: &PublicRecord,
        config: &DerivationConfig,
    ) -> PairkeyResult<()> {
        record.salt.check_len(config)?;
        let key_path = self.key_path(name)?;
        if key_path.exists() {
            warn!(name, "Refusing to import over a local identity");
            return Err(PairkeyError::InvalidName(format!(
                "{} (a local key pair with this name exists)",
                name
            )));
        }
        self.save_public_record(name, record)?;
        debug!(name, fingerprint = %record.public_key.fingerprint(), "Imported public record");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Shared keys
    // ═══════════════════════════════════════════════════════════════════════

    /// Write `<me>_<peer>.skey` and return its path.
    pub fn save_shared_key(
        &self,
        me: &str,
        peer: &str,
        key: &SharedKey,
    ) -> PairkeyResult<PathBuf> {
        let path = self.shared_key_path(me, peer)?;
        write_secret(&path, key.as_bytes())?;
        debug!(path = %path.display(), len = key.len(), "Saved shared key");
        Ok(path)
    }

    /// Read a shared key file from an arbitrary path.
    pub fn load_shared_key(path: impl AsRef<Path>) -> PairkeyResult<SharedKey> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| not_found_or_io(e, "shared key", path))?;
        debug!(path = %path.display(), len = bytes.len(), "Loaded shared key");
        SharedKey::from_bytes(bytes)
    }
}

/// Reject names that are empty, could escape the store directory, or would
/// make `<me>_<peer>.skey` ambiguous.
///
/// `_` is the separator in shared key file names, so `("a_b", "c")` and
/// `("a", "b_c")` would both map to `a_b_c.skey`.
pub fn validate_name(name: &str) -> PairkeyResult<()> {
    let bad = name.is_empty()
        || name.contains(PAIR_SEPARATOR)
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
        || name.contains("..");
    if bad {
        return Err(PairkeyError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn read_artifact(path: &Path, what: &str, name: &str) -> PairkeyResult<Vec<u8>> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => PairkeyError::NotFound(format!(
            "{} for '{}' ({})",
            what,
            name,
            path.display()
        )),
        _ => PairkeyError::Io(e),
    })?;
    debug!(path = %path.display(), len = bytes.len(), "Read {}", what);
    Ok(bytes)
}

fn not_found_or_io(e: io::Error, what: &str, path: &Path) -> PairkeyError {
    match e.kind() {
        io::ErrorKind::NotFound => PairkeyError::NotFound(format!("{} ({})", what, path.display())),
        _ => PairkeyError::Io(e),
    }
}

fn ensure_parent(path: &Path) -> PairkeyResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn write_public(path: &Path, bytes: &[u8]) -> PairkeyResult<()> {
    ensure_parent(path)?;
    fs::write(path, bytes)?;
    Ok(())
}

fn write_secret(path: &Path, bytes: &[u8]) -> PairkeyResult<()> {
    ensure_parent(path)?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // `mode` only applies on create; tighten an existing file too.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}
