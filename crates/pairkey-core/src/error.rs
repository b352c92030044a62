//! Error types for pairkey

use thiserror::Error;

/// Main error type for pairkey operations
#[derive(Error, Debug)]
pub enum PairkeyError {
    /// A stored artifact (key pair, public key, salt, shared key) is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cryptographic operation failed (key generation, ECDH, HKDF, HMAC,
    /// malformed key material)
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Envelope tag or request MAC did not verify (wrong key or tampered data)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    /// Envelope bytes cannot be parsed (too short to hold nonce and tag)
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Stored key record or encoded value cannot be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Identity name is unusable as a storage key
    #[error("Invalid identity name: {0:?}")]
    InvalidName(String),

    /// Derivation parameters out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// End-marker framing could not be removed
    #[error("Framing error: {0}")]
    Framing(#[from] crate::framing::FramingError),
}

/// Result type alias using PairkeyError
pub type PairkeyResult<T> = Result<T, PairkeyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PairkeyError::NotFound("public key for 'bob'".to_string());
        assert_eq!(format!("{}", err), "Not found: public key for 'bob'");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: PairkeyError = io_err.into();
        assert!(matches!(err, PairkeyError::Io(_)));
    }

    #[test]
    fn test_error_from_framing() {
        let err: PairkeyError = crate::framing::FramingError::MissingEndMarker.into();
        assert_eq!(
            err.to_string(),
            "Framing error: no end-of-message marker found"
        );
    }

    #[test]
    fn test_authentication_failure_is_terse() {
        let err = PairkeyError::AuthenticationFailed("envelope did not verify");
        assert_eq!(
            err.to_string(),
            "Authentication failed: envelope did not verify"
        );
    }
}
