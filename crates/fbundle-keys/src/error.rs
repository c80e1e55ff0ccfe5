//! Error types for key handling and the trust store.

use thiserror::Error;

/// Errors that can occur while loading, using or storing keys.
#[derive(Debug, Error)]
pub enum KeyError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Key material of a type or format that is not supported.
    #[error("Unsupported key: {0}")]
    UnsupportedKey(String),

    /// Key material that claims a supported type but cannot be decoded.
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// Verification ran and the signature did not match.
    #[error("Signature verification failed")]
    InvalidSignature,

    /// The signing primitive itself failed.
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// No trusted key matches the identifier.
    #[error("Key not found in trust store: {0}")]
    KeyNotFound(String),

    /// A different file already occupies the target name.
    #[error("Key conflict: {0}")]
    Conflict(String),

    /// A remote source name or definition is not acceptable.
    #[error("Invalid remote source: {0}")]
    InvalidRemote(String),
}

/// Result type for key operations.
pub type KeyResult<T> = Result<T, KeyError>;

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn KeyError___invalid_signature___displays_message() {
        assert_eq!(
            KeyError::InvalidSignature.to_string(),
            "Signature verification failed"
        );
    }

    #[test]
    fn KeyError___key_not_found___displays_identifier() {
        let err = KeyError::KeyNotFound("sha256:abcd".to_string());

        assert_eq!(err.to_string(), "Key not found in trust store: sha256:abcd");
    }

    #[test]
    fn KeyError___from_io_error___converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: KeyError = io_err.into();

        assert!(matches!(err, KeyError::Io(_)));
    }
}
