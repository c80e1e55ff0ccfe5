//! Error types for the core components.

use thiserror::Error;

/// Errors raised by checksums, platform detection and configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A file referenced by a manifest is not present on disk.
    #[error("Missing required file: {0}")]
    MissingFile(String),

    /// A manifest path is absolute, climbs out of its base directory or
    /// passes through a symbolic link.
    #[error("Path escapes the bundle: {0}")]
    UnsafePath(String),

    /// The host probe produced unusable output.
    #[error("Host probe failed: {0}")]
    Probe(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn CoreError___missing_file___displays_path() {
        let err = CoreError::MissingFile("bin/libfoo.so".to_string());

        assert_eq!(err.to_string(), "Missing required file: bin/libfoo.so");
    }

    #[test]
    fn CoreError___from_io_error___converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: CoreError = io_err.into();

        assert!(matches!(err, CoreError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn CoreError___unsafe_path___displays_path() {
        let err = CoreError::UnsafePath("../outside.so".to_string());

        assert_eq!(err.to_string(), "Path escapes the bundle: ../outside.so");
    }

    #[test]
    fn CoreError___probe___displays_message() {
        let err = CoreError::Probe("missing key 'os'".to_string());

        assert_eq!(err.to_string(), "Host probe failed: missing key 'os'");
    }
}
