//! Error types for bundle operations.

use crate::BuildError;
use fbundle_core::CoreError;
use fbundle_keys::KeyError;
use thiserror::Error;

/// Errors that can occur during bundle operations.
#[derive(Debug, Error)]
pub enum BundleError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing or serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// ZIP archive error.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The file is not a usable bundle container.
    #[error("Invalid bundle: {0}")]
    Structural(String),

    /// Manifest validation error.
    #[error("Invalid manifest: {0}")]
    Schema(String),

    /// Missing required file in bundle.
    #[error("Missing required file: {0}")]
    MissingFile(String),

    /// Plugin named in a request is not part of the bundle.
    #[error("Plugin '{name}' not found in bundle (available: {})", .available.join(", "))]
    PluginNotFound { name: String, available: Vec<String> },

    /// External build failure.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Key loading or signing error.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Checksum, platform or configuration error.
    #[error(transparent)]
    Core(CoreError),
}

impl From<CoreError> for BundleError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingFile(path) => BundleError::MissingFile(path),
            CoreError::Io(e) => BundleError::Io(e),
            CoreError::UnsafePath(path) => {
                BundleError::Schema(format!("path escapes the bundle: {path}"))
            }
            other => BundleError::Core(other),
        }
    }
}

/// Result type for bundle operations.
pub type BundleResult<T> = Result<T, BundleError>;

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn BundleError___io___displays_message() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BundleError = io_err.into();

        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn BundleError___schema___displays_message() {
        let err = BundleError::Schema("missing bundleName".to_string());

        assert_eq!(err.to_string(), "Invalid manifest: missing bundleName");
    }

    #[test]
    fn BundleError___missing_file___displays_path() {
        let err = BundleError::MissingFile("manifest.yaml".to_string());

        assert_eq!(err.to_string(), "Missing required file: manifest.yaml");
    }

    #[test]
    fn BundleError___plugin_not_found___lists_available() {
        let err = BundleError::PluginNotFound {
            name: "ghost".to_string(),
            available: vec!["mixer".to_string(), "reverb".to_string()],
        };

        assert_eq!(
            err.to_string(),
            "Plugin 'ghost' not found in bundle (available: mixer, reverb)"
        );
    }

    #[test]
    fn BundleError___from_core_missing_file___becomes_missing_file() {
        let err: BundleError = CoreError::MissingFile("bin/gone.so".to_string()).into();

        assert!(matches!(err, BundleError::MissingFile(path) if path == "bin/gone.so"));
    }

    #[test]
    fn BundleError___from_core_unsafe_path___becomes_schema() {
        let err: BundleError = CoreError::UnsafePath("/etc/passwd".to_string()).into();

        assert!(matches!(err, BundleError::Schema(message) if message.contains("/etc/passwd")));
    }

    #[test]
    fn BundleError___from_core_probe___stays_core() {
        let err: BundleError = CoreError::Probe("no compiler".to_string()).into();

        assert!(matches!(err, BundleError::Core(_)));
    }
}
