//! The external build backend.
//!
//! Compiling a plugin's source distribution is delegated to a
//! [`BuildBackend`]: the native toolchain, a cross-compilation file or a
//! container image. Bundle operations only see the resulting artifact.

use fbundle_core::{HostProbe, PlatformIdentifier};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A compiled binary produced by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    /// Location of the compiled file, inside the build's work directory.
    pub path: PathBuf,
    /// The platform the artifact was actually built for.
    pub platform: PlatformIdentifier,
}

/// A failed build for one target.
#[derive(Debug, Clone, Error)]
#[error("build failed for {target}: {message}")]
pub struct BuildError {
    /// Triplet of the target that failed.
    pub target: String,
    pub message: String,
    /// Captured compiler or container output.
    pub diagnostics: Option<String>,
}

impl BuildError {
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
            diagnostics: None,
        }
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = Some(diagnostics.into());
        self
    }
}

/// Builds plugin source distributions and answers the host probe.
pub trait BuildBackend: HostProbe {
    /// Build `sdist` for `target` inside `work_dir`.
    ///
    /// `work_dir` is a fresh temporary directory owned by the caller; the
    /// returned artifact may live inside it.
    fn build(
        &self,
        sdist: &Path,
        work_dir: &Path,
        target: &PlatformIdentifier,
    ) -> Result<BuildArtifact, BuildError>;

    /// Targets this backend can build for on `host`.
    fn available_targets(&self, host: &PlatformIdentifier) -> Vec<PlatformIdentifier> {
        vec![host.clone()]
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn BuildError___display___names_target() {
        let err = BuildError::new("aarch64-linux", "linker not found").with_diagnostics("ld: ...");

        assert_eq!(err.to_string(), "build failed for aarch64-linux: linker not found");
        assert_eq!(err.diagnostics.as_deref(), Some("ld: ..."));
    }
}
