//! Plugin bundle format for fbundle
//!
//! This crate creates, signs, verifies and maintains `.fbundle` archives:
//! zip files holding per-plugin source distributions, platform-tagged
//! compiled binaries and a YAML manifest that describes them.
//!
//! # Bundle Structure
//!
//! ```text
//! my-plugins.fbundle
//! ├── manifest.yaml
//! ├── mixer_src.zip                  # source distribution per plugin
//! └── bin/
//!     ├── libmixer.x86_64-linux.gcc-libstdc++-2.39-cxx11_abi.so
//!     └── libmixer.aarch64-macos.clang-libc++-170006-libc++_abi.dylib
//! ```
//!
//! The bundle signature lives inside `manifest.yaml` and covers the
//! canonical checksum list of every source distribution and binary, so any
//! change to a file invalidates it.
//!
//! # Example
//!
//! ```no_run
//! use fbundle_bundle::{BundleOps, TrustStatus};
//! # use fbundle_bundle::{BuildArtifact, BuildBackend, BuildError};
//! # use fbundle_core::{CoreResult, FbundleConfig, HostProbe, PlatformIdentifier};
//! # use std::path::Path;
//! # struct Backend;
//! # impl HostProbe for Backend {
//! #     fn probe_host(&self) -> CoreResult<String> { unimplemented!() }
//! # }
//! # impl BuildBackend for Backend {
//! #     fn build(&self, _: &Path, _: &Path, _: &PlatformIdentifier) -> Result<BuildArtifact, BuildError> { unimplemented!() }
//! # }
//! let config = FbundleConfig::default();
//! let ops = BundleOps::new(&config, Backend);
//!
//! ops.sign(Path::new("plugins.fbundle"), Path::new("release.pem"))?;
//! let report = ops.inspect(Path::new("plugins.fbundle"));
//! assert_eq!(report.signature.status, TrustStatus::Trusted);
//! # Ok::<(), fbundle_bundle::BundleError>(())
//! ```

mod archive;
mod backend;
mod error;
mod manifest;

pub mod ops;

pub use archive::{StagedBundle, read_manifest_text, write_archive};
pub use backend::{BuildArtifact, BuildBackend, BuildError};
pub use error::{BundleError, BundleResult};
pub use manifest::{BinaryEntry, BinaryPlatform, Manifest, PluginEntry, SdistEntry, SignatureBlock};
pub use ops::{
    BinaryCompatibility, BundleMetadata, BundleOps, ClearReport, CreateReport, DiffReport,
    DirectoryReport, FileChange, FileDiff, FillEvent, FillReport, FillStatus, InspectReport,
    MetadataUpdate, PackOptions, PackReport, PluginCompatibility, SignReport, SignatureChange,
    SignatureReport, SourceComparison, SourceFileDiff, TargetOutcome, TrustStatus,
    ValidationReport, ValidationStatus, ValidationSummary,
};

/// Bundle file extension.
pub const BUNDLE_EXTENSION: &str = "fbundle";

/// Manifest file name within the bundle.
pub const MANIFEST_FILE: &str = "manifest.yaml";

/// Detached signature file written by early versions of the format.
pub const LEGACY_SIGNATURE_FILE: &str = "manifest.sig";

/// Directory holding compiled binaries within the bundle.
pub const BIN_DIR: &str = "bin";
