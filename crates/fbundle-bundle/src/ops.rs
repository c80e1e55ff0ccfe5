//! Bundle operations.
//!
//! Operations that need host state (the trust store, the platform cache or
//! the build backend) are methods on [`BundleOps`]. Operations that only
//! look at the bundle itself are also available as free functions.
//!
//! Content problems are reported, not raised: [`validate`] and
//! [`BundleOps::inspect`] always return a report. Mutating operations stage
//! the bundle in a temporary directory and only replace the original once
//! the new archive is complete, so a failure leaves the input untouched.

mod clear;
mod create;
mod diff;
mod directory;
mod fill;
mod inspect;
mod metadata;
mod sign;
mod sources;
mod validate;

use crate::manifest::BinaryEntry;
use crate::{BuildBackend, BundleResult, Manifest};
use fbundle_core::{FbundleConfig, PlatformCache, PlatformIdentifier};
use fbundle_keys::{KeyAlgorithm, TrustStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use clear::clear;
pub use create::BundleMetadata;
pub use diff::diff;
pub use directory::{pack_bundle_directory, validate_bundle_directory};
pub use metadata::{MetadataUpdate, edit_metadata, extract_plugin_source};
pub use sign::sign;
pub use sources::compare_plugin_sources;
pub use validate::validate;

/// Outcome of [`validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Passed,
    Failed,
}

/// Accumulated validation findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub summary: ValidationSummary,
    /// `Failed` iff `errors` is non-empty.
    pub status: ValidationStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub errors: usize,
    pub warnings: usize,
}

impl ValidationReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == ValidationStatus::Passed
    }
}

/// Trust verdict for a bundle signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustStatus {
    /// No signature block.
    Unsigned,
    /// Signed by a key that is not in the trust store.
    Untrusted,
    /// The signature does not verify.
    Invalid,
    Trusted,
    /// The signed checksums are authentic but the files no longer match them.
    Tampered,
    /// Verification could not be attempted.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureReport {
    pub status: TrustStatus,
    pub fingerprint: Option<String>,
    /// Trust store source that vouched for the key.
    pub key_source: Option<String>,
    pub key_path: Option<PathBuf>,
    pub reason: Option<String>,
}

impl SignatureReport {
    fn with_status(status: TrustStatus) -> Self {
        Self {
            status,
            fingerprint: None,
            key_source: None,
            key_path: None,
            reason: None,
        }
    }
}

/// A binary and whether it can run on the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryCompatibility {
    pub binary: BinaryEntry,
    pub compatible: bool,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginCompatibility {
    pub sdist_path: Option<String>,
    pub binaries: Vec<BinaryCompatibility>,
    pub compatible_found: bool,
}

/// Everything known about a bundle, as produced by [`BundleOps::inspect`].
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub validation: ValidationReport,
    pub signature: SignatureReport,
    pub plugins: BTreeMap<String, PluginCompatibility>,
    pub manifest: Option<Manifest>,
    pub host: Option<PlatformIdentifier>,
}

/// Result of [`BundleOps::create`].
#[derive(Debug, Clone, Serialize)]
pub struct CreateReport {
    pub output: PathBuf,
    pub plugins: Vec<String>,
    /// Staged binary paths inside the bundle.
    pub binaries: Vec<String>,
}

/// Result of [`sign`].
#[derive(Debug, Clone, Serialize)]
pub struct SignReport {
    pub fingerprint: String,
    pub algorithm: KeyAlgorithm,
    /// Number of files covered by the signature.
    pub signed_files: usize,
}

/// Signature comparison in [`diff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureChange {
    Unchanged,
    Removed,
    Added,
    Changed,
    Unsigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileChange {
    Added,
    Removed,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub path: String,
    pub status: FileChange,
    pub details: String,
}

/// Result of [`diff`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    pub signature: SignatureChange,
    /// Unified diff of the two manifests; empty when they are identical.
    pub manifest_diff: String,
    /// Changed files, sorted by path.
    pub files: Vec<FileDiff>,
}

/// Result of [`clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub binaries_removed: usize,
    pub signature_removed: bool,
    pub legacy_signature_removed: bool,
}

/// Result of [`validate_bundle_directory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryReport {
    pub validation: ValidationReport,
    /// The manifest carries a `bundleSignature` block.
    pub is_signed: bool,
}

/// Naming for [`pack_bundle_directory`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackOptions {
    /// File stem of the bundle; defaults to the directory name.
    pub name: Option<String>,
    /// Defaults to the parent of the packed directory.
    pub output_dir: Option<PathBuf>,
}

/// Result of [`pack_bundle_directory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackReport {
    pub output: PathBuf,
    pub is_signed: bool,
    pub files_packed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFileDiff {
    /// Path inside the source archive.
    pub path: String,
    pub diff: String,
}

/// Result of [`compare_plugin_sources`]. Every list is sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceComparison {
    pub added_files: Vec<String>,
    pub removed_files: Vec<String>,
    pub modified_files: Vec<SourceFileDiff>,
}

impl SourceComparison {
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !(self.added_files.is_empty()
            && self.removed_files.is_empty()
            && self.modified_files.is_empty())
    }
}

/// Stage of a fill progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FillStatus {
    Building,
    Success,
    Failure,
    Complete,
}

/// Structured progress event emitted during [`BundleOps::fill_with_progress`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FillEvent {
    pub status: FillStatus,
    pub plugin: Option<String>,
    pub target: Option<String>,
    pub message: String,
}

/// Per-target result of a fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetOutcome {
    pub plugin: String,
    /// Triplet of the requested target.
    pub target: String,
    pub succeeded: bool,
    pub message: String,
    /// Bundle path of the staged binary on success.
    pub binary_path: Option<String>,
}

/// Result of [`BundleOps::fill`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    pub outcomes: Vec<TargetOutcome>,
    pub warnings: Vec<String>,
    pub signature_removed: bool,
}

impl FillReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Bundle operations bound to a trust store, a platform cache and a build backend.
#[derive(Debug)]
pub struct BundleOps<B> {
    trust_store: TrustStore,
    platform_cache: PlatformCache,
    backend: B,
}

impl<B: BuildBackend> BundleOps<B> {
    /// Use the trust store and platform cache locations from `config`.
    pub fn new(config: &FbundleConfig, backend: B) -> Self {
        Self::with_parts(
            TrustStore::new(&config.trust_store_dir),
            config.platform_cache(),
            backend,
        )
    }

    pub fn with_parts(trust_store: TrustStore, platform_cache: PlatformCache, backend: B) -> Self {
        Self {
            trust_store,
            platform_cache,
            backend,
        }
    }

    #[must_use]
    pub fn trust_store(&self) -> &TrustStore {
        &self.trust_store
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The host platform, from the cache or a fresh probe.
    pub fn host(&self) -> BundleResult<PlatformIdentifier> {
        Ok(self.platform_cache.current_host(&self.backend)?)
    }

    /// Forget the cached host platform. Returns whether a cache existed.
    pub fn clear_platform_cache(&self) -> BundleResult<bool> {
        Ok(self.platform_cache.clear()?)
    }

    /// Build a new bundle from plugin source directories.
    pub fn create(
        &self,
        plugin_dirs: &[PathBuf],
        output: &Path,
        metadata: &BundleMetadata,
        target_version: Option<&str>,
    ) -> BundleResult<CreateReport> {
        create::create(self, plugin_dirs, output, metadata, target_version)
    }

    /// Sign a bundle in place with a PKCS#8 private key.
    pub fn sign(&self, bundle: &Path, private_key: &Path) -> BundleResult<SignReport> {
        sign::sign(bundle, private_key)
    }

    pub fn validate(&self, bundle: &Path) -> ValidationReport {
        validate::validate(bundle)
    }

    /// Validate a bundle, check its signature against the trust store and
    /// match its binaries against the host.
    pub fn inspect(&self, bundle: &Path) -> InspectReport {
        inspect::inspect(self, bundle)
    }

    pub fn diff(&self, a: &Path, b: &Path) -> BundleResult<DiffReport> {
        diff::diff(a, b)
    }

    /// Build the requested targets per plugin and add the binaries to the bundle.
    pub fn fill(
        &self,
        bundle: &Path,
        targets: &BTreeMap<String, Vec<PlatformIdentifier>>,
    ) -> BundleResult<FillReport> {
        fill::fill(self, bundle, targets, &mut |_| {})
    }

    /// [`Self::fill`], delivering progress events to `progress`.
    pub fn fill_with_progress<F>(
        &self,
        bundle: &Path,
        targets: &BTreeMap<String, Vec<PlatformIdentifier>>,
        mut progress: F,
    ) -> BundleResult<FillReport>
    where
        F: FnMut(&FillEvent),
    {
        fill::fill(self, bundle, targets, &mut progress)
    }

    /// Per plugin, the backend's available targets whose triplet has no binary yet.
    pub fn fillable_targets(
        &self,
        bundle: &Path,
    ) -> BundleResult<BTreeMap<String, Vec<PlatformIdentifier>>> {
        fill::fillable_targets(self, bundle)
    }

    pub fn clear(&self, bundle: &Path) -> BundleResult<ClearReport> {
        clear::clear(bundle)
    }

    pub fn edit_metadata(
        &self,
        bundle: &Path,
        update: &MetadataUpdate,
    ) -> BundleResult<Vec<&'static str>> {
        metadata::edit_metadata(bundle, update)
    }

    pub fn extract_plugin_source(
        &self,
        bundle: &Path,
        plugin: &str,
        output_dir: &Path,
    ) -> BundleResult<PathBuf> {
        metadata::extract_plugin_source(bundle, plugin, output_dir)
    }

    /// Diff one plugin's source distribution between two bundles.
    pub fn compare_plugin_sources(
        &self,
        a: &Path,
        b: &Path,
        plugin: &str,
    ) -> BundleResult<SourceComparison> {
        sources::compare_plugin_sources(a, b, plugin)
    }

    pub fn validate_bundle_directory(&self, directory: &Path) -> BundleResult<DirectoryReport> {
        directory::validate_bundle_directory(directory)
    }

    /// Validate an unpacked bundle directory and zip it into a bundle.
    pub fn pack_bundle_directory(
        &self,
        directory: &Path,
        options: &PackOptions,
    ) -> BundleResult<PackReport> {
        directory::pack_bundle_directory(directory, options)
    }
}
