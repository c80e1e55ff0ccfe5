//! # fbundle
//!
//! Package native plugins as `.fbundle` archives and decide whether a
//! bundle can be trusted and run on the current host.
//!
//! A bundle carries, per plugin, a source distribution and any number of
//! compiled binaries tagged with the platform and ABI they were built for.
//! fbundle provides:
//! - Bundle creation, filling with new targets and clearing of binaries
//! - Packing and checking unpacked bundle directories, and diffing plugin sources
//! - Ed25519 and RSA signing over a canonical checksum list
//! - A local trust store of public keys grouped by source
//! - ABI compatibility matching between binaries and the host
//!
//! ## Quick Start
//!
//! ```no_run
//! use fbundle::prelude::*;
//! # use std::path::Path;
//! # struct Toolchain;
//! # impl HostProbe for Toolchain {
//! #     fn probe_host(&self) -> CoreResult<String> { unimplemented!() }
//! # }
//! # impl BuildBackend for Toolchain {
//! #     fn build(&self, _: &Path, _: &Path, _: &PlatformIdentifier) -> Result<BuildArtifact, BuildError> { unimplemented!() }
//! # }
//!
//! init_logging(LogLevel::Info);
//! let config = FbundleConfig::default();
//! let ops = BundleOps::new(&config, Toolchain);
//!
//! let report = ops.inspect(Path::new("plugins.fbundle"));
//! match report.signature.status {
//!     TrustStatus::Trusted => println!("signed by a trusted key"),
//!     status => println!("not trusted: {status:?}"),
//! }
//! for (plugin, compat) in &report.plugins {
//!     println!("{plugin}: compatible binary found = {}", compat.compatible_found);
//! }
//! ```
//!
//! ## Crate Structure
//!
//! This is a facade crate that re-exports from:
//! - [`fbundle_core`] - Checksums, platform identifiers, compatibility, configuration, logging
//! - [`fbundle_keys`] - Signing keys, fingerprints and the trust store
//! - [`fbundle_bundle`] - Manifest model, archive staging and bundle operations

pub use fbundle_bundle as bundle;
pub use fbundle_core as core;
pub use fbundle_keys as keys;

// Re-export core types
pub use fbundle_core::{
    AbiTarget, CanonicalChecksumList, CoreError, CoreResult, FbundleConfig, HostProbe, LogLevel,
    PlatformCache, PlatformIdentifier, check_compatibility, hash_file, init_logging,
    is_compatible,
};

// Re-export key handling
pub use fbundle_keys::{
    KeyAlgorithm, KeyError, KeyResult, PrivateKey, PublicKey, RemoteSources, TrustStore,
    generate_key_pair,
};

// Re-export bundle operations
pub use fbundle_bundle::{
    BuildArtifact, BuildBackend, BuildError, BundleError, BundleMetadata, BundleOps,
    BundleResult, InspectReport, Manifest, MetadataUpdate, PackOptions, SourceComparison,
    TrustStatus, ValidationReport, ValidationStatus,
};

pub use tracing;

/// Prelude module for convenient imports.
///
/// Use `use fbundle::prelude::*;` to bring in the operation entry point,
/// the backend trait to implement, and the report types most callers match on.
pub mod prelude {
    pub use crate::{
        BuildArtifact, BuildBackend, BuildError, BundleError, BundleMetadata, BundleOps,
        BundleResult, CoreResult, FbundleConfig, HostProbe, KeyAlgorithm, LogLevel,
        PlatformIdentifier, TrustStatus, TrustStore, ValidationStatus, init_logging,
    };
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn prelude___report_status___serializes_as_wire_names() {
        assert_eq!(
            serde_json::to_string(&TrustStatus::Tampered).unwrap(),
            "\"TAMPERED\""
        );
        assert_eq!(
            serde_json::to_string(&ValidationStatus::Passed).unwrap(),
            "\"passed\""
        );
    }

    #[test]
    fn prelude___trust_store_from_config___starts_empty() {
        let home = TempDir::new().unwrap();
        let config = FbundleConfig::for_home(home.path());

        let store = TrustStore::new(&config.trust_store_dir);

        assert!(store.list_trusted().unwrap().is_empty());
        assert_eq!(store.root(), home.path().join("keys"));
    }
}
