//! fbundle-core - Checksums, platform identifiers and ABI compatibility
//!
//! This crate provides the leaf components shared by the fbundle workspace:
//! - [`hash_file`] and [`CanonicalChecksumList`] for content checksums
//! - [`PlatformIdentifier`] and [`PlatformCache`] for describing build hosts and targets
//! - [`check_compatibility`] for deciding whether a binary may run on a host
//! - [`FbundleConfig`] for the on-disk layout of the tool's state
//! - [`LogLevel`] and [`init_logging`] for tracing output

mod checksum;
mod compat;
mod config;
mod error;
mod logging;
mod platform;

pub use checksum::{
    CanonicalChecksumList, HASH_BLOCK_SIZE, checksum_of_bytes, hash_file, hash_reader,
    is_checksum, resolve_within,
};
pub use compat::{AbiSignature, AbiTarget, Incompatibility, check_compatibility, is_compatible};
pub use config::FbundleConfig;
pub use error::{CoreError, CoreResult};
pub use logging::{LogLevel, init_logging};
pub use platform::{BuildDescriptor, HostProbe, PlatformCache, PlatformIdentifier};

/// Prefix shared by every checksum and key fingerprint.
pub const SHA256_PREFIX: &str = "sha256:";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AbiTarget, BuildDescriptor, CanonicalChecksumList, CoreError, CoreResult, FbundleConfig,
        HostProbe, LogLevel, PlatformCache, PlatformIdentifier, check_compatibility, hash_file,
        is_compatible,
    };
}
