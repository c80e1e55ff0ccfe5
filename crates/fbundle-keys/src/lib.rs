//! fbundle-keys - Signing keys and the local trust store
//!
//! This crate provides:
//! - [`PrivateKey`] / [`PublicKey`] for Ed25519 and RSA keys, with [`sign`] and [`verify`]
//! - [`fingerprint`] for the `sha256:` key identifier stored in signed manifests
//! - [`generate_key_pair`] for creating new signing keys
//! - [`TrustStore`] for enumerating locally trusted public keys by source
//! - [`RemoteSources`] for the list of named remote key repositories
//!
//! # Trust store layout
//!
//! ```text
//! keys/
//! ├── manual/
//! │   ├── release.pub.pem
//! │   └── colleague.pub
//! └── community/          # checkout of a remote source
//!     └── maintainer.pem
//! ```

mod error;
mod keygen;
mod openssh;
mod remotes;
mod signing;
mod trust;

pub use error::{KeyError, KeyResult};
pub use keygen::{KeyPairFiles, KeyPairPaths, generate_key_pair};
pub use remotes::{RemoteSource, RemoteSources};
pub use signing::{KeyAlgorithm, PrivateKey, PublicKey, detect_algorithm, fingerprint, sign, verify};
pub use trust::{AddOutcome, AddedKey, MANUAL_SOURCE, TrustStore, TrustStoreEntry};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        KeyAlgorithm, KeyError, KeyResult, PrivateKey, PublicKey, TrustStore, TrustStoreEntry,
        fingerprint, sign, verify,
    };
}
