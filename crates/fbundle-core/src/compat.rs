//! ABI compatibility between a host and a candidate binary.
//!
//! A binary runs on a host when both share OS and architecture, were built
//! with the same compiler, standard library and ABI name, and the host's
//! standard library version is at least the one the binary was built against.

use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Anything that can be placed on one side of a compatibility check.
pub trait AbiTarget {
    fn os(&self) -> &str;
    fn arch(&self) -> &str;
    fn abi_signature(&self) -> &str;
}

/// The four components of `<compiler>-<stdlib>-<version>-<abi>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiSignature {
    pub compiler: String,
    pub stdlib: String,
    pub version: String,
    pub abi_name: String,
}

impl AbiSignature {
    /// Split a signature into its components.
    ///
    /// Returns `None` unless there are exactly four non-empty components.
    #[must_use]
    pub fn parse(signature: &str) -> Option<Self> {
        let parts: Vec<&str> = signature.split('-').collect();
        let [compiler, stdlib, version, abi_name] = parts.as_slice() else {
            return None;
        };
        if parts.iter().any(|part| part.is_empty()) {
            return None;
        }

        Some(Self {
            compiler: (*compiler).to_string(),
            stdlib: (*stdlib).to_string(),
            version: (*version).to_string(),
            abi_name: (*abi_name).to_string(),
        })
    }
}

impl fmt::Display for AbiSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.compiler, self.stdlib, self.version, self.abi_name
        )
    }
}

/// Why a candidate binary cannot run on a host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Incompatibility {
    #[error("OS mismatch: host is {host}, binary is {candidate}")]
    OsMismatch { host: String, candidate: String },

    #[error("architecture mismatch: host is {host}, binary is {candidate}")]
    ArchMismatch { host: String, candidate: String },

    #[error("malformed ABI signature: {0}")]
    MalformedSignature(String),

    #[error("{component} mismatch: host has {host}, binary has {candidate}")]
    ToolchainMismatch {
        component: &'static str,
        host: String,
        candidate: String,
    },

    #[error("host {component} version {host} is older than required {required}")]
    VersionTooOld {
        component: String,
        host: String,
        required: String,
    },

    #[error("ABI signature mismatch: host is {host}, binary is {candidate}")]
    SignatureMismatch { host: String, candidate: String },
}

/// Decide whether `candidate` may run on `host`.
pub fn check_compatibility<H, C>(host: &H, candidate: &C) -> Result<(), Incompatibility>
where
    H: AbiTarget + ?Sized,
    C: AbiTarget + ?Sized,
{
    if host.os() != candidate.os() {
        return Err(Incompatibility::OsMismatch {
            host: host.os().to_string(),
            candidate: candidate.os().to_string(),
        });
    }
    if host.arch() != candidate.arch() {
        return Err(Incompatibility::ArchMismatch {
            host: host.arch().to_string(),
            candidate: candidate.arch().to_string(),
        });
    }

    let host_sig = AbiSignature::parse(host.abi_signature())
        .ok_or_else(|| Incompatibility::MalformedSignature(host.abi_signature().to_string()))?;
    let candidate_sig = AbiSignature::parse(candidate.abi_signature()).ok_or_else(|| {
        Incompatibility::MalformedSignature(candidate.abi_signature().to_string())
    })?;

    for (component, host_value, candidate_value) in [
        ("compiler", &host_sig.compiler, &candidate_sig.compiler),
        ("stdlib", &host_sig.stdlib, &candidate_sig.stdlib),
        ("ABI", &host_sig.abi_name, &candidate_sig.abi_name),
    ] {
        if host_value != candidate_value {
            return Err(Incompatibility::ToolchainMismatch {
                component,
                host: host_value.clone(),
                candidate: candidate_value.clone(),
            });
        }
    }

    match (
        parse_version(&host_sig.version),
        parse_version(&candidate_sig.version),
    ) {
        (Some(host_version), Some(candidate_version)) => {
            if compare_versions(&host_version, &candidate_version) == Ordering::Less {
                Err(Incompatibility::VersionTooOld {
                    component: host_sig.stdlib,
                    host: host_sig.version,
                    required: candidate_sig.version,
                })
            } else {
                Ok(())
            }
        }
        _ if host.abi_signature() == candidate.abi_signature() => Ok(()),
        _ => Err(Incompatibility::SignatureMismatch {
            host: host.abi_signature().to_string(),
            candidate: candidate.abi_signature().to_string(),
        }),
    }
}

/// Boolean form of [`check_compatibility`] with a human readable reason.
#[must_use]
pub fn is_compatible<H, C>(host: &H, candidate: &C) -> (bool, String)
where
    H: AbiTarget + ?Sized,
    C: AbiTarget + ?Sized,
{
    match check_compatibility(host, candidate) {
        Ok(()) => (true, "compatible".to_string()),
        Err(reason) => (false, reason.to_string()),
    }
}

fn parse_version(version: &str) -> Option<Vec<u64>> {
    version
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                part.parse().ok()
            }
        })
        .collect()
}

/// Dotted version comparison with the shorter side padded with zeros.
fn compare_versions(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    let component = |v: &[u64], i: usize| v.get(i).copied().unwrap_or(0);

    (0..len)
        .map(|i| component(a, i).cmp(&component(b, i)))
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
