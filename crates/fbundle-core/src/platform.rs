//! Platform identifiers for build hosts and targets.
//!
//! The host identifier is detected once by asking a [`HostProbe`] for its
//! `key=value` report and then cached on disk by a [`PlatformCache`] until the
//! cache is explicitly cleared.

use crate::compat::{AbiSignature, AbiTarget};
use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Source of the raw host probe report.
///
/// Implementations compile and run a tiny native detector and return its
/// stdout, one `key=value` pair per line (`os`, `compiler`,
/// `compiler_version`, `stdlib`, `stdlib_version`, `abi`).
pub trait HostProbe {
    fn probe_host(&self) -> CoreResult<String>;
}

/// How a target is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildDescriptor {
    /// The host toolchain.
    #[default]
    Native,
    /// A cross-compilation file describing the target toolchain.
    Cross { cross_file: PathBuf },
    /// A container image providing the toolchain.
    Docker { docker_image: String },
}

/// Structured description of a host or build target ABI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformIdentifier {
    pub os: String,
    pub arch: String,
    /// `<arch>-<os>`
    pub triplet: String,
    /// `<compiler>-<stdlib>-<stdlib_version>-<abi>`
    pub abi_signature: String,
    /// Raw probe values (compiler version, detection method, ...).
    #[serde(default)]
    pub details: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub is_native: bool,
    #[serde(default)]
    pub build: BuildDescriptor,
}

fn default_true() -> bool {
    true
}

impl PlatformIdentifier {
    /// Create a native identifier; the triplet is derived from `arch` and `os`.
    pub fn new(
        os: impl Into<String>,
        arch: impl Into<String>,
        abi_signature: impl Into<String>,
    ) -> Self {
        let os = os.into();
        let arch = arch.into();
        Self {
            triplet: format!("{arch}-{os}"),
            os,
            arch,
            abi_signature: abi_signature.into(),
            details: BTreeMap::new(),
            is_native: true,
            build: BuildDescriptor::Native,
        }
    }

    /// A target built through a cross-compilation file named `<triplet>.cross`.
    pub fn cross(triplet: &str, cross_file: PathBuf) -> Self {
        let mut parts = triplet.splitn(2, '-');
        let arch = parts.next().unwrap_or_default().to_string();
        let os = parts.next().unwrap_or_default().to_string();

        Self {
            os,
            arch,
            triplet: triplet.to_string(),
            abi_signature: format!("cross-{triplet}"),
            details: BTreeMap::new(),
            is_native: false,
            build: BuildDescriptor::Cross { cross_file },
        }
    }

    /// A Linux target built inside a container image.
    pub fn docker(arch: &str, image: &str) -> Self {
        Self {
            os: "linux".to_string(),
            arch: arch.to_string(),
            triplet: format!("{arch}-linux"),
            abi_signature: format!("docker-{image}"),
            details: BTreeMap::new(),
            is_native: false,
            build: BuildDescriptor::Docker {
                docker_image: image.to_string(),
            },
        }
    }

    /// Parse the `key=value` report of a host probe.
    ///
    /// Lines without `=` are ignored and values are trimmed. `os`,
    /// `compiler`, `stdlib` and `abi` are required; `stdlib_version` defaults
    /// to `unknown`.
    pub fn from_probe_output(output: &str, arch: &str) -> CoreResult<Self> {
        let details: BTreeMap<String, String> = output
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .filter(|(key, _)| !key.is_empty())
            .collect();

        let required = |key: &str| {
            details
                .get(key)
                .filter(|value| !value.is_empty())
                .cloned()
                .ok_or_else(|| CoreError::Probe(format!("missing key '{key}' in probe output")))
        };
        let os = required("os")?;
        let compiler = required("compiler")?;
        let stdlib = required("stdlib")?;
        let abi = required("abi")?;
        let stdlib_version = details
            .get("stdlib_version")
            .filter(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());

        let mut identifier =
            Self::new(os, arch, format!("{compiler}-{stdlib}-{stdlib_version}-{abi}"));
        identifier.details = details;
        identifier
            .details
            .insert("detection_method".to_string(), "compiled_binary".to_string());
        Ok(identifier)
    }

    /// Best-effort identifier built from compile-time constants, used when the
    /// probe is unavailable.
    #[must_use]
    pub fn fallback() -> Self {
        let os = std::env::consts::OS;
        let (compiler, stdlib, abi) = match os {
            "macos" => ("clang", "libc++", "libc++_abi"),
            "windows" => ("msvc", "msvcrt", "msvc_abi"),
            _ => ("gcc", "libstdc++", "cxx11_abi"),
        };

        let mut identifier = Self::new(
            os,
            std::env::consts::ARCH,
            format!("{compiler}-{stdlib}-unknown-{abi}"),
        );
        identifier
            .details
            .insert("detection_method".to_string(), "fallback".to_string());
        identifier
    }

    /// Derive a target with the standard library version replaced.
    ///
    /// Compiler, standard library and ABI name are kept from `self`.
    #[must_use]
    pub fn targeted_variant(&self, version: &str) -> Self {
        let signature = AbiSignature::parse(&self.abi_signature);
        let component = |key: &str, from_sig: Option<&String>, default: &str| {
            from_sig
                .cloned()
                .or_else(|| self.details.get(key).cloned())
                .unwrap_or_else(|| default.to_string())
        };
        let compiler = component(
            "compiler",
            signature.as_ref().map(|s| &s.compiler),
            "clang",
        );
        let stdlib = component("stdlib", signature.as_ref().map(|s| &s.stdlib), "libc++");
        let abi = component(
            "abi",
            signature.as_ref().map(|s| &s.abi_name),
            "libc++_abi",
        );

        let mut variant = self.clone();
        variant.abi_signature = format!("{compiler}-{stdlib}-{version}-{abi}");
        variant
            .details
            .insert("stdlib_version".to_string(), version.to_string());
        variant
    }
}

impl AbiTarget for PlatformIdentifier {
    fn os(&self) -> &str {
        &self.os
    }

    fn arch(&self) -> &str {
        &self.arch
    }

    fn abi_signature(&self) -> &str {
        &self.abi_signature
    }
}

/// On-disk cache of the detected host identifier.
#[derive(Debug, Clone)]
pub struct PlatformCache {
    path: PathBuf,
}

impl PlatformCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached identifier.
    ///
    /// An absent or unreadable cache yields `None` so that the caller re-probes.
    pub fn load(&self) -> CoreResult<Option<PlatformIdentifier>> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&contents) {
            Ok(identifier) => Ok(Some(identifier)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring corrupt platform cache");
                Ok(None)
            }
        }
    }

    pub fn store(&self, identifier: &PlatformIdentifier) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(identifier)?)?;
        Ok(())
    }

    /// Delete the cached identifier. Returns whether a cache file existed.
    pub fn clear(&self) -> CoreResult<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "platform cache cleared");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Return the cached host identifier, probing and caching it when absent.
    ///
    /// If the probe fails the compile-time [`PlatformIdentifier::fallback`] is
    /// returned without being cached, so a later call probes again.
    pub fn current_host<P: HostProbe + ?Sized>(&self, probe: &P) -> CoreResult<PlatformIdentifier> {
        if let Some(identifier) = self.load()? {
            return Ok(identifier);
        }

        let identifier = match probe
            .probe_host()
            .and_then(|output| PlatformIdentifier::from_probe_output(&output, std::env::consts::ARCH))
        {
            Ok(identifier) => identifier,
            Err(e) => {
                warn!(error = %e, "host probe failed, using fallback platform detection");
                return Ok(PlatformIdentifier::fallback());
            }
        };

        self.store(&identifier)?;
        debug!(triplet = %identifier.triplet, abi = %identifier.abi_signature, "host platform detected");
        Ok(identifier)
    }
}
