//! Filesystem layout of the tool's state

use crate::{CoreError, CoreResult, PlatformCache, PlatformIdentifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the state directory.
pub const HOME_ENV_VAR: &str = "FBUNDLE_HOME";

/// Resolved locations of the trust store, caches and build configuration.
///
/// Every path defaults to a location under `home`, so a config file only
/// needs to name the entries it wants to move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FbundleConfig {
    pub home: PathBuf,
    pub trust_store_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub abi_cache_file: PathBuf,
    pub cross_files_dir: PathBuf,
    pub remotes_config: PathBuf,
    /// Display name to container image used for Linux builds.
    pub docker_images: BTreeMap<String, String>,
}

/// Config file shape: everything optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    home: Option<PathBuf>,
    trust_store_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    abi_cache_file: Option<PathBuf>,
    cross_files_dir: Option<PathBuf>,
    remotes_config: Option<PathBuf>,
    docker_images: Option<BTreeMap<String, String>>,
}

fn default_home() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .map(|home| home.join(".fbundle"))
        .unwrap_or_else(|| PathBuf::from(".fbundle"))
}

fn default_docker_images() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "x86_64 (manylinux_2_28)".to_string(),
            "quay.io/pypa/manylinux_2_28_x86_64".to_string(),
        ),
        (
            "aarch64 (manylinux_2_28)".to_string(),
            "quay.io/pypa/manylinux_2_28_aarch64".to_string(),
        ),
    ])
}

impl Default for FbundleConfig {
    fn default() -> Self {
        Self::for_home(default_home())
    }
}

impl FbundleConfig {
    /// Default layout rooted at `home`.
    pub fn for_home(home: impl Into<PathBuf>) -> Self {
        Self::resolve(RawConfig {
            home: Some(home.into()),
            ..RawConfig::default()
        })
    }

    fn resolve(raw: RawConfig) -> Self {
        let home = raw.home.unwrap_or_else(default_home);
        let cache_dir = raw.cache_dir.unwrap_or_else(|| home.join("cache"));

        Self {
            trust_store_dir: raw.trust_store_dir.unwrap_or_else(|| home.join("keys")),
            abi_cache_file: raw
                .abi_cache_file
                .unwrap_or_else(|| cache_dir.join("abi_identifier.json")),
            cross_files_dir: raw.cross_files_dir.unwrap_or_else(|| home.join("cross")),
            remotes_config: raw
                .remotes_config
                .unwrap_or_else(|| home.join("key_remotes.json")),
            docker_images: raw.docker_images.unwrap_or_else(default_docker_images),
            cache_dir,
            home,
        }
    }

    /// Parse a TOML document; absent keys take their defaults.
    pub fn from_toml(contents: &str) -> CoreResult<Self> {
        let raw: RawConfig =
            toml::from_str(contents).map_err(|e| CoreError::Config(e.to_string()))?;
        Ok(Self::resolve(raw))
    }

    /// Load a TOML config file, or the defaults when the file does not exist.
    pub fn load(path: &Path) -> CoreResult<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents)
                .map_err(|e| CoreError::Config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Create the state directories.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        for dir in [
            &self.home,
            &self.trust_store_dir,
            &self.cache_dir,
            &self.cross_files_dir,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn platform_cache(&self) -> PlatformCache {
        PlatformCache::new(&self.abi_cache_file)
    }

    /// Targets configured besides the native host: one per `*.cross` file in
    /// `cross_files_dir`, then one per docker image.
    pub fn configured_targets(&self) -> CoreResult<Vec<PlatformIdentifier>> {
        let mut targets = Vec::new();

        if self.cross_files_dir.is_dir() {
            let mut cross_files: Vec<PathBuf> = fs::read_dir(&self.cross_files_dir)?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "cross"))
                .collect();
            cross_files.sort();

            for path in cross_files {
                if let Some(triplet) = path.file_stem().and_then(|stem| stem.to_str()) {
                    targets.push(PlatformIdentifier::cross(triplet, path.clone()));
                }
            }
        }

        for (name, image) in &self.docker_images {
            let arch = name.split_whitespace().next().unwrap_or("x86_64");
            targets.push(PlatformIdentifier::docker(arch, image));
        }

        Ok(targets)
    }
}

#[cfg(test)]
#[path = "config/config_tests.rs"]
mod config_tests;
