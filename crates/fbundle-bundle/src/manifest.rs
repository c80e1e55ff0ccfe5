//! Manifest schema for plugin bundles.
//!
//! The manifest is the `manifest.yaml` file in the bundle root. Decoding is
//! lenient: required fields are optional here so that a manifest missing
//! them can still be loaded and reported on by validation. Keys this model
//! does not know are kept and written back unchanged.

use crate::{BundleError, BundleResult};
use fbundle_core::{AbiTarget, CanonicalChecksumList, CoreResult, PlatformIdentifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

type Extra = BTreeMap<String, serde_yaml::Value>;

/// Bundle manifest - the root metadata record of a bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(
        default,
        deserialize_with = "scalar_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub bundle_name: Option<String>,

    #[serde(
        default,
        deserialize_with = "scalar_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub bundle_version: Option<String>,

    #[serde(
        default,
        deserialize_with = "scalar_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub bundle_author: Option<String>,

    #[serde(
        default,
        deserialize_with = "scalar_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub bundle_comment: Option<String>,

    /// RFC 3339 creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundled_on: Option<String>,

    /// Plugins keyed by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_plugins: Option<BTreeMap<String, PluginEntry>>,

    /// Present iff the bundle was signed after its last content change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_signature: Option<SignatureBlock>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// One plugin: its source distribution and the binaries built from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
    #[serde(default)]
    pub sdist: SdistEntry,

    #[serde(default)]
    pub binaries: Vec<BinaryEntry>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// The plugin's source archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdistEntry {
    /// Path inside the bundle; empty when the manifest does not define one.
    #[serde(default)]
    pub path: String,

    #[serde(
        rename = "sdistBundledOn",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub bundled_on: Option<String>,

    #[serde(default = "default_buildable")]
    pub buildable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Accept any YAML scalar for a text field, so `bundleVersion: 1.0` reads
/// as `"1.0"` rather than failing as a number.
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(Value::Bool(flag)) => Ok(Some(flag.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a text value, found {other:?}"
        ))),
    }
}

fn default_buildable() -> bool {
    true
}

impl Default for SdistEntry {
    fn default() -> Self {
        Self {
            path: String::new(),
            bundled_on: None,
            buildable: true,
            checksum: None,
            extra: Extra::new(),
        }
    }
}

/// A compiled artifact for one platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BinaryEntry {
    #[serde(default)]
    pub platform: BinaryPlatform,

    /// Path inside the bundle; empty when the manifest does not define one.
    #[serde(default)]
    pub path: String,

    #[serde(
        rename = "compiledOn",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub compiled_on: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// The platform fields recorded for a binary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BinaryPlatform {
    #[serde(default)]
    pub triplet: String,

    #[serde(default)]
    pub abi_signature: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl From<&PlatformIdentifier> for BinaryPlatform {
    fn from(identifier: &PlatformIdentifier) -> Self {
        Self {
            triplet: identifier.triplet.clone(),
            abi_signature: identifier.abi_signature.clone(),
            arch: Some(identifier.arch.clone()),
            os: Some(identifier.os.clone()),
            extra: Extra::new(),
        }
    }
}

impl AbiTarget for BinaryPlatform {
    /// The recorded OS, or the second component of the triplet.
    fn os(&self) -> &str {
        self.os
            .as_deref()
            .or_else(|| self.triplet.split('-').nth(1))
            .unwrap_or_default()
    }

    fn arch(&self) -> &str {
        self.arch
            .as_deref()
            .or_else(|| self.triplet.split('-').next())
            .unwrap_or_default()
    }

    fn abi_signature(&self) -> &str {
        &self.abi_signature
    }
}

/// The embedded bundle signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureBlock {
    #[serde(rename = "keyFingerprint")]
    pub key_fingerprint: String,

    /// Lowercase hex of the raw signature bytes.
    pub signature: String,

    #[serde(rename = "signedOn", default, skip_serializing_if = "Option::is_none")]
    pub signed_on: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl SignatureBlock {
    pub fn new(key_fingerprint: String, signature: &[u8]) -> Self {
        Self {
            key_fingerprint,
            signature: hex::encode(signature),
            signed_on: Some(now_rfc3339()),
            extra: Extra::new(),
        }
    }

    /// Decode the hex signature.
    pub fn signature_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(self.signature.trim())
    }
}

/// Current UTC time as an RFC 3339 string.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Manifest {
    /// Create a manifest for a new bundle, stamped with the current time.
    pub fn new(name: &str, version: &str, author: &str, comment: Option<&str>) -> Self {
        Self {
            bundle_name: Some(name.to_string()),
            bundle_version: Some(version.to_string()),
            bundle_author: Some(author.to_string()),
            bundle_comment: comment.map(str::to_string),
            bundled_on: Some(now_rfc3339()),
            bundle_plugins: Some(BTreeMap::new()),
            bundle_signature: None,
            extra: Extra::new(),
        }
    }

    /// Decode manifest text. An empty document decodes to an empty manifest.
    pub fn parse(text: &str) -> BundleResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        match value {
            serde_yaml::Value::Null => Ok(Self::default()),
            serde_yaml::Value::Mapping(_) => serde_yaml::from_value(value)
                .map_err(|e| BundleError::Schema(e.to_string())),
            _ => Err(BundleError::Schema(
                "manifest must be a mapping of keys to values".to_string(),
            )),
        }
    }

    pub fn to_yaml(&self) -> BundleResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Names of required top-level keys that are absent.
    #[must_use]
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.bundle_name.is_none() {
            missing.push("bundleName");
        }
        if self.bundle_version.is_none() {
            missing.push("bundleVersion");
        }
        if self.bundle_plugins.is_none() {
            missing.push("bundlePlugins");
        }
        missing
    }

    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.bundle_signature.is_some()
    }

    /// Plugins in name order; empty when `bundlePlugins` is absent.
    pub fn plugins(&self) -> impl Iterator<Item = (&String, &PluginEntry)> {
        self.bundle_plugins.iter().flatten()
    }

    pub fn plugins_mut(&mut self) -> &mut BTreeMap<String, PluginEntry> {
        self.bundle_plugins.get_or_insert_with(BTreeMap::new)
    }

    #[must_use]
    pub fn plugin(&self, name: &str) -> Option<&PluginEntry> {
        self.bundle_plugins.as_ref()?.get(name)
    }

    #[must_use]
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins().map(|(name, _)| name.clone()).collect()
    }

    /// Every defined sdist and binary path.
    #[must_use]
    pub fn file_paths(&self) -> Vec<&str> {
        self.recorded_checksums().into_keys().collect()
    }

    /// Path to recorded checksum for every defined sdist and binary.
    #[must_use]
    pub fn recorded_checksums(&self) -> BTreeMap<&str, Option<&str>> {
        let mut checksums = BTreeMap::new();
        for (_, plugin) in self.plugins() {
            if !plugin.sdist.path.is_empty() {
                checksums.insert(plugin.sdist.path.as_str(), plugin.sdist.checksum.as_deref());
            }
            for binary in &plugin.binaries {
                if !binary.path.is_empty() {
                    checksums.insert(binary.path.as_str(), binary.checksum.as_deref());
                }
            }
        }
        checksums
    }

    /// Hash every referenced file under `base_dir`.
    pub fn canonical_checksums(&self, base_dir: &Path) -> CoreResult<CanonicalChecksumList> {
        CanonicalChecksumList::from_disk(self.file_paths(), base_dir)
    }

    /// The canonical list as claimed by the manifest, if every file has a
    /// recorded checksum.
    #[must_use]
    pub fn recorded_canonical_list(&self) -> Option<CanonicalChecksumList> {
        let pairs = self
            .recorded_checksums()
            .into_iter()
            .map(|(path, checksum)| checksum.map(|checksum| (path, checksum)))
            .collect::<Option<Vec<_>>>()?;
        Some(CanonicalChecksumList::from_recorded(pairs))
    }

    /// Overwrite per-entry checksums with the values in `list`.
    pub fn apply_checksums(&mut self, list: &CanonicalChecksumList) {
        for plugin in self.bundle_plugins.iter_mut().flat_map(BTreeMap::values_mut) {
            if let Some(checksum) = list.checksum(&plugin.sdist.path) {
                plugin.sdist.checksum = Some(checksum.to_string());
            }
            for binary in &mut plugin.binaries {
                if let Some(checksum) = list.checksum(&binary.path) {
                    binary.checksum = Some(checksum.to_string());
                }
            }
        }
    }

    /// Drop every binary entry. Returns how many were removed.
    pub fn clear_binaries(&mut self) -> usize {
        let mut removed = 0;
        for plugin in self.bundle_plugins.iter_mut().flat_map(BTreeMap::values_mut) {
            removed += plugin.binaries.len();
            plugin.binaries.clear();
        }
        removed
    }

    /// `(plugin, triplet, abi_signature)` for every binary that repeats an
    /// earlier binary's platform within the same plugin.
    #[must_use]
    pub fn binary_key_collisions(&self) -> Vec<(String, String, String)> {
        let mut collisions = Vec::new();
        for (name, plugin) in self.plugins() {
            for (i, binary) in plugin.binaries.iter().enumerate() {
                let key = binary.platform_key();
                if plugin.binaries[..i].iter().any(|earlier| earlier.platform_key() == key) {
                    collisions.push((name.clone(), key.0.to_string(), key.1.to_string()));
                }
            }
        }
        collisions
    }
}

impl PluginEntry {
    /// Whether a binary with this `(triplet, abi_signature)` already exists.
    #[must_use]
    pub fn has_binary(&self, triplet: &str, abi_signature: &str) -> bool {
        self.binaries
            .iter()
            .any(|binary| binary.platform_key() == (triplet, abi_signature))
    }

    #[must_use]
    pub fn has_triplet(&self, triplet: &str) -> bool {
        self.binaries
            .iter()
            .any(|binary| binary.platform.triplet == triplet)
    }
}

impl BinaryEntry {
    /// The composite uniqueness key of a binary within its plugin.
    #[must_use]
    pub fn platform_key(&self) -> (&str, &str) {
        (
            self.platform.triplet.as_str(),
            self.platform.abi_signature.as_str(),
        )
    }
}
