use super::fill::stage_artifact;
use super::{BundleOps, CreateReport};
use crate::archive::{write_archive, zip_directory};
use crate::manifest::now_rfc3339;
use crate::{
    BuildBackend, BundleError, BundleResult, MANIFEST_FILE, Manifest, PluginEntry, SdistEntry,
};
use fbundle_core::hash_file;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

/// Directories never packaged into a source distribution.
const SKIPPED_DIRS: &[&str] = &["builddir", ".git", "target"];

const DEFAULT_COMMENT: &str = "Created with fbundle";

/// Descriptive fields for a new bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleMetadata {
    pub name: String,
    pub version: String,
    pub author: String,
    pub comment: Option<String>,
}

pub(super) fn create<B: BuildBackend>(
    ops: &BundleOps<B>,
    plugin_dirs: &[PathBuf],
    output: &Path,
    metadata: &BundleMetadata,
    target_version: Option<&str>,
) -> BundleResult<CreateReport> {
    info!(output = %output.display(), plugins = plugin_dirs.len(), "creating bundle");

    let host = ops.host()?;
    let target = match target_version {
        Some(version) => {
            info!(version, "targeting minimum platform version");
            host.targeted_variant(version)
        }
        None => host,
    };

    let staging = tempfile::Builder::new().prefix("fbundle_create_").tempdir()?;
    let mut manifest = Manifest::new(
        &metadata.name,
        &metadata.version,
        &metadata.author,
        Some(metadata.comment.as_deref().unwrap_or(DEFAULT_COMMENT)),
    );
    let mut binaries = Vec::new();

    for dir in plugin_dirs {
        if !dir.is_dir() {
            return Err(BundleError::MissingFile(dir.display().to_string()));
        }
        let name = plugin_name(dir)?;
        if manifest.plugin(&name).is_some() {
            return Err(BundleError::Schema(format!(
                "plugin '{name}' is given more than once"
            )));
        }
        info!(plugin = %name, "packaging plugin");

        let sdist_name = format!("{name}_src.zip");
        let sdist_path = staging.path().join(&sdist_name);
        zip_directory(dir, File::create(&sdist_path)?, SKIPPED_DIRS)?;

        let work_dir = tempfile::Builder::new()
            .prefix(&format!("{name}_build_"))
            .tempdir()?;
        let artifact = ops.backend.build(&sdist_path, work_dir.path(), &target)?;
        let binary = stage_artifact(staging.path(), &artifact)?;
        info!(plugin = %name, binary = %binary.path, "binary staged");
        binaries.push(binary.path.clone());

        let entry = PluginEntry {
            sdist: SdistEntry {
                checksum: Some(hash_file(&sdist_path)?),
                path: sdist_name,
                bundled_on: Some(now_rfc3339()),
                ..SdistEntry::default()
            },
            binaries: vec![binary],
            ..PluginEntry::default()
        };
        manifest.plugins_mut().insert(name, entry);
    }

    fs::write(staging.path().join(MANIFEST_FILE), manifest.to_yaml()?)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_archive(staging.path(), output)?;

    info!(output = %output.display(), "bundle created");
    Ok(CreateReport {
        output: output.to_path_buf(),
        plugins: manifest.plugin_names(),
        binaries,
    })
}

fn plugin_name(dir: &Path) -> BundleResult<String> {
    dir.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            BundleError::Schema(format!(
                "cannot derive a plugin name from '{}'",
                dir.display()
            ))
        })
}
