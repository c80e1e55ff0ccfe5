use crate::{BundleError, BundleResult, StagedBundle};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;
use zip::ZipArchive;

/// New values for the descriptive manifest fields. `None` and empty values
/// leave the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub name: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub comment: Option<String>,
}

/// Replace descriptive manifest fields, returning the keys that changed.
///
/// The signature covers file checksums only, so it is kept.
pub fn edit_metadata(bundle: &Path, update: &MetadataUpdate) -> BundleResult<Vec<&'static str>> {
    let staged = StagedBundle::extract(bundle)?;
    let mut manifest = staged.read_manifest()?;

    let mut updated = Vec::new();
    for (key, value, field) in [
        ("bundleName", &update.name, &mut manifest.bundle_name),
        ("bundleVersion", &update.version, &mut manifest.bundle_version),
        ("bundleAuthor", &update.author, &mut manifest.bundle_author),
        ("bundleComment", &update.comment, &mut manifest.bundle_comment),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            *field = Some(value.to_string());
            updated.push(key);
        }
    }

    if !updated.is_empty() {
        staged.write_manifest(&manifest)?;
        staged.commit()?;
        info!(bundle = %bundle.display(), fields = ?updated, "bundle metadata updated");
    }
    Ok(updated)
}

/// Unpack a plugin's source distribution into `output_dir/<plugin>`.
pub fn extract_plugin_source(
    bundle: &Path,
    plugin: &str,
    output_dir: &Path,
) -> BundleResult<PathBuf> {
    let staged = StagedBundle::extract(bundle)?;
    let manifest = staged.read_manifest()?;

    let entry = manifest
        .plugin(plugin)
        .ok_or_else(|| BundleError::PluginNotFound {
            name: plugin.to_string(),
            available: manifest.plugin_names(),
        })?;

    if entry.sdist.path.is_empty() {
        return Err(BundleError::Schema(format!(
            "no source distribution defined for plugin '{plugin}'"
        )));
    }
    let sdist = staged.resolve_entry(&entry.sdist.path)?;
    if !sdist.is_file() {
        return Err(BundleError::MissingFile(entry.sdist.path.clone()));
    }

    let destination = output_dir.join(plugin);
    fs::create_dir_all(&destination)?;
    ZipArchive::new(File::open(&sdist)?)?.extract(&destination)?;

    info!(plugin, destination = %destination.display(), "plugin source extracted");
    Ok(destination)
}
