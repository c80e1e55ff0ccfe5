use super::validate::validate_root;
use super::{DirectoryReport, PackOptions, PackReport};
use crate::{BUNDLE_EXTENSION, BundleError, BundleResult, Manifest, write_archive};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Check an unpacked bundle directory with the same rules [`super::validate`]
/// applies to an archive.
pub fn validate_bundle_directory(directory: &Path) -> BundleResult<DirectoryReport> {
    if !directory.is_dir() {
        return Err(BundleError::MissingFile(directory.display().to_string()));
    }
    info!(directory = %directory.display(), "validating bundle directory");

    let (validation, manifest) = validate_root(directory);
    Ok(DirectoryReport {
        is_signed: manifest.as_ref().is_some_and(Manifest::is_signed),
        validation,
    })
}

/// Zip an unpacked bundle directory into `<name>.fbundle`.
///
/// The directory must validate first; nothing is written otherwise. The
/// archive may not be placed inside the directory it packs.
pub fn pack_bundle_directory(directory: &Path, options: &PackOptions) -> BundleResult<PackReport> {
    let report = validate_bundle_directory(directory)?;
    if !report.validation.passed() {
        return Err(BundleError::Schema(format!(
            "bundle directory failed validation: {}",
            report.validation.errors.join("; ")
        )));
    }
    for warning in &report.validation.warnings {
        warn!(directory = %directory.display(), "{warning}");
    }

    let root = directory.canonicalize()?;
    let name = match &options.name {
        Some(name) => name.clone(),
        None => root
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                BundleError::Schema(format!(
                    "cannot derive a bundle name from '{}'",
                    directory.display()
                ))
            })?,
    };
    let output_dir = match &options.output_dir {
        Some(dir) => dir.clone(),
        None => root.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(".")),
    };

    fs::create_dir_all(&output_dir)?;
    if output_dir.canonicalize()?.starts_with(&root) {
        return Err(BundleError::Schema(format!(
            "output directory '{}' is inside the bundle directory",
            output_dir.display()
        )));
    }

    let output = output_dir.join(format!("{name}.{BUNDLE_EXTENSION}"));
    let files_packed = write_archive(&root, &output)?;

    info!(output = %output.display(), files = files_packed, "bundle directory packed");
    Ok(PackReport {
        output,
        is_signed: report.is_signed,
        files_packed,
    })
}
