use super::{BundleOps, FillEvent, FillReport, FillStatus, TargetOutcome};
use crate::manifest::now_rfc3339;
use crate::{
    BIN_DIR, BinaryEntry, BinaryPlatform, BuildArtifact, BuildBackend, BuildError, BundleError,
    BundleResult, Manifest, PluginEntry, StagedBundle, read_manifest_text,
};
use fbundle_core::{PlatformIdentifier, hash_file};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use tracing::{info, warn};

const RESIGN_WARNING: &str =
    "Bundle signature was removed because its binaries changed; the bundle must be re-signed.";

pub(super) fn fill<B: BuildBackend>(
    ops: &BundleOps<B>,
    bundle: &Path,
    targets: &BTreeMap<String, Vec<PlatformIdentifier>>,
    progress: &mut dyn FnMut(&FillEvent),
) -> BundleResult<FillReport> {
    info!(bundle = %bundle.display(), "filling bundle");

    let staged = StagedBundle::extract(bundle)?;
    let mut manifest = staged.read_manifest()?;

    for name in targets.keys() {
        let plugin = manifest
            .plugin(name)
            .ok_or_else(|| BundleError::PluginNotFound {
                name: name.clone(),
                available: manifest.plugin_names(),
            })?;
        if plugin.sdist.path.is_empty() || !staged.resolve_entry(&plugin.sdist.path)?.is_file() {
            return Err(BundleError::MissingFile(format!(
                "source distribution for plugin '{name}'"
            )));
        }
    }

    let mut report = FillReport::default();
    for (name, plugin_targets) in targets {
        for target in plugin_targets {
            emit(
                progress,
                FillStatus::Building,
                Some(name.as_str()),
                Some(target.triplet.as_str()),
                format!("Building {name} for {}...", target.triplet),
            );

            let plugin = manifest.plugins_mut().entry(name.clone()).or_default();
            let outcome = match build_target(&ops.backend, &staged, name, plugin, target) {
                Ok(binary) => {
                    let message = format!("Successfully built and staged {}", binary.path);
                    let binary_path = binary.path.clone();
                    plugin.binaries.push(binary);
                    emit(
                        progress,
                        FillStatus::Success,
                        Some(name.as_str()),
                        Some(target.triplet.as_str()),
                        message.clone(),
                    );
                    TargetOutcome {
                        plugin: name.clone(),
                        target: target.triplet.clone(),
                        succeeded: true,
                        message,
                        binary_path: Some(binary_path),
                    }
                }
                Err(BundleError::Build(e)) => {
                    let message = format!("Failed to build {name} for {}: {e}", target.triplet);
                    emit(
                        progress,
                        FillStatus::Failure,
                        Some(name.as_str()),
                        Some(target.triplet.as_str()),
                        message.clone(),
                    );
                    TargetOutcome {
                        plugin: name.clone(),
                        target: target.triplet.clone(),
                        succeeded: false,
                        message,
                        binary_path: None,
                    }
                }
                Err(e) => return Err(e),
            };
            report.outcomes.push(outcome);
        }
    }

    if manifest.bundle_signature.take().is_some() {
        warn!("{RESIGN_WARNING}");
        report.signature_removed = true;
        report.warnings.push(RESIGN_WARNING.to_string());
    }

    staged.write_manifest(&manifest)?;
    staged.commit()?;

    emit(
        progress,
        FillStatus::Complete,
        None,
        None,
        format!(
            "Bundle filled: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        ),
    );
    Ok(report)
}

/// Build one target in its own work directory and stage the result.
fn build_target<B: BuildBackend>(
    backend: &B,
    staged: &StagedBundle,
    plugin_name: &str,
    plugin: &PluginEntry,
    target: &PlatformIdentifier,
) -> BundleResult<BinaryEntry> {
    let work_dir = tempfile::Builder::new()
        .prefix(&format!("{plugin_name}_build_"))
        .tempdir()?;
    let sdist = staged.resolve_entry(&plugin.sdist.path)?;
    let artifact = backend.build(&sdist, work_dir.path(), target)?;

    let resolved = &artifact.platform;
    if plugin.has_binary(&resolved.triplet, &resolved.abi_signature) {
        return Err(BuildError::new(
            &target.triplet,
            format!(
                "a binary for {} ({}) already exists",
                resolved.triplet, resolved.abi_signature
            ),
        )
        .into());
    }

    stage_artifact(staged.path(), &artifact)
}

/// Copy a build artifact into `bin/` under its platform-tagged name and
/// describe it as a manifest entry.
///
/// Never replaces a file already in the bundle: two plugins whose artifacts
/// share a stem and platform fail here instead of overwriting each other.
pub(super) fn stage_artifact(
    bundle_root: &Path,
    artifact: &BuildArtifact,
) -> BundleResult<BinaryEntry> {
    let stem = artifact
        .path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| {
            BuildError::new(
                &artifact.platform.triplet,
                format!("artifact '{}' has no usable file name", artifact.path.display()),
            )
        })?;
    let extension = artifact
        .path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    let platform = &artifact.platform;
    let file_name = format!(
        "{stem}.{}.{}{extension}",
        platform.triplet, platform.abi_signature
    );

    let bin_dir = bundle_root.join(BIN_DIR);
    fs::create_dir_all(&bin_dir)?;
    let staged_path = bin_dir.join(&file_name);
    let stage_error = |e: io::Error| {
        BuildError::new(
            &platform.triplet,
            format!("could not stage '{}': {e}", artifact.path.display()),
        )
    };
    let mut source = File::open(&artifact.path).map_err(stage_error)?;
    let mut target = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&staged_path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(BuildError::new(
                &platform.triplet,
                format!("staged binary '{BIN_DIR}/{file_name}' already exists in the bundle"),
            )
            .into());
        }
        Err(e) => return Err(stage_error(e).into()),
    };
    if let Err(e) = io::copy(&mut source, &mut target) {
        drop(target);
        fs::remove_file(&staged_path)?;
        return Err(stage_error(e).into());
    }

    Ok(BinaryEntry {
        platform: BinaryPlatform::from(platform),
        path: format!("{BIN_DIR}/{file_name}"),
        compiled_on: Some(now_rfc3339()),
        checksum: Some(hash_file(&staged_path)?),
        ..BinaryEntry::default()
    })
}

pub(super) fn fillable_targets<B: BuildBackend>(
    ops: &BundleOps<B>,
    bundle: &Path,
) -> BundleResult<BTreeMap<String, Vec<PlatformIdentifier>>> {
    let manifest = Manifest::parse(&read_manifest_text(bundle)?)?;
    let host = ops.host()?;
    let available = ops.backend.available_targets(&host);

    Ok(manifest
        .plugins()
        .filter_map(|(name, plugin)| {
            let missing: Vec<PlatformIdentifier> = available
                .iter()
                .filter(|target| !plugin.has_triplet(&target.triplet))
                .cloned()
                .collect();
            (!missing.is_empty()).then(|| (name.clone(), missing))
        })
        .collect())
}

fn emit(
    progress: &mut dyn FnMut(&FillEvent),
    status: FillStatus,
    plugin: Option<&str>,
    target: Option<&str>,
    message: String,
) {
    match status {
        FillStatus::Failure => warn!(plugin, target, "{message}"),
        _ => info!(plugin, target, "{message}"),
    }
    progress(&FillEvent {
        status,
        plugin: plugin.map(str::to_string),
        target: target.map(str::to_string),
        message,
    });
}
