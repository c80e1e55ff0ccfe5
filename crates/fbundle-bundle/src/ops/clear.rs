use super::ClearReport;
use crate::{BIN_DIR, BundleResult, LEGACY_SIGNATURE_FILE, StagedBundle};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Remove every binary and the signature from a bundle, keeping the sources.
pub fn clear(bundle: &Path) -> BundleResult<ClearReport> {
    info!(bundle = %bundle.display(), "clearing binaries from bundle");

    let staged = StagedBundle::extract(bundle)?;
    let mut manifest = staged.read_manifest()?;

    let signature_removed = manifest.bundle_signature.take().is_some();
    let binaries_removed = manifest.clear_binaries();

    let bin_dir = staged.resolve(BIN_DIR);
    if bin_dir.is_dir() {
        fs::remove_dir_all(&bin_dir)?;
        debug!("removed bin/ directory");
    }

    let legacy = staged.resolve(LEGACY_SIGNATURE_FILE);
    let legacy_signature_removed = legacy.is_file();
    if legacy_signature_removed {
        fs::remove_file(&legacy)?;
        debug!("removed legacy detached signature");
    }

    staged.write_manifest(&manifest)?;
    staged.commit()?;

    info!(binaries_removed, signature_removed, "bundle cleared");
    Ok(ClearReport {
        binaries_removed,
        signature_removed,
        legacy_signature_removed,
    })
}
