use super::SignReport;
use crate::{BundleResult, LEGACY_SIGNATURE_FILE, SignatureBlock, StagedBundle};
use fbundle_keys::PrivateKey;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Sign a bundle in place.
///
/// Checksums of every referenced file are recomputed from the archive and
/// written into the manifest, then the canonical checksum list is signed
/// and stored as `bundleSignature`. A missing file, or a manifest path that
/// points outside the bundle, aborts the operation.
pub fn sign(bundle: &Path, private_key: &Path) -> BundleResult<SignReport> {
    info!(bundle = %bundle.display(), key = %private_key.display(), "signing bundle");

    let key = PrivateKey::from_file(private_key)?;
    let fingerprint = key.public_key().fingerprint()?;
    debug!(algorithm = %key.algorithm(), %fingerprint, "signing key loaded");

    let staged = StagedBundle::extract(bundle)?;
    let mut manifest = staged.read_manifest()?;

    let canonical = manifest.canonical_checksums(staged.path())?;
    manifest.apply_checksums(&canonical);

    let signature = fbundle_keys::sign(&canonical.to_bytes(), &key)?;
    manifest.bundle_signature = Some(SignatureBlock::new(fingerprint.clone(), &signature));
    staged.write_manifest(&manifest)?;

    let legacy = staged.resolve(LEGACY_SIGNATURE_FILE);
    if legacy.is_file() {
        fs::remove_file(&legacy)?;
        debug!("removed legacy detached signature");
    }

    staged.commit()?;

    info!(%fingerprint, files = canonical.len(), "bundle signed");
    Ok(SignReport {
        fingerprint,
        algorithm: key.algorithm(),
        signed_files: canonical.len(),
    })
}
