use super::validate::validate_staged;
use super::{
    BinaryCompatibility, BundleOps, InspectReport, PluginCompatibility, SignatureReport,
    TrustStatus, ValidationReport, ValidationStatus, ValidationSummary,
};
use crate::{BuildBackend, Manifest, SignatureBlock, StagedBundle};
use fbundle_core::{CanonicalChecksumList, CoreError, PlatformIdentifier, is_compatible};
use fbundle_keys::{KeyError, PublicKey, TrustStore};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

const HOST_UNAVAILABLE: &str = "host platform unavailable";

pub(super) fn inspect<B: BuildBackend>(ops: &BundleOps<B>, bundle: &Path) -> InspectReport {
    info!(bundle = %bundle.display(), "inspecting bundle");

    let host = match ops.host() {
        Ok(host) => Some(host),
        Err(e) => {
            warn!(error = %e, "host platform detection failed");
            None
        }
    };

    let staged = match StagedBundle::extract(bundle) {
        Ok(staged) => staged,
        Err(e) => {
            let reason = e.to_string();
            return InspectReport {
                validation: ValidationReport {
                    errors: vec![reason.clone()],
                    warnings: Vec::new(),
                    summary: ValidationSummary {
                        errors: 1,
                        warnings: 0,
                    },
                    status: ValidationStatus::Failed,
                },
                signature: errored(reason),
                plugins: BTreeMap::new(),
                manifest: None,
                host,
            };
        }
    };

    let (validation, manifest) = validate_staged(&staged);
    let Some(manifest) = manifest else {
        let reason = validation
            .errors
            .first()
            .cloned()
            .unwrap_or_else(|| "manifest could not be read".to_string());
        return InspectReport {
            validation,
            signature: errored(reason),
            plugins: BTreeMap::new(),
            manifest: None,
            host,
        };
    };

    let signature = check_signature(&ops.trust_store, &staged, &manifest);
    info!(status = ?signature.status, "signature checked");
    let plugins = plugin_compatibility(&manifest, host.as_ref());

    InspectReport {
        validation,
        signature,
        plugins,
        manifest: Some(manifest),
        host,
    }
}

fn errored(reason: String) -> SignatureReport {
    let mut report = SignatureReport::with_status(TrustStatus::Error);
    report.reason = Some(reason);
    report
}

/// Decide the trust status of a staged bundle.
fn check_signature(
    trust_store: &TrustStore,
    staged: &StagedBundle,
    manifest: &Manifest,
) -> SignatureReport {
    let Some(block) = &manifest.bundle_signature else {
        return SignatureReport::with_status(TrustStatus::Unsigned);
    };

    let mut report = SignatureReport::with_status(TrustStatus::Untrusted);
    report.fingerprint = Some(block.key_fingerprint.clone());

    let entry = match trust_store.find_by_fingerprint(&block.key_fingerprint) {
        Ok(entry) => entry,
        Err(KeyError::KeyNotFound(_)) => {
            report.reason = Some("signing key is not in the trust store".to_string());
            return report;
        }
        Err(e) => {
            report.status = TrustStatus::Error;
            report.reason = Some(e.to_string());
            return report;
        }
    };
    report.key_source = Some(entry.source.clone());
    report.key_path = Some(entry.path.clone());

    let (status, reason) = match trust_store.load_public_key(&entry) {
        Ok(key) => verdict(&key, block, staged, manifest),
        Err(e) => (TrustStatus::Error, Some(e.to_string())),
    };
    report.status = status;
    report.reason = reason;
    report
}

fn verdict(
    key: &PublicKey,
    block: &SignatureBlock,
    staged: &StagedBundle,
    manifest: &Manifest,
) -> (TrustStatus, Option<String>) {
    let signature = match block.signature_bytes() {
        Ok(signature) => signature,
        Err(e) => {
            return (
                TrustStatus::Error,
                Some(format!("signature is not valid hex: {e}")),
            );
        }
    };

    let disk = match manifest.canonical_checksums(staged.path()) {
        Ok(disk) => disk,
        Err(CoreError::MissingFile(path)) => {
            return recorded_verdict(key, &signature, manifest, &format!("{path} is missing"));
        }
        Err(e) => return (TrustStatus::Error, Some(e.to_string())),
    };

    if key.verify(&signature, &disk.to_bytes()).is_err() {
        return recorded_verdict(
            key,
            &signature,
            manifest,
            "file contents no longer match them",
        );
    }

    if matches_recorded(manifest, &disk) {
        (TrustStatus::Trusted, None)
    } else {
        (
            TrustStatus::Tampered,
            Some(
                "Signature is valid, but file contents do not match manifest checksums."
                    .to_string(),
            ),
        )
    }
}

/// The signature failed over the files on disk; check it against the
/// checksums the manifest claims instead.
fn recorded_verdict(
    key: &PublicKey,
    signature: &[u8],
    manifest: &Manifest,
    problem: &str,
) -> (TrustStatus, Option<String>) {
    let authentic = manifest
        .recorded_canonical_list()
        .is_some_and(|recorded| key.verify(signature, &recorded.to_bytes()).is_ok());

    if authentic {
        (
            TrustStatus::Tampered,
            Some(format!(
                "Signature is valid for the recorded checksums, but {problem}."
            )),
        )
    } else {
        (
            TrustStatus::Invalid,
            Some("Cryptographic signature verification failed.".to_string()),
        )
    }
}

fn matches_recorded(manifest: &Manifest, disk: &CanonicalChecksumList) -> bool {
    let recorded = manifest.recorded_checksums();
    disk.iter()
        .all(|(path, checksum)| recorded.get(path).copied().flatten() == Some(checksum))
}

fn plugin_compatibility(
    manifest: &Manifest,
    host: Option<&PlatformIdentifier>,
) -> BTreeMap<String, PluginCompatibility> {
    manifest
        .plugins()
        .map(|(name, plugin)| {
            let binaries: Vec<BinaryCompatibility> = plugin
                .binaries
                .iter()
                .map(|binary| {
                    let (compatible, reason) = match host {
                        Some(host) => is_compatible(host, &binary.platform),
                        None => (false, HOST_UNAVAILABLE.to_string()),
                    };
                    BinaryCompatibility {
                        binary: binary.clone(),
                        compatible,
                        reason,
                    }
                })
                .collect();

            let compatibility = PluginCompatibility {
                sdist_path: (!plugin.sdist.path.is_empty()).then(|| plugin.sdist.path.clone()),
                compatible_found: binaries.iter().any(|b| b.compatible),
                binaries,
            };
            (name.clone(), compatibility)
        })
        .collect()
}
