use super::{ValidationReport, ValidationStatus, ValidationSummary};
use crate::{BundleError, LEGACY_SIGNATURE_FILE, MANIFEST_FILE, Manifest, StagedBundle};
use fbundle_core::{hash_file, resolve_within};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Check a bundle's structure, manifest and file checksums.
///
/// Never fails: every problem found is recorded as an error or a warning.
pub fn validate(bundle: &Path) -> ValidationReport {
    info!(bundle = %bundle.display(), "validating bundle");
    match StagedBundle::extract(bundle) {
        Ok(staged) => validate_staged(&staged).0,
        Err(e) => {
            let mut findings = Findings::default();
            findings.error(e.to_string());
            findings.finish()
        }
    }
}

/// Validate an extracted bundle, also returning its manifest when it could
/// be decoded.
pub(super) fn validate_staged(staged: &StagedBundle) -> (ValidationReport, Option<Manifest>) {
    validate_root(staged.path())
}

/// Validate the unpacked contents of a bundle rooted at `root`.
pub(super) fn validate_root(root: &Path) -> (ValidationReport, Option<Manifest>) {
    let mut findings = Findings::default();

    let manifest_path = root.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        findings.error(format!("Missing {MANIFEST_FILE} file."));
        return (findings.finish(), None);
    }

    let parsed = fs::read_to_string(&manifest_path)
        .map_err(BundleError::from)
        .and_then(|text| Manifest::parse(&text));
    let manifest = match parsed {
        Ok(manifest) => manifest,
        Err(BundleError::Yaml(e)) => {
            findings.error(format!("Manifest file is not valid YAML: {e}"));
            return (findings.finish(), None);
        }
        Err(e) => {
            findings.error(e.to_string());
            return (findings.finish(), None);
        }
    };

    if manifest == Manifest::default() {
        findings.warning("Manifest file is empty.");
    }
    for field in manifest.missing_required_fields() {
        findings.error(format!("Manifest is missing '{field}'."));
    }
    if manifest.bundle_plugins.as_ref().is_some_and(|p| p.is_empty()) {
        findings.warning("Manifest 'bundlePlugins' section is empty.");
    }

    for (name, plugin) in manifest.plugins() {
        let sdist = &plugin.sdist;
        if sdist.path.is_empty() {
            findings.error(format!("sdist path not defined for plugin '{name}'."));
        } else {
            match resolve_within(root, &sdist.path) {
                Err(_) => findings.error(format!("sdist path escapes the bundle: {}", sdist.path)),
                Ok(file) if !file.is_file() => {
                    findings.error(format!("sdist file not found: {}", sdist.path));
                }
                Ok(file) => {
                    if let Some(expected) = &sdist.checksum {
                        findings.check_checksum(&file, &sdist.path, expected);
                    }
                }
            }
        }

        for binary in &plugin.binaries {
            if binary.path.is_empty() {
                findings.error(format!("Binary entry for '{name}' is missing a 'path'."));
                continue;
            }
            let file = match resolve_within(root, &binary.path) {
                Ok(file) => file,
                Err(_) => {
                    findings.error(format!("Binary path escapes the bundle: {}", binary.path));
                    continue;
                }
            };
            if !file.is_file() {
                findings.error(format!("Binary file not found: {}", binary.path));
                continue;
            }
            match &binary.checksum {
                Some(expected) => findings.check_checksum(&file, &binary.path, expected),
                None => findings.warning(format!(
                    "Checksum not defined for binary '{}'.",
                    binary.path
                )),
            }
        }
    }

    for (plugin, triplet, abi) in manifest.binary_key_collisions() {
        findings.error(format!(
            "Plugin '{plugin}' has more than one binary for {triplet} ({abi})."
        ));
    }

    if root.join(LEGACY_SIGNATURE_FILE).is_file() {
        findings.warning(format!(
            "Legacy detached signature '{LEGACY_SIGNATURE_FILE}' is present and is ignored."
        ));
    }
    if !manifest.is_signed() {
        findings.warning("Bundle is not signed (missing 'bundleSignature' in manifest).");
    }

    let report = findings.finish();
    debug!(
        errors = report.summary.errors,
        warnings = report.summary.warnings,
        "validation finished"
    );
    (report, Some(manifest))
}

#[derive(Default)]
struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Findings {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn check_checksum(&mut self, file: &Path, path: &str, expected: &str) {
        match hash_file(file) {
            Ok(actual) if actual == expected => {}
            Ok(_) => self.error(format!("Checksum mismatch for {path}")),
            Err(e) => self.error(format!("Could not read {path}: {e}")),
        }
    }

    fn finish(self) -> ValidationReport {
        let status = if self.errors.is_empty() {
            ValidationStatus::Passed
        } else {
            ValidationStatus::Failed
        };
        ValidationReport {
            summary: ValidationSummary {
                errors: self.errors.len(),
                warnings: self.warnings.len(),
            },
            errors: self.errors,
            warnings: self.warnings,
            status,
        }
    }
}
