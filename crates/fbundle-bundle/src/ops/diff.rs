use super::{DiffReport, FileChange, FileDiff, SignatureChange};
use crate::{BundleResult, MANIFEST_FILE, Manifest, read_manifest_text};
use similar::TextDiff;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// Compare the signatures, manifests and recorded file checksums of two bundles.
pub fn diff(a: &Path, b: &Path) -> BundleResult<DiffReport> {
    info!(a = %a.display(), b = %b.display(), "comparing bundles");

    let text_a = read_manifest_text(a)?;
    let text_b = read_manifest_text(b)?;
    let manifest_a = Manifest::parse(&text_a)?;
    let manifest_b = Manifest::parse(&text_b)?;

    let signature = match (&manifest_a.bundle_signature, &manifest_b.bundle_signature) {
        (Some(sig_a), Some(sig_b)) if sig_a == sig_b => SignatureChange::Unchanged,
        (Some(_), Some(_)) => SignatureChange::Changed,
        (Some(_), None) => SignatureChange::Removed,
        (None, Some(_)) => SignatureChange::Added,
        (None, None) => SignatureChange::Unsigned,
    };

    let manifest_diff = if text_a == text_b {
        String::new()
    } else {
        let from = format!("{}/{MANIFEST_FILE}", display_name(a));
        let to = format!("{}/{MANIFEST_FILE}", display_name(b));
        let lines = TextDiff::from_lines(&text_a, &text_b);
        lines.unified_diff().header(&from, &to).to_string()
    };

    Ok(DiffReport {
        signature,
        manifest_diff,
        files: file_changes(&manifest_a, &manifest_b),
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

fn file_changes(a: &Manifest, b: &Manifest) -> Vec<FileDiff> {
    let files_a = a.recorded_checksums();
    let files_b = b.recorded_checksums();
    let paths: BTreeSet<&str> = files_a.keys().chain(files_b.keys()).copied().collect();

    paths
        .into_iter()
        .filter_map(|path| {
            let (status, details) = match (files_a.get(path), files_b.get(path)) {
                (Some(_), None) => (FileChange::Removed, String::new()),
                (None, Some(_)) => (FileChange::Added, String::new()),
                (Some(before), Some(after)) if before != after => (
                    FileChange::Modified,
                    format!(
                        "Checksum changed from {} to {}",
                        before.unwrap_or("N/A"),
                        after.unwrap_or("N/A")
                    ),
                ),
                _ => return None,
            };
            Some(FileDiff {
                path: path.to_string(),
                status,
                details,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::write_archive;
    use std::fs;
    use tempfile::TempDir;

    fn bundle(dir: &Path, name: &str, manifest: &str) -> std::path::PathBuf {
        let content = TempDir::new().unwrap();
        fs::write(content.path().join(MANIFEST_FILE), manifest).unwrap();
        let path = dir.join(name);
        write_archive(content.path(), &path).unwrap();
        path
    }

    const BASE: &str = "bundleName: demo\nbundleVersion: 1.0.0\nbundlePlugins:\n  demo:\n    sdist:\n      path: demo_src.zip\n      checksum: sha256:aa\n    binaries:\n      - platform: {triplet: x86_64-linux, abi_signature: gcc-libstdc++-2.39-cxx11_abi}\n        path: bin/a.so\n        checksum: sha256:bb\n";

    #[test]
    fn diff___same_unsigned_bundle___reports_nothing() {
        let dir = TempDir::new().unwrap();
        let a = bundle(dir.path(), "a.fbundle", BASE);

        let report = diff(&a, &a).unwrap();

        assert_eq!(report.signature, SignatureChange::Unsigned);
        assert!(report.manifest_diff.is_empty());
        assert!(report.files.is_empty());
    }

    #[test]
    fn diff___changed_files___classifies_each_path() {
        let dir = TempDir::new().unwrap();
        let a = bundle(dir.path(), "a.fbundle", BASE);
        let changed = BASE
            .replace("checksum: sha256:aa", "checksum: sha256:cc")
            .replace("bin/a.so", "bin/b.so");
        let b = bundle(dir.path(), "b.fbundle", &changed);

        let report = diff(&a, &b).unwrap();

        let summary: Vec<(&str, FileChange)> = report
            .files
            .iter()
            .map(|f| (f.path.as_str(), f.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("bin/a.so", FileChange::Removed),
                ("bin/b.so", FileChange::Added),
                ("demo_src.zip", FileChange::Modified),
            ]
        );
        assert_eq!(
            report.files[2].details,
            "Checksum changed from sha256:aa to sha256:cc"
        );
        assert!(report.manifest_diff.contains("--- a.fbundle/manifest.yaml"));
        assert!(report.manifest_diff.contains("+++ b.fbundle/manifest.yaml"));
        assert!(report.manifest_diff.contains("+      checksum: sha256:cc"));
    }

    #[test]
    fn diff___signature_added___is_added() {
        let dir = TempDir::new().unwrap();
        let a = bundle(dir.path(), "a.fbundle", BASE);
        let signed = format!("{BASE}bundleSignature:\n  keyFingerprint: sha256:ff\n  signature: abcd\n");
        let b = bundle(dir.path(), "b.fbundle", &signed);

        assert_eq!(diff(&a, &b).unwrap().signature, SignatureChange::Added);
        assert_eq!(diff(&b, &a).unwrap().signature, SignatureChange::Removed);
        assert_eq!(diff(&b, &b).unwrap().signature, SignatureChange::Unchanged);
    }

    #[test]
    fn diff___checksum_dropped___reports_not_available() {
        let dir = TempDir::new().unwrap();
        let a = bundle(dir.path(), "a.fbundle", BASE);
        let b = bundle(
            dir.path(),
            "b.fbundle",
            &BASE.replace("        checksum: sha256:bb\n", ""),
        );

        let report = diff(&a, &b).unwrap();

        assert_eq!(report.files.len(), 1);
        assert_eq!(
            report.files[0].details,
            "Checksum changed from sha256:bb to N/A"
        );
    }
}
