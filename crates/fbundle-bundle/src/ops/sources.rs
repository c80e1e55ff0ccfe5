use super::metadata::extract_plugin_source;
use super::{SourceComparison, SourceFileDiff};
use crate::BundleResult;
use crate::archive::entry_name;
use similar::TextDiff;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::info;
use walkdir::WalkDir;

/// Compare the source distribution of one plugin across two bundles.
///
/// Files are matched by their path inside the source archive. Text files
/// that differ carry a unified diff; other files only a one-line note.
pub fn compare_plugin_sources(a: &Path, b: &Path, plugin: &str) -> BundleResult<SourceComparison> {
    info!(a = %a.display(), b = %b.display(), plugin, "comparing plugin sources");

    let work_a = tempfile::Builder::new().prefix("fbundle_src_a_").tempdir()?;
    let work_b = tempfile::Builder::new().prefix("fbundle_src_b_").tempdir()?;
    let root_a = extract_plugin_source(a, plugin, work_a.path())?;
    let root_b = extract_plugin_source(b, plugin, work_b.path())?;

    let files_a = source_files(&root_a)?;
    let files_b = source_files(&root_b)?;

    let mut modified_files = Vec::new();
    for path in files_a.intersection(&files_b) {
        let before = fs::read(root_a.join(path))?;
        let after = fs::read(root_b.join(path))?;
        if before != after {
            modified_files.push(SourceFileDiff {
                path: path.clone(),
                diff: file_diff(path, &before, &after),
            });
        }
    }

    Ok(SourceComparison {
        added_files: files_b.difference(&files_a).cloned().collect(),
        removed_files: files_a.difference(&files_b).cloned().collect(),
        modified_files,
    })
}

fn source_files(root: &Path) -> BundleResult<BTreeSet<String>> {
    let mut files = BTreeSet::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            files.insert(entry_name(root, entry.path())?);
        }
    }
    Ok(files)
}

fn file_diff(path: &str, before: &[u8], after: &[u8]) -> String {
    match (std::str::from_utf8(before), std::str::from_utf8(after)) {
        (Ok(before), Ok(after)) => {
            let from = format!("a/{path}");
            let to = format!("b/{path}");
            TextDiff::from_lines(before, after)
                .unified_diff()
                .header(&from, &to)
                .to_string()
        }
        _ => format!("Binary files a/{path} and b/{path} differ\n"),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn file_diff___text_change___is_unified_diff_with_prefixed_headers() {
        let diff = file_diff("src/mix.cpp", b"int a;\nint b;\n", b"int a;\nint c;\n");

        assert!(diff.starts_with("--- a/src/mix.cpp\n+++ b/src/mix.cpp\n"));
        assert!(diff.contains("-int b;\n"));
        assert!(diff.contains("+int c;\n"));
    }

    #[test]
    fn file_diff___non_utf8_content___is_binary_note() {
        let diff = file_diff("data.bin", &[0xff, 0x00], &[0xfe, 0x00]);

        assert_eq!(diff, "Binary files a/data.bin and b/data.bin differ\n");
    }
}
