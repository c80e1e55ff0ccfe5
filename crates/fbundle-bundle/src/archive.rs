//! Reading and atomically rewriting bundle archives.
//!
//! Every mutation follows the same pattern: [`StagedBundle::extract`] the
//! archive into a private temporary directory, change files there, then
//! [`StagedBundle::commit`] it. The archive is rezipped to a temporary file
//! next to the destination and only renamed over the original once the
//! rezip has fully succeeded.

use crate::{BundleError, BundleResult, MANIFEST_FILE, Manifest};
use fbundle_core::resolve_within;
use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// A bundle extracted into a temporary staging directory.
///
/// The staging directory is removed when the value is dropped.
#[derive(Debug)]
pub struct StagedBundle {
    dir: TempDir,
    source: PathBuf,
}

impl StagedBundle {
    /// Extract `bundle_path` into a fresh staging directory.
    pub fn extract(bundle_path: &Path) -> BundleResult<Self> {
        let mut archive = open_archive(bundle_path)?;
        let dir = tempfile::Builder::new().prefix("fbundle_").tempdir()?;
        archive.extract(dir.path())?;

        debug!(bundle = %bundle_path.display(), staging = %dir.path().display(), "bundle extracted");
        Ok(Self {
            dir,
            source: bundle_path.to_path_buf(),
        })
    }

    /// Root of the staging directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The bundle file this was extracted from.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.path().join(MANIFEST_FILE)
    }

    #[must_use]
    pub fn has_manifest(&self) -> bool {
        self.manifest_path().is_file()
    }

    /// Path of a bundle-relative file inside the staging directory.
    #[must_use]
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Path of a file named by the manifest, refusing paths that would leave
    /// the staging directory.
    pub fn resolve_entry(&self, relative: &str) -> BundleResult<PathBuf> {
        Ok(resolve_within(self.dir.path(), relative)?)
    }

    pub fn read_manifest_text(&self) -> BundleResult<String> {
        match std::fs::read_to_string(self.manifest_path()) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BundleError::Structural(
                format!("{MANIFEST_FILE} not found in bundle"),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub fn read_manifest(&self) -> BundleResult<Manifest> {
        Manifest::parse(&self.read_manifest_text()?)
    }

    pub fn write_manifest(&self, manifest: &Manifest) -> BundleResult<()> {
        std::fs::write(self.manifest_path(), manifest.to_yaml()?)?;
        Ok(())
    }

    /// Replace the source bundle with the staged contents.
    pub fn commit(self) -> BundleResult<()> {
        write_archive(self.dir.path(), &self.source)?;
        Ok(())
    }

    /// Write the staged contents to another bundle path.
    pub fn write_to(&self, output: &Path) -> BundleResult<()> {
        write_archive(self.dir.path(), output)?;
        Ok(())
    }
}

fn open_archive(bundle_path: &Path) -> BundleResult<ZipArchive<File>> {
    let file = File::open(bundle_path)?;
    ZipArchive::new(file).map_err(|e| {
        BundleError::Structural(format!(
            "'{}' is not a valid bundle archive: {e}",
            bundle_path.display()
        ))
    })
}

/// Zip every file under `dir` into `output`, atomically, returning the
/// number of files written.
///
/// Entry names are relative to `dir` with `/` separators and are written in
/// sorted order. `output` is only replaced after the archive is complete.
pub fn write_archive(dir: &Path, output: &Path) -> BundleResult<usize> {
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(parent)?;

    let files = zip_directory(dir, tmp.as_file_mut(), &[])?;

    tmp.as_file().sync_all()?;
    tmp.persist(output).map_err(|e| BundleError::Io(e.error))?;

    debug!(output = %output.display(), files, "bundle archive written");
    Ok(files)
}

/// Write every file under `dir` to a zip stream, leaving out directories
/// whose name is in `skip_dirs`. Returns the number of files written.
pub(crate) fn zip_directory<W: Write + Seek>(
    dir: &Path,
    writer: W,
    skip_dirs: &[&str],
) -> BundleResult<usize> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() > 0
                && entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| skip_dirs.contains(&name)))
        });

    let mut files = 0;
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry_name(dir, entry.path())?;

        zip.start_file(name, options)?;
        let mut file = File::open(entry.path())?;
        io::copy(&mut file, &mut zip)?;
        files += 1;
    }

    zip.finish()?;
    Ok(files)
}

/// Name of `path` relative to `root`, with `/` separators.
pub(crate) fn entry_name(root: &Path, path: &Path) -> io::Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|e| io::Error::other(e.to_string()))?;

    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

/// Read `manifest.yaml` straight out of a bundle without staging it.
pub fn read_manifest_text(bundle_path: &Path) -> BundleResult<String> {
    let mut archive = open_archive(bundle_path)?;
    let mut file = archive
        .by_name(MANIFEST_FILE)
        .map_err(|_| BundleError::Structural(format!("{MANIFEST_FILE} not found in bundle")))?;

    let mut text = String::new();
    file.read_to_string(&mut text)?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use std::fs;

    fn bundle_with(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
        let content = TempDir::new().unwrap();
        for (name, data) in files {
            let path = content.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, data).unwrap();
        }
        let output = dir.join("test.fbundle");
        write_archive(content.path(), &output).unwrap();
        output
    }

    #[test]
    fn write_archive___nested_files___uses_forward_slash_names() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle_with(
            dir.path(),
            &[("manifest.yaml", "bundleName: x\n"), ("bin/libx.so", "elf")],
        );

        let archive = ZipArchive::new(File::open(&bundle).unwrap()).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();

        assert_eq!(names, vec!["bin/libx.so", "manifest.yaml"]);
    }

    #[test]
    fn StagedBundle___extract_and_commit___persists_changes() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle_with(dir.path(), &[("manifest.yaml", "bundleName: before\n")]);

        let staged = StagedBundle::extract(&bundle).unwrap();
        fs::write(staged.manifest_path(), "bundleName: after\n").unwrap();
        staged.commit().unwrap();

        assert_eq!(read_manifest_text(&bundle).unwrap(), "bundleName: after\n");
    }

    #[test]
    fn StagedBundle___dropped_without_commit___leaves_original() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle_with(dir.path(), &[("manifest.yaml", "bundleName: before\n")]);
        let original = fs::read(&bundle).unwrap();

        let staging_path = {
            let staged = StagedBundle::extract(&bundle).unwrap();
            fs::write(staged.manifest_path(), "bundleName: after\n").unwrap();
            staged.path().to_path_buf()
        };

        assert_eq!(fs::read(&bundle).unwrap(), original);
        assert!(!staging_path.exists());
    }

    #[test]
    fn StagedBundle___not_a_zip___is_structural_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bogus.fbundle");
        fs::write(&path, b"definitely not a zip").unwrap();

        let result = StagedBundle::extract(&path);

        assert!(matches!(result, Err(BundleError::Structural(_))));
    }

    #[test]
    fn StagedBundle___no_manifest___read_is_structural_error() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle_with(dir.path(), &[("other.txt", "x")]);

        let staged = StagedBundle::extract(&bundle).unwrap();

        assert!(!staged.has_manifest());
        assert!(matches!(
            staged.read_manifest(),
            Err(BundleError::Structural(_))
        ));
    }

    #[test]
    fn read_manifest_text___missing_manifest___is_structural_error() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle_with(dir.path(), &[("other.txt", "x")]);

        assert!(matches!(
            read_manifest_text(&bundle),
            Err(BundleError::Structural(_))
        ));
    }

    #[test]
    fn zip_directory___skip_dirs___leaves_them_out() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("builddir")).unwrap();
        fs::write(dir.path().join("src/lib.cpp"), "int x;").unwrap();
        fs::write(dir.path().join("builddir/lib.o"), "obj").unwrap();
        let out_dir = TempDir::new().unwrap();
        let out = out_dir.path().join("out.zip");

        let written =
            zip_directory(dir.path(), File::create(&out).unwrap(), &["builddir"]).unwrap();

        assert_eq!(written, 1);
        let archive = ZipArchive::new(File::open(&out).unwrap()).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names, vec!["src/lib.cpp"]);
    }
}
