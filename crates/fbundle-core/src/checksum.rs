//! Streaming content checksums and the canonical checksum list.
//!
//! Every checksum is `sha256:` followed by the lowercase hex digest of the
//! raw bytes. The canonical checksum list is the byte string a bundle
//! signature is computed over: one `path:checksum` line per file, sorted by
//! path, joined with `\n` and without a trailing newline.

use crate::{CoreError, CoreResult, SHA256_PREFIX};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

/// Block size used when streaming files through the hasher.
pub const HASH_BLOCK_SIZE: usize = 4096;

/// Compute the checksum of an in-memory byte slice.
#[must_use]
pub fn checksum_of_bytes(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("{SHA256_PREFIX}{}", hex::encode(digest))
}

/// Compute the checksum of everything a reader yields, `block_size` bytes at a time.
///
/// The result does not depend on the block size.
pub fn hash_reader<R: Read>(mut reader: R, block_size: usize) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; block_size.max(1)];

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{SHA256_PREFIX}{}", hex::encode(hasher.finalize())))
}

/// Compute the checksum of a file without reading it fully into memory.
pub fn hash_file<P: AsRef<Path>>(path: P) -> CoreResult<String> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            CoreError::MissingFile(path.display().to_string())
        } else {
            CoreError::Io(e)
        }
    })?;

    Ok(hash_reader(file, HASH_BLOCK_SIZE)?)
}

/// Whether a string is a well-formed `sha256:<64 lowercase hex>` checksum.
#[must_use]
pub fn is_checksum(value: &str) -> bool {
    value.strip_prefix(SHA256_PREFIX).is_some_and(|digest| {
        digest.len() == 64
            && digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    })
}

/// Join a bundle-relative path onto `base_dir`, refusing anything that could
/// reach outside it.
///
/// The path must be non-empty, relative and free of `..` components, and no
/// existing component below `base_dir` may be a symbolic link. Otherwise the
/// result is [`CoreError::UnsafePath`].
pub fn resolve_within(base_dir: &Path, relative: &str) -> CoreResult<PathBuf> {
    let unsafe_path = || CoreError::UnsafePath(relative.to_string());
    let mut resolved = base_dir.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
                if fs::symlink_metadata(&resolved).is_ok_and(|m| m.file_type().is_symlink()) {
                    return Err(unsafe_path());
                }
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path());
            }
        }
    }

    if depth == 0 {
        return Err(unsafe_path());
    }
    Ok(resolved)
}

/// Sorted `(path, checksum)` pairs forming the signing payload of a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalChecksumList {
    entries: BTreeMap<String, String>,
}

impl CanonicalChecksumList {
    /// Hash every referenced file under `base_dir`.
    ///
    /// Fails with [`CoreError::MissingFile`] naming the relative path of the
    /// first file that is not present, or [`CoreError::UnsafePath`] for a path
    /// that [`resolve_within`] refuses.
    pub fn from_disk<I, S>(paths: I, base_dir: &Path) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = BTreeMap::new();
        for path in paths {
            let path = path.as_ref();
            let full_path = resolve_within(base_dir, path)?;
            if !full_path.is_file() {
                return Err(CoreError::MissingFile(path.to_string()));
            }
            let checksum = hash_file(&full_path)?;
            entries.insert(path.to_string(), checksum);
        }

        Ok(Self { entries })
    }

    /// Build a list from already known `(path, checksum)` pairs.
    pub fn from_recorded<I, P, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(path, checksum)| (path.into(), checksum.into()))
                .collect(),
        }
    }

    /// Checksum recorded for a path.
    #[must_use]
    pub fn checksum(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Iterate over `(path, checksum)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(path, checksum)| (path.as_str(), checksum.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `path:checksum` lines joined with `\n`.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.iter()
            .map(|(path, checksum)| format!("{path}:{checksum}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// UTF-8 bytes of [`Self::to_text`], the exact payload that gets signed.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_text().into_bytes()
    }
}
