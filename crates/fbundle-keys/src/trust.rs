//! Local store of trusted public keys, grouped by source.
//!
//! Each subdirectory of the store root is one source: `manual` for keys the
//! user added by hand, otherwise the name of a remote source whose checkout
//! lives there. Any `*.pem` or `*.pub` file inside a source is a trusted key.

use crate::{KeyError, KeyResult, PublicKey};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Source holding keys added by hand.
pub const MANUAL_SOURCE: &str = "manual";

/// One trusted key file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStoreEntry {
    pub source: String,
    pub path: PathBuf,
    pub fingerprint: String,
}

impl TrustStoreEntry {
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

/// Result of adding a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// An identical file was already present; nothing changed.
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedKey {
    pub outcome: AddOutcome,
    pub entry: TrustStoreEntry,
}

/// The trust store rooted at a directory.
#[derive(Debug, Clone)]
pub struct TrustStore {
    root: PathBuf,
}

impl TrustStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn source_dir(&self, source: &str) -> PathBuf {
        self.root.join(source)
    }

    /// Source names in sorted order.
    pub fn sources(&self) -> KeyResult<Vec<String>> {
        let mut sources: Vec<String> = sorted_dir_entries(&self.root)?
            .into_iter()
            .filter(|path| path.is_dir())
            .filter_map(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(str::to_string)
            })
            .collect();
        sources.sort();
        Ok(sources)
    }

    /// Every parseable key file, sorted by source then file name.
    ///
    /// Files that cannot be parsed as public keys are skipped with a warning.
    pub fn list_trusted(&self) -> KeyResult<Vec<TrustStoreEntry>> {
        let mut entries = Vec::new();

        for source in self.sources()? {
            for path in sorted_dir_entries(&self.source_dir(&source))? {
                if !path.is_file() || !is_key_file(&path) {
                    continue;
                }
                match PublicKey::from_file(&path).and_then(|key| key.fingerprint()) {
                    Ok(fingerprint) => entries.push(TrustStoreEntry {
                        source: source.clone(),
                        path,
                        fingerprint,
                    }),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable trusted key");
                    }
                }
            }
        }

        Ok(entries)
    }

    /// First entry, in listing order, whose fingerprint matches.
    pub fn find_by_fingerprint(&self, fingerprint: &str) -> KeyResult<TrustStoreEntry> {
        self.list_trusted()?
            .into_iter()
            .find(|entry| entry.fingerprint == fingerprint)
            .ok_or_else(|| KeyError::KeyNotFound(fingerprint.to_string()))
    }

    pub fn load_public_key(&self, entry: &TrustStoreEntry) -> KeyResult<PublicKey> {
        PublicKey::from_file(&entry.path)
    }

    /// Store `key_bytes` as `file_name` in `source`.
    ///
    /// The key must parse. Adding identical bytes under an existing name is a
    /// no-op; different bytes under an existing name is a conflict.
    pub fn add(&self, source: &str, file_name: &str, key_bytes: &[u8]) -> KeyResult<AddedKey> {
        validate_component(source, "source name")?;
        validate_component(file_name, "key file name")?;
        let destination = self.source_dir(source).join(file_name);
        if !is_key_file(&destination) {
            return Err(KeyError::UnsupportedKey(format!(
                "key file name must end in .pem or .pub: {file_name}"
            )));
        }

        let fingerprint = PublicKey::from_bytes(key_bytes)?.fingerprint()?;
        let entry = TrustStoreEntry {
            source: source.to_string(),
            path: destination.clone(),
            fingerprint,
        };

        match fs::read(&destination) {
            Ok(existing) if existing == key_bytes => {
                debug!(path = %destination.display(), "key already trusted");
                return Ok(AddedKey {
                    outcome: AddOutcome::AlreadyPresent,
                    entry,
                });
            }
            Ok(_) => {
                return Err(KeyError::Conflict(format!(
                    "a different key named '{file_name}' already exists in source '{source}'"
                )));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        fs::create_dir_all(self.source_dir(source))?;
        fs::write(&destination, key_bytes)?;
        info!(source, fingerprint = %entry.fingerprint, path = %destination.display(), "trusted key added");

        Ok(AddedKey {
            outcome: AddOutcome::Added,
            entry,
        })
    }

    /// Copy a key file into the manual source under its own file name.
    pub fn add_file(&self, path: &Path) -> KeyResult<AddedKey> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| KeyError::UnsupportedKey(format!("invalid key path: {}", path.display())))?;
        let key_bytes = fs::read(path)?;
        self.add(MANUAL_SOURCE, file_name, &key_bytes)
    }

    /// Remove manual keys matching a fingerprint, file name or path.
    ///
    /// Returns the removed entries; nothing matching is [`KeyError::KeyNotFound`].
    pub fn remove(&self, identifier: &str) -> KeyResult<Vec<TrustStoreEntry>> {
        let identifier_path = Path::new(identifier);
        let matches: Vec<TrustStoreEntry> = self
            .list_trusted()?
            .into_iter()
            .filter(|entry| entry.source == MANUAL_SOURCE)
            .filter(|entry| {
                entry.fingerprint == identifier
                    || entry.file_name() == identifier
                    || entry.path == identifier_path
            })
            .collect();

        if matches.is_empty() {
            return Err(KeyError::KeyNotFound(identifier.to_string()));
        }

        for entry in &matches {
            fs::remove_file(&entry.path)?;
            info!(fingerprint = %entry.fingerprint, path = %entry.path.display(), "trusted key removed");
        }
        Ok(matches)
    }
}

fn is_key_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "pem" || ext == "pub")
}

/// Paths directly inside `dir`, sorted; a missing directory is empty.
fn sorted_dir_entries(dir: &Path) -> KeyResult<Vec<PathBuf>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut paths = read_dir
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

fn validate_component(value: &str, what: &str) -> KeyResult<()> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(KeyError::UnsupportedKey(format!("invalid {what}: '{value}'")));
    }
    Ok(())
}

#[cfg(test)]
#[path = "trust/trust_tests.rs"]
mod trust_tests;
