//! Named remote key sources.
//!
//! Only the list of sources is managed here; fetching a source into the
//! trust store is done by an external sync step that checks the repository
//! out into `<trust store>/<name>`.

use crate::{KeyError, KeyResult, MANUAL_SOURCE, TrustStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// A git repository of public keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSource {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RemotesFile {
    #[serde(default)]
    remotes: Vec<RemoteSource>,
}

/// The `key_remotes.json` config file.
#[derive(Debug, Clone)]
pub struct RemoteSources {
    config_path: PathBuf,
}

impl RemoteSources {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn list(&self) -> KeyResult<Vec<RemoteSource>> {
        Ok(self.read()?.remotes)
    }

    /// Register a new remote. A duplicate name is a conflict.
    pub fn add(&self, name: &str, url: &str) -> KeyResult<RemoteSource> {
        validate_name(name)?;
        if url.trim().is_empty() {
            return Err(KeyError::InvalidRemote(format!(
                "remote '{name}' needs a URL"
            )));
        }

        let mut file = self.read()?;
        if file.remotes.iter().any(|remote| remote.name == name) {
            return Err(KeyError::Conflict(format!(
                "remote source '{name}' already exists"
            )));
        }

        let remote = RemoteSource {
            name: name.to_string(),
            url: url.trim().to_string(),
        };
        file.remotes.push(remote.clone());
        self.write(&file)?;
        info!(name, url = %remote.url, "remote key source added");
        Ok(remote)
    }

    /// Forget a remote and delete its checkout from the trust store.
    pub fn remove(&self, name: &str, trust_store: &TrustStore) -> KeyResult<RemoteSource> {
        let mut file = self.read()?;
        let position = file
            .remotes
            .iter()
            .position(|remote| remote.name == name)
            .ok_or_else(|| KeyError::InvalidRemote(format!("no remote source named '{name}'")))?;
        let removed = file.remotes.remove(position);
        self.write(&file)?;

        if validate_name(name).is_ok() {
            match fs::remove_dir_all(trust_store.source_dir(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(name, "remote key source removed");
        Ok(removed)
    }

    fn read(&self) -> KeyResult<RemotesFile> {
        match fs::read(&self.config_path) {
            Ok(contents) => Ok(serde_json::from_slice(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(RemotesFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, file: &RemotesFile) -> KeyResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.config_path, serde_json::to_vec_pretty(file)?)?;
        Ok(())
    }
}

fn validate_name(name: &str) -> KeyResult<()> {
    if name.is_empty()
        || name == MANUAL_SOURCE
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
    {
        return Err(KeyError::InvalidRemote(format!(
            "'{name}' cannot be used as a remote source name"
        )));
    }
    Ok(())
}
