// ─── Settings Store ───
// Key/value store of JSON documents addressed by a relative path
// (`instances/<id>/content-state` → `<root>/instances/<id>/content-state.json`).
//
// Documents are read-modify-write; callers that mutate the same instance's
// documents serialize through `InstanceLocks`.

use std::path::{Component, Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs::{remove_file_if_exists, write_atomic};

#[derive(Debug, Clone)]
pub struct SettingsStore {
    root: PathBuf,
}

impl SettingsStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, key: &str) -> LauncherResult<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(LauncherError::Other(format!("Invalid store key '{key}'")));
        }
        Ok(self.root.join(format!("{key}.json")))
    }

    /// Read a document. A missing document is `Ok(None)`.
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> LauncherResult<Option<T>> {
        let path = self.document_path(key)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LauncherError::Io { path, source: e }),
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Corrupt store document {:?}: {}", path, e);
                Err(e.into())
            }
        }
    }

    pub async fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> LauncherResult<T> {
        Ok(self.read(key).await?.unwrap_or_default())
    }

    pub async fn write<T: Serialize>(&self, key: &str, value: &T) -> LauncherResult<()> {
        let path = self.document_path(key)?;
        let json = serde_json::to_vec_pretty(value)?;
        write_atomic(&path, &json).await
    }

    pub async fn remove(&self, key: &str) -> LauncherResult<()> {
        let path = self.document_path(key)?;
        remove_file_if_exists(&path).await.map(|_| ())
    }
}
