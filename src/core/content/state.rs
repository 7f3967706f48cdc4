// ─── Content state ───
// Per-instance document in the settings store holding the enabled flags and
// the last resolution of every catalog entry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::placement::cache_path;
use crate::core::catalog::{Catalog, CatalogEntry, ContentKind};
use crate::core::error::LauncherResult;
use crate::core::registry::ResolvedFile;
use crate::core::store::SettingsStore;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Ok,
    Unavailable,
    Error,
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactStatus::Ok => write!(f, "ok"),
            ArtifactStatus::Unavailable => write!(f, "unavailable"),
            ArtifactStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of resolving one entry for one game version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedArtifact {
    pub status: ArtifactStatus,
    pub game_version: String,
    #[serde(default)]
    pub loader: Option<String>,
    #[serde(default)]
    pub upstream_version_label: Option<String>,
    #[serde(default)]
    pub upstream_file_name: Option<String>,
    /// May carry `.disabled`.
    #[serde(default)]
    pub placed_file_name: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub sha512: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub last_checked_at: DateTime<Utc>,
    /// Required upstream dependency projects of the resolved version.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl ResolvedArtifact {
    fn empty(status: ArtifactStatus, game_version: &str, loader: Option<&str>) -> Self {
        Self {
            status,
            game_version: game_version.to_string(),
            loader: loader.map(str::to_string),
            upstream_version_label: None,
            upstream_file_name: None,
            placed_file_name: None,
            download_url: None,
            sha1: None,
            sha512: None,
            error: None,
            last_checked_at: Utc::now(),
            dependencies: Vec::new(),
        }
    }

    pub fn resolved(
        file: &ResolvedFile,
        game_version: &str,
        loader: Option<&str>,
        placed_file_name: String,
    ) -> Self {
        Self {
            upstream_version_label: Some(file.version_number.clone()),
            upstream_file_name: Some(file.file_name.clone()),
            placed_file_name: Some(placed_file_name),
            download_url: Some(file.url.clone()),
            sha1: file.sha1.clone(),
            sha512: file.sha512.clone(),
            dependencies: file.dependencies.clone(),
            ..Self::empty(ArtifactStatus::Ok, game_version, loader)
        }
    }

    pub fn unavailable(game_version: &str, loader: Option<&str>) -> Self {
        Self::empty(ArtifactStatus::Unavailable, game_version, loader)
    }

    pub fn failed(game_version: &str, loader: Option<&str>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(ArtifactStatus::Error, game_version, loader)
        }
    }

    /// Disabled form of a record. Upstream metadata is kept so the cached
    /// file can be restored on enable.
    pub fn tombstone(&self, placed_file_name: Option<String>) -> Self {
        Self {
            status: ArtifactStatus::Unavailable,
            placed_file_name,
            error: None,
            last_checked_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn revived(&self, placed_file_name: String) -> Self {
        Self {
            status: ArtifactStatus::Ok,
            placed_file_name: Some(placed_file_name),
            error: None,
            last_checked_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ArtifactStatus::Ok
    }

    /// Cache location this record's bytes were stored under, if it names a file.
    pub fn cache_path(&self, cache_root: &Path, kind: ContentKind, placement_id: &str) -> Option<PathBuf> {
        let upstream = self.upstream_file_name.as_deref()?;
        Some(cache_path(cache_root, kind, placement_id, upstream, self.sha1.as_deref()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContentState {
    #[serde(default)]
    pub enabled: BTreeMap<ContentKind, BTreeMap<String, bool>>,
    #[serde(default)]
    pub resolved: BTreeMap<ContentKind, BTreeMap<String, ResolvedArtifact>>,
    /// Auto-installed dependencies keyed by upstream project id.
    #[serde(default)]
    pub dependencies: BTreeMap<String, ResolvedArtifact>,
}

pub fn state_key(instance_id: &str) -> String {
    format!("instances/{instance_id}/content-state")
}

impl ContentState {
    pub async fn load(store: &SettingsStore, instance_id: &str) -> LauncherResult<Self> {
        store.read_or_default(&state_key(instance_id)).await
    }

    pub async fn save(&self, store: &SettingsStore, instance_id: &str) -> LauncherResult<()> {
        store.write(&state_key(instance_id), self).await
    }

    /// Required entries are always enabled; unset flags fall back to the
    /// catalog default.
    pub fn is_enabled(&self, entry: &CatalogEntry) -> bool {
        entry.required
            || self
                .enabled
                .get(&entry.kind)
                .and_then(|flags| flags.get(&entry.id))
                .copied()
                .unwrap_or(entry.default_enabled)
    }

    pub fn set_flag(&mut self, kind: ContentKind, id: &str, enabled: bool) {
        self.enabled.entry(kind).or_default().insert(id.to_string(), enabled);
    }

    pub fn resolved(&self, kind: ContentKind, id: &str) -> Option<&ResolvedArtifact> {
        self.resolved.get(&kind).and_then(|records| records.get(id))
    }

    pub fn set_resolved(&mut self, kind: ContentKind, id: &str, artifact: ResolvedArtifact) {
        self.resolved.entry(kind).or_default().insert(id.to_string(), artifact);
    }

    /// Effective flag of every catalog entry of `kind`.
    pub fn effective_flags(&self, catalog: &Catalog, kind: ContentKind) -> BTreeMap<String, bool> {
        catalog
            .entries_of(kind)
            .map(|entry| (entry.id.clone(), self.is_enabled(entry)))
            .collect()
    }

    /// Replace the flags of `kind` wholesale.
    pub fn replace_flags(&mut self, kind: ContentKind, flags: BTreeMap<String, bool>) {
        self.enabled.insert(kind, flags);
    }
}
