use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::catalog::ContentKind;
use crate::core::content::ResolvedArtifact;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs::write_atomic;
use crate::core::instance::{InstanceConfig, LoaderType};

pub const SCHEMA_VERSION: u32 = 1;

/// Instance configuration as recorded in a lockfile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LockfileInstance {
    pub game_version: String,
    pub loader: LoaderType,
    #[serde(default)]
    pub loader_version: Option<String>,
    pub min_memory_mb: u32,
    pub max_memory_mb: u32,
    #[serde(default)]
    pub jvm_args: Vec<String>,
    #[serde(default)]
    pub preset_id: Option<String>,
}

impl From<&InstanceConfig> for LockfileInstance {
    fn from(config: &InstanceConfig) -> Self {
        Self {
            game_version: config.minecraft_version.clone(),
            loader: config.loader,
            loader_version: config.loader_version.clone(),
            min_memory_mb: config.min_memory_mb,
            max_memory_mb: config.max_memory_mb,
            jvm_args: config.jvm_args.clone(),
            preset_id: config.preset_id.clone(),
        }
    }
}

impl LockfileInstance {
    pub fn to_config(&self) -> InstanceConfig {
        InstanceConfig {
            minecraft_version: self.game_version.clone(),
            loader: self.loader,
            loader_version: self.loader_version.clone(),
            min_memory_mb: self.min_memory_mb,
            max_memory_mb: self.max_memory_mb,
            jvm_args: self.jvm_args.clone(),
            preset_id: self.preset_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LockfileArtifactEntry {
    /// Catalog id, or `dep-{project}` for auto-installed dependencies.
    pub id: String,
    pub category: ContentKind,
    pub required: bool,
    pub enabled: bool,
    #[serde(default)]
    pub dependency: bool,
    #[serde(flatten)]
    pub artifact: ResolvedArtifact,
}

impl LockfileArtifactEntry {
    /// Entries whose bytes the lockfile promises to be on disk.
    pub fn is_expected_on_disk(&self) -> bool {
        self.enabled && self.artifact.is_ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceLockfile {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub instance: LockfileInstance,
    #[serde(default)]
    pub artifacts: Vec<LockfileArtifactEntry>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl InstanceLockfile {
    pub fn check_schema(&self) -> LauncherResult<()> {
        check_schema_version(self.schema_version)
    }

    /// Parse a lockfile, rejecting unknown schema versions before looking at
    /// anything else in the document.
    pub fn from_json(raw: &str) -> LauncherResult<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let found = value
            .get("schemaVersion")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        check_schema_version(u32::try_from(found).unwrap_or(u32::MAX))?;
        Ok(serde_json::from_value(value)?)
    }

    /// `Ok(None)` when no lockfile has been written yet.
    pub async fn read(path: &Path) -> LauncherResult<Option<Self>> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Self::from_json(&raw).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LauncherError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    pub async fn write(&self, path: &Path) -> LauncherResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json).await
    }

    pub fn entry(&self, category: ContentKind, id: &str) -> Option<&LockfileArtifactEntry> {
        self.artifacts
            .iter()
            .find(|e| e.category == category && e.id == id)
    }
}

fn check_schema_version(found: u32) -> LauncherResult<()> {
    if found == SCHEMA_VERSION {
        Ok(())
    } else {
        Err(LauncherError::LockfileSchema {
            found,
            expected: SCHEMA_VERSION,
        })
    }
}
