use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::LauncherResult;
use crate::core::fs::write_atomic;
use crate::core::loaders::meta_json::{FABRIC_META_BASE, QUILT_META_BASE};
use crate::core::loaders::LoaderEndpoints;
use crate::core::maven::{FORGE_MAVEN, NEOFORGE_MAVEN};
use crate::core::registry::MODRINTH_API_BASE;
use crate::core::version::VERSION_MANIFEST_URL;

/// External runner that receives the launch descriptor on stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            program: "interface-runner".into(),
            args: Vec::new(),
        }
    }
}

/// `launcher_settings.json`; every field is optional on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    pub registry_base_url: String,
    pub fabric_meta_url: String,
    pub quilt_meta_url: String,
    pub forge_maven_url: String,
    pub neoforge_maven_url: String,
    pub version_manifest_url: String,
    pub supervisor: SupervisorSettings,
    pub connect_timeout_secs: Option<u64>,
    pub default_max_memory_mb: u32,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            registry_base_url: MODRINTH_API_BASE.into(),
            fabric_meta_url: FABRIC_META_BASE.into(),
            quilt_meta_url: QUILT_META_BASE.into(),
            forge_maven_url: FORGE_MAVEN.into(),
            neoforge_maven_url: NEOFORGE_MAVEN.into(),
            version_manifest_url: VERSION_MANIFEST_URL.into(),
            supervisor: SupervisorSettings::default(),
            connect_timeout_secs: Some(15),
            default_max_memory_mb: 4096,
        }
    }
}

impl LauncherSettings {
    /// Missing or unreadable settings fall back to the defaults.
    pub async fn load(path: &Path) -> Self {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring unreadable settings {:?}: {}", path, e);
            Self::default()
        })
    }

    pub async fn save(&self, path: &Path) -> LauncherResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json).await
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn loader_endpoints(&self) -> LoaderEndpoints {
        LoaderEndpoints {
            fabric_meta: self.fabric_meta_url.clone(),
            quilt_meta: self.quilt_meta_url.clone(),
            forge_maven: self.forge_maven_url.clone(),
            neoforge_maven: self.neoforge_maven_url.clone(),
            version_manifest: self.version_manifest_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn partial_settings_keep_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher_settings.json");
        tokio::fs::write(&path, r#"{"registry_base_url":"http://localhost:9000"}"#)
            .await
            .unwrap();

        let settings = LauncherSettings::load(&path).await;
        assert_eq!(settings.registry_base_url, "http://localhost:9000");
        assert_eq!(settings.default_max_memory_mb, 4096);
        assert_eq!(settings.loader_endpoints().forge_maven, FORGE_MAVEN);
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher_settings.json");
        let mut settings = LauncherSettings::default();
        settings.supervisor.program = "/usr/bin/runner".into();
        settings.save(&path).await.unwrap();
        assert_eq!(LauncherSettings::load(&path).await, settings);
    }
}
