use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::core::catalog::ContentKind;

/// Supported mod loaders — strongly typed, no magic strings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoaderType {
    Vanilla,
    Forge,
    Fabric,
    NeoForge,
    Quilt,
}

impl LoaderType {
    /// Loaders that run third-party code (mods) at all.
    pub fn is_code_loader(self) -> bool {
        !matches!(self, LoaderType::Vanilla)
    }

    /// Tag used by the content registry's `loaders` filter.
    pub fn registry_tag(self) -> Option<&'static str> {
        match self {
            LoaderType::Vanilla => None,
            LoaderType::Forge => Some("forge"),
            LoaderType::Fabric => Some("fabric"),
            LoaderType::NeoForge => Some("neoforge"),
            LoaderType::Quilt => Some("quilt"),
        }
    }
}

impl std::fmt::Display for LoaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderType::Vanilla => write!(f, "vanilla"),
            LoaderType::Forge => write!(f, "forge"),
            LoaderType::Fabric => write!(f, "fabric"),
            LoaderType::NeoForge => write!(f, "neoforge"),
            LoaderType::Quilt => write!(f, "quilt"),
        }
    }
}

impl std::str::FromStr for LoaderType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "vanilla" => Ok(LoaderType::Vanilla),
            "forge" => Ok(LoaderType::Forge),
            "fabric" => Ok(LoaderType::Fabric),
            "neoforge" => Ok(LoaderType::NeoForge),
            "quilt" => Ok(LoaderType::Quilt),
            other => Err(format!("unknown loader '{other}'")),
        }
    }
}

/// External commands run around the game process.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchHooks {
    /// Non-zero exit aborts the launch.
    #[serde(default)]
    pub pre_launch: Option<String>,
    /// Failures are logged only.
    #[serde(default)]
    pub post_exit: Option<String>,
}

/// The user-editable part of an instance. Captured by rollback snapshots and
/// lockfiles, written back verbatim on restore/apply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceConfig {
    pub minecraft_version: String,
    pub loader: LoaderType,
    pub loader_version: Option<String>,
    pub min_memory_mb: u32,
    pub max_memory_mb: u32,
    #[serde(default)]
    pub jvm_args: Vec<String>,
    #[serde(default)]
    pub preset_id: Option<String>,
}

/// Full instance representation persisted to disk as `instance.json`.
///
/// Each instance has its own folder under `instances/<uuid>/` with:
/// - `minecraft/`             — game working directory
/// - `minecraft/mods/`        — placed mod files
/// - `minecraft/resourcepacks/`, `minecraft/shaderpacks/`
/// - `instance.json`          — this serialized struct
/// - `instance.lock.json`     — lockfile, when generated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub minecraft_version: String,
    pub loader: LoaderType,
    pub loader_version: Option<String>,
    pub java_path: Option<PathBuf>,
    pub min_memory_mb: u32,
    pub max_memory_mb: u32,
    /// Extra JVM arguments configured on the instance.
    #[serde(default)]
    pub jvm_args: Vec<String>,
    #[serde(default)]
    pub preset_id: Option<String>,
    #[serde(default)]
    pub hooks: LaunchHooks,
    pub created_at: DateTime<Utc>,
    pub last_played: Option<DateTime<Utc>>,
}

impl Instance {
    /// Create a new instance with initial state.
    pub fn new(
        name: String,
        minecraft_version: String,
        loader: LoaderType,
        loader_version: Option<String>,
        max_memory_mb: u32,
        base_dir: &std::path::Path,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let instance_dir = base_dir.join(&id);

        Self {
            id,
            name,
            path: instance_dir,
            minecraft_version,
            loader,
            loader_version,
            java_path: None,
            min_memory_mb: 512,
            max_memory_mb,
            jvm_args: Vec::new(),
            preset_id: None,
            hooks: LaunchHooks::default(),
            created_at: Utc::now(),
            last_played: None,
        }
    }

    pub fn config(&self) -> InstanceConfig {
        InstanceConfig {
            minecraft_version: self.minecraft_version.clone(),
            loader: self.loader,
            loader_version: self.loader_version.clone(),
            min_memory_mb: self.min_memory_mb,
            max_memory_mb: self.max_memory_mb,
            jvm_args: self.jvm_args.clone(),
            preset_id: self.preset_id.clone(),
        }
    }

    pub fn apply_config(&mut self, config: &InstanceConfig) {
        self.minecraft_version = config.minecraft_version.clone();
        self.loader = config.loader;
        self.loader_version = config.loader_version.clone();
        self.min_memory_mb = config.min_memory_mb;
        self.max_memory_mb = config.max_memory_mb;
        self.jvm_args = config.jvm_args.clone();
        self.preset_id = config.preset_id.clone();
    }

    /// Path to the instance's `minecraft/` game working directory.
    pub fn game_dir(&self) -> PathBuf {
        self.path.join("minecraft")
    }

    /// Directory holding placed files of one content kind.
    pub fn content_dir(&self, kind: ContentKind) -> PathBuf {
        self.game_dir().join(kind.dir_name())
    }

    /// Path to the `natives` folder (extracted per launch session).
    pub fn natives_dir(&self) -> PathBuf {
        self.path.join("natives")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.path.join("logs")
    }

    /// Path to this instance's config file.
    pub fn config_path(&self) -> PathBuf {
        self.path.join("instance.json")
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.path.join("instance.lock.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_apply() {
        let mut instance = Instance::new(
            "test".into(),
            "1.20.1".into(),
            LoaderType::Fabric,
            Some("0.15.11".into()),
            4096,
            std::path::Path::new("/tmp"),
        );
        let mut config = instance.config();
        config.minecraft_version = "1.21.1".into();
        config.preset_id = Some("shaders".into());

        instance.apply_config(&config);
        assert_eq!(instance.config(), config);
    }

    #[test]
    fn content_dirs_live_under_the_game_dir() {
        let mut instance = Instance::new(
            "test".into(),
            "1.20.1".into(),
            LoaderType::Vanilla,
            None,
            2048,
            std::path::Path::new("/tmp"),
        );
        instance.path = PathBuf::from("/tmp/inst");
        assert_eq!(
            instance.content_dir(ContentKind::ResourcePack),
            PathBuf::from("/tmp/inst/minecraft/resourcepacks")
        );
    }

    #[test]
    fn loader_parses_case_insensitively() {
        assert_eq!("NeoForge".parse::<LoaderType>().unwrap(), LoaderType::NeoForge);
        assert!("liteloader".parse::<LoaderType>().is_err());
        assert_eq!(LoaderType::Vanilla.registry_tag(), None);
    }
}
