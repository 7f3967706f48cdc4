use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

const APP_DIR_NAME: &str = "InterfaceOficial";
const BOOTSTRAP_FILE: &str = "launcher_bootstrap.json";

/// Overrides every other way of choosing the data directory.
pub const DATA_DIR_ENV: &str = "INTERFACE_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BootstrapConfig {
    data_dir: PathBuf,
}

/// Layout of the launcher data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPaths {
    data_dir: PathBuf,
}

impl LauncherPaths {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.data_dir.join("instances")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.data_dir.join("versions")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }

    /// Cached loader installers, keyed by loader and version.
    pub fn loaders_dir(&self) -> PathBuf {
        self.data_dir.join("loaders")
    }

    pub fn content_cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache").join("content")
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("catalog.json")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("launcher_settings.json")
    }
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `INTERFACE_DATA_DIR`, else the bootstrap redirect, else
/// `<platform data dir>/InterfaceOficial`.
pub fn resolve_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        debug!("Data dir from {}: {:?}", DATA_DIR_ENV, dir);
        return PathBuf::from(dir);
    }

    let base = default_base_dir();
    let bootstrap_path = base.join(BOOTSTRAP_FILE);
    if let Ok(raw) = std::fs::read_to_string(&bootstrap_path) {
        if let Ok(cfg) = serde_json::from_str::<BootstrapConfig>(&raw) {
            debug!("Data dir from bootstrap file: {:?}", cfg.data_dir);
            return cfg.data_dir;
        }
    }

    base.join(APP_DIR_NAME)
}
