// ─── Content Catalog ───
// Static list of curated content the launcher knows how to install.
// Which entries exist is configuration, never derived at runtime.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::error::{LauncherError, LauncherResult};

/// Prefix reserved for auto-installed dependency files.
pub const DEPENDENCY_ID_PREFIX: &str = "dep-";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Mod,
    ResourcePack,
    ShaderPack,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [
        ContentKind::Mod,
        ContentKind::ResourcePack,
        ContentKind::ShaderPack,
    ];

    pub const PACKS: [ContentKind; 2] = [ContentKind::ResourcePack, ContentKind::ShaderPack];

    /// Directory name inside the game directory.
    pub fn dir_name(self) -> &'static str {
        match self {
            ContentKind::Mod => "mods",
            ContentKind::ResourcePack => "resourcepacks",
            ContentKind::ShaderPack => "shaderpacks",
        }
    }

    /// Extension used when the upstream filename carries none.
    pub fn default_extension(self) -> &'static str {
        match self {
            ContentKind::Mod => "jar",
            ContentKind::ResourcePack | ContentKind::ShaderPack => "zip",
        }
    }

    /// Only code content is filtered by loader upstream; packs are
    /// frequently untagged.
    pub fn filters_by_loader(self) -> bool {
        matches!(self, ContentKind::Mod)
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Mod => write!(f, "mod"),
            ContentKind::ResourcePack => write!(f, "resourcepack"),
            ContentKind::ShaderPack => write!(f, "shaderpack"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Stable id, used as the on-disk filename prefix.
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub required: bool,
    pub upstream_project_id: String,
    pub kind: ContentKind,
    #[serde(default)]
    pub default_enabled: bool,
}

/// Named set of enabled entries applied in one step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub max_memory_mb: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub entries: Vec<CatalogEntry>,
    #[serde(default)]
    pub presets: Vec<Preset>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>, presets: Vec<Preset>) -> LauncherResult<Self> {
        let catalog = Self { entries, presets };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load `catalog.json`. A missing file means an empty catalog.
    pub async fn load(path: &Path) -> LauncherResult<Self> {
        if !path.exists() {
            info!("No catalog at {:?}; starting with an empty catalog", path);
            return Ok(Self::default());
        }

        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(LauncherError::io(path))?;
        let catalog: Catalog = serde_json::from_str(&raw)?;
        catalog.validate()?;
        info!(
            "Loaded catalog: {} entries, {} presets",
            catalog.entries.len(),
            catalog.presets.len()
        );
        Ok(catalog)
    }

    fn validate(&self) -> LauncherResult<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if entry.id.trim().is_empty() {
                return Err(LauncherError::InvalidCatalog("entry with empty id".into()));
            }
            if !entry
                .id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            {
                return Err(LauncherError::InvalidCatalog(format!(
                    "id '{}' contains characters outside [A-Za-z0-9._-]",
                    entry.id
                )));
            }
            // `__` separates the id from the upstream name on disk; a trailing `_`
            // would merge into that separator and change the parsed id.
            if entry.id.contains("__")
                || entry.id.ends_with('_')
                || entry.id.starts_with(DEPENDENCY_ID_PREFIX)
            {
                return Err(LauncherError::InvalidCatalog(format!(
                    "id '{}' uses a reserved pattern",
                    entry.id
                )));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(LauncherError::InvalidCatalog(format!(
                    "duplicate id '{}'",
                    entry.id
                )));
            }
        }

        for preset in &self.presets {
            if let Some(unknown) = preset.enabled.iter().find(|id| !seen.contains(id.as_str())) {
                return Err(LauncherError::InvalidCatalog(format!(
                    "preset '{}' references unknown entry '{}'",
                    preset.id, unknown
                )));
            }
        }

        Ok(())
    }

    pub fn entry(&self, id: &str) -> LauncherResult<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| LauncherError::CatalogEntryNotFound(id.to_string()))
    }

    pub fn entries_of(&self, kind: ContentKind) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn preset(&self, id: &str) -> LauncherResult<&Preset> {
        self.presets
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| LauncherError::PresetNotFound(id.to_string()))
    }

    pub fn contains_project(&self, project_id: &str) -> bool {
        self.entries.iter().any(|e| e.upstream_project_id == project_id)
    }
}
