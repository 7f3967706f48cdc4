use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::downloader::Downloader;
use crate::core::error::LauncherResult;
use crate::core::instance::LoaderType;

use super::{
    context::InstallContext, forge::ForgeInstaller, meta_json::MetaJsonInstaller,
    metadata::LoaderMetadata, neoforge::NeoForgeInstaller, LoaderEndpoints,
};

/// Resultado unificado de instalación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderInstallResult {
    pub version_id: String,
    pub descriptor_path: PathBuf,
    pub jar_path: PathBuf,
    /// `None` for the vanilla base game.
    pub loader_version: Option<String>,
}

#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    /// Upstream versions of this loader for one game version.
    async fn metadata(&self, game_version: &str) -> LauncherResult<LoaderMetadata>;

    /// Write the descriptor and jar for the slot described by `ctx`.
    async fn install(&self, ctx: &InstallContext<'_>) -> LauncherResult<()>;

    /// Whether the slot's jar is a copy of the vanilla client.
    fn runs_on_vanilla_jar(&self) -> bool;
}

/// Dispatcher sin Box<dyn>
pub enum Installer {
    MetaJson(MetaJsonInstaller),
    Forge(ForgeInstaller),
    NeoForge(NeoForgeInstaller),
}

impl Installer {
    /// `None` for vanilla, which has no loader to install.
    pub fn for_loader(
        loader: LoaderType,
        endpoints: &LoaderEndpoints,
        downloader: Arc<Downloader>,
    ) -> Option<Self> {
        match loader {
            LoaderType::Vanilla => None,
            LoaderType::Fabric | LoaderType::Quilt => Some(Self::MetaJson(MetaJsonInstaller::new(
                loader,
                endpoints.meta_base(loader)?.to_string(),
                downloader,
            ))),
            LoaderType::Forge => Some(Self::Forge(ForgeInstaller::new(
                endpoints.forge_maven.clone(),
                downloader,
            ))),
            LoaderType::NeoForge => Some(Self::NeoForge(NeoForgeInstaller::new(
                endpoints.neoforge_maven.clone(),
                downloader,
            ))),
        }
    }

    pub async fn metadata(&self, game_version: &str) -> LauncherResult<LoaderMetadata> {
        match self {
            Installer::MetaJson(i) => i.metadata(game_version).await,
            Installer::Forge(i) => i.metadata(game_version).await,
            Installer::NeoForge(i) => i.metadata(game_version).await,
        }
    }

    pub async fn install(&self, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        match self {
            Installer::MetaJson(i) => i.install(ctx).await,
            Installer::Forge(i) => i.install(ctx).await,
            Installer::NeoForge(i) => i.install(ctx).await,
        }
    }

    pub fn runs_on_vanilla_jar(&self) -> bool {
        match self {
            Installer::MetaJson(i) => i.runs_on_vanilla_jar(),
            Installer::Forge(i) => i.runs_on_vanilla_jar(),
            Installer::NeoForge(i) => i.runs_on_vanilla_jar(),
        }
    }
}
