// ─── Loader Installer ───
// Resolves loader versions for a game version and writes version slots
// (`versions/{id}/{id}.json` + `versions/{id}/{id}.jar`).

pub mod context;
pub mod forge;
pub mod installer;
pub mod meta_json;
pub mod metadata;
pub mod neoforge;
pub mod vanilla;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

pub use context::InstallContext;
pub use installer::{Installer, LoaderInstallResult, LoaderInstaller};
pub use metadata::LoaderMetadata;

use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::LoaderType;
use crate::core::maven::{FORGE_MAVEN, NEOFORGE_MAVEN};
use crate::core::version::VERSION_MANIFEST_URL;
use meta_json::{FABRIC_META_BASE, QUILT_META_BASE};
use vanilla::VanillaInstaller;

/// Upstream locations of loader metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderEndpoints {
    pub fabric_meta: String,
    pub quilt_meta: String,
    pub forge_maven: String,
    pub neoforge_maven: String,
    pub version_manifest: String,
}

impl Default for LoaderEndpoints {
    fn default() -> Self {
        Self {
            fabric_meta: FABRIC_META_BASE.into(),
            quilt_meta: QUILT_META_BASE.into(),
            forge_maven: FORGE_MAVEN.into(),
            neoforge_maven: NEOFORGE_MAVEN.into(),
            version_manifest: VERSION_MANIFEST_URL.into(),
        }
    }
}

impl LoaderEndpoints {
    pub fn meta_base(&self, loader: LoaderType) -> Option<&str> {
        match loader {
            LoaderType::Fabric => Some(self.fabric_meta.as_str()),
            LoaderType::Quilt => Some(self.quilt_meta.as_str()),
            _ => None,
        }
    }
}

/// `"{loader}-loader-{loaderVersion}-{gameVersion}"`
pub fn composite_version_id(loader: LoaderType, loader_version: &str, game_version: &str) -> String {
    format!("{loader}-loader-{loader_version}-{game_version}")
}

pub struct LoaderService {
    versions_dir: PathBuf,
    loaders_dir: PathBuf,
    endpoints: LoaderEndpoints,
    downloader: Arc<Downloader>,
    vanilla: VanillaInstaller,
}

impl LoaderService {
    pub fn new(
        versions_dir: PathBuf,
        loaders_dir: PathBuf,
        endpoints: LoaderEndpoints,
        downloader: Arc<Downloader>,
    ) -> Self {
        let vanilla = VanillaInstaller::new(endpoints.version_manifest.clone(), downloader.clone());
        Self {
            versions_dir,
            loaders_dir,
            endpoints,
            downloader,
            vanilla,
        }
    }

    pub fn versions_dir(&self) -> &Path {
        &self.versions_dir
    }

    /// Base game slot; no network when it is already in place.
    pub async fn ensure_base_game(&self, game_version: &str) -> LauncherResult<LoaderInstallResult> {
        self.vanilla.ensure(&self.versions_dir, game_version).await
    }

    fn installer(&self, loader: LoaderType) -> Option<Installer> {
        Installer::for_loader(loader, &self.endpoints, self.downloader.clone())
    }

    /// Raw upstream listing; `None` for vanilla.
    pub async fn metadata(
        &self,
        loader: LoaderType,
        game_version: &str,
    ) -> LauncherResult<Option<LoaderMetadata>> {
        match self.installer(loader) {
            Some(installer) => Ok(Some(installer.metadata(game_version).await?)),
            None => Ok(None),
        }
    }

    pub async fn pick_version(
        &self,
        loader: LoaderType,
        game_version: &str,
    ) -> LauncherResult<Option<String>> {
        let picked = self
            .metadata(loader, game_version)
            .await?
            .and_then(|m| m.pick_version());
        debug!("Picked {} {:?} for {}", loader, picked, game_version);
        Ok(picked)
    }

    pub async fn install(
        &self,
        instance_id: &str,
        game_version: &str,
        loader: LoaderType,
        version: Option<&str>,
    ) -> LauncherResult<LoaderInstallResult> {
        let Some(installer) = self.installer(loader) else {
            return self.ensure_base_game(game_version).await;
        };

        let loader_version = match version {
            Some(v) => v.to_string(),
            None => self.pick_version(loader, game_version).await?.ok_or_else(|| {
                LauncherError::Loader(format!("No {loader} version available for {game_version}"))
            })?,
        };

        let version_id = composite_version_id(loader, &loader_version, game_version);
        let slot = self.versions_dir.join(&version_id);
        let result = LoaderInstallResult {
            descriptor_path: slot.join(format!("{version_id}.json")),
            jar_path: slot.join(format!("{version_id}.jar")),
            version_id,
            loader_version: Some(loader_version),
        };

        let installed = tokio::fs::try_exists(&result.descriptor_path).await.unwrap_or(false)
            && tokio::fs::try_exists(&result.jar_path).await.unwrap_or(false);
        if installed {
            debug!("{} already installed for instance {}", result.version_id, instance_id);
            return Ok(result);
        }

        if installer.runs_on_vanilla_jar() {
            self.ensure_base_game(game_version).await?;
        }

        let loader_version = result.loader_version.as_deref().unwrap_or_default();
        let ctx = InstallContext {
            game_version,
            loader_version,
            version_id: &result.version_id,
            descriptor_path: &result.descriptor_path,
            jar_path: &result.jar_path,
            versions_dir: &self.versions_dir,
            loaders_dir: &self.loaders_dir,
            downloader: &self.downloader,
        };
        installer.install(&ctx).await?;

        info!("Loader {} ready for instance {}", result.version_id, instance_id);
        Ok(result)
    }
}
