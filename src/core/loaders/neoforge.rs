use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::context::InstallContext;
use super::forge::{fetch_maven_metadata, install_from_installer};
use super::installer::LoaderInstaller;
use super::metadata::LoaderMetadata;
use crate::core::downloader::Downloader;
use crate::core::error::LauncherResult;
use crate::core::maven::MavenArtifact;

/// Game version whose NeoForge builds live under the legacy `forge` artifact.
const LEGACY_GAME_VERSION: &str = "1.20.1";

/// NeoForge installer — similar to Forge but uses the NeoForge Maven and
/// versions derived from the game version.
pub struct NeoForgeInstaller {
    maven_base: String,
    downloader: Arc<Downloader>,
}

impl NeoForgeInstaller {
    pub fn new(maven_base: String, downloader: Arc<Downloader>) -> Self {
        Self {
            maven_base,
            downloader,
        }
    }
}

/// `1.{minor}.{patch}` → `{minor}.{patch}.`; NeoForge numbers its builds
/// after the game version without the leading `1.`.
pub fn version_prefix(game_version: &str) -> Option<String> {
    let mut parts = game_version.split('.');
    if parts.next()? != "1" {
        return None;
    }
    let minor: u32 = parts.next()?.parse().ok()?;
    let patch: u32 = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    Some(format!("{minor}.{patch}."))
}

#[async_trait]
impl LoaderInstaller for NeoForgeInstaller {
    async fn metadata(&self, game_version: &str) -> LauncherResult<LoaderMetadata> {
        let mut versions = Vec::new();

        if let Some(prefix) = version_prefix(game_version) {
            let listing = MavenArtifact::new("net.neoforged", "neoforge", "");
            let metadata =
                fetch_maven_metadata(&self.downloader, &listing.metadata_url(&self.maven_base)).await?;
            versions.extend(
                metadata
                    .versions()
                    .iter()
                    .filter(|v| v.starts_with(&prefix))
                    .cloned(),
            );
        }

        if game_version == LEGACY_GAME_VERSION {
            let legacy = MavenArtifact::new("net.neoforged", "forge", "");
            match fetch_maven_metadata(&self.downloader, &legacy.metadata_url(&self.maven_base)).await {
                Ok(metadata) => {
                    versions.extend(metadata.versions_with_prefix(&format!("{game_version}-")))
                }
                Err(e) => warn!("Legacy NeoForge listing unavailable: {}", e),
            }
        }

        Ok(LoaderMetadata::MavenXml(versions))
    }

    async fn install(&self, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        info!(
            "Installing NeoForge {} for MC {}",
            ctx.loader_version, ctx.game_version
        );

        // Coordinate: net.neoforged:neoforge:<loader_version>:installer
        let primary = MavenArtifact::new("net.neoforged", "neoforge", ctx.loader_version)
            .with_classifier("installer");
        // Legacy NeoForge for MC 1.20.1 was published under net.neoforged:forge
        let legacy = MavenArtifact::new(
            "net.neoforged",
            "forge",
            &format!("{}-{}", ctx.game_version, ctx.loader_version),
        )
        .with_classifier("installer");

        let installer_path = ctx
            .loaders_dir
            .join("neoforge")
            .join(ctx.loader_version)
            .join(primary.filename());

        install_from_installer(
            ctx,
            &[primary.url(&self.maven_base), legacy.url(&self.maven_base)],
            &installer_path,
        )
        .await
    }

    fn runs_on_vanilla_jar(&self) -> bool {
        false
    }
}
