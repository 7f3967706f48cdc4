use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::context::InstallContext;
use super::installer::LoaderInstaller;
use super::metadata::{override_id, LoaderMetadata};
use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs::{is_non_empty_file, write_atomic};
use crate::core::maven::{MavenArtifact, MavenMetadata};

/// Forge: versions from `maven-metadata.xml`, descriptor taken from the
/// official installer jar.
pub struct ForgeInstaller {
    maven_base: String,
    downloader: Arc<Downloader>,
}

impl ForgeInstaller {
    pub fn new(maven_base: String, downloader: Arc<Downloader>) -> Self {
        Self {
            maven_base,
            downloader,
        }
    }

    fn installer_artifact(game_version: &str, loader_version: &str) -> MavenArtifact {
        MavenArtifact::new(
            "net.minecraftforge",
            "forge",
            &format!("{game_version}-{loader_version}"),
        )
        .with_classifier("installer")
    }
}

#[async_trait]
impl LoaderInstaller for ForgeInstaller {
    async fn metadata(&self, game_version: &str) -> LauncherResult<LoaderMetadata> {
        let listing = MavenArtifact::new("net.minecraftforge", "forge", "");
        let metadata = fetch_maven_metadata(&self.downloader, &listing.metadata_url(&self.maven_base)).await?;
        // Forge versions are published as `{gameVersion}-{forgeVersion}`.
        Ok(LoaderMetadata::MavenXml(
            metadata.versions_with_prefix(&format!("{game_version}-")),
        ))
    }

    async fn install(&self, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        info!(
            "Installing Forge {} for MC {}",
            ctx.loader_version, ctx.game_version
        );

        let artifact = Self::installer_artifact(ctx.game_version, ctx.loader_version);
        let installer_path = ctx
            .loaders_dir
            .join("forge")
            .join(ctx.loader_version)
            .join(artifact.filename());

        install_from_installer(ctx, &[artifact.url(&self.maven_base)], &installer_path).await
    }

    fn runs_on_vanilla_jar(&self) -> bool {
        false
    }
}

// ── Shared by the installer-based loaders ───────────────

pub(super) async fn fetch_maven_metadata(
    downloader: &Downloader,
    url: &str,
) -> LauncherResult<MavenMetadata> {
    let bytes = downloader
        .fetch_bytes(url)
        .await
        .map_err(|e| LauncherError::LoaderApi(format!("{url}: {e}")))?;
    let xml = String::from_utf8_lossy(&bytes);
    MavenMetadata::parse(&xml)
}

/// Download the installer once (trying `candidates` in order), pull
/// `version.json` out of it and write the slot.
pub(super) async fn install_from_installer(
    ctx: &InstallContext<'_>,
    candidates: &[String],
    installer_path: &Path,
) -> LauncherResult<()> {
    if is_non_empty_file(installer_path).await {
        debug!("Using cached installer {:?}", installer_path);
    } else {
        download_first(ctx.downloader, candidates, installer_path).await?;
    }

    let installer_bytes = tokio::fs::read(installer_path)
        .await
        .map_err(LauncherError::io(installer_path))?;
    let version_json = extract_version_json(&installer_bytes)?;
    let descriptor = override_id(version_json, ctx.version_id)?;

    // Launch goes through the libraries the descriptor lists; the slot jar is
    // only a placeholder.
    write_atomic(ctx.jar_path, &[]).await?;
    write_atomic(ctx.descriptor_path, &serde_json::to_vec_pretty(&descriptor)?).await?;

    info!("Installed {} from {:?}", ctx.version_id, installer_path);
    Ok(())
}

async fn download_first(
    downloader: &Downloader,
    candidates: &[String],
    dest: &Path,
) -> LauncherResult<()> {
    let mut first_error = None;
    for url in candidates {
        match downloader.download_file(url, dest, None).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!("Installer route failed: {} ({})", url, e);
                first_error.get_or_insert(e);
            }
        }
    }
    Err(first_error.unwrap_or_else(|| LauncherError::Loader("no installer URL to try".into())))
}

fn extract_version_json(installer_bytes: &[u8]) -> LauncherResult<serde_json::Value> {
    let mut archive = zip::ZipArchive::new(Cursor::new(installer_bytes))?;
    let file = archive
        .by_name("version.json")
        .map_err(|e| LauncherError::Loader(format!("Missing version.json: {}", e)))?;
    Ok(serde_json::from_reader(file)?)
}
