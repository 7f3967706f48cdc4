use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::installer::LoaderInstallResult;
use crate::core::downloader::{Downloader, ExpectedHashes};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs::{is_non_empty_file, write_atomic};
use crate::core::version::{VersionJson, VersionManifest};

/// Installs the unmodified base game: version JSON + client jar under
/// `versions/{gameVersion}/`.
pub struct VanillaInstaller {
    manifest_url: String,
    downloader: Arc<Downloader>,
}

impl VanillaInstaller {
    pub fn new(manifest_url: String, downloader: Arc<Downloader>) -> Self {
        Self {
            manifest_url,
            downloader,
        }
    }

    pub async fn ensure(
        &self,
        versions_dir: &Path,
        game_version: &str,
    ) -> LauncherResult<LoaderInstallResult> {
        let slot = versions_dir.join(game_version);
        let result = LoaderInstallResult {
            version_id: game_version.to_string(),
            descriptor_path: slot.join(format!("{game_version}.json")),
            jar_path: slot.join(format!("{game_version}.jar")),
            loader_version: None,
        };

        if tokio::fs::try_exists(&result.descriptor_path).await.unwrap_or(false)
            && is_non_empty_file(&result.jar_path).await
        {
            debug!("Minecraft {} already installed", game_version);
            return Ok(result);
        }

        info!("Installing Vanilla {}", game_version);

        let manifest = VersionManifest::fetch(self.downloader.client(), &self.manifest_url).await?;
        let entry = manifest.find_version(game_version).ok_or_else(|| {
            LauncherError::Loader(format!(
                "Minecraft version {} not found in manifest",
                game_version
            ))
        })?;

        let raw_json = self
            .downloader
            .fetch_verified(&entry.url, &ExpectedHashes::new(entry.sha1.as_deref(), None))
            .await?;
        let version_json: VersionJson = serde_json::from_slice(&raw_json)?;
        let client = version_json.client_download().ok_or_else(|| {
            LauncherError::Loader(format!("Version {} has no client download", game_version))
        })?;

        self.downloader
            .download_file(&client.url, &result.jar_path, Some(&client.sha1))
            .await?;
        write_atomic(&result.descriptor_path, &raw_json).await?;

        info!("Vanilla {} installed successfully", game_version);
        Ok(result)
    }
}
