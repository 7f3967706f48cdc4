use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::info;

use super::context::InstallContext;
use super::installer::LoaderInstaller;
use super::metadata::{override_id, LoaderListEntry, LoaderMetadata};
use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs::{copy_atomic, write_atomic};
use crate::core::instance::LoaderType;

pub const FABRIC_META_BASE: &str = "https://meta.fabricmc.net/v2";
pub const QUILT_META_BASE: &str = "https://meta.quiltmc.org/v3";

/// Fabric and Quilt: both expose the same meta API shape and run on top of
/// the vanilla client jar.
pub struct MetaJsonInstaller {
    loader: LoaderType,
    meta_base: String,
    downloader: Arc<Downloader>,
}

impl MetaJsonInstaller {
    pub fn new(loader: LoaderType, meta_base: String, downloader: Arc<Downloader>) -> Self {
        Self {
            loader,
            meta_base: meta_base.trim_end_matches('/').to_string(),
            downloader,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> LauncherResult<T> {
        let resp = self
            .downloader
            .client()
            .get(url)
            .send()
            .await
            .map_err(|e| LauncherError::LoaderApi(format!("{url}: {e}")))?;

        if !resp.status().is_success() {
            return Err(LauncherError::LoaderApi(format!(
                "{} meta returned {} for {}",
                self.loader,
                resp.status(),
                url
            )));
        }

        Ok(resp.json::<T>().await?)
    }

    pub async fn fetch_profile(
        &self,
        game_version: &str,
        loader_version: &str,
    ) -> LauncherResult<LoaderMetadata> {
        let url = format!(
            "{}/versions/loader/{}/{}/profile/json",
            self.meta_base, game_version, loader_version
        );
        let profile: serde_json::Value = self.get_json(&url).await?;
        Ok(LoaderMetadata::JsonByVersionAndLoader(profile))
    }
}

#[async_trait]
impl LoaderInstaller for MetaJsonInstaller {
    async fn metadata(&self, game_version: &str) -> LauncherResult<LoaderMetadata> {
        let url = format!("{}/versions/loader/{}", self.meta_base, game_version);
        let entries: Vec<LoaderListEntry> = self.get_json(&url).await?;
        Ok(LoaderMetadata::JsonByVersion(entries))
    }

    async fn install(&self, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        info!(
            "Installing {} {} for Minecraft {}",
            self.loader, ctx.loader_version, ctx.game_version
        );

        let LoaderMetadata::JsonByVersionAndLoader(profile) = self
            .fetch_profile(ctx.game_version, ctx.loader_version)
            .await?
        else {
            return Err(LauncherError::Loader("unexpected metadata shape".into()));
        };

        if profile.get("mainClass").and_then(|m| m.as_str()).unwrap_or("").is_empty() {
            return Err(LauncherError::LoaderApi(format!(
                "{} profile missing mainClass",
                self.loader
            )));
        }

        let descriptor = override_id(profile, ctx.version_id)?;

        // Jar first: a descriptor on disk means the slot is complete.
        copy_atomic(&ctx.vanilla_jar(), ctx.jar_path).await?;
        write_atomic(ctx.descriptor_path, &serde_json::to_vec_pretty(&descriptor)?).await?;

        info!("{} installed as {}", self.loader, ctx.version_id);
        Ok(())
    }

    fn runs_on_vanilla_jar(&self) -> bool {
        true
    }
}
