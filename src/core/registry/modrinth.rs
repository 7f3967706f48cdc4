use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::{ContentRegistry, ResolvedFile};
use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};

pub const MODRINTH_API_BASE: &str = "https://api.modrinth.com/v2";

/// Registry client speaking the Modrinth v2 version API.
pub struct ModrinthClient {
    base_url: String,
    downloader: Arc<Downloader>,
}

#[derive(Debug, Deserialize)]
struct ProjectVersion {
    id: String,
    #[serde(default)]
    project_id: Option<String>,
    version_number: String,
    date_published: DateTime<Utc>,
    #[serde(default)]
    files: Vec<VersionFile>,
    #[serde(default)]
    dependencies: Vec<VersionDependency>,
}

#[derive(Debug, Deserialize)]
struct VersionFile {
    url: String,
    filename: String,
    #[serde(default)]
    hashes: FileHashes,
    #[serde(default)]
    primary: bool,
}

#[derive(Debug, Default, Deserialize)]
struct FileHashes {
    sha1: Option<String>,
    sha512: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionDependency {
    #[serde(default)]
    project_id: Option<String>,
    dependency_type: String,
}

impl ModrinthClient {
    pub fn new(base_url: impl Into<String>, downloader: Arc<Downloader>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            downloader,
        }
    }
}

/// Newest by publish date; primary file, else the first one.
fn select_latest(project_id: &str, mut versions: Vec<ProjectVersion>) -> Option<ResolvedFile> {
    versions.sort_by(|a, b| b.date_published.cmp(&a.date_published));

    let version = versions.into_iter().find(|v| !v.files.is_empty())?;
    let file_index = version.files.iter().position(|f| f.primary).unwrap_or(0);
    let dependencies = version
        .dependencies
        .iter()
        .filter(|d| d.dependency_type == "required")
        .filter_map(|d| d.project_id.clone())
        .collect();
    let file = version.files.into_iter().nth(file_index)?;

    Some(ResolvedFile {
        project_id: version.project_id.unwrap_or_else(|| project_id.to_string()),
        version_id: version.id,
        version_number: version.version_number,
        file_name: file.filename,
        url: file.url,
        sha1: file.hashes.sha1,
        sha512: file.hashes.sha512,
        dependencies,
    })
}

#[async_trait]
impl ContentRegistry for ModrinthClient {
    async fn resolve_latest(
        &self,
        project_id: &str,
        game_version: &str,
        loader: Option<&str>,
    ) -> LauncherResult<Option<ResolvedFile>> {
        let url = format!("{}/project/{}/version", self.base_url, project_id);

        let mut query = vec![(
            "game_versions",
            serde_json::to_string(&[game_version])?,
        )];
        // Packs are often untagged; filtering them by loader yields nothing.
        if let Some(loader) = loader {
            query.push(("loaders", serde_json::to_string(&[loader])?));
        }

        let response = self
            .downloader
            .client()
            .get(&url)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Registry has no project {}", project_id);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(LauncherError::Registry(format!(
                "{} returned HTTP {}",
                url,
                status.as_u16()
            )));
        }

        let versions: Vec<ProjectVersion> = response.json().await?;
        debug!(
            "Registry returned {} versions for {} ({} / {:?})",
            versions.len(),
            project_id,
            game_version,
            loader
        );
        Ok(select_latest(project_id, versions))
    }

    async fn download_buffer(&self, url: &str) -> LauncherResult<Vec<u8>> {
        self.downloader.fetch_bytes(url).await
    }
}
