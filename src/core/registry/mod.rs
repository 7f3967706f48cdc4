// ─── Content Registry ───
// Interface to the upstream registry that publishes mod / pack versions.

mod modrinth;

pub use modrinth::{ModrinthClient, MODRINTH_API_BASE};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::LauncherResult;

/// The file chosen for a `(project, game version, loader)` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFile {
    pub project_id: String,
    pub version_id: String,
    pub version_number: String,
    pub file_name: String,
    pub url: String,
    pub sha1: Option<String>,
    pub sha512: Option<String>,
    /// Project ids this version declares as required dependencies.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[async_trait]
pub trait ContentRegistry: Send + Sync {
    /// Newest version compatible with `game_version` (and `loader`, when given).
    ///
    /// `Ok(None)` means nothing is published for that combination, which is
    /// an ordinary outcome.
    async fn resolve_latest(
        &self,
        project_id: &str,
        game_version: &str,
        loader: Option<&str>,
    ) -> LauncherResult<Option<ResolvedFile>>;

    /// Download a file into memory; non-2xx responses are errors.
    async fn download_buffer(&self, url: &str) -> LauncherResult<Vec<u8>>;
}
