// ─── Loader metadata ───
// The three upstream shapes loader versions come in.

use serde::Deserialize;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::newest_version;

/// One row of `GET /versions/loader/{gameVersion}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderListEntry {
    pub loader: LoaderListVersion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoaderListVersion {
    pub version: String,
    /// Quilt does not publish the flag at all.
    #[serde(default)]
    pub stable: Option<bool>,
}

#[derive(Debug, Clone)]
pub enum LoaderMetadata {
    /// Loader versions compatible with one game version, newest first.
    JsonByVersion(Vec<LoaderListEntry>),
    /// A ready-made launch profile for one (game version, loader version).
    JsonByVersionAndLoader(serde_json::Value),
    /// Loader versions from `maven-metadata.xml`, already filtered to the
    /// game version.
    MavenXml(Vec<String>),
}

impl LoaderMetadata {
    /// Every version the listing offers, in upstream order.
    pub fn versions(&self) -> Vec<String> {
        match self {
            LoaderMetadata::JsonByVersion(entries) => {
                entries.iter().map(|e| e.loader.version.clone()).collect()
            }
            LoaderMetadata::JsonByVersionAndLoader(_) => self.pick_version().into_iter().collect(),
            LoaderMetadata::MavenXml(versions) => versions.clone(),
        }
    }

    pub fn pick_version(&self) -> Option<String> {
        match self {
            LoaderMetadata::JsonByVersion(entries) => entries
                .iter()
                .find(|e| e.loader.stable == Some(true))
                .or_else(|| entries.first())
                .map(|e| e.loader.version.clone()),
            LoaderMetadata::JsonByVersionAndLoader(profile) => profile_loader_version(profile),
            LoaderMetadata::MavenXml(versions) => newest_version(versions),
        }
    }
}

/// Version of the `*-loader` library a profile was generated for.
fn profile_loader_version(profile: &serde_json::Value) -> Option<String> {
    profile
        .get("libraries")?
        .as_array()?
        .iter()
        .filter_map(|lib| lib.get("name")?.as_str())
        .find_map(|name| {
            let mut parts = name.split(':');
            let (_group, artifact, version) = (parts.next()?, parts.next()?, parts.next()?);
            artifact.ends_with("-loader").then(|| version.to_string())
        })
}

/// Replace the descriptor's `id` so it matches the slot it is written into.
pub fn override_id(mut descriptor: serde_json::Value, id: &str) -> LauncherResult<serde_json::Value> {
    let object = descriptor
        .as_object_mut()
        .ok_or_else(|| LauncherError::Loader("version descriptor is not a JSON object".into()))?;
    object.insert("id".into(), serde_json::Value::String(id.to_string()));
    Ok(descriptor)
}
