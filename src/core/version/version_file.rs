// ─── Version File ───
// The slice of a Mojang version JSON the engine needs: where the client jar
// lives. The raw document is stored untouched next to the jar.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    pub id: Option<String>,
    #[serde(default)]
    pub main_class: Option<String>,
    pub downloads: Option<VersionDownloads>,
}

#[derive(Debug, Deserialize)]
pub struct VersionDownloads {
    pub client: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    pub sha1: String,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}

impl VersionJson {
    pub fn client_download(&self) -> Option<&DownloadArtifact> {
        self.downloads.as_ref().and_then(|d| d.client.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_download_is_optional() {
        let with: VersionJson = serde_json::from_str(
            r#"{"id":"1.20.1","mainClass":"net.minecraft.client.main.Main",
                "downloads":{"client":{"sha1":"aa","size":3,"url":"https://x/client.jar"}}}"#,
        )
        .unwrap();
        assert_eq!(with.client_download().unwrap().url, "https://x/client.jar");

        let without: VersionJson = serde_json::from_str(r#"{"id":"old"}"#).unwrap();
        assert!(without.client_download().is_none());
    }
}
