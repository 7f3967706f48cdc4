use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{LauncherError, LauncherResult};

/// Represents a fully parsed Maven coordinate.
///
/// Supported formats:
///   `groupId:artifactId:version`
///   `groupId:artifactId:version:classifier`
///   `groupId:artifactId:version[:classifier]@packaging`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MavenArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    /// File extension / packaging type. Defaults to `"jar"`.
    pub packaging: String,
}

impl MavenArtifact {
    pub fn new(group_id: &str, artifact_id: &str, version: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            classifier: None,
            packaging: "jar".to_string(),
        }
    }

    /// Parse a Maven coordinate string.
    pub fn parse(coord: &str) -> LauncherResult<Self> {
        let (coord_part, packaging_override) = match coord.rfind('@') {
            Some(idx) => (&coord[..idx], Some(&coord[idx + 1..])),
            None => (coord, None),
        };

        let parts: Vec<&str> = coord_part.split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(LauncherError::Loader(format!(
                "Invalid Maven coordinate: {coord}"
            )));
        }

        let mut artifact = match parts.as_slice() {
            [group, artifact, version] => Self::new(group, artifact, version),
            [group, artifact, version, classifier] => {
                Self::new(group, artifact, version).with_classifier(classifier)
            }
            _ => {
                return Err(LauncherError::Loader(format!(
                    "Invalid Maven coordinate: {coord}"
                )))
            }
        };
        if let Some(packaging) = packaging_override {
            artifact.packaging = packaging.to_string();
        }
        Ok(artifact)
    }

    pub fn with_classifier(mut self, classifier: &str) -> Self {
        self.classifier = Some(classifier.to_string());
        self
    }

    /// Construct the group path portion (`net/minecraftforge`).
    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    /// `artifactId-version[-classifier].packaging`
    pub fn filename(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.version, c, self.packaging
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.packaging),
        }
    }

    /// `<repo>/<group_path>/<artifact_id>/<version>/<filename>`
    pub fn url(&self, repo_base: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            repo_base.trim_end_matches('/'),
            self.group_path(),
            self.artifact_id,
            self.version,
            self.filename()
        )
    }

    /// `<repo>/<group_path>/<artifact_id>/maven-metadata.xml`; the version is ignored.
    pub fn metadata_url(&self, repo_base: &str) -> String {
        format!(
            "{}/{}/{}/maven-metadata.xml",
            repo_base.trim_end_matches('/'),
            self.group_path(),
            self.artifact_id
        )
    }
}

impl fmt::Display for MavenArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.classifier {
            Some(c) => write!(
                f,
                "{}:{}:{}:{}@{}",
                self.group_id, self.artifact_id, self.version, c, self.packaging
            ),
            None => write!(
                f,
                "{}:{}:{}@{}",
                self.group_id, self.artifact_id, self.version, self.packaging
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_coordinate() {
        let a = MavenArtifact::parse("net.minecraftforge:forge:1.20.1-47.2.0").unwrap();
        assert_eq!(a.group_id, "net.minecraftforge");
        assert_eq!(a.artifact_id, "forge");
        assert_eq!(a.version, "1.20.1-47.2.0");
        assert_eq!(a.classifier, None);
        assert_eq!(a.packaging, "jar");
    }

    #[test]
    fn parse_with_classifier_and_packaging() {
        let a = MavenArtifact::parse("net.neoforged:neoforge:21.1.77:installer@jar").unwrap();
        assert_eq!(a.classifier.as_deref(), Some("installer"));
        assert_eq!(a.filename(), "neoforge-21.1.77-installer.jar");
        assert!(MavenArtifact::parse("only:two").is_err());
        assert!(MavenArtifact::parse("a::c").is_err());
    }

    #[test]
    fn installer_url_construction() {
        let a = MavenArtifact::new("net.minecraftforge", "forge", "1.20.1-47.2.0")
            .with_classifier("installer");
        assert_eq!(
            a.url("https://maven.minecraftforge.net/"),
            "https://maven.minecraftforge.net/net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0-installer.jar"
        );
        assert_eq!(
            a.metadata_url("https://maven.minecraftforge.net"),
            "https://maven.minecraftforge.net/net/minecraftforge/forge/maven-metadata.xml"
        );
    }
}
