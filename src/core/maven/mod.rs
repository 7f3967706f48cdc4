mod artifact;
mod metadata;

pub use artifact::MavenArtifact;
pub use metadata::{compare_versions, newest_version, MavenMetadata};

/// Maven repositories the two installer-based loaders publish to.
pub const FORGE_MAVEN: &str = "https://maven.minecraftforge.net";
pub const NEOFORGE_MAVEN: &str = "https://maven.neoforged.net/releases";
