use std::path::{Path, PathBuf};

use crate::core::downloader::Downloader;

/// Contexto completo de instalación de un slot de versión.
pub struct InstallContext<'a> {
    pub game_version: &'a str,
    pub loader_version: &'a str,
    /// Composite id of the slot, also written into the descriptor.
    pub version_id: &'a str,
    pub descriptor_path: &'a Path,
    pub jar_path: &'a Path,
    pub versions_dir: &'a Path,
    pub loaders_dir: &'a Path,
    pub downloader: &'a Downloader,
}

impl InstallContext<'_> {
    /// Jar of the unmodified base game the JSON loaders run on top of.
    pub fn vanilla_jar(&self) -> PathBuf {
        self.versions_dir
            .join(self.game_version)
            .join(format!("{}.jar", self.game_version))
    }
}
