use std::path::PathBuf;

use tracing::{info, warn};

use super::model::Instance;
use crate::core::catalog::ContentKind;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs::{create_dir_safe, write_atomic};

/// Manages the lifecycle of instances on disk.
#[derive(Debug, Clone)]
pub struct InstanceManager {
    /// Root directory where all instances live.
    instances_dir: PathBuf,
}

impl InstanceManager {
    pub fn new(instances_dir: PathBuf) -> Self {
        Self { instances_dir }
    }

    /// Create a new instance on disk with proper subdirectory structure.
    pub async fn create(&self, mut instance: Instance) -> LauncherResult<Instance> {
        instance.path = self.instances_dir.join(&instance.id);

        if instance.path.exists() {
            return Err(LauncherError::InstanceAlreadyExists(instance.id.clone()));
        }

        self.ensure_structure(&instance).await?;
        self.save(&instance).await?;

        info!("Created instance '{}' ({})", instance.name, instance.id);
        Ok(instance)
    }

    /// Create every directory the engine writes into. Safe to call repeatedly.
    pub async fn ensure_structure(&self, instance: &Instance) -> LauncherResult<()> {
        let game_dir = instance.game_dir();
        let mods_dir = instance.content_dir(ContentKind::Mod);
        let resourcepacks_dir = instance.content_dir(ContentKind::ResourcePack);
        let shaderpacks_dir = instance.content_dir(ContentKind::ShaderPack);
        let logs_dir = instance.logs_dir();

        tokio::try_join!(
            create_dir_safe(&game_dir),
            create_dir_safe(&mods_dir),
            create_dir_safe(&resourcepacks_dir),
            create_dir_safe(&shaderpacks_dir),
            create_dir_safe(&logs_dir),
        )?;

        Ok(())
    }

    /// Save instance metadata to disk.
    pub async fn save(&self, instance: &Instance) -> LauncherResult<()> {
        let json = serde_json::to_vec_pretty(instance)?;
        write_atomic(&instance.config_path(), &json).await
    }

    /// Load a single instance by ID.
    pub async fn load(&self, id: &str) -> LauncherResult<Instance> {
        let config_path = self.instances_dir.join(id).join("instance.json");
        if !config_path.exists() {
            return Err(LauncherError::InstanceNotFound(id.to_string()));
        }

        let json = tokio::fs::read_to_string(&config_path)
            .await
            .map_err(LauncherError::io(&config_path))?;

        let mut instance: Instance = serde_json::from_str(&json)?;
        // The folder may have been moved along with the data dir.
        instance.path = self.instances_dir.join(id);
        Ok(instance)
    }

    /// List all instances.
    pub async fn list(&self) -> LauncherResult<Vec<Instance>> {
        let mut instances = Vec::new();

        if !self.instances_dir.exists() {
            return Ok(instances);
        }

        let mut entries = tokio::fs::read_dir(&self.instances_dir)
            .await
            .map_err(LauncherError::io(&self.instances_dir))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(LauncherError::io(&self.instances_dir))?
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            match self.load(&id).await {
                Ok(inst) => instances.push(inst),
                Err(LauncherError::InstanceNotFound(_)) => {}
                Err(e) => warn!("Skipping unreadable instance {:?}: {}", path, e),
            }
        }

        instances.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(instances)
    }

    /// Delete an instance from disk.
    pub async fn delete(&self, id: &str) -> LauncherResult<()> {
        let instance_dir = self.instances_dir.join(id);
        if !instance_dir.exists() {
            return Err(LauncherError::InstanceNotFound(id.to_string()));
        }

        tokio::fs::remove_dir_all(&instance_dir)
            .await
            .map_err(LauncherError::io(&instance_dir))?;

        info!("Deleted instance {}", id);
        Ok(())
    }
}
