use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use super::locks::InstanceLocks;
use super::paths::{resolve_data_dir, LauncherPaths};
use super::settings::LauncherSettings;
use crate::core::catalog::Catalog;
use crate::core::downloader::Downloader;
use crate::core::error::LauncherResult;
use crate::core::events::EventBus;
use crate::core::fs::create_dir_safe;
use crate::core::http::build_http_client;
use crate::core::instance::InstanceManager;
use crate::core::loaders::LoaderService;
use crate::core::registry::{ContentRegistry, ModrinthClient};
use crate::core::store::SettingsStore;

/// Everything the engine operations need, built once per process.
pub struct AppContext {
    pub paths: LauncherPaths,
    pub settings: LauncherSettings,
    pub http_client: Client,
    pub downloader: Arc<Downloader>,
    pub registry: Arc<dyn ContentRegistry>,
    pub loaders: LoaderService,
    pub store: SettingsStore,
    pub catalog: Arc<Catalog>,
    pub instances: InstanceManager,
    pub locks: InstanceLocks,
    pub events: EventBus,
}

impl AppContext {
    /// Resolve the data directory (unless given), read settings and catalog.
    pub async fn load(data_dir: Option<PathBuf>) -> LauncherResult<Self> {
        let paths = LauncherPaths::new(data_dir.unwrap_or_else(resolve_data_dir));
        create_dir_safe(paths.data_dir()).await?;

        let settings = LauncherSettings::load(&paths.settings_path()).await;
        let catalog = Catalog::load(&paths.catalog_path()).await?;

        info!("Data directory: {:?}", paths.data_dir());
        Self::with_parts(paths, settings, catalog, None)
    }

    /// Assemble a context; without an explicit registry the Modrinth client
    /// configured in `settings` is used.
    pub fn with_parts(
        paths: LauncherPaths,
        settings: LauncherSettings,
        catalog: Catalog,
        registry: Option<Arc<dyn ContentRegistry>>,
    ) -> LauncherResult<Self> {
        let events = EventBus::default();
        let http_client = build_http_client(settings.connect_timeout())?;
        let downloader = Arc::new(Downloader::new(http_client.clone(), Some(events.clone())));
        let registry: Arc<dyn ContentRegistry> = match registry {
            Some(registry) => registry,
            None => Arc::new(ModrinthClient::new(
                settings.registry_base_url.clone(),
                downloader.clone(),
            )),
        };
        let loaders = LoaderService::new(
            paths.versions_dir(),
            paths.loaders_dir(),
            settings.loader_endpoints(),
            downloader.clone(),
        );

        Ok(Self {
            store: SettingsStore::new(paths.store_dir()),
            instances: InstanceManager::new(paths.instances_dir()),
            catalog: Arc::new(catalog),
            locks: InstanceLocks::new(),
            paths,
            settings,
            http_client,
            downloader,
            registry,
            loaders,
            events,
        })
    }
}
