// ─── Test support ───
// Local HTTP upstream, in-memory registry and a throwaway data directory.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::Request;
use axum::middleware::Next;
use axum::Router;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use crate::core::catalog::{Catalog, CatalogEntry, ContentKind};
use crate::core::downloader::{sha1_hex, sha512_hex};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::{Instance, LoaderType};
use crate::core::registry::{ContentRegistry, ResolvedFile};
use crate::core::state::{AppContext, LauncherPaths, LauncherSettings};

// ── HTTP upstream ───────────────────────────────────────

/// axum server on an ephemeral port, counting hits per path.
pub struct TestHttpServer {
    base: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    task: JoinHandle<()>,
}

impl TestHttpServer {
    /// `build` receives the server's base URL so routes can link to each other.
    pub async fn start<F>(build: F) -> Self
    where
        F: FnOnce(&str) -> Router,
    {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::default();
        let counter = hits.clone();
        let app = build(&base).layer(axum::middleware::from_fn(
            move |request: Request, next: Next| {
                let counter = counter.clone();
                async move {
                    *counter
                        .lock()
                        .unwrap()
                        .entry(request.uri().path().to_string())
                        .or_insert(0) += 1;
                    next.run(request).await
                }
            },
        ));

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { base, hits, task }
    }

    pub async fn new(router: Router) -> Self {
        Self::start(|_| router).await
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn request_count(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ── In-memory registry ──────────────────────────────────

#[derive(Default)]
struct FakeRegistryState {
    latest: HashMap<String, ResolvedFile>,
    blobs: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    queries: Vec<(String, String, Option<String>)>,
    downloads: usize,
}

/// `ContentRegistry` backed by maps; every project has at most one
/// "latest" file regardless of the query.
#[derive(Default)]
pub struct FakeRegistry {
    state: Mutex<FakeRegistryState>,
}

impl FakeRegistry {
    /// Make `bytes` the latest file of `project`, hashes computed from the bytes.
    pub fn publish(&self, project: &str, version: &str, file_name: &str, bytes: &[u8]) -> ResolvedFile {
        let file = ResolvedFile {
            project_id: project.to_string(),
            version_id: format!("{project}-{version}"),
            version_number: version.to_string(),
            file_name: file_name.to_string(),
            url: format!("https://cdn.test/{project}/{version}/{file_name}"),
            sha1: Some(sha1_hex(bytes)),
            sha512: Some(sha512_hex(bytes)),
            dependencies: Vec::new(),
        };
        let mut state = self.state.lock().unwrap();
        state.blobs.insert(file.url.clone(), bytes.to_vec());
        state.latest.insert(project.to_string(), file.clone());
        state.failing.remove(project);
        file
    }

    pub fn set_dependencies(&self, project: &str, dependencies: &[&str]) {
        let mut state = self.state.lock().unwrap();
        if let Some(file) = state.latest.get_mut(project) {
            file.dependencies = dependencies.iter().map(|d| d.to_string()).collect();
        }
    }

    /// Serve different bytes under the published URL; hashes stay as published.
    pub fn tamper(&self, project: &str, bytes: &[u8]) {
        let mut state = self.state.lock().unwrap();
        if let Some(url) = state.latest.get(project).map(|f| f.url.clone()) {
            state.blobs.insert(url, bytes.to_vec());
        }
    }

    pub fn withdraw(&self, project: &str) {
        self.state.lock().unwrap().latest.remove(project);
    }

    /// Lookups for `project` fail until it is published again.
    pub fn fail(&self, project: &str) {
        self.state.lock().unwrap().failing.insert(project.to_string());
    }

    pub fn download_count(&self) -> usize {
        self.state.lock().unwrap().downloads
    }

    /// Loader filter sent with the most recent lookup of `project`.
    pub fn last_loader_filter(&self, project: &str) -> Option<Option<String>> {
        self.state
            .lock()
            .unwrap()
            .queries
            .iter()
            .rev()
            .find(|(p, _, _)| p == project)
            .map(|(_, _, loader)| loader.clone())
    }
}

#[async_trait]
impl ContentRegistry for FakeRegistry {
    async fn resolve_latest(
        &self,
        project_id: &str,
        game_version: &str,
        loader: Option<&str>,
    ) -> LauncherResult<Option<ResolvedFile>> {
        let mut state = self.state.lock().unwrap();
        state.queries.push((
            project_id.to_string(),
            game_version.to_string(),
            loader.map(str::to_string),
        ));
        if state.failing.contains(project_id) {
            return Err(LauncherError::Registry(format!("{project_id} returned HTTP 503")));
        }
        Ok(state.latest.get(project_id).cloned())
    }

    async fn download_buffer(&self, url: &str) -> LauncherResult<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.downloads += 1;
        state
            .blobs
            .get(url)
            .cloned()
            .ok_or_else(|| LauncherError::DownloadFailed {
                url: url.to_string(),
                status: 404,
            })
    }
}

// ── Data directory ──────────────────────────────────────

pub fn entry(id: &str, kind: ContentKind, required: bool, default_enabled: bool) -> CatalogEntry {
    CatalogEntry {
        id: id.to_string(),
        display_name: id.to_uppercase(),
        required,
        upstream_project_id: project_of(id),
        kind,
        default_enabled,
    }
}

/// Upstream project id `entry()` assigns to a catalog id.
pub fn project_of(id: &str) -> String {
    format!("proj-{id}")
}

/// Temp data directory with an `AppContext` wired to a `FakeRegistry`.
pub struct TestEnv {
    pub ctx: Arc<AppContext>,
    pub registry: Arc<FakeRegistry>,
    dir: TempDir,
}

impl TestEnv {
    pub fn new(catalog: Catalog) -> Self {
        Self::with_settings(catalog, LauncherSettings::default())
    }

    pub fn with_settings(catalog: Catalog, settings: LauncherSettings) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(FakeRegistry::default());
        let ctx = AppContext::with_parts(
            LauncherPaths::new(dir.path().to_path_buf()),
            settings,
            catalog,
            Some(registry.clone() as Arc<dyn ContentRegistry>),
        )
        .unwrap();

        Self {
            ctx: Arc::new(ctx),
            registry,
            dir,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub async fn instance(&self, loader: LoaderType) -> Instance {
        let instance = Instance::new(
            "Test".into(),
            "1.20.1".into(),
            loader,
            None,
            4096,
            &self.ctx.paths.instances_dir(),
        );
        self.ctx.instances.create(instance).await.unwrap()
    }

    /// Put a base game slot in place so nothing has to be downloaded.
    pub async fn seed_base_game(&self, game_version: &str) {
        let slot = self.ctx.paths.versions_dir().join(game_version);
        tokio::fs::create_dir_all(&slot).await.unwrap();
        tokio::fs::write(slot.join(format!("{game_version}.json")), br#"{"id":"seeded"}"#)
            .await
            .unwrap();
        tokio::fs::write(slot.join(format!("{game_version}.jar")), b"client")
            .await
            .unwrap();
    }
}

/// Sorted file names of one content directory.
pub async fn placed_names(instance: &Instance, kind: ContentKind) -> Vec<String> {
    crate::core::fs::list_file_names(&instance.content_dir(kind))
        .await
        .unwrap()
}
