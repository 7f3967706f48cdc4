use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the content engine.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Registry error: {0}")]
    Registry(String),

    // ── Integrity ───────────────────────────────────────
    #[error("{algorithm} mismatch for {subject}: expected {expected}, got {actual}")]
    HashMismatch {
        subject: String,
        algorithm: &'static str,
        expected: String,
        actual: String,
    },

    // ── Serialization ───────────────────────────────────
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Instance ────────────────────────────────────────
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Instance already exists: {0}")]
    InstanceAlreadyExists(String),

    // ── Catalog ─────────────────────────────────────────
    #[error("Catalog entry not found: {0}")]
    CatalogEntryNotFound(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    // ── Lockfile ────────────────────────────────────────
    #[error("Unsupported lockfile schema version {found} (expected {expected})")]
    LockfileSchema { found: u32, expected: u32 },

    // ── Rollback ────────────────────────────────────────
    #[error("No rollback snapshot recorded for instance {0}")]
    NoSnapshot(String),

    // ── Loader ──────────────────────────────────────────
    #[error("Loader error: {0}")]
    Loader(String),

    #[error("Loader API unreachable: {0}")]
    LoaderApi(String),

    // ── Launch ──────────────────────────────────────────
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Instance {0} is already launching or running")]
    AlreadyRunning(String),

    #[error("No active process for instance {0}")]
    NotRunning(String),

    #[error("{hook} hook failed with exit code {code:?}")]
    HookFailed {
        hook: &'static str,
        code: Option<i32>,
    },

    #[error("Process spawn failed: {0}")]
    ProcessSpawn(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl LauncherError {
    /// Attach a path to an IO error. Used as `.map_err(LauncherError::io(&path))`.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> LauncherError {
        let path = path.into();
        move |source| LauncherError::Io { path, source }
    }
}

// Results are printed as JSON by the CLI, errors included.
impl serde::Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
