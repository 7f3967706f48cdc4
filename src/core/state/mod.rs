mod context;
mod locks;
mod paths;
mod settings;

pub use context::AppContext;
pub use locks::InstanceLocks;
pub use paths::{resolve_data_dir, LauncherPaths, DATA_DIR_ENV};
pub use settings::{LauncherSettings, SupervisorSettings};
