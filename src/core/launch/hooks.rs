use tokio::process::Command;
use tracing::{info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::Instance;

/// Run a user hook through the platform shell inside the game directory.
pub async fn run_hook(hook: &'static str, command: &str, instance: &Instance) -> LauncherResult<()> {
    let mut shell = if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    info!("Running {} hook for instance {}", hook, instance.id);
    let status = shell
        .current_dir(instance.game_dir())
        .env("INTERFACE_INSTANCE_ID", &instance.id)
        .env("INTERFACE_GAME_DIR", instance.game_dir())
        .status()
        .await
        .map_err(|e| LauncherError::ProcessSpawn(format!("{hook} hook: {e}")))?;

    if !status.success() {
        warn!("{} hook exited with {:?} for instance {}", hook, status.code(), instance.id);
        return Err(LauncherError::HookFailed {
            hook,
            code: status.code(),
        });
    }
    Ok(())
}
