// ─── Process supervisor ───
// Spawns the external runner with the launch descriptor on stdin and streams
// its output onto the event bus.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::descriptor::LaunchDescriptor;
use super::state::{GameProcess, ProcessExit};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::EventBus;
use crate::core::state::SupervisorSettings;

#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    async fn spawn(
        &self,
        descriptor: &LaunchDescriptor,
        events: &EventBus,
    ) -> LauncherResult<Arc<dyn GameProcess>>;
}

/// Runs `program args...` in the instance game directory.
pub struct CommandSupervisor {
    program: String,
    args: Vec<String>,
}

impl CommandSupervisor {
    pub fn new(settings: &SupervisorSettings) -> Self {
        Self {
            program: settings.program.clone(),
            args: settings.args.clone(),
        }
    }
}

#[async_trait]
impl ProcessSupervisor for CommandSupervisor {
    async fn spawn(
        &self,
        descriptor: &LaunchDescriptor,
        events: &EventBus,
    ) -> LauncherResult<Arc<dyn GameProcess>> {
        let payload = serde_json::to_vec(descriptor)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&descriptor.game_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LauncherError::ProcessSpawn(format!("{}: {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let written = async {
                stdin.write_all(&payload).await?;
                stdin.shutdown().await
            }
            .await;
            if let Err(e) = written {
                let _ = child.start_kill();
                return Err(LauncherError::ProcessSpawn(format!(
                    "No se pudo enviar el descriptor a {}: {e}",
                    self.program
                )));
            }
        }

        let instance_id = descriptor.instance_id.clone();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, Stream::Stdout, instance_id.clone(), events.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, Stream::Stderr, instance_id.clone(), events.clone()));
        }

        let pid = child.id();
        let (tx, rx) = watch::channel(None);
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => ProcessExit {
                    code: status.code(),
                    success: status.success(),
                },
                Err(e) => {
                    error!("Cannot wait for game process of {}: {}", instance_id, e);
                    ProcessExit {
                        code: None,
                        success: false,
                    }
                }
            };
            let _ = tx.send(Some(exit));
        });

        info!("Spawned {} (PID {:?})", self.program, pid);
        Ok(Arc::new(ChildProcess { pid, exit: rx }))
    }
}

struct ChildProcess {
    pid: Option<u32>,
    exit: watch::Receiver<Option<ProcessExit>>,
}

#[async_trait]
impl GameProcess for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn kill(&self) -> LauncherResult<()> {
        let exited = self.exit.borrow().is_some();
        if exited {
            return Ok(());
        }
        match self.pid {
            Some(pid) => kill_process(pid).await,
            None => Ok(()),
        }
    }

    async fn wait(&self) -> ProcessExit {
        let mut rx = self.exit.clone();
        let exit = match rx.wait_for(Option::is_some).await {
            Ok(exit) => *exit,
            Err(_) => None,
        };
        exit.unwrap_or(ProcessExit {
            code: None,
            success: false,
        })
    }
}

// ── Output streaming ────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

async fn forward_output<R>(reader: R, stream: Stream, instance_id: String, events: EventBus)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut reported: Vec<LaunchDiagnostic> = Vec::new();

    while let Ok(Some(line)) = lines.next_line().await {
        match stream {
            Stream::Stdout => {
                events.launch_log(&instance_id, "info", line.clone());
                info!("[game:{}][stdout] {}", instance_id, line);
            }
            Stream::Stderr => {
                events.launch_log(&instance_id, "warn", line.clone());
                if let Some(diagnostic) = detect_launch_diagnostic(&line) {
                    if !reported.contains(&diagnostic) {
                        reported.push(diagnostic);
                        events.launch_log(&instance_id, "error", diagnostic_message(diagnostic));
                    }
                }
                warn!("[game:{}][stderr] {}", instance_id, line);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LaunchDiagnostic {
    NeoForgeEarlyDisplayRendererFuture,
    CorruptedLibraryArchive,
}

fn detect_launch_diagnostic(line: &str) -> Option<LaunchDiagnostic> {
    if line.contains("rendererFuture") || line.contains("DisplayWindow.takeOverGlfwWindow") {
        return Some(LaunchDiagnostic::NeoForgeEarlyDisplayRendererFuture);
    }

    if line.contains("ZipException: zip END header not found") {
        return Some(LaunchDiagnostic::CorruptedLibraryArchive);
    }

    None
}

fn diagnostic_message(diagnostic: LaunchDiagnostic) -> &'static str {
    match diagnostic {
        LaunchDiagnostic::NeoForgeEarlyDisplayRendererFuture => {
            "[DIAGNÓSTICO] NeoForge falló en early display (rendererFuture nulo). Prueba actualizar NeoForge, usar Java 17/21 x64 limpia y desactivar overlays de GPU antes de reiniciar la instancia."
        }
        LaunchDiagnostic::CorruptedLibraryArchive => {
            "[DIAGNÓSTICO] Se detectó una librería dañada (zip END header not found). Cierra la instancia, borra la ruta `libraries/...` indicada en el log y reinicia para forzar una descarga limpia."
        }
    }
}

// ── Termination ─────────────────────────────────────────

/// Windows: `taskkill /T /F`. Elsewhere SIGTERM, then SIGKILL if still alive.
pub async fn kill_process(pid: u32) -> LauncherResult<()> {
    #[cfg(target_os = "windows")]
    {
        let status = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .status()
            .await
            .map_err(|e| LauncherError::Other(format!("No se pudo finalizar proceso {pid}: {e}")))?;

        if !status.success() {
            return Err(LauncherError::Other(format!(
                "El comando para cerrar el proceso {pid} devolvió código {:?}",
                status.code()
            )));
        }

        Ok(())
    }

    #[cfg(not(target_os = "windows"))]
    {
        let graceful = Command::new("kill")
            .args(["-15", &pid.to_string()])
            .status()
            .await
            .map_err(|e| LauncherError::Other(format!("No se pudo enviar SIGTERM a {pid}: {e}")))?;

        if graceful.success() {
            tokio::time::sleep(Duration::from_millis(300)).await;
            let check = Command::new("kill").args(["-0", &pid.to_string()]).status().await;
            if matches!(check, Ok(status) if !status.success()) {
                return Ok(());
            }
        }

        let force = Command::new("kill")
            .args(["-9", &pid.to_string()])
            .status()
            .await
            .map_err(|e| LauncherError::Other(format!("No se pudo finalizar proceso {pid}: {e}")))?;

        if !force.success() {
            return Err(LauncherError::Other(format!(
                "El comando para cerrar el proceso {pid} devolvió código {:?}",
                force.code()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_are_detected_from_stderr_lines() {
        assert_eq!(
            detect_launch_diagnostic("java.lang.NullPointerException: rendererFuture is null"),
            Some(LaunchDiagnostic::NeoForgeEarlyDisplayRendererFuture)
        );
        assert_eq!(
            detect_launch_diagnostic("java.util.zip.ZipException: zip END header not found"),
            Some(LaunchDiagnostic::CorruptedLibraryArchive)
        );
        assert_eq!(detect_launch_diagnostic("[main/INFO] Loading"), None);
    }

    #[cfg(unix)]
    mod unix {
        use std::path::PathBuf;

        use super::super::*;
        use crate::core::auth::LaunchAccountProfile;
        use crate::core::events::LauncherEvent;
        use crate::core::instance::LoaderType;

        fn descriptor(game_dir: PathBuf) -> LaunchDescriptor {
            LaunchDescriptor {
                instance_id: "inst".into(),
                version_id: "1.20.1".into(),
                descriptor_path: game_dir.join("1.20.1.json"),
                jar_path: game_dir.join("1.20.1.jar"),
                game_version: "1.20.1".into(),
                loader: LoaderType::Vanilla,
                loader_version: None,
                min_memory_mb: 512,
                max_memory_mb: 2048,
                assets_dir: game_dir.join("assets"),
                libraries_dir: game_dir.join("libraries"),
                versions_dir: game_dir.join("versions"),
                natives_dir: game_dir.join("natives"),
                game_dir,
                jvm_args: vec![],
                game_args: vec![],
                account: LaunchAccountProfile::offline("Steve"),
            }
        }

        fn shell(script: &str) -> CommandSupervisor {
            CommandSupervisor::new(&SupervisorSettings {
                program: "sh".into(),
                args: vec!["-c".into(), script.into()],
            })
        }

        #[tokio::test]
        async fn runner_receives_the_descriptor_and_its_output_is_streamed() {
            let dir = tempfile::tempdir().unwrap();
            let events = EventBus::new(64);
            let mut rx = events.subscribe();
            let supervisor = shell(
                "cat > received.json; echo ready; echo 'ZipException: zip END header not found' >&2; exit 3",
            );

            let process = supervisor
                .spawn(&descriptor(dir.path().to_path_buf()), &events)
                .await
                .unwrap();
            assert!(process.pid().is_some());

            let exit = process.wait().await;
            assert_eq!(exit.code, Some(3));
            assert!(!exit.success);
            assert_eq!(process.wait().await, exit);

            let received: serde_json::Value =
                serde_json::from_slice(&std::fs::read(dir.path().join("received.json")).unwrap())
                    .unwrap();
            assert_eq!(received["instanceId"], "inst");
            assert_eq!(received["maxMemoryMb"], 2048);
            assert_eq!(received["account"]["username"], "Steve");

            let mut messages = Vec::new();
            while messages.len() < 3 {
                let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                    .await
                    .unwrap()
                    .unwrap();
                if let LauncherEvent::LaunchLog { level, message, .. } = event {
                    messages.push((level, message));
                }
            }
            assert!(messages.contains(&("info".to_string(), "ready".to_string())));
            assert!(messages
                .iter()
                .any(|(level, message)| level == "error" && message.starts_with("[DIAGNÓSTICO]")));
        }

        #[tokio::test]
        async fn killing_a_running_process_ends_it() {
            let dir = tempfile::tempdir().unwrap();
            let events = EventBus::default();
            let process = shell("cat > /dev/null; exec sleep 30")
                .spawn(&descriptor(dir.path().to_path_buf()), &events)
                .await
                .unwrap();

            process.kill().await.unwrap();
            let exit = tokio::time::timeout(Duration::from_secs(5), process.wait())
                .await
                .unwrap();
            assert!(!exit.success);
        }

        #[tokio::test]
        async fn missing_program_is_a_spawn_error() {
            let dir = tempfile::tempdir().unwrap();
            let supervisor = CommandSupervisor::new(&SupervisorSettings {
                program: "definitely-not-a-real-runner".into(),
                args: vec![],
            });
            let result = supervisor
                .spawn(&descriptor(dir.path().to_path_buf()), &EventBus::default())
                .await;
            assert!(matches!(result, Err(LauncherError::ProcessSpawn(_))));
        }
    }
}
