// ─── Launch orchestrator ───
// Idle → Launching → Running → Idle, with a cancel flag while Launching.
// Bootstrap runs under the instance lock; the spawned process is watched by
// a background task that returns the instance to Idle on exit.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use super::descriptor::{LaunchDescriptor, RuntimePrefs};
use super::hooks::run_hook;
use super::state::{GameProcess, LaunchPhase, LaunchRegistry, Promotion, StopRequest};
use super::supervisor::{CommandSupervisor, ProcessSupervisor};
use crate::core::auth::LaunchAccountProfile;
use crate::core::catalog::ContentKind;
use crate::core::content::dependencies::install_missing_dependencies_unlocked;
use crate::core::content::resolver::refresh_unlocked;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::LauncherEvent;
use crate::core::fs::create_dir_safe;
use crate::core::instance::Instance;
use crate::core::state::AppContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LaunchOutcome {
    Running { pid: Option<u32> },
    Cancelled,
}

pub struct LaunchOrchestrator {
    ctx: Arc<AppContext>,
    registry: LaunchRegistry,
    supervisor: Arc<dyn ProcessSupervisor>,
}

impl LaunchOrchestrator {
    pub fn new(ctx: Arc<AppContext>, supervisor: Arc<dyn ProcessSupervisor>) -> Self {
        Self {
            ctx,
            registry: LaunchRegistry::default(),
            supervisor,
        }
    }

    /// Uses the runner configured in the launcher settings.
    pub fn from_settings(ctx: Arc<AppContext>) -> Self {
        let supervisor = Arc::new(CommandSupervisor::new(&ctx.settings.supervisor));
        Self::new(ctx, supervisor)
    }

    pub fn state(&self, instance_id: &str) -> LaunchPhase {
        self.registry.phase(instance_id)
    }

    pub fn is_running(&self, instance_id: &str) -> bool {
        self.registry.phase(instance_id) != LaunchPhase::Idle
    }

    pub async fn launch(
        &self,
        instance_id: &str,
        account: LaunchAccountProfile,
        prefs: RuntimePrefs,
    ) -> LauncherResult<LaunchOutcome> {
        let account = account.sanitized();
        account.validate()?;
        self.ctx.instances.load(instance_id).await?;
        self.registry.begin(instance_id)?;

        let events = &self.ctx.events;
        events.launch_progress(instance_id, 5, "Iniciando validación de instancia", "running");

        match self.launch_inner(instance_id, account, &prefs).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.registry.clear(instance_id);
                events.launch_progress(instance_id, 100, "Error en preparación", "error");
                events.launch_log(instance_id, "error", format!("[ERROR] {err}"));
                error!("Launch of instance {} failed: {}", instance_id, err);
                Err(err)
            }
        }
    }

    // Must not fail once the process is promoted to Running.
    async fn launch_inner(
        &self,
        instance_id: &str,
        account: LaunchAccountProfile,
        prefs: &RuntimePrefs,
    ) -> LauncherResult<LaunchOutcome> {
        let events = &self.ctx.events;
        let (instance, descriptor) = self.bootstrap(instance_id, account, prefs).await?;

        if self.take_cancellation(instance_id) {
            return Ok(LaunchOutcome::Cancelled);
        }

        if let Some(command) = instance.hooks.pre_launch.as_deref() {
            events.launch_log(instance_id, "info", "[HOOK] Ejecutando pre-launch.");
            run_hook("pre-launch", command, &instance).await?;
        }

        if self.take_cancellation(instance_id) {
            return Ok(LaunchOutcome::Cancelled);
        }

        events.launch_progress(instance_id, 90, "Lanzando proceso de Minecraft", "running");
        let process = self.supervisor.spawn(&descriptor, events).await?;

        match self.registry.promote(instance_id, process.clone()) {
            Promotion::Cancelled => {
                if let Err(e) = process.kill().await {
                    warn!("Cannot kill cancelled launch of {}: {}", instance_id, e);
                }
                self.report_cancelled(instance_id);
                Ok(LaunchOutcome::Cancelled)
            }
            Promotion::Running => {
                let pid = process.pid();
                self.mark_played(instance_id).await;

                info!("Launched instance {} (PID {:?})", instance.name, pid);
                events.launch_progress(instance_id, 100, "Instancia en ejecución", "done");
                events.launch_log(
                    instance_id,
                    "info",
                    format!("[RUNTIME] Instancia en ejecución (PID {}).", display_pid(pid)),
                );

                self.watch_exit(instance_id.to_string(), process);
                Ok(LaunchOutcome::Running { pid })
            }
        }
    }

    async fn bootstrap(
        &self,
        instance_id: &str,
        account: LaunchAccountProfile,
        prefs: &RuntimePrefs,
    ) -> LauncherResult<(Instance, LaunchDescriptor)> {
        let ctx = &self.ctx;
        let events = &ctx.events;
        let _guard = ctx.locks.acquire(instance_id).await;

        let mut instance = ctx.instances.load(instance_id).await?;
        ctx.instances.ensure_structure(&instance).await?;
        create_dir_safe(&instance.natives_dir()).await?;
        events.launch_progress(instance_id, 15, "Validación completada", "running");

        ctx.loaders.ensure_base_game(&instance.minecraft_version).await?;
        events.launch_progress(instance_id, 30, "Juego base listo", "running");

        if instance.loader.is_code_loader() && instance.loader_version.is_none() {
            let picked = ctx
                .loaders
                .pick_version(instance.loader, &instance.minecraft_version)
                .await?
                .ok_or_else(|| {
                    LauncherError::Loader(format!(
                        "No {} version available for {}",
                        instance.loader, instance.minecraft_version
                    ))
                })?;
            info!("Pinned {} {} on instance {}", instance.loader, picked, instance.id);
            instance.loader_version = Some(picked);
            ctx.instances.save(&instance).await?;
        }

        events.launch_progress(instance_id, 40, "Instalando loader", "running");
        let install = ctx
            .loaders
            .install(
                &instance.id,
                &instance.minecraft_version,
                instance.loader,
                instance.loader_version.as_deref(),
            )
            .await?;
        if instance.loader.is_code_loader() && install.loader_version != instance.loader_version {
            instance.loader_version = install.loader_version.clone();
            ctx.instances.save(&instance).await?;
        }

        events.launch_progress(instance_id, 55, "Sincronizando contenido", "running");
        let resolved = refresh_unlocked(ctx, &instance, &ContentKind::ALL).await?;
        for (id, artifact) in resolved.iter().filter(|(_, a)| a.error.is_some()) {
            events.launch_log(
                instance_id,
                "warn",
                format!(
                    "[CONTENIDO] {} no se pudo resolver: {}",
                    id,
                    artifact.error.as_deref().unwrap_or_default()
                ),
            );
        }
        install_missing_dependencies_unlocked(ctx, &instance).await?;

        events.launch_progress(instance_id, 72, "Instalación y verificación completadas", "running");
        let descriptor = LaunchDescriptor::build(&ctx.paths, &instance, &install, account, prefs);
        Ok((instance, descriptor))
    }

    async fn mark_played(&self, instance_id: &str) {
        let _guard = self.ctx.locks.acquire(instance_id).await;
        match self.ctx.instances.load(instance_id).await {
            Ok(mut instance) => {
                instance.last_played = Some(Utc::now());
                if let Err(e) = self.ctx.instances.save(&instance).await {
                    warn!("Cannot persist last played time for {}: {}", instance_id, e);
                }
            }
            Err(e) => warn!("Cannot load instance {} after spawn: {}", instance_id, e),
        }
    }

    // Pending stop request: leave the registry and report; nothing else runs.
    fn take_cancellation(&self, instance_id: &str) -> bool {
        if !self.registry.is_cancel_requested(instance_id) {
            return false;
        }
        self.registry.clear(instance_id);
        self.report_cancelled(instance_id);
        true
    }

    fn report_cancelled(&self, instance_id: &str) {
        let events = &self.ctx.events;
        events.launch_progress(instance_id, 0, "Inicio cancelado", "idle");
        events.launch_log(instance_id, "info", "[RUNTIME] Inicio cancelado por usuario.");
        info!("Launch of instance {} cancelled", instance_id);
    }

    fn watch_exit(&self, instance_id: String, process: Arc<dyn GameProcess>) {
        let ctx = self.ctx.clone();
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let exit = process.wait().await;
            registry.clear_if_current(&instance_id, &process);

            let events = &ctx.events;
            if exit.success {
                events.launch_progress(&instance_id, 0, "Pendiente de inicio", "idle");
                events.launch_log(&instance_id, "info", "[RUNTIME] Proceso finalizado correctamente.");
                info!("Game process for {} exited cleanly", instance_id);
            } else {
                events.launch_progress(&instance_id, 100, "Minecraft finalizó con error", "error");
                events.launch_log(
                    &instance_id,
                    "error",
                    match exit.code {
                        Some(code) => format!("[ERROR] El proceso finalizó con código {code}"),
                        None => "[ERROR] El proceso finalizó sin código de salida (terminación externa).".into(),
                    },
                );
                error!("Game process for {} exited with {:?}", instance_id, exit.code);
            }

            match ctx.instances.load(&instance_id).await {
                Ok(instance) => {
                    if let Some(command) = instance.hooks.post_exit.as_deref() {
                        if let Err(e) = run_hook("post-exit", command, &instance).await {
                            warn!("Post-exit hook of {} failed: {}", instance_id, e);
                            events.launch_log(&instance_id, "warn", format!("[HOOK] {e}"));
                        }
                    }
                }
                Err(e) => warn!("Cannot load instance {} after exit: {}", instance_id, e),
            }

            events.publish(LauncherEvent::ProcessExited {
                instance_id,
                code: exit.code,
                success: exit.success,
            });
        });
    }

    /// Running: kill and go Idle. Launching: request cancellation and return.
    pub async fn stop(&self, instance_id: &str) -> LauncherResult<()> {
        let events = &self.ctx.events;
        match self.registry.request_stop(instance_id) {
            StopRequest::Kill(process) => {
                let pid = process.pid();
                process.kill().await?;
                events.launch_progress(instance_id, 0, "Instancia detenida", "idle");
                events.launch_log(
                    instance_id,
                    "info",
                    format!("[RUNTIME] Instancia detenida por usuario (PID {}).", display_pid(pid)),
                );
                info!("Stopped instance {}", instance_id);
                Ok(())
            }
            StopRequest::CancelRequested => {
                events.launch_log(
                    instance_id,
                    "info",
                    "[RUNTIME] Cancelación solicitada; el proceso no se lanzará.",
                );
                Ok(())
            }
            StopRequest::NotRunning => Err(LauncherError::NotRunning(instance_id.to_string())),
        }
    }
}

fn display_pid(pid: Option<u32>) -> String {
    pid.map_or_else(|| "?".to_string(), |p| p.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{watch, Notify, Semaphore};

    use super::*;
    use crate::core::catalog::Catalog;
    use crate::core::events::EventBus;
    use crate::core::instance::LoaderType;
    use crate::core::launch::state::ProcessExit;
    use crate::core::state::LauncherSettings;
    use crate::core::testing::{entry, placed_names, project_of, TestEnv};

    struct FakeProcess {
        pid: u32,
        exit: watch::Sender<Option<ProcessExit>>,
        killed: AtomicBool,
    }

    impl FakeProcess {
        fn finish(&self, code: i32) {
            self.exit.send_replace(Some(ProcessExit {
                code: Some(code),
                success: code == 0,
            }));
        }
    }

    #[async_trait]
    impl GameProcess for FakeProcess {
        fn pid(&self) -> Option<u32> {
            Some(self.pid)
        }

        async fn kill(&self) -> LauncherResult<()> {
            self.killed.store(true, Ordering::SeqCst);
            self.exit.send_replace(Some(ProcessExit {
                code: None,
                success: false,
            }));
            Ok(())
        }

        async fn wait(&self) -> ProcessExit {
            let mut rx = self.exit.subscribe();
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

    #[derive(Default)]
    struct FakeSupervisor {
        gate: Option<Arc<Semaphore>>,
        started: Notify,
        spawned: Mutex<Vec<Arc<FakeProcess>>>,
        descriptors: Mutex<Vec<LaunchDescriptor>>,
    }

    impl FakeSupervisor {
        fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::default()
            }
        }

        fn process(&self, index: usize) -> Arc<FakeProcess> {
            self.spawned.lock().unwrap()[index].clone()
        }

        fn spawn_count(&self) -> usize {
            self.spawned.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProcessSupervisor for FakeSupervisor {
        async fn spawn(
            &self,
            descriptor: &LaunchDescriptor,
            _events: &EventBus,
        ) -> LauncherResult<Arc<dyn GameProcess>> {
            self.started.notify_one();
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }

            let (exit, _) = watch::channel(None);
            let mut spawned = self.spawned.lock().unwrap();
            let process = Arc::new(FakeProcess {
                pid: 4242 + spawned.len() as u32,
                exit,
                killed: AtomicBool::new(false),
            });
            spawned.push(process.clone());
            self.descriptors.lock().unwrap().push(descriptor.clone());
            Ok(process as Arc<dyn GameProcess>)
        }
    }

    fn empty_catalog() -> Catalog {
        Catalog::new(vec![], vec![]).unwrap()
    }

    async fn setup(catalog: Catalog, supervisor: FakeSupervisor) -> (TestEnv, Arc<FakeSupervisor>, LaunchOrchestrator) {
        let env = TestEnv::new(catalog);
        env.seed_base_game("1.20.1").await;
        let supervisor = Arc::new(supervisor);
        let orchestrator = LaunchOrchestrator::new(env.ctx.clone(), supervisor.clone());
        (env, supervisor, orchestrator)
    }

    fn steve() -> LaunchAccountProfile {
        LaunchAccountProfile::offline("Steve")
    }

    async fn wait_for_exit(rx: &mut tokio::sync::broadcast::Receiver<LauncherEvent>) -> (Option<i32>, bool) {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            if let LauncherEvent::ProcessExited { code, success, .. } = event {
                return (code, success);
            }
        }
    }

    #[tokio::test]
    async fn launch_runs_until_stopped() {
        let (env, supervisor, orchestrator) = setup(empty_catalog(), FakeSupervisor::default()).await;
        let instance = env.instance(LoaderType::Vanilla).await;

        let outcome = orchestrator
            .launch(&instance.id, steve(), RuntimePrefs::default())
            .await
            .unwrap();
        assert_eq!(outcome, LaunchOutcome::Running { pid: Some(4242) });
        assert!(orchestrator.is_running(&instance.id));
        assert_eq!(orchestrator.state(&instance.id), LaunchPhase::Running { pid: Some(4242) });

        let second = orchestrator.launch(&instance.id, steve(), RuntimePrefs::default()).await;
        assert!(matches!(second, Err(LauncherError::AlreadyRunning(_))));
        assert_eq!(supervisor.spawn_count(), 1);

        let descriptor = supervisor.descriptors.lock().unwrap()[0].clone();
        assert_eq!(descriptor.version_id, "1.20.1");
        assert_eq!(descriptor.game_dir, instance.game_dir());
        assert!(descriptor.min_memory_mb <= descriptor.max_memory_mb);
        assert!(descriptor.max_memory_mb <= 4096);
        assert_eq!(descriptor.account.username, "Steve");

        let persisted = env.ctx.instances.load(&instance.id).await.unwrap();
        assert!(persisted.last_played.is_some());

        orchestrator.stop(&instance.id).await.unwrap();
        assert!(supervisor.process(0).killed.load(Ordering::SeqCst));
        assert_eq!(orchestrator.state(&instance.id), LaunchPhase::Idle);
        assert!(matches!(
            orchestrator.stop(&instance.id).await,
            Err(LauncherError::NotRunning(_))
        ));
    }

    #[tokio::test]
    async fn stop_during_launch_cancels_before_running() {
        let gate = Arc::new(Semaphore::new(0));
        let (env, supervisor, orchestrator) =
            setup(empty_catalog(), FakeSupervisor::gated(gate.clone())).await;
        let instance = env.instance(LoaderType::Vanilla).await;

        let (outcome, ()) = tokio::join!(
            orchestrator.launch(&instance.id, steve(), RuntimePrefs::default()),
            async {
                supervisor.started.notified().await;
                assert_eq!(orchestrator.state(&instance.id), LaunchPhase::Launching);
                orchestrator.stop(&instance.id).await.unwrap();
                assert_eq!(orchestrator.state(&instance.id), LaunchPhase::LaunchingCancelled);
                assert!(orchestrator.is_running(&instance.id));
                gate.add_permits(1);
            }
        );

        assert_eq!(outcome.unwrap(), LaunchOutcome::Cancelled);
        assert_eq!(orchestrator.state(&instance.id), LaunchPhase::Idle);
        assert!(supervisor.process(0).killed.load(Ordering::SeqCst));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_during_bootstrap_skips_the_pre_launch_hook() {
        let (env, supervisor, orchestrator) = setup(empty_catalog(), FakeSupervisor::default()).await;
        let mut instance = env.instance(LoaderType::Vanilla).await;
        instance.hooks.pre_launch = Some("echo ran > pre-launch-ran".into());
        env.ctx.instances.save(&instance).await.unwrap();

        // Holding the instance lock parks the launch inside bootstrap.
        let guard = env.ctx.locks.acquire(&instance.id).await;
        let (outcome, ()) = tokio::join!(
            orchestrator.launch(&instance.id, steve(), RuntimePrefs::default()),
            async {
                while orchestrator.state(&instance.id) != LaunchPhase::Launching {
                    tokio::task::yield_now().await;
                }
                orchestrator.stop(&instance.id).await.unwrap();
                assert_eq!(orchestrator.state(&instance.id), LaunchPhase::LaunchingCancelled);
                drop(guard);
            }
        );

        assert_eq!(outcome.unwrap(), LaunchOutcome::Cancelled);
        assert_eq!(orchestrator.state(&instance.id), LaunchPhase::Idle);
        assert!(!instance.game_dir().join("pre-launch-ran").exists());
        assert_eq!(supervisor.spawn_count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_exit_returns_to_idle_and_runs_post_exit_hook() {
        let (env, supervisor, orchestrator) = setup(empty_catalog(), FakeSupervisor::default()).await;
        let mut instance = env.instance(LoaderType::Vanilla).await;
        instance.hooks.post_exit = Some("echo done > exited".into());
        env.ctx.instances.save(&instance).await.unwrap();
        let mut rx = env.ctx.events.subscribe();

        orchestrator
            .launch(&instance.id, steve(), RuntimePrefs::default())
            .await
            .unwrap();
        supervisor.process(0).finish(0);

        assert_eq!(wait_for_exit(&mut rx).await, (Some(0), true));
        assert_eq!(orchestrator.state(&instance.id), LaunchPhase::Idle);
        assert!(instance.game_dir().join("exited").exists());

        // A fresh launch is accepted once the previous process is gone.
        orchestrator
            .launch(&instance.id, steve(), RuntimePrefs::default())
            .await
            .unwrap();
        assert_eq!(supervisor.spawn_count(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_pre_launch_hook_aborts_the_launch() {
        let (env, supervisor, orchestrator) = setup(empty_catalog(), FakeSupervisor::default()).await;
        let mut instance = env.instance(LoaderType::Vanilla).await;
        instance.hooks.pre_launch = Some("exit 3".into());
        env.ctx.instances.save(&instance).await.unwrap();

        let err = orchestrator
            .launch(&instance.id, steve(), RuntimePrefs::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LauncherError::HookFailed {
                hook: "pre-launch",
                code: Some(3)
            }
        ));
        assert_eq!(orchestrator.state(&instance.id), LaunchPhase::Idle);
        assert_eq!(supervisor.spawn_count(), 0);
    }

    #[tokio::test]
    async fn malformed_credentials_are_rejected_before_launching() {
        let (env, supervisor, orchestrator) = setup(empty_catalog(), FakeSupervisor::default()).await;
        let instance = env.instance(LoaderType::Vanilla).await;

        let mut account = steve();
        account.uuid = "not-a-uuid".into();
        let err = orchestrator
            .launch(&instance.id, account, RuntimePrefs::default())
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::InvalidCredential(_)));
        assert_eq!(orchestrator.state(&instance.id), LaunchPhase::Idle);
        assert_eq!(supervisor.spawn_count(), 0);
    }

    #[tokio::test]
    async fn bootstrap_failure_returns_to_idle() {
        let settings = LauncherSettings {
            version_manifest_url: "http://127.0.0.1:9/manifest.json".into(),
            ..LauncherSettings::default()
        };
        let env = TestEnv::with_settings(empty_catalog(), settings);
        let supervisor = Arc::new(FakeSupervisor::default());
        let orchestrator = LaunchOrchestrator::new(env.ctx.clone(), supervisor.clone());
        let instance = env.instance(LoaderType::Vanilla).await;

        assert!(orchestrator
            .launch(&instance.id, steve(), RuntimePrefs::default())
            .await
            .is_err());
        assert_eq!(orchestrator.state(&instance.id), LaunchPhase::Idle);
        assert_eq!(supervisor.spawn_count(), 0);
    }

    #[tokio::test]
    async fn launch_converges_content_before_spawning() {
        let catalog = Catalog::new(
            vec![entry("faithful", ContentKind::ResourcePack, true, false)],
            vec![],
        )
        .unwrap();
        let (env, _supervisor, orchestrator) = setup(catalog, FakeSupervisor::default()).await;
        let instance = env.instance(LoaderType::Vanilla).await;
        env.registry
            .publish(&project_of("faithful"), "1.0", "faithful.zip", b"pack");

        orchestrator
            .launch(&instance.id, steve(), RuntimePrefs::default())
            .await
            .unwrap();

        assert_eq!(
            placed_names(&instance, ContentKind::ResourcePack).await,
            vec!["faithful__faithful.zip"]
        );
    }

    #[tokio::test]
    async fn unknown_instances_are_not_marked_launching() {
        let (_env, _supervisor, orchestrator) = setup(empty_catalog(), FakeSupervisor::default()).await;
        let err = orchestrator
            .launch("missing", steve(), RuntimePrefs::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::InstanceNotFound(_)));
        assert_eq!(orchestrator.state("missing"), LaunchPhase::Idle);
    }
}
