// ─── CLI commands ───
// Every subcommand maps onto one core operation and prints its result as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use crate::core::auth::LaunchAccountProfile;
use crate::core::catalog::ContentKind;
use crate::core::content::{self, ContentState};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::LauncherEvent;
use crate::core::instance::{Instance, LoaderType};
use crate::core::launch::{LaunchOrchestrator, LaunchOutcome, RuntimePrefs};
use crate::core::lockfile::{self, InstanceLockfile};
use crate::core::rollback::{self, RollbackReason};
use crate::core::state::AppContext;

#[derive(Debug, Parser)]
#[command(name = "interface")]
#[command(about = "Content resolution, lockfiles and launches for Minecraft instances", long_about = None)]
pub struct Cli {
    /// Data directory (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create and list instances
    Instance {
        #[command(subcommand)]
        action: InstanceAction,
    },
    /// Resolve, toggle and preset catalog content
    Content {
        #[command(subcommand)]
        action: ContentAction,
    },
    /// Generate, apply and verify instance lockfiles
    Lock {
        #[command(subcommand)]
        action: LockAction,
    },
    /// Configuration snapshots
    Rollback {
        #[command(subcommand)]
        action: RollbackAction,
    },
    /// Loader metadata
    Loader {
        #[command(subcommand)]
        action: LoaderAction,
    },
    /// Bootstrap and launch an instance, waiting for the game to exit
    Launch(LaunchArgs),
}

#[derive(Debug, Subcommand)]
pub enum InstanceAction {
    Create {
        name: String,
        /// Minecraft version, e.g. 1.20.1
        #[arg(long = "version")]
        minecraft_version: String,
        #[arg(long, default_value = "vanilla")]
        loader: LoaderType,
        /// Pin a loader version instead of picking one at launch
        #[arg(long)]
        loader_version: Option<String>,
        #[arg(long)]
        max_memory_mb: Option<u32>,
    },
    List,
    Delete {
        id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindSelection {
    Mods,
    Packs,
    All,
}

impl KindSelection {
    fn kinds(self) -> &'static [ContentKind] {
        match self {
            KindSelection::Mods => &[ContentKind::Mod],
            KindSelection::Packs => &ContentKind::PACKS,
            KindSelection::All => &ContentKind::ALL,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ContentAction {
    /// Resolve catalog entries for the instance's game version
    Refresh {
        id: String,
        #[arg(long, value_enum, default_value = "all")]
        kinds: KindSelection,
    },
    /// Enable or disable one catalog entry
    Toggle {
        id: String,
        entry: String,
        #[arg(long, action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Apply a catalog preset
    Preset {
        id: String,
        preset: String,
    },
    /// Install required dependencies the catalog does not provide
    Dependencies {
        id: String,
    },
    /// Print the stored content state
    Status {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum LockAction {
    Generate {
        id: String,
    },
    Apply {
        id: String,
        /// Lockfile to reproduce
        #[arg(long)]
        file: PathBuf,
    },
    Drift {
        id: String,
        /// Compare against this lockfile instead of the instance's own
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum RollbackAction {
    Snapshot {
        id: String,
        #[arg(long)]
        note: Option<String>,
    },
    List {
        id: String,
    },
    Restore {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum LoaderAction {
    Versions {
        loader: LoaderType,
        game_version: String,
    },
}

#[derive(Debug, Args)]
pub struct LaunchArgs {
    pub id: String,
    /// JSON file holding a launch account profile
    #[arg(long, conflicts_with = "offline")]
    pub account: Option<PathBuf>,
    /// Offline player name
    #[arg(long)]
    pub offline: Option<String>,
    #[arg(long)]
    pub fullscreen: bool,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    /// Extra JVM arguments, whitespace separated
    #[arg(long, allow_hyphen_values = true)]
    pub jvm_args: Option<String>,
    #[arg(long)]
    pub g1gc: bool,
}

pub async fn execute(cli: Cli) -> LauncherResult<Value> {
    let ctx = Arc::new(AppContext::load(cli.data_dir).await?);

    match cli.command {
        Command::Instance { action } => instance_command(&ctx, action).await,
        Command::Content { action } => content_command(&ctx, action).await,
        Command::Lock { action } => lock_command(&ctx, action).await,
        Command::Rollback { action } => rollback_command(&ctx, action).await,
        Command::Loader {
            action: LoaderAction::Versions { loader, game_version },
        } => {
            let versions = ctx
                .loaders
                .metadata(loader, &game_version)
                .await?
                .map(|metadata| metadata.versions())
                .unwrap_or_default();
            Ok(json!({ "loader": loader, "gameVersion": game_version, "versions": versions }))
        }
        Command::Launch(args) => launch_command(ctx, args).await,
    }
}

async fn instance_command(ctx: &AppContext, action: InstanceAction) -> LauncherResult<Value> {
    match action {
        InstanceAction::Create {
            name,
            minecraft_version,
            loader,
            loader_version,
            max_memory_mb,
        } => {
            let instance = ctx
                .instances
                .create(Instance::new(
                    name,
                    minecraft_version,
                    loader,
                    loader_version,
                    max_memory_mb.unwrap_or(ctx.settings.default_max_memory_mb),
                    &ctx.paths.instances_dir(),
                ))
                .await?;
            Ok(serde_json::to_value(instance)?)
        }
        InstanceAction::List => Ok(serde_json::to_value(ctx.instances.list().await?)?),
        InstanceAction::Delete { id } => {
            let _guard = ctx.locks.acquire(&id).await;
            ctx.instances.delete(&id).await?;
            Ok(json!({ "deleted": id }))
        }
    }
}

async fn content_command(ctx: &AppContext, action: ContentAction) -> LauncherResult<Value> {
    let value = match action {
        ContentAction::Refresh { id, kinds } => {
            serde_json::to_value(content::refresh(ctx, &id, kinds.kinds()).await?)?
        }
        ContentAction::Toggle { id, entry, enabled } => {
            serde_json::to_value(content::set_enabled(ctx, &id, &entry, enabled).await?)?
        }
        ContentAction::Preset { id, preset } => {
            serde_json::to_value(content::apply_preset(ctx, &id, &preset).await?)?
        }
        ContentAction::Dependencies { id } => {
            serde_json::to_value(content::install_missing_dependencies(ctx, &id).await?)?
        }
        ContentAction::Status { id } => {
            ctx.instances.load(&id).await?;
            serde_json::to_value(ContentState::load(&ctx.store, &id).await?)?
        }
    };
    Ok(value)
}

async fn lock_command(ctx: &AppContext, action: LockAction) -> LauncherResult<Value> {
    let value = match action {
        LockAction::Generate { id } => serde_json::to_value(lockfile::generate(ctx, &id).await?)?,
        LockAction::Apply { id, file } => {
            let lock = read_lockfile(&file).await?;
            serde_json::to_value(lockfile::apply(ctx, &id, lock).await?)?
        }
        LockAction::Drift { id, file } => {
            let lock = match file {
                Some(file) => Some(read_lockfile(&file).await?),
                None => None,
            };
            serde_json::to_value(lockfile::check_drift(ctx, &id, lock).await?)?
        }
    };
    Ok(value)
}

async fn read_lockfile(path: &std::path::Path) -> LauncherResult<InstanceLockfile> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(LauncherError::io(path))?;
    InstanceLockfile::from_json(&raw)
}

async fn rollback_command(ctx: &AppContext, action: RollbackAction) -> LauncherResult<Value> {
    let value = match action {
        RollbackAction::Snapshot { id, note } => {
            serde_json::to_value(rollback::snapshot(ctx, &id, RollbackReason::Manual, note).await?)?
        }
        RollbackAction::List { id } => serde_json::to_value(rollback::list(ctx, &id).await?)?,
        RollbackAction::Restore { id } => serde_json::to_value(rollback::restore_latest(ctx, &id).await?)?,
    };
    Ok(value)
}

// ── Launch ──────────────────────────────────────────────

async fn launch_command(ctx: Arc<AppContext>, args: LaunchArgs) -> LauncherResult<Value> {
    let account = match (&args.account, &args.offline) {
        (Some(path), _) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .map_err(LauncherError::io(path))?;
            serde_json::from_str::<LaunchAccountProfile>(&raw)?
        }
        (None, Some(name)) => LaunchAccountProfile::offline(name),
        (None, None) => {
            return Err(LauncherError::InvalidCredential(
                "se requiere --account o --offline".into(),
            ))
        }
    };
    let prefs = RuntimePrefs {
        fullscreen: args.fullscreen,
        width: args.width,
        height: args.height,
        extra_jvm_args: args.jvm_args.unwrap_or_default(),
        prefer_g1gc: args.g1gc,
    };

    let printer = tokio::spawn(print_launch_events(ctx.events.subscribe(), args.id.clone()));
    let mut exits = ctx.events.subscribe();
    let orchestrator = LaunchOrchestrator::from_settings(ctx);

    let result = run_until_exit(&orchestrator, &mut exits, &args.id, account, prefs).await;
    printer.abort();
    result
}

async fn run_until_exit(
    orchestrator: &LaunchOrchestrator,
    exits: &mut tokio::sync::broadcast::Receiver<LauncherEvent>,
    instance_id: &str,
    account: LaunchAccountProfile,
    prefs: RuntimePrefs,
) -> LauncherResult<Value> {
    let outcome = orchestrator.launch(instance_id, account, prefs).await?;
    let pid = match outcome {
        LaunchOutcome::Running { pid } => pid,
        cancelled => return Ok(serde_json::to_value(cancelled)?),
    };

    loop {
        tokio::select! {
            event = exits.recv() => match event {
                Ok(LauncherEvent::ProcessExited { instance_id: id, code, success }) if id == instance_id => {
                    return Ok(json!({ "outcome": "exited", "pid": pid, "code": code, "success": success }));
                }
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Ok(json!({ "outcome": "running", "pid": pid })),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; stopping instance {}", instance_id);
                orchestrator.stop(instance_id).await?;
            }
        }
    }
}

async fn print_launch_events(mut rx: tokio::sync::broadcast::Receiver<LauncherEvent>, instance_id: String) {
    loop {
        match rx.recv().await {
            Ok(LauncherEvent::LaunchProgress { instance_id: id, value, stage, .. }) if id == instance_id => {
                eprintln!("[{value:>3}%] {stage}");
            }
            Ok(LauncherEvent::LaunchLog { instance_id: id, level, message }) if id == instance_id => {
                eprintln!("[{level}] {message}");
            }
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
    }
}
