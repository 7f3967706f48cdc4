// ─── Rollback Manager ───
// Bounded per-instance history of configuration + enabled flags. Snapshots
// carry intent only; restoring runs a full resolver pass to converge files.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::core::catalog::ContentKind;
use crate::core::content::resolver::refresh_unlocked;
use crate::core::content::{ContentState, ResolvedArtifact};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::{Instance, InstanceConfig};
use crate::core::state::AppContext;

pub const MAX_SNAPSHOTS: usize = 8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RollbackReason {
    PresetApply,
    ModsRefresh,
    PacksRefresh,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RollbackSnapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub reason: RollbackReason,
    #[serde(default)]
    pub note: Option<String>,
    pub config: InstanceConfig,
    pub enabled_mods: BTreeMap<String, bool>,
    /// Resource and shader packs.
    pub enabled_packs: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub snapshot: RollbackSnapshot,
    pub resolved: BTreeMap<String, ResolvedArtifact>,
}

fn history_key(instance_id: &str) -> String {
    format!("instances/{instance_id}/rollback")
}

pub async fn list(ctx: &AppContext, instance_id: &str) -> LauncherResult<Vec<RollbackSnapshot>> {
    ctx.store.read_or_default(&history_key(instance_id)).await
}

pub async fn snapshot(
    ctx: &AppContext,
    instance_id: &str,
    reason: RollbackReason,
    note: Option<String>,
) -> LauncherResult<RollbackSnapshot> {
    let _guard = ctx.locks.acquire(instance_id).await;
    let instance = ctx.instances.load(instance_id).await?;
    snapshot_unlocked(ctx, &instance, reason, note).await
}

/// Push a snapshot of the current intent; the oldest beyond the cap is dropped.
pub(crate) async fn snapshot_unlocked(
    ctx: &AppContext,
    instance: &Instance,
    reason: RollbackReason,
    note: Option<String>,
) -> LauncherResult<RollbackSnapshot> {
    let state = ContentState::load(&ctx.store, &instance.id).await?;
    let enabled_mods = state.effective_flags(&ctx.catalog, ContentKind::Mod);
    let enabled_packs = ContentKind::PACKS
        .iter()
        .flat_map(|&kind| state.effective_flags(&ctx.catalog, kind))
        .collect();

    let snapshot = RollbackSnapshot {
        id: Uuid::new_v4().to_string(),
        created_at: Utc::now(),
        reason,
        note,
        config: instance.config(),
        enabled_mods,
        enabled_packs,
    };

    let mut history = list(ctx, &instance.id).await?;
    history.insert(0, snapshot.clone());
    history.truncate(MAX_SNAPSHOTS);
    ctx.store.write(&history_key(&instance.id), &history).await?;

    info!(
        "Rollback snapshot {} ({:?}) recorded for instance {}",
        snapshot.id, reason, instance.id
    );
    Ok(snapshot)
}

/// Write the newest snapshot back, drop it from the history and converge
/// every content kind to the restored flags.
pub async fn restore_latest(ctx: &AppContext, instance_id: &str) -> LauncherResult<RestoreOutcome> {
    let _guard = ctx.locks.acquire(instance_id).await;
    let mut instance = ctx.instances.load(instance_id).await?;

    let mut history = list(ctx, instance_id).await?;
    if history.is_empty() {
        return Err(LauncherError::NoSnapshot(instance_id.to_string()));
    }
    let snapshot = history.remove(0);

    instance.apply_config(&snapshot.config);
    ctx.instances.save(&instance).await?;

    let mut state = ContentState::load(&ctx.store, instance_id).await?;
    state.replace_flags(ContentKind::Mod, snapshot.enabled_mods.clone());
    for kind in ContentKind::PACKS {
        let flags = ctx
            .catalog
            .entries_of(kind)
            .filter_map(|entry| {
                snapshot
                    .enabled_packs
                    .get(&entry.id)
                    .map(|&enabled| (entry.id.clone(), enabled))
            })
            .collect();
        state.replace_flags(kind, flags);
    }
    state.save(&ctx.store, instance_id).await?;
    ctx.store.write(&history_key(instance_id), &history).await?;

    info!("Restored snapshot {} on instance {}", snapshot.id, instance_id);
    let resolved = refresh_unlocked(ctx, &instance, &ContentKind::ALL).await?;
    Ok(RestoreOutcome { snapshot, resolved })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Catalog;
    use crate::core::content::set_enabled;
    use crate::core::instance::LoaderType;
    use crate::core::testing::{entry, placed_names, project_of, TestEnv};

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                entry("sodium", ContentKind::Mod, false, true),
                entry("faithful", ContentKind::ResourcePack, false, false),
                entry("bsl", ContentKind::ShaderPack, false, false),
            ],
            vec![],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn history_is_capped_and_newest_first() {
        let env = TestEnv::new(catalog());
        let instance = env.instance(LoaderType::Fabric).await;

        for i in 0..10 {
            snapshot(&env.ctx, &instance.id, RollbackReason::Manual, Some(format!("n{i}")))
                .await
                .unwrap();
        }

        let history = list(&env.ctx, &instance.id).await.unwrap();
        assert_eq!(history.len(), MAX_SNAPSHOTS);
        assert_eq!(history[0].note.as_deref(), Some("n9"));
        assert_eq!(history[7].note.as_deref(), Some("n2"));
        assert_eq!(history[0].enabled_mods["sodium"], true);
        assert_eq!(history[0].enabled_packs.len(), 2);
    }

    #[tokio::test]
    async fn restore_brings_back_config_flags_and_files() {
        let env = TestEnv::new(catalog());
        let instance = env.instance(LoaderType::Fabric).await;
        env.registry.publish(&project_of("sodium"), "v1", "sodium.jar", b"sodium");
        env.registry.publish(&project_of("bsl"), "v1", "bsl.zip", b"bsl");

        snapshot(&env.ctx, &instance.id, RollbackReason::Manual, None).await.unwrap();

        let mut changed = env.ctx.instances.load(&instance.id).await.unwrap();
        changed.max_memory_mb = 1024;
        env.ctx.instances.save(&changed).await.unwrap();
        set_enabled(&env.ctx, &instance.id, "sodium", false).await.unwrap();
        set_enabled(&env.ctx, &instance.id, "bsl", true).await.unwrap();

        let outcome = restore_latest(&env.ctx, &instance.id).await.unwrap();
        assert!(outcome.resolved["sodium"].is_ok());
        assert!(!outcome.resolved["bsl"].is_ok());

        let restored = env.ctx.instances.load(&instance.id).await.unwrap();
        assert_eq!(restored.max_memory_mb, 4096);
        assert_eq!(placed_names(&restored, ContentKind::Mod).await, vec!["sodium__sodium.jar"]);
        assert!(placed_names(&restored, ContentKind::ShaderPack).await.is_empty());
        assert!(list(&env.ctx, &instance.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn restoring_an_empty_history_fails() {
        let env = TestEnv::new(catalog());
        let instance = env.instance(LoaderType::Vanilla).await;
        assert!(matches!(
            restore_latest(&env.ctx, &instance.id).await,
            Err(LauncherError::NoSnapshot(_))
        ));
    }

    #[test]
    fn reasons_are_kebab_case() {
        assert_eq!(
            serde_json::to_string(&RollbackReason::PresetApply).unwrap(),
            "\"preset-apply\""
        );
    }
}
