use std::collections::BTreeMap;

use tracing::info;

use super::resolver::refresh_unlocked;
use super::state::{ContentState, ResolvedArtifact};
use crate::core::catalog::ContentKind;
use crate::core::error::LauncherResult;
use crate::core::rollback::{self, RollbackReason};
use crate::core::state::AppContext;

/// Enable exactly the preset's entries (required ones stay on), store the
/// preset id and memory override, then refresh every kind.
pub async fn apply_preset(
    ctx: &AppContext,
    instance_id: &str,
    preset_id: &str,
) -> LauncherResult<BTreeMap<String, ResolvedArtifact>> {
    let preset = ctx.catalog.preset(preset_id)?.clone();
    let _guard = ctx.locks.acquire(instance_id).await;
    let mut instance = ctx.instances.load(instance_id).await?;

    rollback::snapshot_unlocked(
        ctx,
        &instance,
        RollbackReason::PresetApply,
        Some(format!("preset {}", preset.id)),
    )
    .await?;

    let mut state = ContentState::load(&ctx.store, instance_id).await?;
    for entry in &ctx.catalog.entries {
        state.set_flag(entry.kind, &entry.id, preset.enabled.contains(&entry.id));
    }
    state.save(&ctx.store, instance_id).await?;

    instance.preset_id = Some(preset.id.clone());
    if let Some(max_memory_mb) = preset.max_memory_mb {
        instance.max_memory_mb = max_memory_mb;
        instance.min_memory_mb = instance.min_memory_mb.min(max_memory_mb);
    }
    ctx.instances.save(&instance).await?;

    info!("Applied preset '{}' to instance {}", preset.id, instance_id);
    refresh_unlocked(ctx, &instance, &ContentKind::ALL).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{Catalog, Preset};
    use crate::core::error::LauncherError;
    use crate::core::instance::LoaderType;
    use crate::core::testing::{entry, placed_names, project_of, TestEnv};

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                entry("sodium", ContentKind::Mod, true, false),
                entry("iris", ContentKind::Mod, false, true),
                entry("zoomify", ContentKind::Mod, false, false),
                entry("bsl", ContentKind::ShaderPack, false, false),
            ],
            vec![Preset {
                id: "shaders".into(),
                display_name: "Shaders".into(),
                enabled: vec!["zoomify".into(), "bsl".into()],
                max_memory_mb: Some(6144),
            }],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn preset_flags_replace_everything_else() {
        let env = TestEnv::new(catalog());
        let instance = env.instance(LoaderType::Fabric).await;
        for id in ["sodium", "iris", "zoomify", "bsl"] {
            env.registry.publish(&project_of(id), "v1", &format!("{id}.jar"), id.as_bytes());
        }

        let result = apply_preset(&env.ctx, &instance.id, "shaders").await.unwrap();
        assert!(result["sodium"].is_ok());
        assert!(!result["iris"].is_ok());
        assert!(result["zoomify"].is_ok());
        assert!(result["bsl"].is_ok());

        assert_eq!(
            placed_names(&instance, ContentKind::Mod).await,
            vec!["sodium__sodium.jar", "zoomify__zoomify.jar"]
        );
        assert_eq!(placed_names(&instance, ContentKind::ShaderPack).await, vec!["bsl__bsl.jar"]);

        let reloaded = env.ctx.instances.load(&instance.id).await.unwrap();
        assert_eq!(reloaded.preset_id.as_deref(), Some("shaders"));
        assert_eq!(reloaded.max_memory_mb, 6144);

        let history = rollback::list(&env.ctx, &instance.id).await.unwrap();
        assert_eq!(history[0].reason, RollbackReason::PresetApply);
        assert_eq!(history[0].config.preset_id, None);
    }

    #[tokio::test]
    async fn unknown_preset_changes_nothing() {
        let env = TestEnv::new(catalog());
        let instance = env.instance(LoaderType::Fabric).await;

        assert!(matches!(
            apply_preset(&env.ctx, &instance.id, "missing").await,
            Err(LauncherError::PresetNotFound(_))
        ));
        assert!(rollback::list(&env.ctx, &instance.id).await.unwrap().is_empty());
    }
}
