use std::collections::{BTreeMap, HashSet, VecDeque};

use tracing::{info, warn};

use super::placement::{remove_placed, sanitize_file_name};
use super::resolver::{loader_filter, resolve_and_place};
use super::state::{ContentState, ResolvedArtifact};
use crate::core::catalog::{ContentKind, DEPENDENCY_ID_PREFIX};
use crate::core::error::LauncherResult;
use crate::core::fs::is_non_empty_file;
use crate::core::instance::Instance;
use crate::core::state::AppContext;

/// Placement id of an auto-installed dependency project.
pub fn dependency_placement_id(project_id: &str) -> String {
    let mut id = sanitize_file_name(project_id);
    while id.contains("__") {
        id = id.replace("__", "_");
    }
    // A trailing `_` would fold into the `__` separator on disk.
    format!("{DEPENDENCY_ID_PREFIX}{}", id.trim_end_matches('_'))
}

/// Resolve and place every required dependency of the instance's mods that
/// the catalog does not already provide. Returns what was (re)installed.
///
/// Dependencies no enabled mod reaches anymore are removed from disk and
/// from the content state.
pub async fn install_missing_dependencies(
    ctx: &AppContext,
    instance_id: &str,
) -> LauncherResult<BTreeMap<String, ResolvedArtifact>> {
    let _guard = ctx.locks.acquire(instance_id).await;
    let instance = ctx.instances.load(instance_id).await?;
    install_missing_dependencies_unlocked(ctx, &instance).await
}

pub(crate) async fn install_missing_dependencies_unlocked(
    ctx: &AppContext,
    instance: &Instance,
) -> LauncherResult<BTreeMap<String, ResolvedArtifact>> {
    let mut installed = BTreeMap::new();
    let mut state = ContentState::load(&ctx.store, &instance.id).await?;
    let mods_dir = instance.content_dir(ContentKind::Mod);

    let mut queue = root_dependencies(ctx, instance, &state);
    let mut seen = HashSet::new();

    while let Some(project) = queue.pop_front() {
        if !seen.insert(project.clone()) || ctx.catalog.contains_project(&project) {
            continue;
        }

        if let Some(existing) = state.dependencies.get(&project) {
            let present = match existing.placed_file_name.as_deref() {
                Some(name) => is_non_empty_file(&mods_dir.join(name)).await,
                None => false,
            };
            if existing.is_ok() && existing.game_version == instance.minecraft_version && present {
                queue.extend(existing.dependencies.iter().cloned());
                continue;
            }
        }

        let placement_id = dependency_placement_id(&project);
        let artifact = match resolve_and_place(ctx, instance, ContentKind::Mod, &placement_id, &project).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!("Dependency {} failed for instance {}: {}", project, instance.id, e);
                ResolvedArtifact::failed(
                    &instance.minecraft_version,
                    loader_filter(instance.loader, ContentKind::Mod),
                    e.to_string(),
                )
            }
        };

        queue.extend(artifact.dependencies.iter().cloned());
        state.dependencies.insert(project.clone(), artifact.clone());
        installed.insert(project, artifact);
    }

    remove_unreached(instance, &mut state, &seen).await?;
    state.save(&ctx.store, &instance.id).await?;
    if !installed.is_empty() {
        info!(
            "Installed {} missing dependencies for instance {}",
            installed.len(),
            instance.id
        );
    }
    Ok(installed)
}

/// Drop dependencies the enabled mods no longer reach, walking only the
/// metadata already recorded in `state`. Used after a mod is disabled.
pub(crate) async fn prune_dependencies(
    ctx: &AppContext,
    instance: &Instance,
    state: &mut ContentState,
) -> LauncherResult<()> {
    let mut queue = root_dependencies(ctx, instance, state);
    let mut seen = HashSet::new();
    while let Some(project) = queue.pop_front() {
        if !seen.insert(project.clone()) {
            continue;
        }
        if let Some(record) = state.dependencies.get(&project) {
            queue.extend(record.dependencies.iter().cloned());
        }
    }
    remove_unreached(instance, state, &seen).await
}

// Direct dependencies of enabled, resolved catalog mods.
fn root_dependencies(ctx: &AppContext, instance: &Instance, state: &ContentState) -> VecDeque<String> {
    if !instance.loader.is_code_loader() {
        return VecDeque::new();
    }
    ctx.catalog
        .entries_of(ContentKind::Mod)
        .filter(|entry| state.is_enabled(entry))
        .filter_map(|entry| state.resolved(ContentKind::Mod, &entry.id))
        .filter(|record| record.is_ok())
        .flat_map(|record| record.dependencies.iter().cloned())
        .collect()
}

async fn remove_unreached(
    instance: &Instance,
    state: &mut ContentState,
    reached: &HashSet<String>,
) -> LauncherResult<()> {
    let mods_dir = instance.content_dir(ContentKind::Mod);
    let unreached: Vec<String> = state
        .dependencies
        .keys()
        .filter(|project| !reached.contains(*project))
        .cloned()
        .collect();
    for project in unreached {
        remove_placed(&mods_dir, &dependency_placement_id(&project), None).await?;
        state.dependencies.remove(&project);
        info!("Removed unused dependency {} from instance {}", project, instance.id);
    }
    Ok(())
}
