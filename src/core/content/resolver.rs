use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::dependencies::prune_dependencies;
use super::placement::{cache_path, placed_files_for, remove_placed, PlacedFile};
use super::state::{ContentState, ResolvedArtifact};
use crate::core::catalog::{CatalogEntry, ContentKind};
use crate::core::downloader::{verify_bytes, ExpectedHashes};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs::{copy_atomic, is_non_empty_file, write_atomic};
use crate::core::instance::{Instance, LoaderType};
use crate::core::rollback::{self, RollbackReason};
use crate::core::state::AppContext;

/// Loader tag sent with a registry lookup; packs are never filtered.
pub fn loader_filter(loader: LoaderType, kind: ContentKind) -> Option<&'static str> {
    if kind.filters_by_loader() {
        loader.registry_tag()
    } else {
        None
    }
}

// ── Refresh pass ────────────────────────────────────────

/// Resolve every catalog entry of `kinds` for the instance's game version and
/// converge the content directories. Records a rollback snapshot first.
pub async fn refresh(
    ctx: &AppContext,
    instance_id: &str,
    kinds: &[ContentKind],
) -> LauncherResult<BTreeMap<String, ResolvedArtifact>> {
    let _guard = ctx.locks.acquire(instance_id).await;
    let instance = ctx.instances.load(instance_id).await?;

    let reason = if kinds.contains(&ContentKind::Mod) {
        RollbackReason::ModsRefresh
    } else {
        RollbackReason::PacksRefresh
    };
    rollback::snapshot_unlocked(ctx, &instance, reason, None).await?;

    refresh_unlocked(ctx, &instance, kinds).await
}

/// Refresh without taking the instance lock; the caller holds it.
pub(crate) async fn refresh_unlocked(
    ctx: &AppContext,
    instance: &Instance,
    kinds: &[ContentKind],
) -> LauncherResult<BTreeMap<String, ResolvedArtifact>> {
    ctx.instances.ensure_structure(instance).await?;
    let mut state = ContentState::load(&ctx.store, &instance.id).await?;
    let mut results = BTreeMap::new();

    for &kind in kinds {
        for entry in ctx.catalog.entries_of(kind) {
            let artifact = refresh_entry(ctx, instance, &state, entry).await;
            state.set_resolved(kind, &entry.id, artifact.clone());
            results.insert(entry.id.clone(), artifact);
        }
    }
    if kinds.contains(&ContentKind::Mod) {
        prune_dependencies(ctx, instance, &mut state).await?;
    }

    state.save(&ctx.store, &instance.id).await?;

    let ok = results.values().filter(|a| a.is_ok()).count();
    info!(
        "Refreshed {} entries for instance {} ({} ok)",
        results.len(),
        instance.id,
        ok
    );
    Ok(results)
}

/// Entry-scoped failures become `error` records; they never abort the pass.
async fn refresh_entry(
    ctx: &AppContext,
    instance: &Instance,
    state: &ContentState,
    entry: &CatalogEntry,
) -> ResolvedArtifact {
    let game_version = &instance.minecraft_version;
    let loader = loader_filter(instance.loader, entry.kind);

    if !state.is_enabled(entry) {
        let dir = instance.content_dir(entry.kind);
        if let Err(e) = remove_placed(&dir, &entry.id, None).await {
            warn!("Could not clear disabled entry {}: {}", entry.id, e);
            return ResolvedArtifact::failed(game_version, loader, e.to_string());
        }
        return match state.resolved(entry.kind, &entry.id) {
            Some(previous) => previous.tombstone(None),
            None => ResolvedArtifact::unavailable(game_version, loader),
        };
    }

    match resolve_and_place(ctx, instance, entry.kind, &entry.id, &entry.upstream_project_id).await {
        Ok(artifact) => artifact,
        Err(e) => {
            warn!(
                "Entry {} failed for instance {}: {}",
                entry.id, instance.id, e
            );
            ResolvedArtifact::failed(game_version, loader, e.to_string())
        }
    }
}

/// Resolve `project_id`, make sure its verified bytes are cached, and place
/// them as `{placement_id}__{name}`. Shared by catalog entries and
/// auto-installed dependencies.
pub(super) async fn resolve_and_place(
    ctx: &AppContext,
    instance: &Instance,
    kind: ContentKind,
    placement_id: &str,
    project_id: &str,
) -> LauncherResult<ResolvedArtifact> {
    let game_version = &instance.minecraft_version;
    let loader = loader_filter(instance.loader, kind);
    let dir = instance.content_dir(kind);

    let Some(file) = ctx
        .registry
        .resolve_latest(project_id, game_version, loader)
        .await?
    else {
        debug!("{} has nothing for {} / {:?}", project_id, game_version, loader);
        remove_placed(&dir, placement_id, None).await?;
        return Ok(ResolvedArtifact::unavailable(game_version, loader));
    };

    let cached = cache_path(
        &ctx.paths.content_cache_dir(),
        kind,
        placement_id,
        &file.file_name,
        file.sha1.as_deref(),
    );
    if is_non_empty_file(&cached).await {
        debug!("Cache hit for {} at {:?}", placement_id, cached);
    } else {
        let bytes = ctx.registry.download_buffer(&file.url).await?;
        // Bytes that fail verification never reach the cache.
        verify_bytes(
            &bytes,
            &ExpectedHashes::new(file.sha1.as_deref(), file.sha512.as_deref()),
            &file.file_name,
        )?;
        write_atomic(&cached, &bytes).await?;
    }

    let placed = PlacedFile::new(placement_id, &file.file_name, true).to_file_name();
    remove_placed(&dir, placement_id, Some(&placed)).await?;
    copy_atomic(&cached, &dir.join(&placed)).await?;

    Ok(ResolvedArtifact::resolved(&file, game_version, loader, placed))
}

// ── Single-entry toggle ─────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToggleOutcome {
    /// File state now matches the flag.
    Applied { placed_file_name: Option<String> },
    /// Required entries stay enabled.
    RequiredLocked,
    /// Flag stored, but nothing local can be placed; a refresh is needed.
    NeedsRefresh,
}

pub async fn set_enabled(
    ctx: &AppContext,
    instance_id: &str,
    entry_id: &str,
    enabled: bool,
) -> LauncherResult<ToggleOutcome> {
    let entry = ctx.catalog.entry(entry_id)?.clone();
    let _guard = ctx.locks.acquire(instance_id).await;
    let instance = ctx.instances.load(instance_id).await?;

    if entry.required && !enabled {
        info!("Ignoring disable of required entry {}", entry.id);
        return Ok(ToggleOutcome::RequiredLocked);
    }

    let mut state = ContentState::load(&ctx.store, instance_id).await?;
    state.set_flag(entry.kind, &entry.id, enabled);

    let outcome = if enabled {
        enable_entry(ctx, &instance, &mut state, &entry).await?
    } else {
        let outcome = disable_entry(&instance, &mut state, &entry).await?;
        if entry.kind == ContentKind::Mod {
            prune_dependencies(ctx, &instance, &mut state).await?;
        }
        outcome
    };

    state.save(&ctx.store, instance_id).await?;
    debug!("Toggled {} -> {} on {}: {:?}", entry.id, enabled, instance_id, outcome);
    Ok(outcome)
}

async fn enable_entry(
    ctx: &AppContext,
    instance: &Instance,
    state: &mut ContentState,
    entry: &CatalogEntry,
) -> LauncherResult<ToggleOutcome> {
    let dir = instance.content_dir(entry.kind);
    let loader = loader_filter(instance.loader, entry.kind);
    let record = state.resolved(entry.kind, &entry.id).cloned();

    // Resolved for another game version or loader: nothing on disk is reusable.
    if record
        .as_ref()
        .is_some_and(|r| {
            r.game_version != instance.minecraft_version || r.loader.as_deref() != loader
        })
    {
        return Ok(ToggleOutcome::NeedsRefresh);
    }

    // 1. cached bytes from the last resolution
    if let Some(record) = &record {
        let cached = record.cache_path(&ctx.paths.content_cache_dir(), entry.kind, &entry.id);
        if let (Some(cached), Some(upstream)) = (cached, record.upstream_file_name.as_deref()) {
            if is_non_empty_file(&cached).await {
                let placed = PlacedFile::new(&entry.id, upstream, true).to_file_name();
                remove_placed(&dir, &entry.id, Some(&placed)).await?;
                copy_atomic(&cached, &dir.join(&placed)).await?;
                state.set_resolved(entry.kind, &entry.id, record.revived(placed.clone()));
                return Ok(ToggleOutcome::Applied {
                    placed_file_name: Some(placed),
                });
            }
        }
    }

    // 2. a previously disabled file
    let existing = placed_files_for(&dir, &entry.id).await?;
    if let Some(active) = existing.iter().find(|p| p.enabled) {
        return Ok(ToggleOutcome::Applied {
            placed_file_name: Some(active.to_file_name()),
        });
    }
    if let Some(disabled) = existing.first() {
        let placed = disabled.with_enabled(true).to_file_name();
        tokio::fs::rename(dir.join(disabled.to_file_name()), dir.join(&placed))
            .await
            .map_err(LauncherError::io(dir.join(&placed)))?;
        if let Some(record) = &record {
            state.set_resolved(entry.kind, &entry.id, record.revived(placed.clone()));
        }
        return Ok(ToggleOutcome::Applied {
            placed_file_name: Some(placed),
        });
    }

    Ok(ToggleOutcome::NeedsRefresh)
}

async fn disable_entry(
    instance: &Instance,
    state: &mut ContentState,
    entry: &CatalogEntry,
) -> LauncherResult<ToggleOutcome> {
    let dir = instance.content_dir(entry.kind);
    let mut disabled_name = None;

    for placed in placed_files_for(&dir, &entry.id).await? {
        let target = placed.with_enabled(false).to_file_name();
        if placed.enabled {
            tokio::fs::rename(dir.join(placed.to_file_name()), dir.join(&target))
                .await
                .map_err(LauncherError::io(dir.join(&target)))?;
        }
        disabled_name = Some(target);
    }

    if let Some(record) = state.resolved(entry.kind, &entry.id).cloned() {
        state.set_resolved(entry.kind, &entry.id, record.tombstone(disabled_name.clone()));
    }

    Ok(ToggleOutcome::Applied {
        placed_file_name: disabled_name,
    })
}
