use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use super::drift::{check_drift_unlocked, LockfileDriftReport};
use super::model::{InstanceLockfile, LockfileArtifactEntry, LockfileInstance, SCHEMA_VERSION};
use crate::core::catalog::{ContentKind, DEPENDENCY_ID_PREFIX};
use crate::core::content::dependencies::dependency_placement_id;
use crate::core::content::resolver::loader_filter;
use crate::core::content::{is_managed, ContentState, PlacedFile, ResolvedArtifact};
use crate::core::downloader::{file_matches, verify_bytes, ExpectedHashes};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs::{copy_atomic, is_non_empty_file, list_file_names, remove_file_if_exists, write_atomic};
use crate::core::state::AppContext;

const MAX_CONCURRENT_STAGING: usize = 4;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCounts {
    pub mods: usize,
    pub resourcepacks: usize,
    pub shaderpacks: usize,
    /// Disabled or not-ok entries; nothing to place.
    pub skipped: usize,
    pub failed: usize,
}

impl AppliedCounts {
    fn placed(&mut self, kind: ContentKind) {
        match kind {
            ContentKind::Mod => self.mods += 1,
            ContentKind::ResourcePack => self.resourcepacks += 1,
            ContentKind::ShaderPack => self.shaderpacks += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ApplyIssue {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockfileApplyResult {
    pub applied: AppliedCounts,
    pub issues: Vec<ApplyIssue>,
    pub drift: LockfileDriftReport,
}

// ── Generate ────────────────────────────────────────────

/// Record the current intent and resolution of every catalog entry (and
/// every auto-installed dependency), then write it next to the instance.
pub async fn generate(ctx: &AppContext, instance_id: &str) -> LauncherResult<InstanceLockfile> {
    let _guard = ctx.locks.acquire(instance_id).await;
    let instance = ctx.instances.load(instance_id).await?;
    let state = ContentState::load(&ctx.store, instance_id).await?;

    let mut artifacts = Vec::new();
    let mut notes = Vec::new();

    for kind in ContentKind::ALL {
        for entry in ctx.catalog.entries_of(kind) {
            let enabled = state.is_enabled(entry);
            let artifact = state.resolved(kind, &entry.id).cloned().unwrap_or_else(|| {
                ResolvedArtifact::unavailable(
                    &instance.minecraft_version,
                    loader_filter(instance.loader, kind),
                )
            });
            if enabled && !artifact.is_ok() {
                notes.push(format!("{} is enabled but {}", entry.id, artifact.status));
            }
            artifacts.push(LockfileArtifactEntry {
                id: entry.id.clone(),
                category: kind,
                required: entry.required,
                enabled,
                dependency: false,
                artifact,
            });
        }
    }

    for (project, artifact) in &state.dependencies {
        let id = dependency_placement_id(project);
        if !artifact.is_ok() {
            notes.push(format!("dependency {} is {}", project, artifact.status));
        }
        artifacts.push(LockfileArtifactEntry {
            id,
            category: ContentKind::Mod,
            required: false,
            enabled: true,
            dependency: true,
            artifact: artifact.clone(),
        });
    }

    let lockfile = InstanceLockfile {
        schema_version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        instance: LockfileInstance::from(&instance.config()),
        artifacts,
        notes,
    };
    lockfile.write(&instance.lockfile_path()).await?;

    info!(
        "Lockfile generated for instance {}: {} artifacts, {} notes",
        instance_id,
        lockfile.artifacts.len(),
        lockfile.notes.len()
    );
    Ok(lockfile)
}

// ── Apply ───────────────────────────────────────────────

/// Reproduce the lockfile's state exactly: config, flags and files. Bytes
/// come from each entry's recorded URL and hashes, not from a new lookup.
pub async fn apply(
    ctx: &AppContext,
    instance_id: &str,
    lockfile: InstanceLockfile,
) -> LauncherResult<LockfileApplyResult> {
    lockfile.check_schema()?;

    let _guard = ctx.locks.acquire(instance_id).await;
    let mut instance = ctx.instances.load(instance_id).await?;

    instance.apply_config(&lockfile.instance.to_config());
    ctx.instances.save(&instance).await?;
    ctx.instances.ensure_structure(&instance).await?;

    // Stage first: the cache is filled before any placed file is touched.
    let cache_root = ctx.paths.content_cache_dir();
    let staged: BTreeMap<usize, LauncherResult<PathBuf>> = stream::iter(
        lockfile
            .artifacts
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_expected_on_disk()),
    )
    .map(|(index, entry)| {
        let cache_root = &cache_root;
        async move { (index, stage(ctx, cache_root, entry).await) }
    })
    .buffer_unordered(MAX_CONCURRENT_STAGING)
    .collect()
    .await;

    for kind in ContentKind::ALL {
        let dir = instance.content_dir(kind);
        for name in list_file_names(&dir).await? {
            if is_managed(&name) {
                remove_file_if_exists(&dir.join(&name)).await?;
            }
        }
    }

    let mut counts = AppliedCounts::default();
    let mut issues = Vec::new();
    let mut state = ContentState::default();

    for (index, entry) in lockfile.artifacts.iter().enumerate() {
        let record = match staged.get(&index) {
            None => {
                counts.skipped += 1;
                entry.artifact.tombstone(None)
            }
            Some(Ok(cached)) => match place(&instance.content_dir(entry.category), entry, cached).await {
                Ok(placed) => {
                    counts.placed(entry.category);
                    ResolvedArtifact {
                        placed_file_name: Some(placed),
                        ..entry.artifact.clone()
                    }
                }
                Err(e) => failed_entry(&mut counts, &mut issues, entry, e),
            },
            Some(Err(e)) => {
                let message = e.to_string();
                failed_entry(&mut counts, &mut issues, entry, LauncherError::Other(message))
            }
        };

        if entry.dependency {
            let project = entry
                .id
                .strip_prefix(DEPENDENCY_ID_PREFIX)
                .unwrap_or(&entry.id)
                .to_string();
            state.dependencies.insert(project, record);
        } else {
            let record = if entry.enabled { record } else { entry.artifact.tombstone(None) };
            state.set_flag(entry.category, &entry.id, entry.enabled);
            state.set_resolved(entry.category, &entry.id, record);
        }
    }

    state.save(&ctx.store, instance_id).await?;
    lockfile.write(&instance.lockfile_path()).await?;

    let drift = check_drift_unlocked(ctx, &instance, Some(lockfile)).await?;
    info!(
        "Lockfile applied to {}: {} mods, {} resource packs, {} shader packs, {} issues",
        instance_id,
        counts.mods,
        counts.resourcepacks,
        counts.shaderpacks,
        issues.len()
    );

    Ok(LockfileApplyResult {
        applied: counts,
        issues,
        drift,
    })
}

fn failed_entry(
    counts: &mut AppliedCounts,
    issues: &mut Vec<ApplyIssue>,
    entry: &LockfileArtifactEntry,
    error: LauncherError,
) -> ResolvedArtifact {
    warn!("Lockfile entry {} failed: {}", entry.id, error);
    counts.failed += 1;
    issues.push(ApplyIssue {
        id: entry.id.clone(),
        message: error.to_string(),
    });
    ResolvedArtifact::failed(
        &entry.artifact.game_version,
        entry.artifact.loader.as_deref(),
        error.to_string(),
    )
}

/// Make sure the entry's verified bytes are in the cache; returns their path.
async fn stage(ctx: &AppContext, cache_root: &Path, entry: &LockfileArtifactEntry) -> LauncherResult<PathBuf> {
    let artifact = &entry.artifact;
    let cached = artifact
        .cache_path(cache_root, entry.category, &entry.id)
        .ok_or_else(|| LauncherError::Other(format!("{} records no upstream file name", entry.id)))?;
    let expected = ExpectedHashes::new(artifact.sha1.as_deref(), artifact.sha512.as_deref());

    if is_non_empty_file(&cached).await && file_matches(&cached, &expected).await? != Some(false) {
        return Ok(cached);
    }

    let url = artifact
        .download_url
        .as_deref()
        .ok_or_else(|| LauncherError::Other(format!("{} records no download URL", entry.id)))?;
    let bytes = ctx.registry.download_buffer(url).await?;
    verify_bytes(&bytes, &expected, &entry.id)?;
    write_atomic(&cached, &bytes).await?;
    Ok(cached)
}

async fn place(dir: &Path, entry: &LockfileArtifactEntry, cached: &Path) -> LauncherResult<String> {
    let upstream = entry.artifact.upstream_file_name.as_deref().unwrap_or_default();
    let placed = PlacedFile::new(&entry.id, upstream, true).to_file_name();
    copy_atomic(cached, &dir.join(&placed)).await?;
    Ok(placed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Catalog;
    use crate::core::content::{install_missing_dependencies, refresh, set_enabled};
    use crate::core::instance::LoaderType;
    use crate::core::lockfile::drift::{check_drift, DriftSeverity};
    use crate::core::testing::{entry, placed_names, project_of, TestEnv};

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                entry("sodium", ContentKind::Mod, true, false),
                entry("zoomify", ContentKind::Mod, false, false),
                entry("faithful", ContentKind::ResourcePack, false, true),
                entry("bsl", ContentKind::ShaderPack, false, false),
            ],
            vec![],
        )
        .unwrap()
    }

    async fn resolved_env() -> (TestEnv, crate::core::instance::Instance) {
        let env = TestEnv::new(catalog());
        let instance = env.instance(LoaderType::Fabric).await;
        env.registry.publish(&project_of("sodium"), "0.5.8", "sodium-0.5.8.jar", b"sodium");
        env.registry.set_dependencies(&project_of("sodium"), &["fabric-api"]);
        env.registry.publish("fabric-api", "0.92", "fabric-api.jar", b"api");
        env.registry.publish(&project_of("faithful"), "1.0", "Faithful.zip", b"faithful");
        refresh(&env.ctx, &instance.id, &ContentKind::ALL).await.unwrap();
        install_missing_dependencies(&env.ctx, &instance.id).await.unwrap();
        (env, instance)
    }

    #[tokio::test]
    async fn generate_lists_every_entry_with_explicit_flags() {
        let (env, instance) = resolved_env().await;
        set_enabled(&env.ctx, &instance.id, "bsl", true).await.unwrap();

        let lockfile = generate(&env.ctx, &instance.id).await.unwrap();
        assert_eq!(lockfile.artifacts.len(), 5);

        let zoomify = lockfile.entry(ContentKind::Mod, "zoomify").unwrap();
        assert!(!zoomify.enabled);
        let sodium = lockfile.entry(ContentKind::Mod, "sodium").unwrap();
        assert!(sodium.required && sodium.is_expected_on_disk());
        let dep = lockfile.entry(ContentKind::Mod, "dep-fabric-api").unwrap();
        assert!(dep.dependency);

        // bsl is enabled but was never resolved
        assert_eq!(lockfile.notes.len(), 1);
        assert!(lockfile.notes[0].starts_with("bsl"));
        assert!(instance.lockfile_path().exists());
    }

    #[tokio::test]
    async fn applying_a_generated_lockfile_is_clean() {
        let (env, instance) = resolved_env().await;
        let lockfile = generate(&env.ctx, &instance.id).await.unwrap();

        let result = apply(&env.ctx, &instance.id, lockfile).await.unwrap();
        assert!(result.issues.is_empty(), "{:?}", result.issues);
        assert_eq!(result.applied.mods, 2);
        assert_eq!(result.applied.resourcepacks, 1);
        assert_eq!(result.applied.skipped, 2);
        assert!(result.drift.clean, "{:?}", result.drift.issues);
        assert_eq!(result.drift.checked_count, 3);

        let report = check_drift(&env.ctx, &instance.id, None).await.unwrap();
        assert!(report.clean);
    }

    #[tokio::test]
    async fn apply_reproduces_history_even_after_upstream_moved_on() {
        let (env, instance) = resolved_env().await;
        let lockfile = generate(&env.ctx, &instance.id).await.unwrap();

        env.registry.publish(&project_of("sodium"), "0.6.0", "sodium-0.6.0.jar", b"sodium-new");
        refresh(&env.ctx, &instance.id, &[ContentKind::Mod]).await.unwrap();
        tokio::fs::write(instance.content_dir(ContentKind::Mod).join("stray.jar"), b"x")
            .await
            .unwrap();

        let result = apply(&env.ctx, &instance.id, lockfile).await.unwrap();
        assert!(result.drift.clean, "{:?}", result.drift.issues);
        assert_eq!(
            placed_names(&instance, ContentKind::Mod).await,
            vec!["dep-fabric-api__fabric-api.jar", "sodium__sodium-0.5.8.jar"]
        );

        let state = ContentState::load(&env.ctx.store, &instance.id).await.unwrap();
        assert_eq!(
            state.resolved(ContentKind::Mod, "sodium").unwrap().upstream_version_label.as_deref(),
            Some("0.5.8")
        );
        assert!(state.dependencies["fabric-api"].is_ok());
    }

    #[tokio::test]
    async fn apply_rewrites_the_instance_config() {
        let (env, instance) = resolved_env().await;
        let mut lockfile = generate(&env.ctx, &instance.id).await.unwrap();
        lockfile.instance.loader_version = Some("0.15.11".into());
        lockfile.instance.max_memory_mb = 8192;
        lockfile.instance.jvm_args = vec!["-XX:+UseZGC".into()];

        apply(&env.ctx, &instance.id, lockfile).await.unwrap();
        let reloaded = env.ctx.instances.load(&instance.id).await.unwrap();
        assert_eq!(reloaded.loader_version.as_deref(), Some("0.15.11"));
        assert_eq!(reloaded.max_memory_mb, 8192);
        assert_eq!(reloaded.jvm_args, vec!["-XX:+UseZGC"]);
    }

    #[tokio::test]
    async fn per_entry_failures_are_collected() {
        let (env, instance) = resolved_env().await;
        let mut lockfile = generate(&env.ctx, &instance.id).await.unwrap();
        let faithful = lockfile
            .artifacts
            .iter_mut()
            .find(|e| e.id == "faithful")
            .unwrap();
        faithful.artifact.sha1 = Some("0000000000000000000000000000000000000000".into());
        faithful.artifact.download_url = Some("https://cdn.test/gone.zip".into());

        let result = apply(&env.ctx, &instance.id, lockfile).await.unwrap();
        assert_eq!(result.applied.failed, 1);
        assert_eq!(result.applied.mods, 2);
        assert_eq!(result.issues[0].id, "faithful");
        assert!(placed_names(&instance, ContentKind::ResourcePack).await.is_empty());
        assert_eq!(result.drift.critical_count, 1);
    }

    #[tokio::test]
    async fn unknown_schema_is_rejected_before_any_change() {
        let (env, instance) = resolved_env().await;
        let mut lockfile = generate(&env.ctx, &instance.id).await.unwrap();
        lockfile.schema_version = 2;
        lockfile.instance.max_memory_mb = 1;

        assert!(matches!(
            apply(&env.ctx, &instance.id, lockfile).await,
            Err(LauncherError::LockfileSchema { found: 2, expected: 1 })
        ));
        let reloaded = env.ctx.instances.load(&instance.id).await.unwrap();
        assert_eq!(reloaded.max_memory_mb, 4096);
        assert_eq!(placed_names(&instance, ContentKind::Mod).await.len(), 2);
    }

    #[tokio::test]
    async fn drift_follows_the_hash_law() {
        let (env, instance) = resolved_env().await;
        generate(&env.ctx, &instance.id).await.unwrap();
        let sodium = instance.content_dir(ContentKind::Mod).join("sodium__sodium-0.5.8.jar");

        assert!(check_drift(&env.ctx, &instance.id, None).await.unwrap().clean);

        tokio::fs::write(&sodium, b"patched").await.unwrap();
        let report = check_drift(&env.ctx, &instance.id, None).await.unwrap();
        assert_eq!(report.critical_count, 1);
        assert_eq!(report.issues[0].id, "sodium");

        tokio::fs::write(&sodium, b"sodium").await.unwrap();
        assert!(check_drift(&env.ctx, &instance.id, None).await.unwrap().clean);

        tokio::fs::remove_file(&sodium).await.unwrap();
        let report = check_drift(&env.ctx, &instance.id, None).await.unwrap();
        assert_eq!(report.critical_count, 1);
        assert_eq!(report.issues[0].severity, DriftSeverity::Critical);
    }

    #[tokio::test]
    async fn unreadable_files_are_warnings_not_drift() {
        let (env, instance) = resolved_env().await;
        generate(&env.ctx, &instance.id).await.unwrap();
        let sodium = instance.content_dir(ContentKind::Mod).join("sodium__sodium-0.5.8.jar");

        // a directory under the recorded name is found but cannot be hashed
        tokio::fs::remove_file(&sodium).await.unwrap();
        tokio::fs::create_dir(&sodium).await.unwrap();

        let report = check_drift(&env.ctx, &instance.id, None).await.unwrap();
        assert_eq!(report.critical_count, 0, "{:?}", report.issues);
        assert_eq!(report.warning_count, 1);
        assert_eq!(report.issues[0].id, "sodium");
        assert_eq!(report.issues[0].severity, DriftSeverity::Warning);
    }

    #[tokio::test]
    async fn missing_lockfile_with_content_is_critical() {
        let (env, instance) = resolved_env().await;
        let report = check_drift(&env.ctx, &instance.id, None).await.unwrap();
        assert!(!report.clean);
        assert_eq!(report.issues[0].id, "lockfile");
        assert_eq!(report.critical_count, 1);

        let empty = TestEnv::new(catalog());
        let fresh = empty.instance(LoaderType::Vanilla).await;
        assert!(check_drift(&empty.ctx, &fresh.id, None).await.unwrap().clean);
    }

    #[tokio::test]
    async fn config_changes_and_stray_files_are_warnings() {
        let (env, instance) = resolved_env().await;
        generate(&env.ctx, &instance.id).await.unwrap();

        let mut changed = env.ctx.instances.load(&instance.id).await.unwrap();
        changed.minecraft_version = "1.21.1".into();
        env.ctx.instances.save(&changed).await.unwrap();
        let mods = instance.content_dir(ContentKind::Mod);
        tokio::fs::write(mods.join("OptiFine.jar"), b"x").await.unwrap();
        tokio::fs::write(mods.join("zoomify__zoomify.jar"), b"x").await.unwrap();
        tokio::fs::write(mods.join("options.txt"), b"x").await.unwrap();

        let report = check_drift(&env.ctx, &instance.id, None).await.unwrap();
        assert_eq!(report.critical_count, 0);
        assert_eq!(report.warning_count, 3, "{:?}", report.issues);
    }
}
