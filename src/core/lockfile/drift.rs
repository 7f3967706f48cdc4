use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::model::{InstanceLockfile, LockfileArtifactEntry};
use crate::core::catalog::ContentKind;
use crate::core::content::{is_managed, ContentState, PlacedFile};
use crate::core::downloader::{file_matches, ExpectedHashes};
use crate::core::error::LauncherResult;
use crate::core::fs::list_file_names;
use crate::core::instance::Instance;
use crate::core::state::AppContext;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LockfileDriftIssue {
    pub id: String,
    pub category: Option<ContentKind>,
    pub severity: DriftSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LockfileDriftReport {
    pub clean: bool,
    pub issues: Vec<LockfileDriftIssue>,
    pub critical_count: usize,
    pub warning_count: usize,
    pub checked_count: usize,
    pub checked_at: DateTime<Utc>,
}

impl LockfileDriftReport {
    fn new(issues: Vec<LockfileDriftIssue>, checked_count: usize) -> Self {
        let critical_count = issues
            .iter()
            .filter(|i| i.severity == DriftSeverity::Critical)
            .count();
        Self {
            clean: issues.is_empty(),
            warning_count: issues.len() - critical_count,
            critical_count,
            checked_count,
            issues,
            checked_at: Utc::now(),
        }
    }
}

fn issue(
    id: &str,
    category: Option<ContentKind>,
    severity: DriftSeverity,
    message: impl Into<String>,
) -> LockfileDriftIssue {
    LockfileDriftIssue {
        id: id.to_string(),
        category,
        severity,
        message: message.into(),
    }
}

/// Compare the instance against `lockfile`, or the persisted one when `None`.
/// Drift is only reported; nothing is corrected here.
pub async fn check_drift(
    ctx: &AppContext,
    instance_id: &str,
    lockfile: Option<InstanceLockfile>,
) -> LauncherResult<LockfileDriftReport> {
    let _guard = ctx.locks.acquire(instance_id).await;
    let instance = ctx.instances.load(instance_id).await?;
    check_drift_unlocked(ctx, &instance, lockfile).await
}

pub(crate) async fn check_drift_unlocked(
    ctx: &AppContext,
    instance: &Instance,
    lockfile: Option<InstanceLockfile>,
) -> LauncherResult<LockfileDriftReport> {
    let lockfile = match lockfile {
        Some(lockfile) => Some(lockfile),
        None => InstanceLockfile::read(&instance.lockfile_path()).await?,
    };

    let Some(lockfile) = lockfile else {
        let state = ContentState::load(&ctx.store, &instance.id).await?;
        let has_live_content = ctx.catalog.entries.iter().any(|entry| {
            state.is_enabled(entry)
                && state
                    .resolved(entry.kind, &entry.id)
                    .is_some_and(|r| r.is_ok())
        }) || state.dependencies.values().any(|r| r.is_ok());

        let issues = if has_live_content {
            vec![issue(
                "lockfile",
                None,
                DriftSeverity::Critical,
                "No lockfile despite installed content",
            )]
        } else {
            Vec::new()
        };
        return Ok(LockfileDriftReport::new(issues, 0));
    };

    let mut issues = Vec::new();
    let mut checked = 0;

    for entry in lockfile.artifacts.iter().filter(|e| e.is_expected_on_disk()) {
        checked += 1;
        let Some(path) = locate(instance, entry).await? else {
            issues.push(issue(
                &entry.id,
                Some(entry.category),
                DriftSeverity::Critical,
                format!("Expected file for {} is missing", entry.id),
            ));
            continue;
        };

        let expected = ExpectedHashes::new(entry.artifact.sha1.as_deref(), entry.artifact.sha512.as_deref());
        match file_matches(&path, &expected).await {
            Ok(Some(false)) => issues.push(issue(
                &entry.id,
                Some(entry.category),
                DriftSeverity::Critical,
                format!("{:?} does not match the recorded hash", path),
            )),
            Ok(_) => {}
            Err(e) => {
                warn!("Could not hash {:?}: {}", path, e);
                issues.push(issue(
                    &entry.id,
                    Some(entry.category),
                    DriftSeverity::Warning,
                    format!("Could not verify {:?}: {}", path, e),
                ));
            }
        }
    }

    issues.extend(config_drift(instance, &lockfile));
    issues.extend(unaccounted_files(instance, &lockfile).await?);

    debug!(
        "Drift check for {}: {} issues over {} entries",
        instance.id,
        issues.len(),
        checked
    );
    Ok(LockfileDriftReport::new(issues, checked))
}

/// Exact recorded name first, then any active `{id}__*` file.
async fn locate(instance: &Instance, entry: &LockfileArtifactEntry) -> LauncherResult<Option<PathBuf>> {
    let dir = instance.content_dir(entry.category);

    if let Some(name) = entry.artifact.placed_file_name.as_deref() {
        let exact = dir.join(name);
        let active = PlacedFile::parse(name).is_some_and(|p| p.enabled);
        if active && tokio::fs::try_exists(&exact).await.unwrap_or(false) {
            return Ok(Some(exact));
        }
    }

    Ok(list_file_names(&dir)
        .await?
        .into_iter()
        .filter_map(|name| PlacedFile::parse(&name))
        .find(|p| p.enabled && p.catalog_id == entry.id)
        .map(|p| dir.join(p.to_file_name())))
}

fn config_drift(instance: &Instance, lockfile: &InstanceLockfile) -> Vec<LockfileDriftIssue> {
    let locked = &lockfile.instance;
    let mut issues = Vec::new();

    if instance.minecraft_version != locked.game_version {
        issues.push(issue(
            "instance",
            None,
            DriftSeverity::Warning,
            format!(
                "Game version is {} but the lockfile records {}",
                instance.minecraft_version, locked.game_version
            ),
        ));
    }
    if instance.loader != locked.loader {
        issues.push(issue(
            "instance",
            None,
            DriftSeverity::Warning,
            format!("Loader is {} but the lockfile records {}", instance.loader, locked.loader),
        ));
    }
    if instance.loader_version != locked.loader_version {
        issues.push(issue(
            "instance",
            None,
            DriftSeverity::Warning,
            format!(
                "Loader version is {:?} but the lockfile records {:?}",
                instance.loader_version, locked.loader_version
            ),
        ));
    }

    issues
}

/// Managed files the lockfile does not account for. A `.disabled` copy of a
/// locked entry is fine; an active file of a disabled entry is not.
async fn unaccounted_files(
    instance: &Instance,
    lockfile: &InstanceLockfile,
) -> LauncherResult<Vec<LockfileDriftIssue>> {
    let mut issues = Vec::new();

    for kind in ContentKind::ALL {
        for name in list_file_names(&instance.content_dir(kind)).await? {
            if !is_managed(&name) {
                continue;
            }
            let locked = PlacedFile::parse(&name)
                .and_then(|placed| lockfile.entry(kind, &placed.catalog_id).map(|e| (placed, e)));
            let message = match locked {
                None => format!("{name} is not accounted for by the lockfile"),
                Some((placed, entry)) if placed.enabled && !entry.enabled => {
                    format!("{name} is active but {} is disabled in the lockfile", entry.id)
                }
                Some(_) => continue,
            };
            issues.push(issue(&name, Some(kind), DriftSeverity::Warning, message));
        }
    }

    Ok(issues)
}
