// ─── Launch descriptor ───
// Everything the process supervisor needs to start the game: version slot,
// memory bounds, working directories, JVM/game arguments and credential.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::core::auth::LaunchAccountProfile;
use crate::core::instance::{Instance, LoaderType};
use crate::core::loaders::LoaderInstallResult;
use crate::core::state::LauncherPaths;

const MIN_HEAP_MB: u32 = 512;

/// Per-launch options chosen by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimePrefs {
    pub fullscreen: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Free-text JVM arguments, split on whitespace.
    pub extra_jvm_args: String,
    /// Adds `-XX:+UseG1GC` unless another collector is selected.
    pub prefer_g1gc: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchDescriptor {
    pub instance_id: String,
    pub version_id: String,
    pub descriptor_path: PathBuf,
    pub jar_path: PathBuf,
    pub game_version: String,
    pub loader: LoaderType,
    pub loader_version: Option<String>,
    pub min_memory_mb: u32,
    pub max_memory_mb: u32,
    pub game_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub libraries_dir: PathBuf,
    pub versions_dir: PathBuf,
    pub natives_dir: PathBuf,
    pub jvm_args: Vec<String>,
    pub game_args: Vec<String>,
    pub account: LaunchAccountProfile,
}

impl LaunchDescriptor {
    pub fn build(
        paths: &LauncherPaths,
        instance: &Instance,
        install: &LoaderInstallResult,
        account: LaunchAccountProfile,
        prefs: &RuntimePrefs,
    ) -> Self {
        let (min_memory_mb, max_memory_mb) = clamp_memory(
            instance.min_memory_mb,
            instance.max_memory_mb,
            physical_memory_mb(),
        );

        Self {
            instance_id: instance.id.clone(),
            version_id: install.version_id.clone(),
            descriptor_path: install.descriptor_path.clone(),
            jar_path: install.jar_path.clone(),
            game_version: instance.minecraft_version.clone(),
            loader: instance.loader,
            loader_version: install
                .loader_version
                .clone()
                .or_else(|| instance.loader_version.clone()),
            min_memory_mb,
            max_memory_mb,
            game_dir: instance.game_dir(),
            assets_dir: paths.assets_dir(),
            libraries_dir: paths.libraries_dir(),
            versions_dir: paths.versions_dir(),
            natives_dir: instance.natives_dir(),
            jvm_args: build_jvm_args(instance, prefs),
            game_args: build_game_args(prefs),
            account,
        }
    }
}

pub fn physical_memory_mb() -> Option<u64> {
    let mut system = System::new();
    system.refresh_memory();
    let total = system.total_memory() / 1024 / 1024;
    (total > 0).then_some(total)
}

/// `max` never exceeds physical memory, `min` never exceeds `max`.
pub fn clamp_memory(min_mb: u32, max_mb: u32, physical_mb: Option<u64>) -> (u32, u32) {
    let mut max_mb = max_mb.max(MIN_HEAP_MB);
    if let Some(physical) = physical_mb {
        let cap = u32::try_from(physical).unwrap_or(u32::MAX).max(MIN_HEAP_MB);
        max_mb = max_mb.min(cap);
    }
    (min_mb.clamp(1, max_mb), max_mb)
}

// ── JVM arguments ───────────────────────────────────────

fn build_jvm_args(instance: &Instance, prefs: &RuntimePrefs) -> Vec<String> {
    let raw: Vec<String> = instance
        .jvm_args
        .iter()
        .cloned()
        .chain(prefs.extra_jvm_args.split_whitespace().map(str::to_string))
        .collect();
    let mut args = sanitize_jvm_args(&raw);

    if prefs.prefer_g1gc && !args.iter().any(|a| a.starts_with("-XX:+Use") && a.ends_with("GC")) {
        args.push("-XX:+UseG1GC".into());
    }

    ensure_loader_jvm_workarounds(instance.loader, &instance.minecraft_version, &mut args);
    args
}

/// Heap size and classpath belong to the descriptor, not to user arguments.
fn sanitize_jvm_args(raw: &[String]) -> Vec<String> {
    let mut sanitized = Vec::new();
    let mut i = 0;

    while i < raw.len() {
        let arg = raw[i].trim();
        if arg == "-cp" || arg == "-classpath" || arg == "--class-path" {
            i += 2;
            continue;
        }
        if !arg.is_empty() && !arg.starts_with("-Xmx") && !arg.starts_with("-Xms") {
            sanitized.push(arg.to_string());
        }
        i += 1;
    }

    sanitized
}

fn required_java_major(minecraft_version: &str) -> u32 {
    let lower = minecraft_version.to_ascii_lowercase();
    if let Some(week_pos) = lower.find('w') {
        let year_hint = &lower[..week_pos];
        if year_hint.len() >= 2 {
            if let Ok(snapshot_year) = year_hint[year_hint.len() - 2..].parse::<u32>() {
                return if snapshot_year >= 24 { 21 } else { 17 };
            }
        }
    }

    let mut parts = minecraft_version.split('.').map(|p| p.parse::<u32>().ok());
    let major = parts.next().flatten().unwrap_or(1);
    let minor = parts.next().flatten().unwrap_or(20);
    let patch = parts.next().flatten().unwrap_or(0);

    if major > 1 || minor >= 21 || (minor == 20 && patch >= 5) {
        21
    } else if minor >= 17 {
        17
    } else {
        8
    }
}

fn ensure_loader_jvm_workarounds(loader: LoaderType, minecraft_version: &str, args: &mut Vec<String>) {
    if !matches!(loader, LoaderType::Forge | LoaderType::NeoForge) {
        return;
    }

    if required_java_major(minecraft_version) >= 17 {
        for (flag, value) in MODERN_FORGE_JVM_ARG_PAIRS {
            ensure_jvm_arg_pair_present(args, flag, value);
        }
    }

    if loader != LoaderType::NeoForge {
        return;
    }

    ensure_jvm_arg_present(args, "--add-modules=jdk.naming.dns");
    ensure_jvm_arg_present(args, "--add-opens=java.base/java.util.jar=ALL-UNNAMED");
    set_jvm_system_property(args, "ignoreList", "bootstraplauncher,neon-fml");

    // Early display crashes (`rendererFuture` null) on some GPU/overlay setups.
    set_jvm_system_property(args, "fml.earlyprogresswindow", "false");
    set_jvm_system_property(args, "forge.earlywindow", "false");
    set_jvm_system_property(args, "neoforge.earlydisplay", "false");
}

const MODERN_FORGE_JVM_ARG_PAIRS: [(&str, &str); 12] = [
    ("--add-modules", "ALL-SYSTEM"),
    ("--add-opens", "java.base/java.util.jar=ALL-UNNAMED"),
    ("--add-opens", "java.base/java.lang=ALL-UNNAMED"),
    ("--add-opens", "java.base/java.util=ALL-UNNAMED"),
    ("--add-opens", "java.base/java.lang.invoke=ALL-UNNAMED"),
    ("--add-opens", "java.base/java.lang.reflect=ALL-UNNAMED"),
    ("--add-opens", "java.base/java.nio.file=ALL-UNNAMED"),
    ("--add-opens", "java.base/sun.security.util=ALL-UNNAMED"),
    ("--add-exports", "java.base/sun.security.action=ALL-UNNAMED"),
    ("--add-opens", "java.base/java.io=ALL-UNNAMED"),
    ("--add-opens", "java.base/java.net=ALL-UNNAMED"),
    ("--add-opens", "java.base/sun.nio.ch=ALL-UNNAMED"),
];

fn ensure_jvm_arg_pair_present(args: &mut Vec<String>, flag: &str, value: &str) {
    let combined = format!("{flag}={value}");
    if args.iter().any(|arg| arg == &combined) {
        return;
    }
    if args.windows(2).any(|pair| pair[0] == flag && pair[1] == value) {
        return;
    }

    args.push(flag.to_string());
    args.push(value.to_string());
}

fn ensure_jvm_arg_present(args: &mut Vec<String>, flag_with_value: &str) {
    if !args.iter().any(|arg| arg == flag_with_value) {
        args.push(flag_with_value.to_string());
    }
}

fn set_jvm_system_property(args: &mut Vec<String>, property: &str, value: &str) {
    let prefix = format!("-D{property}=");
    args.retain(|arg| !arg.starts_with(&prefix));
    args.push(format!("{prefix}{value}"));
}

// ── Game arguments ──────────────────────────────────────

fn build_game_args(prefs: &RuntimePrefs) -> Vec<String> {
    let mut args = Vec::new();
    if prefs.fullscreen {
        args.push("--fullscreen".to_string());
    }
    // Width and height only travel as a valid pair.
    if let (Some(width), Some(height)) = (prefs.width, prefs.height) {
        if width > 0 && height > 0 {
            args.extend([
                "--width".to_string(),
                width.to_string(),
                "--height".to_string(),
                height.to_string(),
            ]);
        }
    }
    args
}
