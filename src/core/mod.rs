// ─── InterfaceOficial Core ───
// Content resolution, lockfiles, rollback and launch orchestration for
// Minecraft instances.
//
// Architecture:
//   core/
//     catalog     — Curated content entries and presets
//     content/    — Artifact resolver: refresh, toggle, presets, dependencies
//     lockfile/   — Lockfile model, generate/apply, drift checks
//     rollback/   — Bounded configuration snapshot history
//     launch/     — Launch state machine, descriptor, supervisor, hooks
//     instance/   — Instance model + CRUD manager
//     registry/   — Upstream content registry client
//     loaders/    — Vanilla, Fabric, Quilt, Forge, NeoForge
//     version/    — Mojang manifest + version JSON
//     maven/      — Maven coordinates and metadata
//     downloader/ — Verified downloads with SHA-1/SHA-512 checks
//     auth/       — Launch credential checks
//     state/      — Paths, settings, per-instance locks, app context

pub mod auth;
pub mod catalog;
pub mod content;
pub mod downloader;
pub mod error;
pub mod events;
pub mod fs;
pub mod http;
pub mod instance;
pub mod launch;
pub mod loaders;
pub mod lockfile;
pub mod maven;
pub mod registry;
pub mod rollback;
pub mod state;
pub mod store;
pub mod version;

#[cfg(test)]
pub mod testing;
