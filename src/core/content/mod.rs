// ─── Artifact Resolver ───
// Resolves catalog entries against the content registry, keeps verified
// bytes in the shared cache and materializes the enabled subset into the
// instance content directories.

pub mod dependencies;
pub mod placement;
pub mod presets;
pub mod resolver;
pub mod state;

pub use dependencies::install_missing_dependencies;
pub use placement::{is_managed, PlacedFile};
pub use presets::apply_preset;
pub use resolver::{refresh, set_enabled, ToggleOutcome};
pub use state::{ArtifactStatus, ContentState, ResolvedArtifact};
