// ─── Lockfile Manager ───
// `instance.lock.json`: a reproducible record of what an instance runs,
// plus apply and drift detection against it.

pub mod drift;
pub mod manager;
pub mod model;

pub use drift::{check_drift, DriftSeverity, LockfileDriftIssue, LockfileDriftReport};
pub use manager::{apply, generate, AppliedCounts, ApplyIssue, LockfileApplyResult};
pub use model::{InstanceLockfile, LockfileArtifactEntry, LockfileInstance, SCHEMA_VERSION};
