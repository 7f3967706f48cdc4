// ─── Launch state ───
// One phase per instance id. The map lock is never held across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;

use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessExit {
    pub code: Option<i32>,
    pub success: bool,
}

/// Handle to a running game process, as returned by the supervisor.
#[async_trait]
pub trait GameProcess: Send + Sync {
    fn pid(&self) -> Option<u32>;

    async fn kill(&self) -> LauncherResult<()>;

    /// Resolves once the process has exited. Safe to call more than once.
    async fn wait(&self) -> ProcessExit;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum LaunchPhase {
    Idle,
    Launching,
    LaunchingCancelled,
    Running { pid: Option<u32> },
}

enum Slot {
    Launching { cancel_requested: bool },
    Running(Arc<dyn GameProcess>),
}

pub enum StopRequest {
    Kill(Arc<dyn GameProcess>),
    CancelRequested,
    NotRunning,
}

pub enum Promotion {
    Running,
    Cancelled,
}

#[derive(Clone, Default)]
pub struct LaunchRegistry {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl LaunchRegistry {
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn phase(&self, instance_id: &str) -> LaunchPhase {
        match self.slots().get(instance_id) {
            None => LaunchPhase::Idle,
            Some(Slot::Launching { cancel_requested: false }) => LaunchPhase::Launching,
            Some(Slot::Launching { cancel_requested: true }) => LaunchPhase::LaunchingCancelled,
            Some(Slot::Running(process)) => LaunchPhase::Running { pid: process.pid() },
        }
    }

    /// Idle → Launching.
    pub fn begin(&self, instance_id: &str) -> LauncherResult<()> {
        let mut slots = self.slots();
        if slots.contains_key(instance_id) {
            return Err(LauncherError::AlreadyRunning(instance_id.to_string()));
        }
        slots.insert(
            instance_id.to_string(),
            Slot::Launching {
                cancel_requested: false,
            },
        );
        Ok(())
    }

    /// Running → Idle handing back the process to kill; Launching → cancelled.
    pub fn request_stop(&self, instance_id: &str) -> StopRequest {
        let mut slots = self.slots();
        let process = match slots.get_mut(instance_id) {
            None => return StopRequest::NotRunning,
            Some(Slot::Launching { cancel_requested }) => {
                *cancel_requested = true;
                return StopRequest::CancelRequested;
            }
            Some(Slot::Running(process)) => process.clone(),
        };
        slots.remove(instance_id);
        StopRequest::Kill(process)
    }

    pub fn is_cancel_requested(&self, instance_id: &str) -> bool {
        matches!(
            self.slots().get(instance_id),
            Some(Slot::Launching { cancel_requested: true })
        )
    }

    /// Launching → Running, unless a stop arrived meanwhile (slot cleared).
    pub fn promote(&self, instance_id: &str, process: Arc<dyn GameProcess>) -> Promotion {
        let mut slots = self.slots();
        let launching = matches!(
            slots.get(instance_id),
            Some(Slot::Launching { cancel_requested: false })
        );
        if launching {
            slots.insert(instance_id.to_string(), Slot::Running(process));
            Promotion::Running
        } else {
            slots.remove(instance_id);
            Promotion::Cancelled
        }
    }

    pub fn clear(&self, instance_id: &str) {
        self.slots().remove(instance_id);
    }

    /// Only clears the slot if it still holds this exact process.
    pub fn clear_if_current(&self, instance_id: &str, process: &Arc<dyn GameProcess>) -> bool {
        let mut slots = self.slots();
        let current = matches!(
            slots.get(instance_id),
            Some(Slot::Running(running)) if Arc::ptr_eq(running, process)
        );
        if current {
            slots.remove(instance_id);
        }
        current
    }
}
