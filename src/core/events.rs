use serde::Serialize;
use tokio::sync::broadcast;

/// Everything the engine reports while it works.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LauncherEvent {
    DownloadProgress {
        url: String,
        file_name: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },
    LaunchProgress {
        instance_id: String,
        value: u8,
        stage: String,
        state: String,
    },
    LaunchLog {
        instance_id: String,
        level: String,
        message: String,
    },
    ProcessExited {
        instance_id: String,
        code: Option<i32>,
        success: bool,
    },
}

/// Broadcast bus shared by the downloader, the orchestrator and the supervisor.
///
/// Publishing never blocks; events without subscribers are dropped.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<LauncherEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: LauncherEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LauncherEvent> {
        self.tx.subscribe()
    }

    pub fn launch_progress(&self, instance_id: &str, value: u8, stage: &str, state: &str) {
        self.publish(LauncherEvent::LaunchProgress {
            instance_id: instance_id.to_string(),
            value,
            stage: stage.to_string(),
            state: state.to_string(),
        });
    }

    pub fn launch_log(&self, instance_id: &str, level: &str, message: impl Into<String>) {
        self.publish(LauncherEvent::LaunchLog {
            instance_id: instance_id.to_string(),
            level: level.to_string(),
            message: message.into(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.launch_log("abc", "info", "hello");
    }

    #[tokio::test]
    async fn subscribers_receive_progress() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.launch_progress("abc", 40, "Instalando loader", "running");

        match rx.recv().await.unwrap() {
            LauncherEvent::LaunchProgress { instance_id, value, .. } => {
                assert_eq!(instance_id, "abc");
                assert_eq!(value, 40);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
