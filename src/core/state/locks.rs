use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

/// One async mutex per instance id.
///
/// Everything that read-modify-writes an instance's documents (content
/// state, rollback history, lockfile, instance.json) holds the guard for the
/// whole operation. Different instances never contend.
#[derive(Debug, Clone, Default)]
pub struct InstanceLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl InstanceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, instance_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(instance_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_instance_is_serialized() {
        let locks = InstanceLocks::new();
        let guard = locks.acquire("a").await;

        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire("a")).await;
        assert!(second.is_err());

        drop(guard);
        let _again = locks.acquire("a").await;
    }

    #[tokio::test]
    async fn different_instances_do_not_contend() {
        let locks = InstanceLocks::new();
        let _a = locks.acquire("a").await;
        let _b = tokio::time::timeout(Duration::from_millis(50), locks.acquire("b"))
            .await
            .unwrap();
    }
}
