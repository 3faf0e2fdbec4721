//! Expiry Sweep Task
//!
//! Background task that periodically reclaims expired entries from the
//! store. Reads already treat expired entries as absent; this only frees
//! the memory they hold.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::KeyValueStore;

/// Spawns a background task that periodically purges expired entries.
///
/// # Arguments
/// * `store` - shared store to sweep
/// * `cleanup_interval_secs` - Interval in seconds between sweeps (minimum 1)
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_cleanup_task(store: Arc<dyn KeyValueStore>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            backend = store.backend_name(),
            "Starting expiry sweep with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.purge_expired().await;
            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ManualClock, MemoryStore};

    #[tokio::test]
    async fn test_sweep_removes_expired_entries() {
        let clock = Arc::new(ManualClock::new());
        let memory = Arc::new(MemoryStore::with_clock(100, clock.clone()));
        memory.set("students:1", "\"a\"".to_string(), 1).await;
        memory.set("students:2", "\"b\"".to_string(), 3600).await;
        clock.advance(Duration::from_secs(2));

        let store: Arc<dyn KeyValueStore> = memory.clone();
        let handle = spawn_cleanup_task(store, 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(memory.len().await, 1);
        assert_eq!(memory.stats().await.expirations, 1);
        assert_eq!(memory.get("students:2").await.as_deref(), Some("\"b\""));

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_can_be_aborted() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new(10));
        let handle = spawn_cleanup_task(store, 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
