//! Background cleanup task sweeping the gate store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::GateStore;

/// Spawn the periodic sweep loop.
///
/// Runs until `shutdown` is notified; each tick drops expired dedup
/// entries and expired throttle records.
pub fn spawn_cleanup(
    store: Arc<GateStore>,
    interval: Duration,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (dedup_removed, throttle_removed) = store.sweep(Utc::now());
                    debug!(dedup_removed, throttle_removed, "cleanup sweep complete");
                }
                _ = shutdown.notified() => {
                    info!("cleanup task shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_core::EngineConfig;

    #[tokio::test]
    async fn shutdown_stops_the_task() {
        let store = Arc::new(GateStore::new(&EngineConfig::default()));
        let shutdown = Arc::new(Notify::new());
        let handle = spawn_cleanup(store, Duration::from_secs(3600), shutdown.clone());

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task did not stop")
            .expect("task panicked");
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_runs_on_each_tick() {
        let config = EngineConfig {
            dedup_retention_seconds: 1,
            ..Default::default()
        };
        let store = Arc::new(GateStore::new(&config));
        store.mark_at("stale", Utc::now() - chrono::Duration::seconds(10));
        assert!(store.seen("stale"));

        let shutdown = Arc::new(Notify::new());
        let handle = spawn_cleanup(store.clone(), Duration::from_millis(50), shutdown.clone());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!store.seen("stale"));

        shutdown.notify_one();
        handle.await.expect("task panicked");
    }
}
