// Periodic cache and counter maintenance

use crate::cache::ResponseCache;
use crate::ratelimit::CountingStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What one maintenance pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub expired: usize,
    pub measured_bytes: usize,
    pub swept_buckets: usize,
}

/// Background task: expiry cleanup, footprint re-measurement and stale
/// counter sweeping on a fixed interval. Also re-measures whenever the cache
/// asks for it after `remeasure_every_sets` inserts.
pub struct MaintenanceTask {
    cache: Arc<ResponseCache>,
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl MaintenanceTask {
    pub fn spawn(
        cache: Arc<ResponseCache>,
        store: Arc<dyn CountingStore>,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run(cache.clone(), store, interval, shutdown_rx));
        Self {
            cache,
            shutdown_tx,
            handle,
        }
    }

    /// Stop the periodic task, wait for it, then flush the cache.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            warn!("Maintenance task ended abnormally: {}", e);
        }
        self.cache.clear();
        info!("Maintenance stopped, cache flushed");
    }
}

async fn run(
    cache: Arc<ResponseCache>,
    store: Arc<dyn CountingStore>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!("Maintenance task started (every {:?})", period);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = tick(&cache, store.as_ref()).await;
                debug!(
                    expired = report.expired,
                    measured_bytes = report.measured_bytes,
                    swept_buckets = report.swept_buckets,
                    "Maintenance pass complete"
                );
            }
            _ = cache.remeasure_requested() => {
                let measured_bytes = cache.remeasure();
                debug!(measured_bytes, "Re-measured after insert threshold");
            }
            _ = shutdown_rx.recv() => {
                info!("Maintenance task shutting down");
                return;
            }
        }
    }
}

/// A single maintenance pass.
pub async fn tick(cache: &ResponseCache, store: &dyn CountingStore) -> TickReport {
    let expired = cache.cleanup_expired();
    let measured_bytes = cache.remeasure();
    let swept_buckets = store.sweep().await;
    TickReport {
        expired,
        measured_bytes,
        swept_buckets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachedResponse, Expiry};
    use crate::clock::ManualClock;
    use crate::config::CacheConfig;
    use crate::ratelimit::LocalCountingStore;

    #[tokio::test]
    async fn test_tick_cleans_expired_and_sweeps() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = ResponseCache::new(CacheConfig::default(), clock.clone());
        let store = LocalCountingStore::new(clock.clone());

        cache.set(
            "short",
            CachedResponse::ok("text/plain", "a"),
            Expiry::After(Duration::from_secs(1)),
        );
        cache.set("long", CachedResponse::ok("text/plain", "b"), Expiry::Never);
        store.increment("1.2.3.4:v1", Duration::from_secs(60)).await;

        clock.advance(Duration::from_secs(300));
        let report = tick(&cache, &store).await;

        assert_eq!(report.expired, 1);
        assert_eq!(report.swept_buckets, 1);
        assert_eq!(report.measured_bytes, cache.memory_usage());
        assert!(cache.contains("long"));
    }

    #[tokio::test]
    async fn test_insert_threshold_triggers_remeasure_in_task() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(ResponseCache::new(
            CacheConfig {
                remeasure_every_sets: 2,
                ..CacheConfig::default()
            },
            clock.clone(),
        ));
        let store: Arc<dyn CountingStore> = Arc::new(LocalCountingStore::new(clock));
        let task = MaintenanceTask::spawn(cache.clone(), store, Duration::from_secs(3600));

        cache.set("a", CachedResponse::ok("text/plain", "a"), Expiry::Never);
        cache.set("b", CachedResponse::ok("text/plain", "b"), Expiry::Never);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // The request was consumed by the task, so no permit is left behind.
        let pending =
            tokio::time::timeout(Duration::from_millis(50), cache.remeasure_requested()).await;
        assert!(pending.is_err());

        task.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_flushes_cache() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(ResponseCache::new(CacheConfig::default(), clock.clone()));
        let store: Arc<dyn CountingStore> = Arc::new(LocalCountingStore::new(clock));
        cache.set("k", CachedResponse::ok("text/plain", "v"), Expiry::Never);

        let task = MaintenanceTask::spawn(cache.clone(), store, Duration::from_secs(3600));
        task.shutdown().await;

        assert!(cache.is_empty());
        assert_eq!(cache.memory_usage(), 0);
    }
}
