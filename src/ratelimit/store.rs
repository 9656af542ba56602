//! Counting store abstraction and the in-process backend.
//!
//! A counting store answers one question: "how many requests has this bucket made
//! in the current fixed window, including this one?" Implementations must never
//! make the caller fail; on internal trouble they return [`WindowCount::Unlimited`].

use super::models::WindowCount;
use crate::clock::Clock;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Windows this many lengths behind the current one are stale.
pub const STALE_WINDOWS: u64 = 2;

/// Trait for rate limit counting backends
#[async_trait]
pub trait CountingStore: Send + Sync {
    /// Atomically increment the counter of the current window for `bucket_key`
    /// and return the post-increment value.
    async fn increment(&self, bucket_key: &str, window: Duration) -> WindowCount;

    /// Drop counters that can no longer influence admission. Returns how many
    /// buckets were removed.
    async fn sweep(&self) -> usize {
        0
    }

    /// Establish backend connections ahead of the first request.
    async fn warm_up(&self) {}

    fn backend_name(&self) -> &'static str;
}

/// Index of the window containing `now_millis`.
pub fn window_id(now_millis: u64, window: Duration) -> u64 {
    let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX).max(1);
    now_millis / window_ms
}

/// Per-bucket table of `(window_id, count)` pairs. Rarely holds more than two.
#[derive(Debug, Default)]
struct WindowTable {
    window: Duration,
    slots: Vec<(u64, u64)>,
}

impl WindowTable {
    fn prune(&mut self, current: u64) {
        self.slots.retain(|(id, _)| id + STALE_WINDOWS >= current);
    }

    fn bump(&mut self, current: u64) -> u64 {
        match self.slots.iter_mut().find(|(id, _)| *id == current) {
            Some((_, count)) => {
                *count += 1;
                *count
            }
            None => {
                self.slots.push((current, 1));
                1
            }
        }
    }
}

/// In-memory backend for single-instance deployments.
///
/// Buckets live in a sharded map; an increment holds only its shard's lock, so
/// increments for the same bucket are linearizable and unrelated buckets rarely
/// contend.
pub struct LocalCountingStore {
    buckets: DashMap<String, WindowTable>,
    clock: Arc<dyn Clock>,
}

impl LocalCountingStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: DashMap::new(),
            clock,
        }
    }

    /// Number of buckets currently tracked.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[async_trait]
impl CountingStore for LocalCountingStore {
    async fn increment(&self, bucket_key: &str, window: Duration) -> WindowCount {
        let current = window_id(self.clock.now_millis(), window);

        let count = match self.buckets.get_mut(bucket_key) {
            Some(mut table) => {
                table.window = window;
                table.prune(current);
                table.bump(current)
            }
            None => {
                let mut table = self
                    .buckets
                    .entry(bucket_key.to_string())
                    .or_insert_with(|| WindowTable {
                        window,
                        slots: Vec::with_capacity(2),
                    });
                table.prune(current);
                table.bump(current)
            }
        };

        WindowCount::Counted(count)
    }

    async fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.buckets.len();

        self.buckets.retain(|_, table| {
            table.prune(window_id(now, table.window));
            !table.slots.is_empty()
        });

        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            debug!("Swept {} idle rate limit buckets", removed);
        }
        removed
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_counts_within_window() {
        let clock = Arc::new(ManualClock::new(0));
        let store = LocalCountingStore::new(clock.clone());

        assert_eq!(store.increment("a", MINUTE).await, WindowCount::Counted(1));
        assert_eq!(store.increment("a", MINUTE).await, WindowCount::Counted(2));
        assert_eq!(store.increment("b", MINUTE).await, WindowCount::Counted(1));
    }

    #[tokio::test]
    async fn test_resets_on_window_rollover() {
        let clock = Arc::new(ManualClock::new(0));
        let store = LocalCountingStore::new(clock.clone());

        store.increment("a", MINUTE).await;
        store.increment("a", MINUTE).await;
        clock.advance(MINUTE);
        assert_eq!(store.increment("a", MINUTE).await, WindowCount::Counted(1));
    }

    #[tokio::test]
    async fn test_prunes_stale_windows() {
        let clock = Arc::new(ManualClock::new(0));
        let store = LocalCountingStore::new(clock.clone());

        store.increment("a", MINUTE).await;
        clock.advance(MINUTE * 5);
        store.increment("a", MINUTE).await;

        let table = store.buckets.get("a").unwrap();
        assert_eq!(table.slots, vec![(5, 1)]);
    }

    #[tokio::test]
    async fn test_sweep_drops_idle_buckets() {
        let clock = Arc::new(ManualClock::new(0));
        let store = LocalCountingStore::new(clock.clone());

        store.increment("idle", MINUTE).await;
        clock.advance(MINUTE * 3);
        store.increment("busy", MINUTE).await;

        assert_eq!(store.sweep().await, 1);
        assert_eq!(store.bucket_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(LocalCountingStore::new(clock));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..250 {
                    store.increment("shared", MINUTE).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(
            store.increment("shared", MINUTE).await,
            WindowCount::Counted(2001)
        );
    }

    #[test]
    fn test_window_id() {
        assert_eq!(window_id(59_999, MINUTE), 0);
        assert_eq!(window_id(60_000, MINUTE), 1);
    }
}
