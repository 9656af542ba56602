//! Shared counting store backed by Redis (or any RESP-compatible server).
//!
//! Keys are `{prefix}:{bucket_key}:{window_id}` and carry a TTL of two window
//! lengths so stale windows expire even when no instance touches them again.
//! Every failure path returns [`WindowCount::Unlimited`].

use super::models::WindowCount;
use super::store::{window_id, CountingStore, STALE_WINDOWS};
use crate::clock::Clock;
use crate::error::Result;
use crate::metrics;
use crate::utils::logging::sanitize;
use crate::utils::retry::with_retry;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::RedisError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// After a failed connection attempt, requests skip the backend for this long.
const RECONNECT_COOLDOWN: Duration = Duration::from_secs(5);

/// Upper bound on one start-up connection attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

const BACKEND: &str = "redis";

pub struct RedisCountingStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    key_prefix: String,
    timeout: Duration,
    /// Epoch millis before which no new connection attempt is made.
    reconnect_after: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl RedisCountingStore {
    /// Validates the URL; does not connect. See [`CountingStore::warm_up`].
    pub fn new(
        url: &str,
        key_prefix: impl Into<String>,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            key_prefix: key_prefix.into(),
            timeout,
            reconnect_after: AtomicU64::new(0),
            clock,
        })
    }

    fn counter_key(&self, bucket_key: &str, window_id: u64) -> String {
        format!("{}:{}:{}", self.key_prefix, bucket_key, window_id)
    }

    async fn connection(&self) -> std::result::Result<ConnectionManager, RedisError> {
        self.connection
            .get_or_try_init(|| {
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(1)
                    .set_connection_timeout(CONNECT_TIMEOUT)
                    .set_response_timeout(self.timeout);
                ConnectionManager::new_with_config(self.client.clone(), config)
            })
            .await
            .cloned()
    }

    async fn try_increment(
        &self,
        key: &str,
        ttl_secs: i64,
    ) -> std::result::Result<u64, RedisError> {
        let mut conn = self.connection().await?;
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(key, 1u64)
            .expire(key, ttl_secs)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    fn in_cooldown(&self, now: u64) -> bool {
        self.connection.get().is_none() && now < self.reconnect_after.load(Ordering::Relaxed)
    }

    /// Only applies while no connection was ever established; an established
    /// manager reconnects on its own.
    fn start_cooldown(&self, now: u64) {
        if self.connection.get().is_none() {
            self.reconnect_after.store(
                now + RECONNECT_COOLDOWN.as_millis() as u64,
                Ordering::Relaxed,
            );
        }
    }

    fn fail_open(&self, kind: &str, detail: &str) -> WindowCount {
        warn!(
            "Counting store {} failure ({}), admitting request: {}",
            BACKEND,
            kind,
            sanitize(detail)
        );
        metrics::record_counting_store_error(BACKEND, kind);
        WindowCount::Unlimited
    }
}

fn classify(error: &RedisError) -> &'static str {
    if error.is_timeout() {
        "timeout"
    } else if error.is_connection_refusal() || error.is_connection_dropped() || error.is_io_error()
    {
        "connect"
    } else {
        "command"
    }
}

#[async_trait]
impl CountingStore for RedisCountingStore {
    async fn increment(&self, bucket_key: &str, window: Duration) -> WindowCount {
        let now = self.clock.now_millis();
        if self.in_cooldown(now) {
            metrics::record_counting_store_error(BACKEND, "unavailable");
            return WindowCount::Unlimited;
        }

        let key = self.counter_key(bucket_key, window_id(now, window));
        let ttl_secs = (window.as_secs() * STALE_WINDOWS).max(1) as i64;

        match tokio::time::timeout(self.timeout, self.try_increment(&key, ttl_secs)).await {
            Ok(Ok(count)) => WindowCount::Counted(count),
            Ok(Err(e)) => {
                let kind = classify(&e);
                self.start_cooldown(now);
                self.fail_open(kind, &e.to_string())
            }
            Err(_) => {
                self.start_cooldown(now);
                self.fail_open(
                    "timeout",
                    &format!("no reply within {}ms", self.timeout.as_millis()),
                )
            }
        }
    }

    async fn warm_up(&self) {
        let result = with_retry(
            "counting store connect",
            4,
            Duration::from_secs(3),
            move || async move {
                match tokio::time::timeout(CONNECT_TIMEOUT, self.connection()).await {
                    Ok(conn) => conn.map_err(|e| e.to_string()),
                    Err(_) => Err(format!(
                        "no connection within {}ms",
                        CONNECT_TIMEOUT.as_millis()
                    )),
                }
            },
        )
        .await;

        match result {
            Ok(mut conn) => {
                let pong: std::result::Result<String, RedisError> =
                    redis::cmd("PING").query_async(&mut conn).await;
                match pong {
                    Ok(_) => info!("Connected to shared counting store"),
                    Err(e) => warn!("Counting store PING failed: {}", sanitize(&e.to_string())),
                }
            }
            Err(e) => {
                warn!(
                    "Counting store unreachable at start-up, rate limiting will fail open until it recovers: {}",
                    sanitize(&e)
                );
            }
        }
        debug!("Counting store key prefix: {}", self.key_prefix);
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[test]
    fn test_rejects_malformed_url() {
        let result = RedisCountingStore::new(
            "not a url",
            "ratelimit",
            Duration::from_millis(50),
            Arc::new(SystemClock),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_counter_key_layout() {
        let store = RedisCountingStore::new(
            "redis://127.0.0.1:6379",
            "ratelimit",
            Duration::from_millis(50),
            Arc::new(SystemClock),
        )
        .unwrap();
        assert_eq!(
            store.counter_key("10.0.0.1:v1", 29_000_000),
            "ratelimit:10.0.0.1:v1:29000000"
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails_open() {
        // Port 1 is reserved and closed on test machines.
        let store = RedisCountingStore::new(
            "redis://127.0.0.1:1",
            "ratelimit",
            Duration::from_millis(200),
            Arc::new(SystemClock),
        )
        .unwrap();

        for _ in 0..3 {
            assert_eq!(
                store.increment("client:v1", Duration::from_secs(60)).await,
                WindowCount::Unlimited
            );
        }
    }
}
