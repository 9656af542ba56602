//! Rate limiter service.
//!
//! Combines the static [`RateLimitPolicy`] with a [`CountingStore`] to decide,
//! per request, between EXEMPT, ADMITTED and REJECTED.

use super::identity::{client_identity, presented_credential, top_level_segment, AdminKeys};
use super::models::{Decision, RateLimitPolicy, Tier, WindowCount};
use super::redis_store::RedisCountingStore;
use super::store::{CountingStore, LocalCountingStore};
use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::error::Result;
use crate::metrics;
use axum::http::HeaderMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The parts of a request the limiter looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestFacts<'a> {
    pub path: &'a str,
    pub headers: &'a HeaderMap,
    pub peer: Option<IpAddr>,
}

/// Main rate limiter service
pub struct RateLimiter {
    policy: RateLimitPolicy,
    store: Arc<dyn CountingStore>,
    admin_keys: AdminKeys,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Build the limiter and pick the counting backend once: Redis when a URL is
    /// configured, in-process counters otherwise.
    pub fn from_config(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let store: Arc<dyn CountingStore> = match &config.redis_url {
            Some(url) => {
                info!("Rate limiter using shared counting store");
                Arc::new(RedisCountingStore::new(
                    url,
                    config.key_prefix.clone(),
                    Duration::from_millis(config.backend_timeout_ms),
                    clock.clone(),
                )?)
            }
            None => {
                info!("Rate limiter using in-memory counting store");
                Arc::new(LocalCountingStore::new(clock.clone()))
            }
        };

        let limiter = Self::with_store(
            RateLimitPolicy::from(config),
            store,
            AdminKeys::new(&config.admin_keys),
            clock,
        );
        if limiter.admin_keys.is_empty() {
            warn!("No admin keys configured; the admin tier and admin endpoints are unreachable");
        }
        Ok(limiter)
    }

    /// Create with a custom storage backend (for testing)
    pub fn with_store(
        policy: RateLimitPolicy,
        store: Arc<dyn CountingStore>,
        admin_keys: AdminKeys,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            policy,
            store,
            admin_keys,
            clock,
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub fn admin_keys(&self) -> &AdminKeys {
        &self.admin_keys
    }

    pub fn store(&self) -> &Arc<dyn CountingStore> {
        &self.store
    }

    /// Ordered predicates, first match wins: admin, authenticated, anonymous.
    pub fn tier_for(&self, path: &str, headers: &HeaderMap) -> Tier {
        let credential = presented_credential(headers);

        match credential {
            Some(c) if self.policy.is_admin_path(path) && self.admin_keys.verify(&c) => Tier::Admin,
            Some(_) => Tier::Authenticated,
            None => Tier::Anonymous,
        }
    }

    /// `identity:segment`, so each route family is limited independently per client.
    pub fn bucket_key(identity: &str, path: &str) -> String {
        format!("{}:{}", identity, top_level_segment(path))
    }

    /// Seconds until the current window closes (at least 1).
    pub fn retry_after_secs(&self) -> u64 {
        let window_ms = u64::try_from(self.policy.window.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        let elapsed = self.clock.now_millis() % window_ms;
        (window_ms - elapsed).div_ceil(1000).max(1)
    }

    /// Decide whether a request may proceed. Never fails: counting-store
    /// trouble admits the request.
    pub async fn check(&self, facts: &RequestFacts<'_>) -> Decision {
        if !self.policy.enabled || self.policy.is_exempt(facts.path) {
            metrics::record_rate_limit_decision("none", "exempt");
            return Decision::Exempt;
        }

        let identity = client_identity(facts.headers, facts.peer);
        let tier = self.tier_for(facts.path, facts.headers);
        let limit = self.policy.limit_for(tier);
        let bucket = Self::bucket_key(&identity, facts.path);

        let decision = match self.store.increment(&bucket, self.policy.window).await {
            WindowCount::Counted(count) if count > limit => Decision::Rejected {
                tier,
                limit,
                count,
                retry_after_secs: self.retry_after_secs(),
            },
            WindowCount::Counted(count) => Decision::Admitted {
                tier,
                limit,
                count: Some(count),
            },
            WindowCount::Unlimited => Decision::Admitted {
                tier,
                limit,
                count: None,
            },
        };

        if decision.is_rejected() {
            warn!(
                bucket = %bucket,
                tier = tier.as_str(),
                limit = limit,
                "Rate limit exceeded"
            );
        } else {
            debug!(bucket = %bucket, tier = tier.as_str(), "Request admitted");
        }
        metrics::record_rate_limit_decision(tier.as_str(), decision.label());

        decision
    }
}
