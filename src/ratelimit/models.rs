//! Rate limiting policy, tiers and decisions.

use crate::config::RateLimitConfig;
use std::time::Duration;

/// Which ceiling a request is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Anonymous,
    Authenticated,
    Admin,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Anonymous => "anonymous",
            Tier::Authenticated => "authenticated",
            Tier::Admin => "admin",
        }
    }
}

/// Result of one counting-store increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCount {
    /// Post-increment count for the current window.
    Counted(u64),
    /// The backend failed; the caller must treat the request as not limited.
    Unlimited,
}

/// Outcome of the admission check for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Path is on the bypass list (or limiting is disabled); nothing was counted.
    Exempt,
    /// `count` is `None` when the counting store failed open.
    Admitted {
        tier: Tier,
        limit: u64,
        count: Option<u64>,
    },
    Rejected {
        tier: Tier,
        limit: u64,
        count: u64,
        retry_after_secs: u64,
    },
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Exempt => "exempt",
            Decision::Admitted { .. } => "admitted",
            Decision::Rejected { .. } => "rejected",
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Decision::Rejected { .. })
    }
}

/// Static admission policy. Built once at start-up and shared read-only.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub enabled: bool,
    pub anonymous_limit: u64,
    pub authenticated_limit: u64,
    pub admin_limit: u64,
    /// Reserved for a token-bucket refinement.
    pub burst: u64,
    pub window: Duration,
    pub exempt_paths: Vec<String>,
    pub admin_path_prefix: String,
}

impl RateLimitPolicy {
    pub fn limit_for(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Anonymous => self.anonymous_limit,
            Tier::Authenticated => self.authenticated_limit,
            Tier::Admin => self.admin_limit,
        }
    }

    /// Exact match, or any sub-path of an exempt entry.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|exempt| {
            let exempt = exempt.trim_end_matches('/');
            path == exempt
                || path
                    .strip_prefix(exempt)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    pub fn is_admin_path(&self, path: &str) -> bool {
        let prefix = self.admin_path_prefix.trim_end_matches('/');
        !prefix.is_empty()
            && (path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/')))
    }
}

impl From<&RateLimitConfig> for RateLimitPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            anonymous_limit: config.anonymous_rpm,
            authenticated_limit: config.authenticated_rpm,
            admin_limit: config.admin_rpm,
            burst: config.burst,
            window: Duration::from_secs(config.window_secs),
            exempt_paths: config.exempt_paths.clone(),
            admin_path_prefix: config.admin_path_prefix.clone(),
        }
    }
}
