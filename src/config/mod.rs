// Configuration module
// Layered loading (defaults, file, environment) and start-up validation.

mod models;

pub use models::*;

use crate::error::{GatewayError, Result};
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Config file
    /// 3. Defaults (lowest)
    ///
    /// An explicitly supplied `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p.to_path_buf()).required(true),
            None => File::with_name(&Self::default_config_path()).required(false),
        };

        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            .add_source(file)
            // Override with environment variables (e.g. REDACTGATE__CACHE__MAX_ENTRIES)
            .add_source(
                Environment::with_prefix("REDACTGATE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the cache or limiter misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        let cache = &self.cache;
        if cache.max_entries == 0 {
            return Err(GatewayError::Config("cache.max_entries must be > 0".into()));
        }
        if cache.max_memory_bytes == 0 {
            return Err(GatewayError::Config(
                "cache.max_memory_bytes must be > 0".into(),
            ));
        }
        if cache.cleanup_interval_secs == 0 {
            return Err(GatewayError::Config(
                "cache.cleanup_interval_secs must be > 0".into(),
            ));
        }
        for (name, weight) in [
            ("cache.eviction_age_weight", cache.eviction_age_weight),
            ("cache.eviction_hit_weight", cache.eviction_hit_weight),
            ("cache.ttl_multipliers.structured", cache.ttl_multipliers.structured),
            ("cache.ttl_multipliers.markup", cache.ttl_multipliers.markup),
            ("cache.ttl_multipliers.other", cache.ttl_multipliers.other),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(GatewayError::Config(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, weight
                )));
            }
        }
        if !(cache.low_watermark > 0.0 && cache.low_watermark <= 1.0) {
            return Err(GatewayError::Config(format!(
                "cache.low_watermark must be in (0, 1], got {}",
                cache.low_watermark
            )));
        }

        let rl = &self.rate_limit;
        if rl.window_secs == 0 {
            return Err(GatewayError::Config(
                "rate_limit.window_secs must be > 0".into(),
            ));
        }
        if rl.anonymous_rpm == 0 || rl.authenticated_rpm == 0 || rl.admin_rpm == 0 {
            return Err(GatewayError::Config(
                "rate_limit tier ceilings must be > 0".into(),
            ));
        }
        if rl.backend_timeout_ms == 0 {
            return Err(GatewayError::Config(
                "rate_limit.backend_timeout_ms must be > 0".into(),
            ));
        }
        if let Some(url) = &rl.redis_url {
            if url.trim().is_empty() {
                return Err(GatewayError::Config(
                    "rate_limit.redis_url is set but empty".into(),
                ));
            }
            redis::Client::open(url.as_str()).map_err(|e| {
                GatewayError::Config(format!("rate_limit.redis_url is invalid: {}", e))
            })?;
        }

        Ok(())
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".redactgate")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}
