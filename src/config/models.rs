//! Configuration data structures for redactgate.
//!
//! This module defines the schema for the application settings: the HTTP server,
//! logging, the response cache and the tiered rate limiter.

use serde::{Deserialize, Serialize};

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP server settings (host, port, workers).
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// In-process response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Rate limiting policy and counting backend.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Settings for the built-in HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The IP address or hostname the server should bind to.
    /// Default: `127.0.0.1`
    #[serde(default = "default_host")]
    pub host: String,

    /// The port number the server should listen on.
    /// Default: `8080`
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of tokio worker threads.
    /// Default: Number of logical CPU cores.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Largest accepted request body.
    /// Default: `25 MiB`
    #[serde(default = "default_max_request_body")]
    pub max_request_body_bytes: usize,

    /// Names of the PII-detection engines fronted by this edge.
    #[serde(default = "default_engines")]
    pub engines: Vec<String>,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`, `compact`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// TTL multipliers applied to `default_ttl_secs` by media-type class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TtlMultipliers {
    /// JSON, XML, CSV, NDJSON and `+json`/`+xml` types.
    #[serde(default = "default_structured_multiplier")]
    pub structured: f64,

    /// HTML, XHTML and Markdown.
    #[serde(default = "default_markup_multiplier")]
    pub markup: f64,

    /// Everything else.
    #[serde(default = "default_other_multiplier")]
    pub other: f64,
}

/// Settings for the in-process response cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether the cache middleware is active.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of cached responses.
    /// Default: `1000`
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Memory budget for all cached responses, in bytes.
    /// Default: `100 MiB`
    #[serde(default = "default_max_memory")]
    pub max_memory_bytes: usize,

    /// Base TTL before media-type multipliers are applied.
    /// Default: `300`
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    #[serde(default)]
    pub ttl_multipliers: TtlMultipliers,

    /// Only GET/HEAD requests under one of these path prefixes are cached.
    #[serde(default = "default_cacheable_prefixes")]
    pub cacheable_prefixes: Vec<String>,

    /// Request headers that select a representation and so take part in the key.
    /// Default: `accept`, `accept-encoding`
    #[serde(default = "default_vary_headers")]
    pub vary_headers: Vec<String>,

    /// Responses with larger bodies are served but never stored.
    /// Default: `5 MiB`
    #[serde(default = "default_max_body")]
    pub max_body_bytes: usize,

    /// Weight of normalized idle time in the eviction score.
    /// Default: `0.7`
    #[serde(default = "default_age_weight")]
    pub eviction_age_weight: f64,

    /// Weight of normalized hit count in the eviction score.
    /// Default: `0.3`
    #[serde(default = "default_hit_weight")]
    pub eviction_hit_weight: f64,

    /// Fraction of the memory budget that over-budget re-measurement evicts down to.
    /// Default: `0.8`
    #[serde(default = "default_low_watermark")]
    pub low_watermark: f64,

    /// Re-measure total memory after this many inserts.
    /// Default: `100`
    #[serde(default = "default_remeasure_every")]
    pub remeasure_every_sets: u64,

    /// Period of the background expiry sweep.
    /// Default: `60`
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

/// Settings for tiered rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether the rate-limit middleware is active.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Ceiling per window for requests without credentials.
    /// Default: `30`
    #[serde(default = "default_anonymous_rpm")]
    pub anonymous_rpm: u64,

    /// Ceiling per window for requests carrying a credential.
    /// Default: `100`
    #[serde(default = "default_authenticated_rpm")]
    pub authenticated_rpm: u64,

    /// Ceiling per window for admin requests with a valid admin key.
    /// Default: `1000`
    #[serde(default = "default_admin_rpm")]
    pub admin_rpm: u64,

    /// Reserved for a token-bucket refinement; not used for admission.
    /// Default: `10`
    #[serde(default = "default_burst")]
    pub burst: u64,

    /// Length of one counting window.
    /// Default: `60`
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Paths that are never counted (exact match or any sub-path).
    #[serde(default = "default_exempt_paths")]
    pub exempt_paths: Vec<String>,

    /// Path prefix that qualifies for the admin tier.
    /// Default: `/admin`
    #[serde(default = "default_admin_prefix")]
    pub admin_path_prefix: String,

    /// Keys accepted as admin credentials.
    #[serde(default)]
    pub admin_keys: Vec<String>,

    /// Shared counting store. Absent means counters are kept in-process.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Namespace for keys in the shared store.
    /// Default: `ratelimit`
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Upper bound on one shared-store round-trip before failing open.
    /// Default: `50`
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            max_request_body_bytes: default_max_request_body(),
            engines: default_engines(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for TtlMultipliers {
    fn default() -> Self {
        Self {
            structured: default_structured_multiplier(),
            markup: default_markup_multiplier(),
            other: default_other_multiplier(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_max_entries(),
            max_memory_bytes: default_max_memory(),
            default_ttl_secs: default_ttl_secs(),
            ttl_multipliers: TtlMultipliers::default(),
            cacheable_prefixes: default_cacheable_prefixes(),
            vary_headers: default_vary_headers(),
            max_body_bytes: default_max_body(),
            eviction_age_weight: default_age_weight(),
            eviction_hit_weight: default_hit_weight(),
            low_watermark: default_low_watermark(),
            remeasure_every_sets: default_remeasure_every(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            anonymous_rpm: default_anonymous_rpm(),
            authenticated_rpm: default_authenticated_rpm(),
            admin_rpm: default_admin_rpm(),
            burst: default_burst(),
            window_secs: default_window_secs(),
            exempt_paths: default_exempt_paths(),
            admin_path_prefix: default_admin_prefix(),
            admin_keys: Vec::new(),
            redis_url: None,
            key_prefix: default_key_prefix(),
            backend_timeout_ms: default_backend_timeout(),
        }
    }
}

// Helper functions for serde defaults and shared constants
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_max_request_body() -> usize {
    25 * 1024 * 1024
}

fn default_engines() -> Vec<String> {
    vec!["presidio".to_string(), "spacy".to_string(), "gliner".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_structured_multiplier() -> f64 {
    2.0
}

fn default_markup_multiplier() -> f64 {
    1.0
}

fn default_other_multiplier() -> f64 {
    0.5
}

fn default_max_entries() -> usize {
    1000
}

fn default_max_memory() -> usize {
    100 * 1024 * 1024
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_cacheable_prefixes() -> Vec<String> {
    vec!["/v1/".to_string()]
}

fn default_vary_headers() -> Vec<String> {
    vec!["accept".to_string(), "accept-encoding".to_string()]
}

fn default_max_body() -> usize {
    5 * 1024 * 1024
}

fn default_age_weight() -> f64 {
    0.7
}

fn default_hit_weight() -> f64 {
    0.3
}

fn default_low_watermark() -> f64 {
    0.8
}

fn default_remeasure_every() -> u64 {
    100
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_anonymous_rpm() -> u64 {
    30
}

fn default_authenticated_rpm() -> u64 {
    100
}

fn default_admin_rpm() -> u64 {
    1000
}

fn default_burst() -> u64 {
    10
}

fn default_window_secs() -> u64 {
    60
}

fn default_exempt_paths() -> Vec<String> {
    vec!["/health".to_string(), "/metrics".to_string()]
}

fn default_admin_prefix() -> String {
    "/admin".to_string()
}

fn default_key_prefix() -> String {
    "ratelimit".to_string()
}

fn default_backend_timeout() -> u64 {
    50
}
