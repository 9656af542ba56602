// Prometheus metrics registry and collectors

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec_with_registry, register_gauge_with_registry,
    register_histogram_vec_with_registry, CounterVec, Encoder, Gauge, HistogramVec, Opts,
    Registry, TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // REQUEST METRICS
    // ============================================================================

    /// Total number of API requests
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec_with_registry!(
        Opts::new("requests_total", "Total number of API requests"),
        &["method", "route", "status_code"],
        REGISTRY
    ).unwrap();

    /// Request duration histogram
    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        prometheus::HistogramOpts::new("request_duration_seconds", "Request duration in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["method", "route"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // CACHE METRICS
    // ============================================================================

    /// Response cache operations
    pub static ref CACHE_OPERATIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cache_operations_total", "Total response cache operations"),
        // operation: hit, miss, store, not_modified, eviction, expired, invalidated, estimate_fallback
        &["operation"],
        REGISTRY
    ).unwrap();

    /// Current cache entries
    pub static ref CACHE_ENTRIES: Gauge = register_gauge_with_registry!(
        Opts::new("cache_entries_current", "Current number of cached responses"),
        REGISTRY
    ).unwrap();

    /// Estimated bytes held by the cache
    pub static ref CACHE_MEMORY: Gauge = register_gauge_with_registry!(
        Opts::new("cache_memory_bytes", "Estimated memory held by cached responses"),
        REGISTRY
    ).unwrap();

    // ============================================================================
    // RATE LIMIT METRICS
    // ============================================================================

    /// Admission decisions
    pub static ref RATE_LIMIT_DECISIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("rate_limit_decisions_total", "Rate limiter admission decisions"),
        &["tier", "decision"], // decision: exempt, admitted, rejected
        REGISTRY
    ).unwrap();

    /// Counting store failures that were treated as "not limited"
    pub static ref COUNTING_STORE_ERRORS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("counting_store_errors_total", "Counting store failures (failed open)"),
        &["backend", "kind"], // kind: connect, command, timeout
        REGISTRY
    ).unwrap();
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
