// Metrics module for Prometheus observability

mod registry;

pub use registry::{
    gather_metrics, CACHE_ENTRIES, CACHE_MEMORY, CACHE_OPERATIONS, COUNTING_STORE_ERRORS,
    RATE_LIMIT_DECISIONS, REQUESTS_TOTAL, REQUEST_DURATION,
};

/// Helper to record request metrics
pub fn record_request(method: &str, route: &str, status_code: u16, duration_secs: f64) {
    REQUESTS_TOTAL
        .with_label_values(&[method, route, &status_code.to_string()])
        .inc();

    REQUEST_DURATION
        .with_label_values(&[method, route])
        .observe(duration_secs);
}

/// Helper to record response cache operations
pub fn record_cache_hit() {
    CACHE_OPERATIONS.with_label_values(&["hit"]).inc();
}

pub fn record_cache_miss() {
    CACHE_OPERATIONS.with_label_values(&["miss"]).inc();
}

pub fn record_cache_store() {
    CACHE_OPERATIONS.with_label_values(&["store"]).inc();
}

pub fn record_not_modified() {
    CACHE_OPERATIONS.with_label_values(&["not_modified"]).inc();
}

pub fn record_cache_evictions(count: usize) {
    if count > 0 {
        CACHE_OPERATIONS
            .with_label_values(&["eviction"])
            .inc_by(count as f64);
    }
}

pub fn record_cache_expirations(count: usize) {
    if count > 0 {
        CACHE_OPERATIONS
            .with_label_values(&["expired"])
            .inc_by(count as f64);
    }
}

pub fn record_cache_invalidations(count: usize) {
    if count > 0 {
        CACHE_OPERATIONS
            .with_label_values(&["invalidated"])
            .inc_by(count as f64);
    }
}

pub fn record_estimate_fallback() {
    CACHE_OPERATIONS
        .with_label_values(&["estimate_fallback"])
        .inc();
}

pub fn update_cache_usage(entries: usize, memory_bytes: usize) {
    CACHE_ENTRIES.set(entries as f64);
    CACHE_MEMORY.set(memory_bytes as f64);
}

/// Helper to record rate limiter decisions
pub fn record_rate_limit_decision(tier: &str, decision: &str) {
    RATE_LIMIT_DECISIONS
        .with_label_values(&[tier, decision])
        .inc();
}

pub fn record_counting_store_error(backend: &str, kind: &str) {
    COUNTING_STORE_ERRORS
        .with_label_values(&[backend, kind])
        .inc();
}
