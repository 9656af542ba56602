// HTTP request handlers

use super::routes::AppState;
use crate::cache::CacheStats;
use crate::error::{GatewayError, Result};
use crate::metrics::gather_metrics;
use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HashMap<String, HealthCheck>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    pub message: String,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut checks = HashMap::new();
    let mut overall_status = HealthStatus::Healthy;

    // Cache usage against its budget
    let stats = state.cache().stats();
    let cache_check = if !state.config.cache.enabled {
        HealthCheck {
            status: "disabled".to_string(),
            message: "Response cache disabled".to_string(),
        }
    } else if stats.memory_bytes > stats.max_memory_bytes {
        overall_status = HealthStatus::Degraded;
        HealthCheck {
            status: "warning".to_string(),
            message: format!(
                "Memory {} bytes over budget {}",
                stats.memory_bytes, stats.max_memory_bytes
            ),
        }
    } else {
        HealthCheck {
            status: "ok".to_string(),
            message: format!(
                "{} entries, {} of {} bytes",
                stats.entries, stats.memory_bytes, stats.max_memory_bytes
            ),
        }
    };
    checks.insert("response_cache".to_string(), cache_check);

    // Counting backend
    let limiter_check = if state.config.rate_limit.enabled {
        HealthCheck {
            status: "ok".to_string(),
            message: format!("Counting store: {}", state.limiter.store().backend_name()),
        }
    } else {
        HealthCheck {
            status: "disabled".to_string(),
            message: "Rate limiting disabled".to_string(),
        }
    };
    checks.insert("rate_limiter".to_string(), limiter_check);

    Json(HealthResponse {
        status: overall_status,
        checks,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Prometheus text exposition.
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnginesResponse {
    pub engines: Vec<String>,
}

/// Detection engines this deployment fronts.
pub async fn engines_handler(State(state): State<AppState>) -> Json<EnginesResponse> {
    Json(EnginesResponse {
        engines: state.config.server.engines.clone(),
    })
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvalidateRequest {
    /// Path prefix to drop. Absent means everything.
    #[serde(default)]
    pub prefix: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub removed: usize,
    pub prefix: Option<String>,
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<()> {
    if state.limiter.admin_keys().authorizes(headers) {
        Ok(())
    } else {
        warn!("Rejected admin request without a valid admin key");
        Err(GatewayError::Unauthorized(
            "valid admin key required".to_string(),
        ))
    }
}

/// Handler for POST /admin/cache/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<InvalidateResponse>> {
    require_admin(&state, &headers)?;

    let req: InvalidateRequest = if body.trim().is_empty() {
        InvalidateRequest::default()
    } else {
        serde_json::from_str(&body)
            .map_err(|e| GatewayError::InvalidRequest(format!("invalid JSON body: {}", e)))?
    };

    let removed = match req.prefix.as_deref() {
        Some(prefix) if !prefix.is_empty() => state.http_cache.invalidate_path_prefix(prefix),
        _ => {
            let removed = state.cache().len();
            state.http_cache.invalidate_all();
            removed
        }
    };

    info!(
        "Admin cache invalidation: prefix={:?}, removed={}",
        req.prefix, removed
    );
    Ok(Json(InvalidateResponse {
        removed,
        prefix: req.prefix,
    }))
}

/// Handler for GET /admin/cache/stats
pub async fn cache_stats_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CacheStats>> {
    require_admin(&state, &headers)?;
    Ok(Json(state.cache().stats()))
}
