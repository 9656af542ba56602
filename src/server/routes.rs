// HTTP routes configuration

use super::handlers::{
    cache_stats_handler, engines_handler, health_handler, invalidate_handler, metrics_handler,
};
use super::middleware::{request_id_layers, track_metrics};
use crate::cache::{cache_middleware, HttpCache, ResponseCache};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::error::Result;
use crate::ratelimit::{rate_limit_middleware, RateLimiter};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub http_cache: Arc<HttpCache>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Build the cache and limiter once for the process.
    pub fn new(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let cache = Arc::new(ResponseCache::new(config.cache.clone(), clock.clone()));
        let http_cache = Arc::new(HttpCache::new(cache, &config.cache));
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit, clock)?);

        Ok(Self {
            config: Arc::new(config),
            http_cache,
            limiter,
        })
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        self.http_cache.cache()
    }
}

pub fn create_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/v1/engines", get(engines_handler))
        .route("/admin/cache/invalidate", post(invalidate_handler))
        .route("/admin/cache/stats", get(cache_stats_handler))
        .with_state(state.clone());

    with_edge_layers(routes, &state)
}

/// Wrap any router in the edge stack. The last layer added runs first, so a
/// request passes request-id, tracing, body limit, metrics, rate limiting and
/// then the cache before reaching a handler.
pub fn with_edge_layers(router: Router, state: &AppState) -> Router {
    let (set_request_id, propagate_request_id) = request_id_layers();

    router
        .layer(from_fn_with_state(state.http_cache.clone(), cache_middleware))
        .layer(from_fn_with_state(state.limiter.clone(), rate_limit_middleware))
        .layer(from_fn(track_metrics))
        .layer(RequestBodyLimitLayer::new(
            state.config.server.max_request_body_bytes,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(propagate_request_id)
        .layer(set_request_id)
}
