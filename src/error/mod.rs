// Error types for redactgate
// Maps every failure the edge can surface onto an HTTP response.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Counting store error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache key error: {0}")]
    CacheKey(String),

    #[error("Rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64, limit: u64 },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status and machine-readable error type for this error.
    pub fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            GatewayError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limit_error"),
            GatewayError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "authentication_error"),
            GatewayError::InvalidRequest(_) | GatewayError::CacheKey(_) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error")
            }
            GatewayError::Config(_) | GatewayError::ConfigParsing(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
            }
            GatewayError::Redis(_) => (StatusCode::SERVICE_UNAVAILABLE, "backend_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "api_error"),
        }
    }
}

// Convert GatewayError to HTTP responses for Axum
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        let message = self.to_string();

        let mut error = json!({
            "type": error_type,
            "message": message,
        });

        if let GatewayError::RateLimited {
            retry_after_secs,
            limit,
        } = &self
        {
            error["retry_after"] = json!(retry_after_secs);
            error["limit"] = json!(limit);
        }

        let body = json!({
            "type": "error",
            "error": error,
            "request_id": uuid::Uuid::new_v4(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, axum::Json(body)).into_response();

        if let GatewayError::RateLimited {
            retry_after_secs, ..
        } = self
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
