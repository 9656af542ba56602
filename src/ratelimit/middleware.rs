// Rate limiting middleware

use super::limiter::{RateLimiter, RequestFacts};
use super::models::Decision;
use crate::error::GatewayError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

/// Axum middleware: EXEMPT and ADMITTED requests go to `next`, REJECTED ones
/// get a 429 without reaching it.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip());

    let decision = {
        let facts = RequestFacts {
            path: request.uri().path(),
            headers: request.headers(),
            peer,
        };
        limiter.check(&facts).await
    };

    match decision {
        Decision::Exempt => next.run(request).await,
        Decision::Admitted { limit, count, .. } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            if let Some(count) = count {
                headers.insert(
                    "x-ratelimit-remaining",
                    HeaderValue::from(limit.saturating_sub(count)),
                );
            }
            response
        }
        Decision::Rejected {
            limit,
            retry_after_secs,
            ..
        } => {
            let mut response = GatewayError::RateLimited {
                retry_after_secs,
                limit,
            }
            .into_response();
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(0u64));
            response
        }
    }
}
