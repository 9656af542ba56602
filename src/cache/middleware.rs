// Response caching middleware

use super::key::{etag_for, etag_matches, CacheKeyBuilder};
use super::manager::ResponseCache;
use super::models::{CacheEntry, CachedResponse, Expiry};
use crate::config::CacheConfig;
use crate::error::GatewayError;
use crate::metrics;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tracing::{debug, warn};

pub const X_CACHE: &str = "x-cache";

/// Shared state for [`cache_middleware`]: the store plus request policy.
pub struct HttpCache {
    cache: Arc<ResponseCache>,
    keys: CacheKeyBuilder,
    enabled: bool,
    cacheable_prefixes: Vec<String>,
    max_body_bytes: usize,
}

impl HttpCache {
    pub fn new(cache: Arc<ResponseCache>, config: &CacheConfig) -> Self {
        Self {
            cache,
            keys: CacheKeyBuilder::new(&config.vary_headers),
            enabled: config.enabled,
            cacheable_prefixes: config.cacheable_prefixes.clone(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Only GET and HEAD under a cacheable prefix are looked up or stored.
    pub fn is_cacheable_request(&self, method: &Method, path: &str) -> bool {
        self.enabled
            && (method == Method::GET || method == Method::HEAD)
            && self
                .cacheable_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Drop cached responses for every path starting with `prefix`.
    pub fn invalidate_path_prefix(&self, prefix: &str) -> usize {
        self.cache.invalidate_by_prefix(prefix)
    }

    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    /// Whether a response from the origin may be stored.
    fn is_storable(&self, response: &Response) -> bool {
        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            return false;
        }
        // Answers to the client's own conditional or range headers, which
        // are not part of the key.
        if status == StatusCode::NOT_MODIFIED || status == StatusCode::PARTIAL_CONTENT {
            return false;
        }

        let headers = response.headers();
        if headers.contains_key(header::SET_COOKIE) {
            return false;
        }

        let cache_control = header_str(headers, header::CACHE_CONTROL).to_ascii_lowercase();
        if cache_control
            .split(',')
            .map(str::trim)
            .any(|directive| directive == "no-store" || directive == "private")
        {
            return false;
        }

        if header_str(headers, header::CONTENT_TYPE)
            .trim_start()
            .starts_with("text/event-stream")
        {
            return false;
        }

        let declared_len = header_str(headers, header::CONTENT_LENGTH).parse::<usize>().ok();
        !declared_len.is_some_and(|len| len > self.max_body_bytes)
    }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> &str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

fn not_modified(entry: &CacheEntry) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    if let Some(etag) = &entry.etag {
        set_header(response.headers_mut(), "etag", etag);
    }
    set_header(response.headers_mut(), X_CACHE, "HIT");
    response
}

fn replay(entry: CacheEntry) -> Response {
    let mut response = Response::new(Body::from(entry.body));
    *response.status_mut() = entry.status;
    *response.headers_mut() = entry.headers;
    if let Some(etag) = &entry.etag {
        set_header(response.headers_mut(), "etag", etag);
    }
    set_header(response.headers_mut(), X_CACHE, "HIT");
    response
}

/// Axum middleware serving cacheable requests from [`ResponseCache`].
///
/// Uncacheable requests pass straight through. A fresh entry is replayed, or
/// answered with `304` when `If-None-Match` matches its tag. On a miss the
/// origin response is buffered, tagged and stored when storable.
pub async fn cache_middleware(
    State(http_cache): State<Arc<HttpCache>>,
    request: Request,
    next: Next,
) -> Response {
    if !http_cache.is_cacheable_request(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    let key = match http_cache
        .keys
        .derive(request.method(), request.uri(), request.headers())
    {
        Ok(key) => key,
        Err(e) => {
            debug!("Bypassing cache: {}", e);
            return next.run(request).await;
        }
    };

    if let Some(entry) = http_cache.cache.get(&key) {
        let revalidated = request
            .headers()
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
            .zip(entry.etag.as_deref())
            .is_some_and(|(candidates, etag)| etag_matches(candidates, etag));

        if revalidated {
            metrics::record_not_modified();
            return not_modified(&entry);
        }
        metrics::record_cache_hit();
        return replay(entry);
    }

    metrics::record_cache_miss();
    let response = next.run(request).await;

    if !http_cache.is_storable(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to buffer origin response: {}", e);
            return GatewayError::Internal("failed to read origin response".to_string())
                .into_response();
        }
    };

    if bytes.len() > http_cache.max_body_bytes {
        debug!("Not caching {}: body of {} bytes", key, bytes.len());
        return Response::from_parts(parts, Body::from(bytes));
    }

    let etag = etag_for(&bytes);
    let media_type = header_str(&parts.headers, header::CONTENT_TYPE).to_string();
    let stored = CachedResponse {
        status: parts.status,
        headers: parts.headers.clone(),
        media_type: if media_type.is_empty() {
            "application/octet-stream".to_string()
        } else {
            media_type
        },
        body: bytes.clone(),
        etag: Some(etag.clone()),
    };
    http_cache.cache.set(&key, stored, Expiry::Derived);

    set_header(&mut parts.headers, "etag", &etag);
    set_header(&mut parts.headers, X_CACHE, "MISS");
    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn http_cache() -> HttpCache {
        let config = CacheConfig::default();
        let cache = Arc::new(ResponseCache::new(
            config.clone(),
            Arc::new(ManualClock::new(0)),
        ));
        HttpCache::new(cache, &config)
    }

    #[test]
    fn test_cacheable_requests() {
        let http_cache = http_cache();
        assert!(http_cache.is_cacheable_request(&Method::GET, "/v1/engines"));
        assert!(http_cache.is_cacheable_request(&Method::HEAD, "/v1/engines"));
        assert!(!http_cache.is_cacheable_request(&Method::POST, "/v1/redact"));
        assert!(!http_cache.is_cacheable_request(&Method::GET, "/health"));
    }

    #[test]
    fn test_storable_responses() {
        let http_cache = http_cache();
        let response = |status: StatusCode, headers: &[(&'static str, &'static str)]| {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = status;
            for (name, value) in headers {
                response
                    .headers_mut()
                    .insert(*name, HeaderValue::from_static(*value));
            }
            response
        };

        assert!(http_cache.is_storable(&response(StatusCode::OK, &[])));
        assert!(http_cache.is_storable(&response(StatusCode::MOVED_PERMANENTLY, &[])));
        assert!(!http_cache.is_storable(&response(StatusCode::NOT_FOUND, &[])));
        assert!(!http_cache.is_storable(&response(StatusCode::INTERNAL_SERVER_ERROR, &[])));
        assert!(!http_cache.is_storable(&response(
            StatusCode::OK,
            &[("cache-control", "max-age=0, No-Store")]
        )));
        assert!(!http_cache.is_storable(&response(StatusCode::OK, &[("cache-control", "private")])));
        assert!(!http_cache.is_storable(&response(
            StatusCode::OK,
            &[("content-type", "text/event-stream")]
        )));
        assert!(!http_cache.is_storable(&response(StatusCode::OK, &[("set-cookie", "a=b")])));
        assert!(!http_cache.is_storable(&response(
            StatusCode::OK,
            &[("content-length", "999999999")]
        )));
    }
}
