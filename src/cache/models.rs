//! Cache entry, expiry and statistics models.

use crate::config::TtlMultipliers;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use serde::Serialize;
use std::time::Duration;

/// A response as handed to the cache for storage.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub media_type: String,
    pub body: Bytes,
    pub etag: Option<String>,
}

impl CachedResponse {
    /// A `200 OK` response with the given media type and body. Mostly for tests.
    pub fn ok(media_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            media_type: media_type.to_string(),
            body: body.into(),
            etag: None,
        }
    }
}

/// One cached response plus its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub body: Bytes,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub media_type: String,
    /// Epoch millis.
    pub created_at: u64,
    /// `None` means the entry never expires.
    pub expires_at: Option<u64>,
    pub etag: Option<String>,
    pub last_accessed_at: u64,
    pub hit_count: u64,
    /// Conservative footprint estimate, reflected in the cache's memory counter.
    pub size_bytes: usize,
}

impl CacheEntry {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// How long a stored response stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Derive the TTL from the media type (see [`MediaClass`]).
    Derived,
    After(Duration),
    Never,
}

/// Coarse media-type classes used by the default TTL heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaClass {
    /// Machine-readable payloads: JSON, XML, CSV, NDJSON.
    Structured,
    /// Documents meant for rendering: HTML, XHTML, Markdown.
    Markup,
    Other,
}

impl MediaClass {
    pub fn of(media_type: &str) -> Self {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "text/html" | "application/xhtml+xml" | "text/markdown" => MediaClass::Markup,
            "application/json" | "application/xml" | "text/xml" | "text/csv"
            | "application/x-ndjson" | "application/ndjson" => MediaClass::Structured,
            s if s.ends_with("+json") || s.ends_with("+xml") => MediaClass::Structured,
            _ => MediaClass::Other,
        }
    }

    pub fn multiplier(&self, multipliers: &TtlMultipliers) -> f64 {
        match self {
            MediaClass::Structured => multipliers.structured,
            MediaClass::Markup => multipliers.markup,
            MediaClass::Other => multipliers.other,
        }
    }
}

/// Statistics for cache operations.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub invalidations: u64,
    pub entries: usize,
    pub memory_bytes: usize,
    pub max_entries: usize,
    pub max_memory_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_classes() {
        assert_eq!(MediaClass::of("application/json"), MediaClass::Structured);
        assert_eq!(
            MediaClass::of("application/problem+json; charset=utf-8"),
            MediaClass::Structured
        );
        assert_eq!(MediaClass::of("Text/HTML; charset=utf-8"), MediaClass::Markup);
        assert_eq!(MediaClass::of("application/pdf"), MediaClass::Other);
        assert_eq!(MediaClass::of(""), MediaClass::Other);
    }

    #[test]
    fn test_expiry_check() {
        let mut entry = CacheEntry {
            key: "k".into(),
            body: Bytes::new(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            media_type: "text/plain".into(),
            created_at: 1_000,
            expires_at: None,
            etag: None,
            last_accessed_at: 1_000,
            hit_count: 0,
            size_bytes: 0,
        };
        assert!(!entry.is_expired(u64::MAX));

        entry.expires_at = Some(2_000);
        assert!(!entry.is_expired(1_999));
        assert!(entry.is_expired(2_000));
    }
}
