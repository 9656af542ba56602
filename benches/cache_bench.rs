//! Benchmarks for response cache and key derivation

use axum::http::{HeaderMap, HeaderValue, Method, Uri};
use criterion::{criterion_group, criterion_main, Criterion};
use redactgate::cache::{CacheKeyBuilder, CachedResponse, Expiry, ResponseCache};
use redactgate::clock::SystemClock;
use redactgate::config::CacheConfig;
use std::hint::black_box;
use std::sync::Arc;

fn response() -> CachedResponse {
    CachedResponse::ok("application/json", vec![b'x'; 4 * 1024])
}

fn bench_cache_set(c: &mut Criterion) {
    let cache = ResponseCache::new(CacheConfig::default(), Arc::new(SystemClock));
    let mut i = 0u64;

    c.bench_function("cache_set", |b| {
        b.iter(|| {
            i += 1;
            let key = format!("/v1/documents/{}", i % 5_000);
            cache.set(black_box(&key), response(), Expiry::Derived);
        });
    });
}

fn bench_cache_get(c: &mut Criterion) {
    let cache = ResponseCache::new(CacheConfig::default(), Arc::new(SystemClock));
    for i in 0..500 {
        cache.set(&format!("/v1/documents/{}", i), response(), Expiry::Never);
    }

    c.bench_function("cache_get", |b| {
        b.iter(|| {
            let _ = cache.get(black_box("/v1/documents/250"));
        });
    });
}

fn bench_key_derivation(c: &mut Criterion) {
    let builder = CacheKeyBuilder::new(&["accept".to_string(), "accept-encoding".to_string()]);
    let uri: Uri = "/v1/documents?page=3&lang=en&filter=ssn%2Cphone"
        .parse()
        .unwrap();
    let mut headers = HeaderMap::new();
    headers.insert("accept", HeaderValue::from_static("application/json"));
    headers.insert("accept-encoding", HeaderValue::from_static("gzip, br"));

    c.bench_function("cache_key_derive", |b| {
        b.iter(|| {
            let _ = builder.derive(black_box(&Method::GET), black_box(&uri), black_box(&headers));
        });
    });
}

criterion_group!(benches, bench_cache_set, bench_cache_get, bench_key_derivation);
criterion_main!(benches);
