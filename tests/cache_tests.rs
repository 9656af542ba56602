// Response cache behavior through the public API

use proptest::prelude::*;
use redactgate::cache::{CachedResponse, Expiry, ResponseCache};
use redactgate::clock::ManualClock;
use redactgate::config::CacheConfig;
use std::sync::Arc;
use std::time::Duration;

fn cache_with(config: CacheConfig) -> (ResponseCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    (ResponseCache::new(config, clock.clone()), clock)
}

fn json(body: &str) -> CachedResponse {
    CachedResponse::ok("application/json", body.to_string())
}

#[test]
fn test_get_returns_what_was_set() {
    let (cache, _) = cache_with(CacheConfig::default());

    assert!(cache.set("/v1/engines#1", json(r#"["presidio"]"#), Expiry::Derived));
    let entry = cache.get("/v1/engines#1").expect("entry should be present");

    assert_eq!(&entry.body[..], br#"["presidio"]"#);
    assert_eq!(entry.media_type, "application/json");
    assert!(entry.expires_at.unwrap() > entry.created_at);
}

#[test]
fn test_ttl_expiry() {
    let (cache, clock) = cache_with(CacheConfig::default());
    cache.set(
        "k",
        json("{}"),
        Expiry::After(Duration::from_secs(1)),
    );

    clock.advance(Duration::from_secs(2));
    assert!(cache.get("k").is_none());
    assert!(cache.is_empty());
}

#[test]
fn test_never_expiring_entries_survive_cleanup() {
    let (cache, clock) = cache_with(CacheConfig::default());
    cache.set("forever", json("{}"), Expiry::Never);
    cache.set("brief", json("{}"), Expiry::After(Duration::from_millis(10)));

    clock.advance(Duration::from_secs(86_400));
    assert_eq!(cache.cleanup_expired(), 1);
    assert!(cache.get("forever").is_some());
}

#[test]
fn test_eviction_scenario_abcd() {
    let (cache, clock) = cache_with(CacheConfig {
        max_entries: 2,
        ..CacheConfig::default()
    });

    for key in ["A", "B", "C"] {
        cache.set(key, json(key), Expiry::Never);
        clock.advance(Duration::from_millis(10));
    }
    assert!(!cache.contains("A"), "A is the oldest and goes first");
    assert!(cache.contains("B") && cache.contains("C"));

    assert!(cache.get("B").is_some());
    clock.advance(Duration::from_millis(10));
    cache.set("D", json("D"), Expiry::Never);

    assert!(!cache.contains("C"), "C was neither recent nor hit");
    assert!(cache.contains("B") && cache.contains("D"));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_eviction_prefers_unpopular_entries() {
    let (cache, clock) = cache_with(CacheConfig {
        max_entries: 3,
        ..CacheConfig::default()
    });

    cache.set("popular", json("p"), Expiry::Never);
    cache.set("idle", json("i"), Expiry::Never);
    cache.set("other", json("o"), Expiry::Never);
    for _ in 0..20 {
        cache.get("popular");
    }
    cache.get("other");
    clock.advance(Duration::from_secs(30));

    cache.set("new", json("n"), Expiry::Never);
    assert!(!cache.contains("idle"));
    assert!(cache.contains("popular"));
}

#[test]
fn test_memory_budget_is_enforced() {
    let (cache, _) = cache_with(CacheConfig {
        max_memory_bytes: 50_000,
        ..CacheConfig::default()
    });

    for i in 0..20 {
        cache.set(
            &format!("/v1/doc/{}", i),
            CachedResponse::ok("application/pdf", vec![b'x'; 8_000]),
            Expiry::Never,
        );
        assert!(cache.memory_usage() <= 50_000);
    }
    assert!(cache.len() < 20);
    assert!(cache.stats().evictions > 0);
}

#[test]
fn test_oversized_entry_is_refused() {
    let (cache, _) = cache_with(CacheConfig {
        max_memory_bytes: 1_000,
        ..CacheConfig::default()
    });
    assert!(!cache.set("big", json(&"x".repeat(5_000)), Expiry::Never));
    assert!(cache.is_empty());
    assert_eq!(cache.memory_usage(), 0);
}

#[test]
fn test_remove_is_idempotent() {
    let (cache, _) = cache_with(CacheConfig::default());
    cache.set("k", json("{}"), Expiry::Never);

    assert!(cache.remove("k"));
    let after_first = cache.memory_usage();
    assert!(!cache.remove("k"));
    assert_eq!(cache.memory_usage(), after_first);
    assert_eq!(after_first, 0);
}

#[test]
fn test_invalidate_by_prefix() {
    let (cache, _) = cache_with(CacheConfig::default());
    cache.set("/v1/engines#a", json("1"), Expiry::Never);
    cache.set("/v1/engines#b", json("2"), Expiry::Never);
    cache.set("/v1/jobs#c", json("3"), Expiry::Never);

    assert_eq!(cache.invalidate_by_prefix("/v1/engines"), 2);
    assert_eq!(cache.len(), 1);
    assert!(cache.contains("/v1/jobs#c"));
    assert_eq!(cache.stats().invalidations, 2);
}

#[test]
fn test_clear_resets_everything() {
    let (cache, _) = cache_with(CacheConfig::default());
    cache.set("a", json("1"), Expiry::Never);
    cache.get("a");
    cache.get("missing");

    cache.clear();
    let stats = cache.stats();
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.memory_bytes, 0);
    assert_eq!((stats.hits, stats.misses, stats.stores), (0, 0, 0));
}

#[test]
fn test_concurrent_sets_respect_bounds() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = Arc::new(ResponseCache::new(
        CacheConfig {
            max_entries: 50,
            max_memory_bytes: 200_000,
            ..CacheConfig::default()
        },
        clock,
    ));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    let key = format!("/v1/t{}/{}", t, i);
                    cache.set(&key, CachedResponse::ok("text/plain", vec![0u8; 1_000]), Expiry::Never);
                    cache.get(&key);
                    if i % 7 == 0 {
                        cache.remove(&key);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(cache.len() <= 50);
    assert!(cache.memory_usage() <= 200_000);
    assert_eq!(cache.remeasure(), cache.memory_usage());
}

proptest! {
    #[test]
    fn prop_bounds_hold_after_every_set(
        sizes in prop::collection::vec(0usize..6_000, 1..80),
        max_entries in 1usize..12,
    ) {
        let (cache, clock) = cache_with(CacheConfig {
            max_entries,
            max_memory_bytes: 20_000,
            ..CacheConfig::default()
        });

        for (i, size) in sizes.iter().enumerate() {
            // A handful of repeated keys exercises replacement.
            let key = format!("/v1/k{}", i % 17);
            cache.set(&key, CachedResponse::ok("text/plain", vec![1u8; *size]), Expiry::Never);
            clock.advance(Duration::from_millis(3));

            prop_assert!(cache.len() <= max_entries);
            prop_assert!(cache.memory_usage() <= 20_000);
        }
    }
}
