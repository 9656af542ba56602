// Response cache - bounded, concurrent storage for upstream responses

use super::eviction::{self, Candidate, EvictionWeights};
use super::footprint;
use super::models::{CacheEntry, CacheStats, CachedResponse, Expiry, MediaClass};
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::metrics;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    invalidations: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.stores,
            &self.evictions,
            &self.expirations,
            &self.invalidations,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Response cache bounded by entry count and estimated memory.
///
/// Reads go straight to the sharded map. Inserts and eviction are serialized
/// by a write gate so the bounds hold after every `set`.
/// Re-measurement walks entries one at a time and takes the gate only to
/// evict. The memory counter is raised before an entry becomes visible and
/// lowered only after it is gone, so it never reads below the live total.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    memory: AtomicUsize,
    write_gate: Mutex<()>,
    sets_since_remeasure: AtomicU64,
    remeasure_due: Notify,
    counters: Counters,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        info!(
            max_entries = config.max_entries,
            max_memory_bytes = config.max_memory_bytes,
            "Response cache initialized"
        );
        Self {
            entries: DashMap::new(),
            memory: AtomicUsize::new(0),
            write_gate: Mutex::new(()),
            sets_since_remeasure: AtomicU64::new(0),
            remeasure_due: Notify::new(),
            counters: Counters::default(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a fresh entry, recording the hit. Expired entries are removed
    /// and reported as a miss.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now_millis();

        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.last_accessed_at = now;
                entry.hit_count += 1;
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Some((*entry).clone());
            }
            Some(_) => {}
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        }

        if let Some((_, entry)) = self.entries.remove_if(key, |_, e| e.is_expired(now)) {
            self.release(&entry);
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_expirations(1);
            debug!("Expired on read: {}", key);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// TTL applied to `Expiry::Derived`. `None` when the configured default is 0.
    pub fn ttl_for(&self, media_type: &str) -> Option<Duration> {
        if self.config.default_ttl_secs == 0 {
            return None;
        }
        let multiplier = MediaClass::of(media_type).multiplier(&self.config.ttl_multipliers);
        let secs = self.config.default_ttl_secs as f64 * multiplier;
        Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
    }

    /// Store a response, evicting as needed to stay within both bounds.
    /// Returns `false` when the entry alone exceeds the memory budget.
    pub fn set(&self, key: &str, response: CachedResponse, expiry: Expiry) -> bool {
        let now = self.clock.now_millis();
        let ttl = match expiry {
            Expiry::Derived => self.ttl_for(&response.media_type),
            Expiry::After(ttl) => Some(ttl),
            Expiry::Never => None,
        };

        let mut entry = CacheEntry {
            key: key.to_string(),
            body: response.body,
            status: response.status,
            headers: response.headers,
            media_type: response.media_type,
            created_at: now,
            expires_at: ttl.map(|ttl| {
                now.saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
            }),
            etag: response.etag,
            last_accessed_at: now,
            hit_count: 0,
            size_bytes: 0,
        };
        entry.size_bytes = footprint::estimate_entry(&entry);

        if entry.size_bytes > self.config.max_memory_bytes {
            warn!(
                "Refusing to cache {}: {} bytes exceeds the {} byte budget",
                key, entry.size_bytes, self.config.max_memory_bytes
            );
            return false;
        }

        {
            let _gate = self.write_gate.lock();

            let replaced_size = self.entries.get(key).map(|e| e.size_bytes);
            let projected = self
                .memory
                .load(Ordering::SeqCst)
                .saturating_sub(replaced_size.unwrap_or(0))
                .saturating_add(entry.size_bytes);

            if projected > self.config.max_memory_bytes {
                self.evict_bytes(projected - self.config.max_memory_bytes, Some(key));
            }
            if replaced_size.is_none() && self.entries.len() >= self.config.max_entries {
                self.evict_bytes(0, Some(key));
            }

            self.memory.fetch_add(entry.size_bytes, Ordering::SeqCst);
            if let Some(old) = self.entries.insert(key.to_string(), entry) {
                self.release(&old);
            }
        }

        self.counters.stores.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_store();
        debug!("Stored: {}", key);

        let sets = self.sets_since_remeasure.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.remeasure_every_sets > 0 && sets >= self.config.remeasure_every_sets {
            self.sets_since_remeasure.store(0, Ordering::Relaxed);
            self.remeasure_due.notify_one();
        }

        self.publish_usage();
        true
    }

    /// Remove one entry. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.take(key).is_some();
        if removed {
            self.publish_usage();
        }
        removed
    }

    /// Drop every entry whose expiry has passed. Returns how many went.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.is_expired(now))
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for key in expired {
            if let Some((_, entry)) = self.entries.remove_if(&key, |_, e| e.is_expired(now)) {
                self.release(&entry);
                removed += 1;
            }
        }

        if removed > 0 {
            self.counters.expirations.fetch_add(removed as u64, Ordering::Relaxed);
            metrics::record_cache_expirations(removed);
            debug!("Cleaned up {} expired entries", removed);
            self.publish_usage();
        }
        removed
    }

    /// Remove everything whose key starts with `prefix`. Keys start with the
    /// request path, so a path prefix invalidates that route family.
    pub fn invalidate_by_prefix(&self, prefix: &str) -> usize {
        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();

        let removed = matching.iter().filter(|key| self.take(key).is_some()).count();

        self.counters.invalidations.fetch_add(removed as u64, Ordering::Relaxed);
        metrics::record_cache_invalidations(removed);
        info!("Invalidated {} entries with prefix '{}'", removed, prefix);
        self.publish_usage();
        removed
    }

    /// Remove all entries and reset statistics.
    pub fn clear(&self) {
        let _gate = self.write_gate.lock();
        self.entries.retain(|_, entry| {
            self.memory.fetch_sub(entry.size_bytes, Ordering::SeqCst);
            false
        });
        self.counters.reset();
        self.sets_since_remeasure.store(0, Ordering::Relaxed);
        self.publish_usage();
        info!("Response cache cleared");
    }

    /// Resolves once `remeasure_every_sets` inserts have accumulated since the
    /// last request. Awaited by the maintenance task.
    pub async fn remeasure_requested(&self) {
        self.remeasure_due.notified().await;
    }

    /// Recompute every entry's footprint and correct the memory counter. When
    /// the measured total is over budget, evict down to the low watermark.
    /// Returns the measured total after any eviction.
    pub fn remeasure(&self) -> usize {
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        let mut measured = 0usize;
        for key in keys {
            if let Some(mut entry) = self.entries.get_mut(&key) {
                let size = footprint::estimate_entry(&entry);
                if size > entry.size_bytes {
                    self.memory.fetch_add(size - entry.size_bytes, Ordering::SeqCst);
                } else {
                    self.memory.fetch_sub(entry.size_bytes - size, Ordering::SeqCst);
                }
                entry.size_bytes = size;
                measured = measured.saturating_add(size);
            }
        }

        if measured > self.config.max_memory_bytes {
            let target = (self.config.max_memory_bytes as f64 * self.config.low_watermark) as usize;
            warn!(
                "Measured cache footprint {} exceeds budget {}, trimming to {}",
                measured, self.config.max_memory_bytes, target
            );
            let _gate = self.write_gate.lock();
            let freed = self.evict_bytes(measured - target, None);
            measured = measured.saturating_sub(freed);
        }

        self.publish_usage();
        measured
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn memory_usage(&self) -> usize {
        self.memory.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stores: self.counters.stores.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            entries: self.len(),
            memory_bytes: self.memory_usage(),
            max_entries: self.config.max_entries,
            max_memory_bytes: self.config.max_memory_bytes,
        }
    }

    /// Evict by score until at least `needed` bytes are freed, or a single
    /// entry when `needed` is 0. `exclude` is never chosen. Callers hold the
    /// write gate. Returns the bytes freed.
    fn evict_bytes(&self, needed: usize, exclude: Option<&str>) -> usize {
        let now = self.clock.now_millis();
        let candidates: Vec<Candidate> = self
            .entries
            .iter()
            .filter(|e| Some(e.key().as_str()) != exclude)
            .map(|e| Candidate {
                key: e.key().clone(),
                last_accessed_at: e.last_accessed_at,
                hit_count: e.hit_count,
                size_bytes: e.size_bytes,
            })
            .collect();

        let ranked = eviction::rank(candidates, now, self.weights());
        let victims = if needed == 0 {
            ranked.into_iter().take(1).collect()
        } else {
            eviction::take_until_freed(ranked, needed)
        };

        let mut freed = 0usize;
        let mut count = 0usize;
        for victim in victims {
            if let Some(entry) = self.take(&victim.key) {
                freed = freed.saturating_add(entry.size_bytes);
                count += 1;
                debug!("Evicted: {}", victim.key);
            }
        }

        self.counters.evictions.fetch_add(count as u64, Ordering::Relaxed);
        metrics::record_cache_evictions(count);
        freed
    }

    fn weights(&self) -> EvictionWeights {
        EvictionWeights {
            age: self.config.eviction_age_weight,
            hits: self.config.eviction_hit_weight,
        }
    }

    fn take(&self, key: &str) -> Option<CacheEntry> {
        let (_, entry) = self.entries.remove(key)?;
        self.release(&entry);
        Some(entry)
    }

    fn release(&self, entry: &CacheEntry) {
        self.memory.fetch_sub(entry.size_bytes, Ordering::SeqCst);
    }

    fn publish_usage(&self) {
        metrics::update_cache_usage(self.len(), self.memory_usage());
    }
}
