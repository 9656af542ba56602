//! Memory footprint estimation for cached responses.
//!
//! Estimates walk the entry and its headers, counting each distinct backing
//! buffer once. `Bytes` and `HeaderValue` can share storage (a body sliced from
//! a larger buffer, header values built from the same static), so a visited set
//! keyed by buffer address keeps shared data from being counted twice.

use super::models::CacheEntry;
use crate::metrics;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use bytes::Bytes;
use std::collections::HashSet;
use std::mem::size_of;
use tracing::warn;

/// Fixed bookkeeping cost per entry: map slot, hashing, timestamps, counters.
pub const ENTRY_OVERHEAD: usize = 128;

/// Used when estimation fails. Deliberately large.
pub const FALLBACK_ENTRY_SIZE: usize = 64 * 1024;

/// Addresses of buffers already counted in the current walk.
#[derive(Debug, Default)]
pub struct Seen(HashSet<usize>);

impl Seen {
    /// Returns `true` the first time a non-empty buffer is visited.
    fn first_visit(&mut self, ptr: *const u8, len: usize) -> bool {
        len > 0 && self.0.insert(ptr as usize)
    }
}

/// Approximate heap plus inline size of a value. `None` signals that the
/// estimate could not be computed (arithmetic overflow).
pub trait Footprint {
    fn footprint(&self, seen: &mut Seen) -> Option<usize>;
}

impl Footprint for str {
    fn footprint(&self, _seen: &mut Seen) -> Option<usize> {
        Some(self.len())
    }
}

impl Footprint for String {
    fn footprint(&self, _seen: &mut Seen) -> Option<usize> {
        size_of::<String>().checked_add(self.capacity())
    }
}

impl Footprint for Bytes {
    fn footprint(&self, seen: &mut Seen) -> Option<usize> {
        let shared = if seen.first_visit(self.as_ptr(), self.len()) {
            self.len()
        } else {
            0
        };
        size_of::<Bytes>().checked_add(shared)
    }
}

impl Footprint for HeaderName {
    fn footprint(&self, _seen: &mut Seen) -> Option<usize> {
        size_of::<HeaderName>().checked_add(self.as_str().len())
    }
}

impl Footprint for HeaderValue {
    fn footprint(&self, seen: &mut Seen) -> Option<usize> {
        let bytes = self.as_bytes();
        let shared = if seen.first_visit(bytes.as_ptr(), bytes.len()) {
            bytes.len()
        } else {
            0
        };
        size_of::<HeaderValue>().checked_add(shared)
    }
}

impl Footprint for HeaderMap {
    fn footprint(&self, seen: &mut Seen) -> Option<usize> {
        let mut total = size_of::<HeaderMap>();
        for name in self.keys() {
            total = total.checked_add(name.footprint(seen)?)?;
            for value in self.get_all(name) {
                total = total.checked_add(value.footprint(seen)?)?;
            }
        }
        Some(total)
    }
}

impl<T: Footprint> Footprint for Option<T> {
    fn footprint(&self, seen: &mut Seen) -> Option<usize> {
        match self {
            Some(inner) => inner.footprint(seen),
            None => Some(0),
        }
    }
}

impl Footprint for CacheEntry {
    fn footprint(&self, seen: &mut Seen) -> Option<usize> {
        let parts = [
            self.key.footprint(seen)?,
            self.body.footprint(seen)?,
            self.headers.footprint(seen)?,
            self.media_type.footprint(seen)?,
            self.etag.footprint(seen)?,
        ];
        parts
            .into_iter()
            .try_fold(size_of::<CacheEntry>() + ENTRY_OVERHEAD, |acc, part| {
                acc.checked_add(part)
            })
    }
}

/// Run an estimate, substituting [`FALLBACK_ENTRY_SIZE`] when it fails.
pub fn estimate_with<F>(estimate: F) -> usize
where
    F: FnOnce(&mut Seen) -> Option<usize>,
{
    let mut seen = Seen::default();
    match estimate(&mut seen) {
        Some(size) => size,
        None => {
            warn!(
                "Size estimation failed, using fallback of {} bytes",
                FALLBACK_ENTRY_SIZE
            );
            metrics::record_estimate_fallback();
            FALLBACK_ENTRY_SIZE
        }
    }
}

/// Estimated memory held by one cache entry.
pub fn estimate_entry(entry: &CacheEntry) -> usize {
    estimate_with(|seen| entry.footprint(seen))
}
