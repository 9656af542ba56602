//! In-memory response cache for cacheable upstream responses.
//!
//! # Components
//!
//! - `manager`: the bounded [`ResponseCache`] store.
//! - `key`: cache keys and entity tags.
//! - `footprint`: per-entry memory estimates.
//! - `eviction`: victim scoring.
//! - `middleware`: the axum middleware serving hits, misses and `304`s.

pub mod eviction;
pub mod footprint;
pub mod key;
pub mod manager;
pub mod middleware;
pub mod models;

pub use key::CacheKeyBuilder;
pub use manager::ResponseCache;
pub use middleware::{cache_middleware, HttpCache, X_CACHE};
pub use models::{CacheEntry, CacheStats, CachedResponse, Expiry, MediaClass};
