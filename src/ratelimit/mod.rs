//! Tiered, fixed-window rate limiting.
//!
//! # Components
//!
//! - `store`: the [`CountingStore`] trait and the in-process backend.
//! - `redis_store`: the shared backend for fleets of instances.
//! - `identity`: client identity, credentials and admin keys.
//! - `limiter`: the admission decision.
//! - `middleware`: the axum middleware wrapping every route.

pub mod identity;
pub mod limiter;
pub mod middleware;
pub mod models;
pub mod redis_store;
pub mod store;

pub use identity::AdminKeys;
pub use limiter::{RateLimiter, RequestFacts};
pub use middleware::rate_limit_middleware;
pub use models::{Decision, RateLimitPolicy, Tier, WindowCount};
pub use redis_store::RedisCountingStore;
pub use store::{CountingStore, LocalCountingStore};
