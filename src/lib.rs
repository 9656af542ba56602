// redactgate - response cache and rate limiting edge for the redaction API

pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod metrics;
pub mod ratelimit;
pub mod server;
pub mod utils;
