//! Utility functions and helpers for redactgate.
//!
//! # Submodules
//!
//! - `logging`: Tracing initialization and credential masking.
//! - `retry`: Bounded exponential backoff for start-up connections.

pub mod logging;
pub mod retry;
