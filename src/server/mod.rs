//! Axum-based HTTP server for the redaction API edge.
//!
//! Every route sits behind the same stack: request ids, tracing, a request
//! body limit, request metrics, rate limiting and the response cache. Route
//! handlers themselves know nothing about either concern.
//!
//! # Components
//!
//! - `handlers`: health, metrics, engine listing and the admin cache endpoints.
//! - `middleware`: request-id layers and request metrics.
//! - `routes`: the shared [`AppState`] and the router with its layer stack.

mod handlers;
mod middleware;
mod routes;

pub use handlers::{HealthResponse, HealthStatus, InvalidateRequest, InvalidateResponse};
pub use routes::{create_router, with_edge_layers, AppState};
