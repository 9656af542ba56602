//! Structured logging and credential-masking utilities.
//!
//! This module configures the `tracing` ecosystem for the application and
//! provides a sanitizer so that bearer tokens and API keys seen in request
//! headers never reach a log sink verbatim.

use crate::config::LoggingConfig;
use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global tracing subscriber for the application.
///
/// Supports three output formats:
/// - `json`: Structured JSON logs for production ingestion.
/// - `compact`: Single-line human-readable output.
/// - `pretty` (default): Multi-line, colorized output for development.
///
/// Log levels are controlled via the `RUST_LOG` environment variable or
/// the provided `LoggingConfig`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        "compact" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

static BEARER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9._~+/=-]+").expect("valid regex"));

static API_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)((?:x-api-key|api_key|apikey)["']?\s*[:=]\s*["']?)[A-Za-z0-9._~+/=-]+"#)
        .expect("valid regex")
});

static REDIS_PASSWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(rediss?://[^:/@\s]*:)[^@\s]+@").expect("valid regex"));

/// Masks credentials in a string before it is logged.
///
/// Handles bearer tokens, `x-api-key` style assignments and passwords embedded
/// in Redis URLs.
pub fn sanitize(input: &str) -> String {
    let result = BEARER.replace_all(input, "${1}[REDACTED_TOKEN]");
    let result = API_KEY.replace_all(&result, "${1}[REDACTED_API_KEY]");
    let result = REDIS_PASSWORD.replace_all(&result, "${1}[REDACTED]@");
    result.into_owned()
}
