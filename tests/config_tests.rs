// Configuration loading from TOML files

use redactgate::config::AppConfig;
use redactgate::error::GatewayError;
use std::fs;

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn test_file_overrides_defaults() {
    let (_dir, path) = write_config(
        r#"
[server]
port = 9090
engines = ["presidio"]

[cache]
max_entries = 5
cacheable_prefixes = ["/v1/", "/v2/"]

[cache.ttl_multipliers]
structured = 4.0

[rate_limit]
anonymous_rpm = 10
admin_keys = ["ops-key"]
"#,
    );

    let config = AppConfig::load(Some(&path)).unwrap();

    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.engines, vec!["presidio".to_string()]);
    assert_eq!(config.cache.max_entries, 5);
    assert_eq!(config.cache.cacheable_prefixes.len(), 2);
    assert_eq!(config.cache.ttl_multipliers.structured, 4.0);
    assert_eq!(config.cache.ttl_multipliers.markup, 1.0);
    assert_eq!(config.rate_limit.anonymous_rpm, 10);
    assert_eq!(config.rate_limit.admin_keys, vec!["ops-key".to_string()]);

    // Untouched sections keep their defaults
    assert_eq!(config.rate_limit.authenticated_rpm, 100);
    assert_eq!(config.cache.default_ttl_secs, 300);
    assert!(config.rate_limit.redis_url.is_none());
}

#[test]
fn test_invalid_values_are_fatal() {
    let (_dir, path) = write_config(
        r#"
[cache]
low_watermark = 0.0
"#,
    );

    let err = AppConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, GatewayError::Config(_)));
    assert!(err.to_string().contains("low_watermark"));
}

#[test]
fn test_malformed_redis_url_is_fatal() {
    let (_dir, path) = write_config(
        r#"
[rate_limit]
redis_url = "not a url"
"#,
    );

    assert!(AppConfig::load(Some(&path)).is_err());
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(AppConfig::load(Some(&missing)).is_err());
}

#[test]
fn test_effective_config_round_trips_through_toml() {
    let mut config = AppConfig::default();
    config.rate_limit.redis_url = Some("redis://127.0.0.1:6379/".to_string());
    let rendered = toml::to_string_pretty(&config).unwrap();

    let (_dir, path) = write_config(&rendered);
    let loaded = AppConfig::load(Some(&path)).unwrap();
    assert_eq!(loaded.rate_limit.redis_url, config.rate_limit.redis_url);
    assert_eq!(loaded.cache.max_memory_bytes, config.cache.max_memory_bytes);
}

#[test]
fn test_logging_section_has_only_level_and_format() {
    let rendered = toml::to_string_pretty(&AppConfig::default()).unwrap();
    let logging: toml::Value = toml::from_str(&rendered).unwrap();
    let mut keys: Vec<&str> = logging["logging"]
        .as_table()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    keys.sort_unstable();
    assert_eq!(keys, ["format", "level"]);
}
