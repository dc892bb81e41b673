//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use oncovista_domain::{AuditSinkKind, CacheBackend, OncoVistaError};
use oncovista_infra::config;
use tempfile::TempDir;

#[test]
fn test_load_config_from_toml_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("oncovista.toml");
    std::fs::write(
        &path,
        r#"
        [remote]
        base_url = "https://recs.example.org"

        [breaker]
        failure_threshold = 3
        cooldown_secs = 120

        [retry]
        max_retries = 2
        delays_ms = [500, 1500]

        [cache]
        backend = "file"
        directory = "/var/cache/oncovista"

        [[cache.ttl_tiers]]
        min_confidence = 0.95
        ttl_secs = 7200
        "#,
    )
    .expect("Failed to write config");

    let config = config::load_from_file(&path).expect("Failed to load config from TOML file");

    assert_eq!(config.remote.base_url, "https://recs.example.org");
    assert_eq!(config.breaker.failure_threshold, 3);
    assert_eq!(config.breaker.cooldown_secs, 120);
    assert_eq!(config.retry.max_retries, 2);
    assert_eq!(config.retry.delays_ms, vec![500, 1500]);
    assert_eq!(config.retry.attempt_timeout_secs, 30);
    assert_eq!(config.cache.backend, CacheBackend::File);
    assert_eq!(config.cache.ttl_tiers.len(), 1);
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_config_from_json_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
            "audit": { "sink": "file", "file_path": "/tmp/oncovista-audit.jsonl", "ring_capacity": 50 },
            "reachability": { "probe_address": "10.0.0.5:443", "start_offline": true }
        }"#,
    )
    .expect("Failed to write config");

    let config = config::load_from_file(&path).expect("Failed to load config from JSON file");

    assert_eq!(config.audit.sink, AuditSinkKind::File);
    assert_eq!(config.audit.ring_capacity, 50);
    assert_eq!(config.audit.queue_capacity, 256);
    assert_eq!(config.reachability.probe_address.as_deref(), Some("10.0.0.5:443"));
    assert!(config.reachability.start_offline);
}

#[test]
fn test_missing_file_is_a_config_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let result = config::load_from_file(&dir.path().join("absent.toml"));

    assert!(matches!(result, Err(OncoVistaError::Config(msg)) if msg.contains("not found")));
}

#[test]
fn test_unsupported_extension_is_rejected() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "remote: {}").expect("Failed to write config");

    let result = config::load_from_file(&path);
    assert!(matches!(result, Err(OncoVistaError::Config(msg)) if msg.contains("yaml")));
}

#[test]
fn test_malformed_toml_reports_format() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("oncovista.toml");
    std::fs::write(&path, "[breaker\nfailure_threshold = ").expect("Failed to write config");

    let result = config::load_from_file(&path);
    assert!(matches!(result, Err(OncoVistaError::Config(msg)) if msg.contains("Invalid TOML")));
}
