//! Engine configuration.
//!
//! Every section deserializes with defaults for missing fields, so a config
//! file only needs to name what it changes. Durations are plain integers with
//! the unit in the field name.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CACHE_CONFIDENCE_DISCOUNT, DEFAULT_PERFORMANCE_STATUS, FALLBACK_CONFIDENCE, OFFLINE_CONFIDENCE,
    UNDERSPECIFIED_CONFIDENCE,
};
use crate::errors::{OncoVistaError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub breaker: BreakerConfig,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    pub scoring: ScoringConfig,
    pub audit: AuditConfig,
    pub reachability: ReachabilityConfig,
}

impl Config {
    /// Reject values that would break engine invariants.
    pub fn validate(&self) -> Result<()> {
        if self.remote.base_url.trim().is_empty() {
            return Err(invalid("remote.base_url must not be empty"));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(invalid("breaker.failure_threshold must be greater than 0"));
        }
        if self.retry.attempt_timeout_secs == 0 {
            return Err(invalid("retry.attempt_timeout_secs must be greater than 0"));
        }
        if self.retry.max_retries > 0 && self.retry.delays_ms.is_empty() {
            return Err(invalid("retry.delays_ms must not be empty when retries are enabled"));
        }
        for (name, value) in [
            ("scoring.cache_discount", self.scoring.cache_discount),
            ("scoring.fallback_confidence", self.scoring.fallback_confidence),
            ("scoring.underspecified_confidence", self.scoring.underspecified_confidence),
            ("scoring.offline_confidence", self.scoring.offline_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(&format!("{name} must lie in [0, 1], got {value}")));
            }
        }
        for tier in &self.cache.ttl_tiers {
            if !(0.0..=1.0).contains(&tier.min_confidence) || tier.ttl_secs == 0 {
                return Err(invalid("cache.ttl_tiers need a confidence in [0, 1] and a non-zero TTL"));
            }
        }
        if self.cache.floor_ttl_secs == 0 || self.cache.last_known_good_ttl_secs == 0 {
            return Err(invalid("cache TTLs must be greater than 0"));
        }
        let ceiling = self.cache.last_known_good_ttl_secs;
        if self.cache.floor_ttl_secs > ceiling || self.cache.ttl_tiers.iter().any(|tier| tier.ttl_secs > ceiling) {
            return Err(invalid("cache TTLs must not exceed cache.last_known_good_ttl_secs"));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(invalid("cache.sweep_interval_secs must be greater than 0"));
        }
        if self.reachability.probe_interval_secs == 0 || self.reachability.probe_timeout_ms == 0 {
            return Err(invalid("reachability probe interval and timeout must be greater than 0"));
        }
        if self.cache.backend == CacheBackend::File && self.cache.directory.is_none() {
            return Err(invalid("cache.directory is required for the file backend"));
        }
        if self.audit.ring_capacity == 0 || self.audit.queue_capacity == 0 {
            return Err(invalid("audit capacities must be greater than 0"));
        }
        match self.audit.sink {
            AuditSinkKind::Http if self.audit.url.is_none() => {
                Err(invalid("audit.url is required for the http sink"))
            }
            AuditSinkKind::File if self.audit.file_path.is_none() => {
                Err(invalid("audit.file_path is required for the file sink"))
            }
            _ => Ok(()),
        }
    }
}

fn invalid(message: &str) -> OncoVistaError {
    OncoVistaError::Config(message.to_string())
}

/// Remote recommendation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub default_performance_status: u8,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            default_performance_status: DEFAULT_PERFORMANCE_STATUS,
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, cooldown_secs: 60 }
    }
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Retry schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub delays_ms: Vec<u64>,
    pub attempt_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_retries: 3, delays_ms: vec![1_000, 2_000, 4_000], attempt_timeout_secs: 30 }
    }
}

impl RetrySettings {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays_ms.iter().copied().map(Duration::from_millis).collect()
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

/// Where cache entries are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    File,
}

/// Minimum confidence and the lifetime it earns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtlTier {
    pub min_confidence: f64,
    pub ttl_secs: u64,
}

/// Response cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub directory: Option<PathBuf>,
    pub namespace: String,
    pub ttl_tiers: Vec<TtlTier>,
    pub floor_ttl_secs: u64,
    pub last_known_good_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            directory: None,
            namespace: "recommendations".to_string(),
            ttl_tiers: vec![
                TtlTier { min_confidence: 0.9, ttl_secs: 4 * 3600 },
                TtlTier { min_confidence: 0.8, ttl_secs: 2 * 3600 },
                TtlTier { min_confidence: 0.7, ttl_secs: 3600 },
            ],
            floor_ttl_secs: 30 * 60,
            last_known_good_ttl_secs: 24 * 3600,
            sweep_interval_secs: 5 * 60,
        }
    }
}

impl CacheSettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Confidence heuristics applied by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub cache_discount: f64,
    pub fallback_confidence: f64,
    pub underspecified_confidence: f64,
    pub offline_confidence: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            cache_discount: CACHE_CONFIDENCE_DISCOUNT,
            fallback_confidence: FALLBACK_CONFIDENCE,
            underspecified_confidence: UNDERSPECIFIED_CONFIDENCE,
            offline_confidence: OFFLINE_CONFIDENCE,
        }
    }
}

/// Durable audit destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSinkKind {
    /// Keep records only in the local ring.
    #[default]
    None,
    Http,
    File,
}

/// Audit dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub sink: AuditSinkKind,
    pub url: Option<String>,
    pub file_path: Option<PathBuf>,
    /// Records kept locally for inspection.
    pub ring_capacity: usize,
    /// Records waiting for the sink before the oldest is dropped.
    pub queue_capacity: usize,
    pub send_timeout_secs: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sink: AuditSinkKind::None,
            url: None,
            file_path: None,
            ring_capacity: 100,
            queue_capacity: 256,
            send_timeout_secs: 5,
        }
    }
}

impl AuditConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

/// Network reachability monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachabilityConfig {
    /// `host:port` to probe; derived from `remote.base_url` when unset.
    pub probe_address: Option<String>,
    pub probe_interval_secs: u64,
    pub probe_timeout_ms: u64,
    /// Begin in the manual offline override.
    pub start_offline: bool,
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self { probe_address: None, probe_interval_secs: 30, probe_timeout_ms: 2_000, start_offline: false }
    }
}

impl ReachabilityConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates that defaults carry the documented constants.
    ///
    /// Assertions:
    /// - Confirms threshold 5, cooldown 60s, delays [1s, 2s, 4s], 30s timeout.
    /// - Confirms the 0.8 discount and 0.3 / 0.1 fallback confidences.
    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.cooldown(), Duration::from_secs(60));
        assert_eq!(
            config.retry.delays(),
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );
        assert_eq!(config.retry.attempt_timeout(), Duration::from_secs(30));
        assert!((config.scoring.cache_discount - 0.8).abs() < f64::EPSILON);
        assert!((config.scoring.fallback_confidence - 0.3).abs() < f64::EPSILON);
        assert!((config.scoring.underspecified_confidence - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.cache.sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.audit.ring_capacity, 100);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [breaker]
            cooldown_secs = 10

            [audit]
            sink = "http"
            url = "http://audit.local/api/audit/log"
            "#,
        )
        .unwrap();
        assert_eq!(config.breaker.cooldown_secs, 10);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.audit.sink, AuditSinkKind::Http);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let mut config = Config::default();
        config.scoring.cache_discount = 1.5;
        assert!(matches!(config.validate(), Err(OncoVistaError::Config(msg)) if msg.contains("cache_discount")));
    }

    #[test]
    fn rejects_tier_above_last_known_good_ceiling() {
        let mut config = Config::default();
        config.cache.ttl_tiers[0].ttl_secs = 48 * 3600;
        assert!(matches!(config.validate(), Err(OncoVistaError::Config(msg)) if msg.contains("last_known_good")));

        config.cache.last_known_good_ttl_secs = 48 * 3600;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_sink_without_destination() {
        let mut config = Config::default();
        config.audit.sink = AuditSinkKind::File;
        assert!(config.validate().is_err());
        config.audit.file_path = Some(PathBuf::from("/tmp/audit.jsonl"));
        assert!(config.validate().is_ok());
    }
}
