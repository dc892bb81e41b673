//! Configuration loader
//!
//! Loads engine configuration from a file and environment overrides.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file if one exists (never overriding the process env)
//! 2. Probes multiple paths for a config file (JSON or TOML, by extension)
//! 3. Falls back to [`Config::default`] when no file exists
//! 4. Applies `ONCOVISTA_*` environment overrides
//! 5. Validates the result
//!
//! ## Environment Variables
//! - `ONCOVISTA_CONFIG`: explicit config file path
//! - `ONCOVISTA_REMOTE_BASE_URL`: remote service base URL
//! - `ONCOVISTA_AUDIT_URL`: audit webhook URL (selects the http sink)
//! - `ONCOVISTA_AUDIT_FILE`: audit log path (selects the file sink)
//! - `ONCOVISTA_CACHE_DIR`: cache directory (selects the file backend)
//! - `ONCOVISTA_ATTEMPT_TIMEOUT_SECS`: per-attempt timeout in seconds
//! - `ONCOVISTA_MAX_RETRIES`: retries after the first attempt
//! - `ONCOVISTA_OFFLINE`: start in forced offline mode (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./oncovista.{json,toml}` then `./config.{json,toml}`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};

use oncovista_domain::{AuditSinkKind, CacheBackend, Config, OncoVistaError, Result};

use crate::errors::InfraError;

const FILE_STEMS: [&str; 2] = ["oncovista", "config"];
const EXTENSIONS: [&str; 2] = ["json", "toml"];

/// Load configuration with the full strategy described in the module docs.
///
/// # Errors
/// Returns `OncoVistaError::Config` if a file exists but cannot be parsed, an
/// override has an invalid value, or the result fails validation.
pub fn load() -> Result<Config> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "Ignoring unreadable .env file"),
    }

    let explicit = std::env::var_os("ONCOVISTA_CONFIG").map(PathBuf::from);
    let mut config = match explicit.or_else(probe_config_paths) {
        Some(path) => load_from_file(&path)?,
        None => {
            tracing::info!("No config file found, using defaults");
            Config::default()
        }
    };

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file, without overrides or validation.
///
/// # Errors
/// Returns `OncoVistaError::Config` if the file is missing, unreadable, has an
/// unsupported extension, or fails to parse.
pub fn load_from_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(OncoVistaError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| OncoVistaError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| InfraError::from(e).into()),
        "json" => serde_json::from_str(contents)
            .map_err(|e| OncoVistaError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(OncoVistaError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| {
            FILE_STEMS
                .iter()
                .flat_map(move |stem| EXTENSIONS.iter().map(move |ext| root.join(format!("{stem}.{ext}"))))
        })
        .find(|path| path.exists())
}

/// Apply `ONCOVISTA_*` overrides on top of `config`.
///
/// # Errors
/// Returns `OncoVistaError::Config` for unparsable numeric values.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(url) = env_string("ONCOVISTA_REMOTE_BASE_URL") {
        config.remote.base_url = url;
    }
    if let Some(url) = env_string("ONCOVISTA_AUDIT_URL") {
        config.audit.url = Some(url);
        config.audit.sink = AuditSinkKind::Http;
    }
    if let Some(path) = env_string("ONCOVISTA_AUDIT_FILE") {
        config.audit.file_path = Some(PathBuf::from(path));
        config.audit.sink = AuditSinkKind::File;
    }
    if let Some(dir) = env_string("ONCOVISTA_CACHE_DIR") {
        config.cache.directory = Some(PathBuf::from(dir));
        config.cache.backend = CacheBackend::File;
    }
    if let Some(secs) = env_parse::<u64>("ONCOVISTA_ATTEMPT_TIMEOUT_SECS")? {
        config.retry.attempt_timeout_secs = secs;
    }
    if let Some(retries) = env_parse::<u32>("ONCOVISTA_MAX_RETRIES")? {
        config.retry.max_retries = retries;
    }
    config.reachability.start_offline =
        env_bool("ONCOVISTA_OFFLINE", config.reachability.start_offline);
    Ok(())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_string(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| OncoVistaError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const OVERRIDE_KEYS: [&str; 8] = [
        "ONCOVISTA_REMOTE_BASE_URL",
        "ONCOVISTA_AUDIT_URL",
        "ONCOVISTA_AUDIT_FILE",
        "ONCOVISTA_CACHE_DIR",
        "ONCOVISTA_ATTEMPT_TIMEOUT_SECS",
        "ONCOVISTA_MAX_RETRIES",
        "ONCOVISTA_OFFLINE",
        "ONCOVISTA_CONFIG",
    ];

    fn clear_overrides() {
        for key in OVERRIDE_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for value in ["1", "true", "yes", "on", "TRUE"] {
            std::env::set_var("ONCOVISTA_TEST_BOOL", value);
            assert!(env_bool("ONCOVISTA_TEST_BOOL", false), "{value} should be true");
        }
        for value in ["0", "false", "no", "off"] {
            std::env::set_var("ONCOVISTA_TEST_BOOL", value);
            assert!(!env_bool("ONCOVISTA_TEST_BOOL", true), "{value} should be false");
        }

        std::env::remove_var("ONCOVISTA_TEST_BOOL");
        assert!(env_bool("ONCOVISTA_TEST_BOOL", true));
        assert!(!env_bool("ONCOVISTA_TEST_BOOL", false));
    }

    #[test]
    fn test_env_overrides_applied() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_overrides();

        std::env::set_var("ONCOVISTA_REMOTE_BASE_URL", "http://recs.internal:9000");
        std::env::set_var("ONCOVISTA_CACHE_DIR", "/var/cache/oncovista");
        std::env::set_var("ONCOVISTA_ATTEMPT_TIMEOUT_SECS", "10");
        std::env::set_var("ONCOVISTA_OFFLINE", "yes");

        let mut config = Config::default();
        apply_env_overrides(&mut config).unwrap();

        assert_eq!(config.remote.base_url, "http://recs.internal:9000");
        assert_eq!(config.cache.backend, CacheBackend::File);
        assert_eq!(config.cache.directory, Some(PathBuf::from("/var/cache/oncovista")));
        assert_eq!(config.retry.attempt_timeout_secs, 10);
        assert!(config.reachability.start_offline);
        assert_eq!(config.audit.sink, AuditSinkKind::None);

        clear_overrides();
    }

    #[test]
    fn test_env_override_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_overrides();

        std::env::set_var("ONCOVISTA_MAX_RETRIES", "three");
        let result = apply_env_overrides(&mut Config::default());
        assert!(matches!(result, Err(OncoVistaError::Config(msg)) if msg.contains("ONCOVISTA_MAX_RETRIES")));

        clear_overrides();
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_content = r#"
[breaker]
failure_threshold = 3

[retry]
delays_ms = [500, 1000]
max_retries = 2
"#;

        let config = parse_config(toml_content, Path::new("oncovista.toml")).unwrap();
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.cooldown_secs, 60);
        assert_eq!(config.retry.delays_ms, vec![500, 1000]);
    }

    #[test]
    fn test_parse_config_json() {
        let json_content = r#"{ "audit": { "sink": "file", "file_path": "audit.jsonl" } }"#;
        let config = parse_config(json_content, Path::new("config.json")).unwrap();
        assert_eq!(config.audit.sink, AuditSinkKind::File);
        assert_eq!(config.audit.file_path, Some(PathBuf::from("audit.jsonl")));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", Path::new("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Path::new("/nonexistent/oncovista.json"));
        assert!(matches!(result, Err(OncoVistaError::Config(_))), "Should be a Config error");
    }
}
