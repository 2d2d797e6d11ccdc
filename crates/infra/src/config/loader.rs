//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required variable is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Whatever the source, the result is validated before it is returned.
//!
//! ## Environment Variables
//! - `MEMBERDESK_API_BASE_URL` (required): base URL of the remote API
//! - `MEMBERDESK_API_TIMEOUT_SECS`: per-request timeout
//! - `MEMBERDESK_IDLE_TIMEOUT_SECS`: inactivity before logout
//! - `MEMBERDESK_IDLE_WARNING_LEAD_SECS`: warning shown this long before logout
//! - `MEMBERDESK_IDLE_ENABLED`: whether the idle watchdog runs (true/false)
//! - `MEMBERDESK_ACTIVITY_DEBOUNCE_MS`: activity coalescing window
//! - `MEMBERDESK_RENEWAL_LEAD_SECS`: proactive renewal window
//! - `MEMBERDESK_RENEWAL_CHECK_INTERVAL_SECS`: proactive renewal check interval
//! - `MEMBERDESK_EXPIRY_WARNING_LEAD_SECS`: expiry prompt window
//! - `MEMBERDESK_EXPIRY_POLL_INTERVAL_SECS`: expiry prompt poll interval
//! - `MEMBERDESK_PERSISTENCE_BACKEND`: `file` or `keychain`
//! - `MEMBERDESK_SESSION_PATH`: session file path (file backend)
//! - `MEMBERDESK_LOG_FILTER`: default tracing filter
//! - `MEMBERDESK_LOG_JSON`: emit JSON logs (true/false)
//!
//! Unset optional variables keep their defaults.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./memberdesk.json` or `./memberdesk.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use memberdesk_domain::{
    ApiConfig, Config, LoggingConfig, MemberdeskError, PersistenceBackend, PersistenceConfig,
    Result, SessionConfig,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// variable is missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `MemberdeskError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Validation fails
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `MemberdeskError::Config` if `MEMBERDESK_API_BASE_URL` is
/// missing, a variable has an invalid value, or validation fails.
pub fn load_from_env() -> Result<Config> {
    let defaults = SessionConfig::default();
    let session = SessionConfig {
        idle_timeout_secs: env_parse("MEMBERDESK_IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs)?,
        idle_warning_lead_secs: env_parse(
            "MEMBERDESK_IDLE_WARNING_LEAD_SECS",
            defaults.idle_warning_lead_secs,
        )?,
        idle_enabled: env_bool("MEMBERDESK_IDLE_ENABLED", defaults.idle_enabled),
        activity_debounce_ms: env_parse(
            "MEMBERDESK_ACTIVITY_DEBOUNCE_MS",
            defaults.activity_debounce_ms,
        )?,
        renewal_lead_secs: env_parse("MEMBERDESK_RENEWAL_LEAD_SECS", defaults.renewal_lead_secs)?,
        renewal_check_interval_secs: env_parse(
            "MEMBERDESK_RENEWAL_CHECK_INTERVAL_SECS",
            defaults.renewal_check_interval_secs,
        )?,
        expiry_warning_lead_secs: env_parse(
            "MEMBERDESK_EXPIRY_WARNING_LEAD_SECS",
            defaults.expiry_warning_lead_secs,
        )?,
        expiry_poll_interval_secs: env_parse(
            "MEMBERDESK_EXPIRY_POLL_INTERVAL_SECS",
            defaults.expiry_poll_interval_secs,
        )?,
        retry_ledger_ttl_secs: defaults.retry_ledger_ttl_secs,
    };

    let api_defaults = ApiConfig::default();
    let api = ApiConfig {
        base_url: env_var("MEMBERDESK_API_BASE_URL")?,
        timeout_secs: env_parse("MEMBERDESK_API_TIMEOUT_SECS", api_defaults.timeout_secs)?,
    };

    let mut persistence = PersistenceConfig::default();
    if let Ok(backend) = std::env::var("MEMBERDESK_PERSISTENCE_BACKEND") {
        persistence.backend = parse_backend(&backend)?;
    }
    if let Ok(path) = std::env::var("MEMBERDESK_SESSION_PATH") {
        persistence.path = path;
    }

    let mut logging = LoggingConfig::default();
    if let Ok(filter) = std::env::var("MEMBERDESK_LOG_FILTER") {
        logging.filter = filter;
    }
    logging.json = env_bool("MEMBERDESK_LOG_JSON", logging.json);

    let config = Config { api, session, persistence, logging };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `MemberdeskError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Validation fails
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(MemberdeskError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            MemberdeskError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| MemberdeskError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| MemberdeskError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| MemberdeskError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(MemberdeskError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory (and up to two parents), then
/// the executable's directory.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("memberdesk.json"),
        dir.join("memberdesk.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

fn parse_backend(value: &str) -> Result<PersistenceBackend> {
    match value.to_ascii_lowercase().as_str() {
        "file" => Ok(PersistenceBackend::File),
        "keychain" => Ok(PersistenceBackend::Keychain),
        other => Err(MemberdeskError::Config(format!("Unknown persistence backend: {other}"))),
    }
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        MemberdeskError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional environment variable, `default` when unset
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| MemberdeskError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
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
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const SESSION_VARS: &[&str] = &[
        "MEMBERDESK_API_BASE_URL",
        "MEMBERDESK_API_TIMEOUT_SECS",
        "MEMBERDESK_IDLE_TIMEOUT_SECS",
        "MEMBERDESK_IDLE_WARNING_LEAD_SECS",
        "MEMBERDESK_IDLE_ENABLED",
        "MEMBERDESK_ACTIVITY_DEBOUNCE_MS",
        "MEMBERDESK_RENEWAL_LEAD_SECS",
        "MEMBERDESK_RENEWAL_CHECK_INTERVAL_SECS",
        "MEMBERDESK_EXPIRY_WARNING_LEAD_SECS",
        "MEMBERDESK_EXPIRY_POLL_INTERVAL_SECS",
        "MEMBERDESK_PERSISTENCE_BACKEND",
        "MEMBERDESK_SESSION_PATH",
        "MEMBERDESK_LOG_FILTER",
        "MEMBERDESK_LOG_JSON",
    ];

    fn clear_env() {
        for key in SESSION_VARS {
            std::env::remove_var(key);
        }
    }

    /// Write `contents` to a temp file with the given extension
    fn config_file(contents: &str, extension: &str) -> (NamedTempFile, PathBuf) {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).unwrap();
        (temp_file, path)
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for (key, value) in [("TEST_BOOL_TRUE_1", "1"), ("TEST_BOOL_TRUE_YES", "YES")] {
            std::env::set_var(key, value);
            assert!(env_bool(key, false));
            std::env::remove_var(key);
        }
        for (key, value) in [("TEST_BOOL_FALSE_0", "0"), ("TEST_BOOL_FALSE_OFF", "off")] {
            std::env::set_var(key, value);
            assert!(!env_bool(key, true));
            std::env::remove_var(key);
        }

        std::env::remove_var("TEST_BOOL_MISSING");
        assert!(env_bool("TEST_BOOL_MISSING", true));
        assert!(!env_bool("TEST_BOOL_MISSING", false));
    }

    #[test]
    fn test_load_from_env_with_overrides() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("MEMBERDESK_API_BASE_URL", "https://api.example.test");
        std::env::set_var("MEMBERDESK_IDLE_TIMEOUT_SECS", "900");
        std::env::set_var("MEMBERDESK_IDLE_WARNING_LEAD_SECS", "30");
        std::env::set_var("MEMBERDESK_IDLE_ENABLED", "false");
        std::env::set_var("MEMBERDESK_PERSISTENCE_BACKEND", "Keychain");
        std::env::set_var("MEMBERDESK_LOG_JSON", "true");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.api.base_url, "https://api.example.test");
        assert_eq!(config.session.idle_timeout_secs, 900);
        assert_eq!(config.session.idle_warning_lead_secs, 30);
        assert!(!config.session.idle_enabled);
        assert_eq!(config.session.renewal_lead_secs, 300);
        assert_eq!(config.persistence.backend, PersistenceBackend::Keychain);
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_env_missing_base_url() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, MemberdeskError::Config(_)), "Should be a Config error");
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("MEMBERDESK_API_BASE_URL", "https://api.example.test");
        std::env::set_var("MEMBERDESK_IDLE_TIMEOUT_SECS", "half-an-hour");

        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(MemberdeskError::Config(_))));
    }

    #[test]
    fn test_load_from_env_rejects_invalid_combination() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("MEMBERDESK_API_BASE_URL", "https://api.example.test");
        std::env::set_var("MEMBERDESK_IDLE_TIMEOUT_SECS", "60");
        std::env::set_var("MEMBERDESK_IDLE_WARNING_LEAD_SECS", "60");

        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(MemberdeskError::Config(_))));
    }

    #[test]
    fn test_load_from_file_json() {
        let json_content = r#"{
            "api": { "base_url": "https://api.example.test", "timeout_secs": 10 },
            "session": { "idle_timeout_secs": 600, "idle_warning_lead_secs": 45 },
            "persistence": { "backend": "file", "path": "/tmp/session.json" }
        }"#;
        let (_temp, path) = config_file(json_content, "json");

        let config = load_from_file(Some(path.clone())).expect("config from JSON file");
        std::fs::remove_file(path).ok();

        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.session.idle_timeout_secs, 600);
        assert_eq!(config.session.expiry_warning_lead_secs, 120);
        assert_eq!(config.persistence.path, "/tmp/session.json");
    }

    #[test]
    fn test_load_from_file_toml() {
        let toml_content = r#"
[api]
base_url = "https://api.example.test"

[session]
renewal_lead_secs = 240
idle_enabled = false

[logging]
filter = "memberdesk=debug"
"#;
        let (_temp, path) = config_file(toml_content, "toml");

        let config = load_from_file(Some(path.clone())).expect("config from TOML file");
        std::fs::remove_file(path).ok();

        assert_eq!(config.session.renewal_lead_secs, 240);
        assert!(!config.session.idle_enabled);
        assert_eq!(config.logging.filter, "memberdesk=debug");
        assert_eq!(config.api.timeout_secs, 30);
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/config.json")));
        assert!(matches!(result, Err(MemberdeskError::Config(_))));
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let (_temp, path) = config_file(r#"{ "this is": "not valid json" "#, "json");

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        assert!(result.is_err(), "Should fail with invalid JSON");
    }

    #[test]
    fn test_file_without_api_section_is_rejected() {
        let path = PathBuf::from("memberdesk.json");
        let result = parse_config(r#"{ "session": {} }"#, &path);
        assert!(result.is_err(), "api section is required");
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", &PathBuf::from("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
