//! Configuration loader
//!
//! Loads [`PipelineConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `TOLLGATE_BASE_URL` is absent, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `TOLLGATE_BASE_URL`: API base URL (required for env loading)
//! - `TOLLGATE_TIMEOUT_SECS`: Per-attempt timeout in seconds
//! - `TOLLGATE_RETRY_MAX_ATTEMPTS`: Total attempts per request
//! - `TOLLGATE_RETRY_BASE_DELAY_MS`: First backoff delay
//! - `TOLLGATE_RETRY_MAX_DELAY_MS`: Backoff ceiling
//! - `TOLLGATE_REFRESH_PATH`: Silent refresh endpoint
//! - `TOLLGATE_REFRESH_TIMEOUT_SECS`: Bound on one refresh attempt
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./tollgate.json` or `./tollgate.toml` (current working directory)
//! 2. `./config.json` or `./config.toml` (current working directory)
//! 3. `../` and `../../` variants of the above
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tollgate_domain::{PipelineConfig, RequestError, Result};

const FILE_NAMES: [&str; 4] = ["tollgate.json", "tollgate.toml", "config.json", "config.toml"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the base URL is not
/// set there, falls back to loading from a config file.
///
/// # Errors
/// Returns `RequestError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The resulting configuration fails validation
pub fn load() -> Result<PipelineConfig> {
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
/// `TOLLGATE_BASE_URL` is required; every other variable overrides the
/// corresponding default when present.
///
/// # Errors
/// Returns `RequestError::Config` if the base URL is missing, a value does
/// not parse, or the result fails validation.
pub fn load_from_env() -> Result<PipelineConfig> {
    let mut config = PipelineConfig::with_base_url(env_var("TOLLGATE_BASE_URL")?);

    if let Some(timeout) = env_parse::<u64>("TOLLGATE_TIMEOUT_SECS")? {
        config.timeout_secs = timeout;
    }
    if let Some(attempts) = env_parse::<u32>("TOLLGATE_RETRY_MAX_ATTEMPTS")? {
        config.retry.max_attempts = attempts;
    }
    if let Some(delay) = env_parse::<u64>("TOLLGATE_RETRY_BASE_DELAY_MS")? {
        config.retry.base_delay_ms = delay;
    }
    if let Some(delay) = env_parse::<u64>("TOLLGATE_RETRY_MAX_DELAY_MS")? {
        config.retry.max_delay_ms = delay;
    }
    if let Ok(path) = std::env::var("TOLLGATE_REFRESH_PATH") {
        config.auth.refresh_path = path;
    }
    if let Some(timeout) = env_parse::<u64>("TOLLGATE_REFRESH_TIMEOUT_SECS")? {
        config.auth.refresh_timeout_secs = timeout;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `RequestError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The parsed configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<PipelineConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(RequestError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            RequestError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| RequestError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content, format chosen by extension.
fn parse_config(contents: &str, path: &Path) -> Result<PipelineConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| RequestError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| RequestError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(RequestError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory, its two parents, and the same
/// three levels relative to the executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| [root.clone(), root.join(".."), root.join("../..")])
        .flat_map(|dir| FILE_NAMES.map(|name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `RequestError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        RequestError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional numeric environment variable.
///
/// # Errors
/// Returns `RequestError::Config` if the variable is set but does not parse.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| RequestError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 7] = [
        "TOLLGATE_BASE_URL",
        "TOLLGATE_TIMEOUT_SECS",
        "TOLLGATE_RETRY_MAX_ATTEMPTS",
        "TOLLGATE_RETRY_BASE_DELAY_MS",
        "TOLLGATE_RETRY_MAX_DELAY_MS",
        "TOLLGATE_REFRESH_PATH",
        "TOLLGATE_REFRESH_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("TOLLGATE_BASE_URL", "https://api.example.com/v1");
        std::env::set_var("TOLLGATE_TIMEOUT_SECS", "15");
        std::env::set_var("TOLLGATE_RETRY_MAX_ATTEMPTS", "5");
        std::env::set_var("TOLLGATE_RETRY_BASE_DELAY_MS", "50");
        std::env::set_var("TOLLGATE_RETRY_MAX_DELAY_MS", "800");
        std::env::set_var("TOLLGATE_REFRESH_PATH", "/session/renew");
        std::env::set_var("TOLLGATE_REFRESH_TIMEOUT_SECS", "4");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.base_url, "https://api.example.com/v1");
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 50);
        assert_eq!(config.retry.max_delay_ms, 800);
        assert_eq!(config.auth.refresh_path, "/session/renew");
        assert_eq!(config.auth.refresh_timeout_secs, 4);
    }

    #[test]
    fn test_load_from_env_missing_base_url() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, RequestError::Config(msg) if msg.contains("TOLLGATE_BASE_URL")));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("TOLLGATE_BASE_URL", "https://api.example.com");
        std::env::set_var("TOLLGATE_RETRY_MAX_ATTEMPTS", "lots");

        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(RequestError::Config(msg)) if msg.contains("MAX_ATTEMPTS")));
    }

    #[test]
    fn test_load_from_env_rejects_invalid_combination() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("TOLLGATE_BASE_URL", "https://api.example.com");
        std::env::set_var("TOLLGATE_RETRY_BASE_DELAY_MS", "5000");

        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(RequestError::Config(_))));
    }

    #[test]
    fn test_load_from_file_json() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        temp_file
            .write_all(
                br#"{
                    "base_url": "https://json.example.com",
                    "retry": { "max_attempts": 4 },
                    "dedup": { "allow_duplicate_patterns": ["/poll"] }
                }"#,
            )
            .unwrap();

        let config = load_from_file(Some(temp_file.path().to_path_buf())).unwrap();

        assert_eq!(config.base_url, "https://json.example.com");
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.dedup.allow_duplicate_patterns, vec!["/poll".to_string()]);
        assert_eq!(config.timeout_secs, PipelineConfig::default().timeout_secs);
    }

    #[test]
    fn test_load_from_file_toml() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        temp_file
            .write_all(
                br#"
base_url = "https://toml.example.com"
timeout_secs = 12

[auth]
refresh_path = "/token/refresh"
token_field = "access_token"
"#,
            )
            .unwrap();

        let config = load_from_file(Some(temp_file.path().to_path_buf())).unwrap();

        assert_eq!(config.base_url, "https://toml.example.com");
        assert_eq!(config.timeout_secs, 12);
        assert_eq!(config.auth.refresh_path, "/token/refresh");
        assert_eq!(config.auth.token_field, "access_token");
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/tollgate.json")));
        assert!(matches!(result, Err(RequestError::Config(msg)) if msg.contains("not found")));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("base_url: x", Path::new("tollgate.yaml"));
        assert!(matches!(result, Err(RequestError::Config(msg)) if msg.contains("Unsupported")));
    }

    #[test]
    fn test_parse_config_invalid_json() {
        let result = parse_config("{ invalid json }", Path::new("tollgate.json"));
        assert!(matches!(result, Err(RequestError::Config(msg)) if msg.contains("Invalid JSON")));
    }
}
