//! Pipeline configuration
//!
//! Every field has a default so partial JSON/TOML files and environment
//! overrides can be layered on top of [`PipelineConfig::default`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ALLOW_DUPLICATE_PATTERNS, DEFAULT_BASE_URL, DEFAULT_BYPASS_PATHS,
    DEFAULT_EVENTS_CAPACITY, DEFAULT_LOGIN_PATH, DEFAULT_LOGOUT_PATH, DEFAULT_NO_RETRY_PATHS,
    DEFAULT_REFRESH_PATH, DEFAULT_REFRESH_TIMEOUT_SECS, DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_TIMEOUT_SECS,
    DEFAULT_TOKEN_FIELD,
};
use crate::errors::{RequestError, Result};

/// Top-level configuration for the request pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base URL that relative request URLs are resolved against
    pub base_url: String,
    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,
    /// Buffer size of the lifecycle event channel
    pub events_capacity: usize,
    pub retry: RetryConfig,
    pub auth: AuthConfig,
    pub dedup: DedupConfig,
}

/// Retry budget and backoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Endpoints whose failures are user-visible actions, never retried
    pub no_retry_paths: Vec<String>,
}

/// Credential attachment and re-authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Endpoints that never carry a credential and never enter re-auth
    pub bypass_paths: Vec<String>,
    pub login_path: String,
    pub logout_path: String,
    pub refresh_path: String,
    pub refresh_timeout_secs: u64,
    /// JSON field holding the bearer token in login/refresh responses
    pub token_field: String,
}

/// In-flight deduplication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// URL substrings whose requests may run concurrently
    pub allow_duplicate_patterns: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            events_capacity: DEFAULT_EVENTS_CAPACITY,
            retry: RetryConfig::default(),
            auth: AuthConfig::default(),
            dedup: DedupConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            no_retry_paths: owned(DEFAULT_NO_RETRY_PATHS),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bypass_paths: owned(DEFAULT_BYPASS_PATHS),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            logout_path: DEFAULT_LOGOUT_PATH.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            token_field: DEFAULT_TOKEN_FIELD.to_string(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { allow_duplicate_patterns: owned(DEFAULT_ALLOW_DUPLICATE_PATTERNS) }
    }
}

impl PipelineConfig {
    /// Config pointed at `base_url` with every other field defaulted.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check invariants that serde defaults cannot express.
    ///
    /// # Errors
    /// Returns `RequestError::Config` describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(RequestError::Config("base_url must not be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(RequestError::Config("timeout_secs must be greater than zero".into()));
        }
        if self.auth.refresh_timeout_secs == 0 {
            return Err(RequestError::Config(
                "auth.refresh_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.events_capacity == 0 {
            return Err(RequestError::Config("events_capacity must be greater than zero".into()));
        }
        self.retry.validate()
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// # Errors
    /// Returns `RequestError::Config` for a zero budget or inverted delays.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(RequestError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(RequestError::Config(format!(
                "retry.max_delay_ms ({}) is smaller than retry.base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(())
    }
}

impl AuthConfig {
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }
}
