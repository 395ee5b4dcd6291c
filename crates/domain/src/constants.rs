//! Domain constants
//!
//! Centralized defaults for the request pipeline. Configuration structs fall
//! back to these when a field is omitted.

// Transport
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const BEARER_PREFIX: &str = "Bearer ";

// Retry
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 2_000;
pub const DEFAULT_NO_RETRY_PATHS: &[&str] = &["/login", "/register"];

// Authentication
pub const DEFAULT_BYPASS_PATHS: &[&str] =
    &["/login", "/register", "/captcha", "/auth/verify", "/auth/refresh"];
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_LOGOUT_PATH: &str = "/logout";
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TOKEN_FIELD: &str = "token";

// Deduplication
pub const DEFAULT_ALLOW_DUPLICATE_PATTERNS: &[&str] = &["/upload-progress"];
pub const SUPERSEDED_REASON: &str = "superseded by newer request";

// Lifecycle events
pub const EVENT_AUTH_STATE_CHANGED: &str = "auth-state-changed";
pub const EVENT_LOGIN_SUCCESS: &str = "login-success";
pub const EVENT_LOGIN_REQUIRED: &str = "login-required";
pub const DEFAULT_EVENTS_CAPACITY: usize = 32;
