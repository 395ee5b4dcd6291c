//! Error types for the request pipeline
//!
//! Every failure a caller can observe from `RequestPipeline::request` is one
//! of these variants. Cancellation is a dedicated variant so callers can
//! suppress it instead of treating it as a real failure.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::impl_wire_name_conversions;

/// Main error type for tollgate
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum RequestError {
    /// Request superseded by a newer duplicate or aborted by its caller
    #[error("Request cancelled: {reason}")]
    Cancelled { reason: String },

    /// No response received (DNS, connection refused, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the configured per-request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// 401 that the re-authentication flow could not resolve
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Any other non-2xx response
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String, body: Option<String> },

    /// Retry budget spent; wraps the last underlying failure
    #[error("Retry budget exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: Box<RequestError> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for tollgate operations
pub type Result<T> = std::result::Result<T, RequestError>;

/// Coarse classification used by retry and notification decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Superseded or aborted; never surfaced to the user
    Cancelled,
    /// No response (connection failure or timeout) - retryable
    Network,
    /// 401 / unresolved re-authentication
    Authentication,
    /// 5xx responses - retryable
    Server,
    /// 4xx responses other than 401 - terminal
    Client,
    /// Misconfiguration, storage or internal failures - terminal
    Config,
}

impl_wire_name_conversions!(ErrorCategory {
    Cancelled => "cancelled",
    Network => "network",
    Authentication => "authentication",
    Server => "server",
    Client => "client",
    Config => "config",
});

impl RequestError {
    /// Build a cancellation error with the given reason.
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled { reason: reason.into() }
    }

    /// Build an HTTP error for a non-2xx status, deriving the message from the
    /// status code.
    pub fn from_status(status: u16, body: Option<String>) -> Self {
        Self::Http { status, message: status_message(status).to_string(), body }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
            Self::Network(_) | Self::Timeout(_) => ErrorCategory::Network,
            Self::Auth(_) => ErrorCategory::Authentication,
            Self::Http { status, .. } => match *status {
                401 => ErrorCategory::Authentication,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Client,
            },
            Self::RetryExhausted { last, .. } => last.category(),
            Self::Config(_) | Self::Storage(_) | Self::Internal(_) => ErrorCategory::Config,
        }
    }

    /// True when the request was superseded or aborted.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// HTTP status carried by this error, looking through retry exhaustion.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::RetryExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Message suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::Cancelled { .. } => String::new(),
            Self::Network(_) | Self::Timeout(_) => {
                "Network unavailable, please check your connection".to_string()
            }
            Self::Auth(_) => status_message(401).to_string(),
            Self::Http { message, .. } => message.clone(),
            Self::RetryExhausted { last, .. } => last.user_message(),
            Self::Config(_) | Self::Storage(_) | Self::Internal(_) => {
                "Something went wrong, please try again".to_string()
            }
        }
    }
}

/// Status-derived notification text.
pub fn status_message(status: u16) -> &'static str {
    match status {
        400 => "The request was invalid",
        401 => "Your session has expired, please log in again",
        403 => "Permission denied",
        404 => "The requested resource was not found",
        408 => "The request timed out",
        409 => "The resource was modified by someone else",
        422 => "Validation failed",
        429 => "Too many requests, please slow down",
        500..=599 => "The server is having trouble, please try again shortly",
        _ => "Request failed",
    }
}
