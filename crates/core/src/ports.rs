//! Port interfaces the pipeline depends on
//!
//! Infrastructure crates provide the real implementations (reqwest transport,
//! keychain/file token stores, HTTP refresher). Tests substitute in-memory
//! doubles.

use async_trait::async_trait;
use tollgate_domain::{ApiResponse, Credential, RequestDescriptor, Result, Severity};

/// Holder of the single live credential
///
/// Last write wins. Reads are synchronous so credential attachment never
/// yields between fingerprint registration and dispatch.
pub trait TokenStore: Send + Sync {
    /// Current credential, if any
    fn get(&self) -> Option<Credential>;

    /// Replace the current credential
    fn set(&self, credential: Credential) -> Result<()>;

    /// Remove the current credential
    fn clear(&self) -> Result<()>;
}

/// Sends one prepared request over the network
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` exactly once.
    ///
    /// Any HTTP status, including 4xx/5xx, is returned as `Ok`. `Err` is
    /// reserved for exchanges that produced no response (connection refused,
    /// DNS failure, reset); the pipeline applies timeouts and cancellation
    /// around this call.
    async fn send(&self, request: &RequestDescriptor) -> Result<ApiResponse>;
}

/// Outcome of a silent credential refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new credential was issued
    Refreshed(Credential),
    /// Silent refresh is not possible (e.g. nothing to refresh from)
    Unavailable,
}

/// Obtains a new credential without user interaction
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    /// Exchange `current` for a fresh credential.
    async fn refresh(&self, current: Option<Credential>) -> Result<RefreshOutcome>;
}

/// Interactive re-authentication supplied by the UI layer
#[async_trait]
pub trait LoginPrompt: Send + Sync {
    /// Ask the user to log in; rejects if the user cancels.
    async fn prompt_login(&self) -> Result<Credential>;
}

/// Fire-and-forget user notification sink (toasts, banners)
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// Notifier that drops every message
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str, _severity: Severity) {}
}
