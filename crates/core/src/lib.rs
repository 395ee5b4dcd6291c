//! # Tollgate Core
//!
//! Request orchestration logic - no HTTP client, keychain or file system code.
//!
//! This crate contains:
//! - Port interfaces (transport, token store, refresher, login prompt, notifier)
//! - Request fingerprinting and in-flight deduplication
//! - Credential attachment and the single-flight re-authentication coordinator
//! - Retry classification and backoff
//! - The [`RequestPipeline`] façade composing all of the above
//!
//! ## Architecture Principles
//! - Only depends on `tollgate-domain`
//! - All I/O goes through the traits in [`ports`]
//! - Cancellation is cooperative and observed at every suspension point

pub mod auth;
pub mod cancel;
pub mod endpoint;
pub mod fingerprint;
pub mod pipeline;
pub mod ports;
pub mod reauth;
pub mod registry;
pub mod retry;

pub use auth::AuthInterceptor;
pub use cancel::CancelHandle;
pub use fingerprint::{Fingerprint, RequestFingerprinter};
pub use pipeline::{RequestPipeline, RequestPipelineBuilder};
pub use ports::{
    CredentialRefresher, LoginPrompt, Notifier, NullNotifier, RefreshOutcome, TokenStore,
    Transport,
};
pub use reauth::{ReauthCoordinator, ReauthState};
pub use registry::{InFlightRegistry, Ticket};
pub use retry::{RetryBudget, RetryPolicy};
