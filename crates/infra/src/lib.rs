//! # Tollgate Infrastructure
//!
//! Infrastructure implementations of the `tollgate-core` ports.
//!
//! This crate contains:
//! - The reqwest HTTP transport
//! - Token stores (memory, file, platform keychain)
//! - HTTP credential refresh and the login/logout session service
//! - Configuration loading from environment and files
//! - Tracing setup and a tracing-backed notifier
//!
//! ## Architecture
//! - Implements traits defined in `tollgate-core`
//! - Contains all "impure" code (network, file system, keychain)

pub mod assembly;
pub mod auth;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use assembly::http_pipeline;
pub use auth::{
    FileTokenStore, HttpTokenRefresher, KeychainTokenStore, MemoryTokenStore, SessionService,
};
pub use errors::InfraError;
pub use http::{ReqwestTransport, ReqwestTransportBuilder};
pub use observability::{init_tracing, TracingNotifier};
