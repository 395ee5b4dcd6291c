//! # Tollgate Domain
//!
//! Request, response and credential types shared by every tollgate crate.
//!
//! This crate contains:
//! - Request descriptors, per-request options and response payloads
//! - The request error taxonomy and Result alias
//! - Pipeline configuration structures
//! - Domain constants (allow-lists, header names, event names)
//!
//! ## Architecture
//! - No dependencies on other tollgate crates
//! - No I/O, no async runtime
//! - Pure data and classification helpers

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
