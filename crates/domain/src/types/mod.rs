//! Domain types and models

pub mod credential;
pub mod events;
pub mod request;

pub use credential::Credential;
pub use events::{AuthEvent, Severity};
pub use request::{ApiResponse, HttpMethod, RequestDescriptor, RequestOptions};
