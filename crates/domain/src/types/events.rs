//! Lifecycle signals and notification severities

use serde::{Deserialize, Serialize};

use crate::constants::{EVENT_AUTH_STATE_CHANGED, EVENT_LOGIN_REQUIRED, EVENT_LOGIN_SUCCESS};
use crate::impl_wire_name_conversions;

/// Signals emitted to UI collaborators around authentication changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum AuthEvent {
    /// A credential was stored or cleared
    AuthStateChanged { authenticated: bool },
    /// Login or refresh produced a new credential
    LoginSuccess,
    /// Interactive login is needed before requests can succeed
    LoginRequired,
}

impl AuthEvent {
    /// Event name as seen by subscribers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthStateChanged { .. } => EVENT_AUTH_STATE_CHANGED,
            Self::LoginSuccess => EVENT_LOGIN_SUCCESS,
            Self::LoginRequired => EVENT_LOGIN_REQUIRED,
        }
    }
}

/// Notification severity passed to the notifier port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl_wire_name_conversions!(Severity {
    Info => "info",
    Warning => "warning",
    Error => "error",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(AuthEvent::AuthStateChanged { authenticated: true }.name(), "auth-state-changed");
        assert_eq!(AuthEvent::LoginSuccess.name(), "login-success");
        assert_eq!(AuthEvent::LoginRequired.name(), "login-required");
    }

    #[test]
    fn test_event_serialization_matches_name() {
        let json = serde_json::to_value(AuthEvent::LoginRequired).unwrap();
        assert_eq!(json["event"], AuthEvent::LoginRequired.name());
    }
}
