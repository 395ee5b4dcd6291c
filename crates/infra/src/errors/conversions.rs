//! Conversions from external infrastructure errors into domain errors.

use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use serde_json::Error as JsonError;
use std::io::Error as IoError;
use tollgate_domain::RequestError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub RequestError);

impl From<InfraError> for RequestError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<RequestError> for InfraError {
    fn from(value: RequestError) -> Self {
        InfraError(value)
    }
}

/// Map any supported infrastructure error straight to [`RequestError`].
pub fn into_request_error(err: impl Into<InfraError>) -> RequestError {
    err.into().0
}

trait IntoRequestError {
    fn into_request_error(self) -> RequestError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → RequestError */
/* -------------------------------------------------------------------------- */

impl IntoRequestError for HttpError {
    fn into_request_error(self) -> RequestError {
        if self.is_builder() {
            return RequestError::Config(format!("invalid HTTP request: {self}"));
        }

        if self.is_timeout() {
            return RequestError::Network("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return RequestError::Network(format!("HTTP connection failure: {self}"));
        }

        if let Some(status) = self.status() {
            return RequestError::from_status(status.as_u16(), None);
        }

        if self.is_decode() {
            return RequestError::Internal(format!("failed to decode HTTP response: {self}"));
        }

        RequestError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_request_error())
    }
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → RequestError */
/* -------------------------------------------------------------------------- */

impl IntoRequestError for KeyringError {
    fn into_request_error(self) -> RequestError {
        use KeyringError::*;

        let description = self.to_string();

        match self {
            NoEntry => RequestError::Storage("keychain entry not found".into()),
            BadEncoding(_) => {
                RequestError::Storage("credential in keychain is not valid UTF-8".into())
            }
            TooLong(name, limit) => RequestError::Storage(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            Invalid(attr, reason) => {
                RequestError::Storage(format!("keychain attribute '{attr}' is invalid: {reason}"))
            }
            PlatformFailure(err) => RequestError::Storage(format!("keychain platform error: {err}")),
            NoStorageAccess(err) => {
                RequestError::Storage(format!("unable to access secure storage: {err}"))
            }
            _ => RequestError::Storage(description),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_request_error())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error / serde_json::Error → RequestError */
/* -------------------------------------------------------------------------- */

impl IntoRequestError for IoError {
    fn into_request_error(self) -> RequestError {
        RequestError::Storage(format!("{}: {self}", self.kind()))
    }
}

impl From<IoError> for InfraError {
    fn from(value: IoError) -> Self {
        InfraError(value.into_request_error())
    }
}

impl IntoRequestError for JsonError {
    fn into_request_error(self) -> RequestError {
        if self.is_io() {
            return RequestError::Storage(format!("failed to read JSON: {self}"));
        }
        RequestError::Internal(format!("invalid JSON at line {}: {self}", self.line()))
    }
}

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        InfraError(value.into_request_error())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
