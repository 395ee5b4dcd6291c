//! Credential storage, silent refresh and session endpoints

pub mod refresher;
pub mod session;
pub mod token_store;

use serde_json::Value;
use tollgate_domain::{Credential, RequestError, Result};

pub use refresher::HttpTokenRefresher;
pub use session::SessionService;
pub use token_store::{FileTokenStore, KeychainTokenStore, MemoryTokenStore};

/// Pull the bearer token out of a login/refresh response.
///
/// `field` may be a dotted path (`data.token`) for wrapped payloads.
pub(crate) fn extract_token(body: &Value, field: &str) -> Result<Credential> {
    let token = field
        .split('.')
        .try_fold(body, |node, key| node.get(key))
        .and_then(Value::as_str)
        .ok_or_else(|| RequestError::Auth(format!("response has no '{field}' token")))?;

    token_store::ensure_header_safe(token)?;
    Ok(Credential::from_token(token))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_extracts_flat_and_nested_tokens() {
        assert_eq!(extract_token(&json!({ "token": "T1" }), "token").unwrap().value(), "T1");
        assert_eq!(
            extract_token(&json!({ "data": { "token": "T2" } }), "data.token").unwrap().value(),
            "T2"
        );
    }

    #[test]
    fn test_missing_or_non_string_token_is_an_auth_error() {
        assert!(matches!(extract_token(&json!({}), "token"), Err(RequestError::Auth(_))));
        assert!(matches!(extract_token(&json!({ "token": 42 }), "token"), Err(RequestError::Auth(_))));
    }
}
