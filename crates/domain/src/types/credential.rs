//! Bearer credential held by the token store

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::BEARER_PREFIX;

/// Opaque bearer credential with optional expiry metadata
///
/// The raw value is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Wrap a raw token without inspecting it.
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into(), expires_at: None }
    }

    /// Wrap a raw token, decoding a JWT `exp` claim when the token has one.
    pub fn from_token(value: impl Into<String>) -> Self {
        let value = value.into();
        let expires_at = decode_jwt_expiry(&value);
        Self { value, expires_at }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// `Authorization` header value for this credential.
    pub fn bearer(&self) -> String {
        format!("{BEARER_PREFIX}{}", self.value)
    }

    /// True when expiry metadata exists and `now + skew` is past it.
    pub fn is_expired(&self, skew: chrono::Duration) -> bool {
        self.expires_at.is_some_and(|exp| Utc::now() + skew >= exp)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn decode_jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    DateTime::from_timestamp(exp, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u1","exp":{exp}}}"#));
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn test_opaque_token_has_no_expiry() {
        let credential = Credential::from_token("opaque-token");
        assert_eq!(credential.expires_at(), None);
        assert!(!credential.is_expired(chrono::Duration::zero()));
    }

    #[test]
    fn test_jwt_expiry_is_decoded() {
        let credential = Credential::from_token(jwt_with_exp(1_700_000_000));
        let expected = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(credential.expires_at(), Some(expected));
        assert!(credential.is_expired(chrono::Duration::zero()));
    }

    #[test]
    fn test_future_jwt_is_not_expired() {
        let exp = (Utc::now() + chrono::Duration::hours(1)).timestamp();
        let credential = Credential::from_token(jwt_with_exp(exp));
        assert!(!credential.is_expired(chrono::Duration::minutes(5)));
        assert!(credential.is_expired(chrono::Duration::hours(2)));
    }

    #[test]
    fn test_bearer_header_value() {
        assert_eq!(Credential::new("T1").bearer(), "Bearer T1");
    }

    #[test]
    fn test_debug_redacts_value() {
        let rendered = format!("{:?}", Credential::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
