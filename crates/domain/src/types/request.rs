//! Request descriptors and response payloads

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::AUTHORIZATION_HEADER;
use crate::errors::{RequestError, Result};
use crate::impl_wire_name_conversions;

/// HTTP method of an outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl_wire_name_conversions!(HttpMethod {
    Get => "GET",
    Post => "POST",
    Put => "PUT",
    Patch => "PATCH",
    Delete => "DELETE",
    Head => "HEAD",
});

/// Per-request behaviour flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// Bypass the in-flight registry; concurrent identical requests all run.
    pub allow_duplicate: bool,
    /// A 401 propagates straight to the caller instead of triggering re-auth.
    pub skip_auth_retry: bool,
    /// Overrides the pipeline-wide timeout for each attempt.
    pub timeout: Option<Duration>,
    /// Overrides the pipeline-wide attempt budget.
    pub retry_budget: Option<u32>,
}

/// Everything needed to (re)send one logical request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    /// Absolute URL or path relative to the configured base URL
    pub url: String,
    /// Query parameters, serialized as a JSON object
    pub params: Option<Value>,
    /// JSON body
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub options: RequestOptions,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: None,
            body: None,
            headers: BTreeMap::new(),
            options: RequestOptions::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, url).with_body(body)
    }

    pub fn put(url: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Put, url).with_body(body)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn allow_duplicate(mut self) -> Self {
        self.options.allow_duplicate = true;
        self
    }

    pub fn skip_auth_retry(mut self) -> Self {
        self.options.skip_auth_retry = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn retry_budget(mut self, attempts: u32) -> Self {
        self.options.retry_budget = Some(attempts);
        self
    }

    /// Current `Authorization` header, matched case-insensitively.
    pub fn authorization(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(AUTHORIZATION_HEADER))
            .map(|(_, value)| value.as_str())
    }

    /// Replace any `Authorization` header, whatever its casing.
    pub fn set_authorization(&mut self, value: String) {
        self.headers.retain(|name, _| !name.eq_ignore_ascii_case(AUTHORIZATION_HEADER));
        self.headers.insert(AUTHORIZATION_HEADER.to_string(), value);
    }
}

/// Response returned to the caller after a successful exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON payload; non-JSON bodies arrive as a JSON string and empty
    /// bodies as `null`.
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, headers: BTreeMap::new(), body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the payload into a caller type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).map_err(|e| {
            RequestError::Internal(format!("Failed to parse response payload: {e}"))
        })
    }

    /// Body as text for error reporting.
    pub fn body_text(&self) -> Option<String> {
        match &self.body {
            Value::Null => None,
            Value::String(text) if text.is_empty() => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}
