use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use serde_json::Value;
use tollgate_core::Transport;
use tollgate_domain::{ApiResponse, HttpMethod, RequestDescriptor, RequestError, Result};
use tracing::debug;

use crate::errors::InfraError;

/// [`Transport`] that performs exactly one HTTP exchange per call.
///
/// Retries, timeouts and cancellation belong to the pipeline; this type only
/// turns a [`RequestDescriptor`] into a reqwest request and the reply into an
/// [`ApiResponse`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Wrap an already configured reqwest client.
    pub fn from_client(client: ReqwestClient) -> Self {
        Self { client }
    }

    fn prepare(&self, request: &RequestDescriptor) -> Result<RequestBuilder> {
        let mut builder = self.client.request(to_method(request.method), &request.url);

        if let Some(params) = &request.params {
            builder = builder.query(&query_pairs(params)?);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        Ok(builder)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<ApiResponse> {
        let builder = self.prepare(request)?;
        debug!(method = %request.method, url = %request.url, "sending HTTP request");

        let response = builder.send().await.map_err(|err| {
            debug!(method = %request.method, url = %request.url, error = %err, "HTTP request failed");
            RequestError::from(InfraError::from(err))
        })?;

        debug!(
            method = %request.method,
            url = %request.url,
            status = response.status().as_u16(),
            "received HTTP response"
        );
        into_api_response(response).await
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
    }
}

/// Flatten a params object into query pairs. Arrays repeat the key; nested
/// objects are sent as JSON text.
fn query_pairs(params: &Value) -> Result<Vec<(String, String)>> {
    let Value::Object(map) = params else {
        return Err(RequestError::Config("request params must be a JSON object".into()));
    };

    let mut pairs = Vec::with_capacity(map.len());
    for (name, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                pairs.extend(items.iter().map(|item| (name.clone(), scalar_text(item))));
            }
            other => pairs.push((name.clone(), scalar_text(other))),
        }
    }
    Ok(pairs)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

async fn into_api_response(response: Response) -> Result<ApiResponse> {
    let status = response.status().as_u16();
    let headers: BTreeMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();

    let bytes = response.bytes().await.map_err(|err| {
        RequestError::Network(format!("failed to read response body: {err}"))
    })?;

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    Ok(ApiResponse { status, headers, body })
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug, Default)]
pub struct ReqwestTransportBuilder {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
}

impl ReqwestTransportBuilder {
    /// Client-level ceiling per exchange. The pipeline applies its own
    /// per-attempt timeout, so this is normally left unset.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Add one default header sent with every request.
    ///
    /// # Errors
    /// `RequestError::Config` if the name or value is not a valid header.
    pub fn default_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| RequestError::Config(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| RequestError::Config(format!("invalid header value: {e}")))?;
        self.default_headers.get_or_insert_with(HeaderMap::new).insert(name, value);
        Ok(self)
    }

    pub fn build(self) -> Result<ReqwestTransport> {
        let mut builder = ReqwestClient::builder().no_proxy();

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| RequestError::from(InfraError::from(err)))?;

        Ok(ReqwestTransport { client })
    }
}
