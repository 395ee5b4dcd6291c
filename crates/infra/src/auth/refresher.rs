//! Silent credential refresh over HTTP

use std::sync::Arc;

use async_trait::async_trait;
use tollgate_core::endpoint::resolve_url;
use tollgate_core::{CredentialRefresher, RefreshOutcome, Transport};
use tollgate_domain::{AuthConfig, Credential, HttpMethod, RequestDescriptor, RequestError, Result};
use tracing::{debug, info, instrument};

use super::extract_token;

/// Exchanges the current bearer for a new one at the refresh endpoint.
///
/// Talks to the transport directly: a refresh call never goes through the
/// pipeline, so its own 401 cannot start another re-authentication.
pub struct HttpTokenRefresher {
    transport: Arc<dyn Transport>,
    url: String,
    token_field: String,
}

impl HttpTokenRefresher {
    pub fn new(transport: Arc<dyn Transport>, base_url: &str, auth: &AuthConfig) -> Self {
        Self {
            transport,
            url: resolve_url(base_url, &auth.refresh_path),
            token_field: auth.token_field.clone(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CredentialRefresher for HttpTokenRefresher {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn refresh(&self, current: Option<Credential>) -> Result<RefreshOutcome> {
        let Some(current) = current else {
            debug!("no credential to refresh from");
            return Ok(RefreshOutcome::Unavailable);
        };

        let mut request = RequestDescriptor::new(HttpMethod::Post, self.url.clone()).skip_auth_retry();
        request.set_authorization(current.bearer());

        let response = self.transport.send(&request).await?;
        match response.status {
            200..=299 => {
                let credential = extract_token(&response.body, &self.token_field)?;
                info!(expires_at = ?credential.expires_at(), "credential refreshed");
                Ok(RefreshOutcome::Refreshed(credential))
            }
            401 | 403 => Err(RequestError::Auth(format!(
                "refresh rejected with status {}",
                response.status
            ))),
            status => Err(RequestError::from_status(status, response.body_text())),
        }
    }
}
