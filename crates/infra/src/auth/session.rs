//! Explicit login and logout against the backend

use std::sync::Arc;

use serde_json::json;
use tollgate_core::RequestPipeline;
use tollgate_domain::{AuthConfig, Credential, RequestDescriptor, Result};
use tracing::{info, instrument, warn};

use super::extract_token;

/// Login/logout calls that feed the pipeline's session state.
///
/// Both calls are flagged `skip_auth_retry`: a rejected login is the user's
/// answer, not a reason to refresh.
pub struct SessionService {
    pipeline: Arc<RequestPipeline>,
    auth: AuthConfig,
}

impl SessionService {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        let auth = pipeline.config().auth.clone();
        Self { pipeline, auth }
    }

    /// Authenticate with username and password and commit the issued
    /// credential.
    ///
    /// # Errors
    /// The pipeline error for a failed exchange (`Auth` for a 401), or
    /// `Auth` when the response carries no token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Credential> {
        let request = RequestDescriptor::post(
            self.auth.login_path.clone(),
            json!({ "username": username, "password": password }),
        )
        .skip_auth_retry();

        let response = self.pipeline.request(request).await?;
        let credential = extract_token(&response.body, &self.auth.token_field)?;
        self.pipeline.sign_in(credential.clone())?;
        info!("login succeeded");
        Ok(credential)
    }

    /// Tell the backend, then drop the local session regardless of its
    /// answer.
    ///
    /// # Errors
    /// Only token store failures; a failed logout call is logged.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let request = RequestDescriptor::post(self.auth.logout_path.clone(), json!({}))
            .skip_auth_retry()
            .retry_budget(1);

        if let Err(err) = self.pipeline.request(request).await {
            warn!(error = %err, "logout call failed, clearing session anyway");
        }
        self.pipeline.sign_out()
    }
}
