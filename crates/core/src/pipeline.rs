//! Request pipeline façade
//!
//! Composes fingerprinting, in-flight deduplication, credential attachment,
//! re-authentication and retry behind a single `request` call. One logical
//! request holds one registry slot for its whole life; retries and the
//! post-refresh replay reuse that slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tollgate_domain::{
    ApiResponse, AuthEvent, Credential, ErrorCategory, PipelineConfig, RequestDescriptor,
    RequestError, Result, Severity,
};
use tracing::{debug, info, instrument, warn};

use crate::auth::AuthInterceptor;
use crate::cancel::CancelHandle;
use crate::endpoint::resolve_url;
use crate::fingerprint::{Fingerprint, RequestFingerprinter};
use crate::ports::{CredentialRefresher, LoginPrompt, Notifier, NullNotifier, TokenStore, Transport};
use crate::reauth::ReauthCoordinator;
use crate::registry::{InFlightRegistry, Ticket};
use crate::retry::RetryPolicy;

/// Entry point for every outbound API call
pub struct RequestPipeline {
    config: PipelineConfig,
    transport: Arc<dyn Transport>,
    interceptor: AuthInterceptor,
    registry: Arc<InFlightRegistry>,
    coordinator: ReauthCoordinator,
    retry: RetryPolicy,
    notifier: Arc<dyn Notifier>,
    events: broadcast::Sender<AuthEvent>,
}

/// Releases the registry slot when the request settles or its future is
/// dropped.
struct SlotGuard<'a> {
    registry: &'a InFlightRegistry,
    fingerprint: Fingerprint,
    ticket: Ticket,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if !self.registry.release(&self.fingerprint, self.ticket) {
            debug!(fingerprint = %self.fingerprint, "slot already taken over, nothing to release");
        }
    }
}

impl RequestPipeline {
    pub fn builder(config: PipelineConfig) -> RequestPipelineBuilder {
        RequestPipelineBuilder::new(config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<InFlightRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &ReauthCoordinator {
        &self.coordinator
    }

    /// Subscribe to authentication lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Send `descriptor` and wait for its settled outcome.
    ///
    /// # Errors
    /// `RequestError::Cancelled` when superseded by an identical request,
    /// otherwise the terminal failure after re-authentication and retries.
    pub async fn request(&self, descriptor: RequestDescriptor) -> Result<ApiResponse> {
        self.request_with_handle(descriptor, CancelHandle::new()).await
    }

    /// Like [`Self::request`], with a caller-owned abort handle.
    ///
    /// # Errors
    /// See [`Self::request`]. Cancelling `handle` settles the request with
    /// `RequestError::Cancelled` at the next suspension point.
    #[instrument(skip_all, fields(method = %descriptor.method, url = %descriptor.url))]
    pub async fn request_with_handle(
        &self,
        descriptor: RequestDescriptor,
        handle: CancelHandle,
    ) -> Result<ApiResponse> {
        let mut request = descriptor;
        request.url = resolve_url(&self.config.base_url, &request.url);
        let fingerprint = RequestFingerprinter::for_request(&request);

        let _slot = if self.registry.is_duplicate_allowed(&request) {
            None
        } else {
            let ticket = self.registry.register(fingerprint.clone(), handle.clone());
            Some(SlotGuard { registry: &self.registry, fingerprint: fingerprint.clone(), ticket })
        };

        let reauth_rejected = AtomicBool::new(false);
        let (request_ref, fingerprint_ref, handle_ref, rejected_ref) =
            (&request, &fingerprint, &handle, &reauth_rejected);

        let result = self
            .retry
            .execute(request_ref, handle_ref, move |attempt| {
                self.pass(request_ref, fingerprint_ref, handle_ref, rejected_ref, attempt)
            })
            .await;

        match &result {
            Ok(response) => debug!(status = response.status, "request settled"),
            Err(err) => self.report_failure(err, reauth_rejected.load(Ordering::Acquire)),
        }
        result
    }

    /// Commit a credential from an explicit login.
    ///
    /// # Errors
    /// Propagates token store failures.
    pub fn sign_in(&self, credential: Credential) -> Result<()> {
        info!("signing in");
        self.coordinator.commit_login(credential)
    }

    /// Abort everything outstanding and drop the credential.
    ///
    /// # Errors
    /// Propagates token store failures.
    pub fn sign_out(&self) -> Result<()> {
        let cancelled = self.registry.cancel_all("signed out");
        info!(cancelled, "signing out");
        self.coordinator.clear_session()
    }

    /// Cancel every outstanding request.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.registry.cancel_all("pipeline shut down");
        info!(cancelled, "request pipeline shut down");
        cancelled
    }

    /// One pass: attach, send, and on 401 wait for re-authentication and
    /// replay once.
    async fn pass(
        &self,
        template: &RequestDescriptor,
        fingerprint: &Fingerprint,
        handle: &CancelHandle,
        reauth_rejected: &AtomicBool,
        attempt: u32,
    ) -> Result<ApiResponse> {
        let mut request = template.clone();
        let used = self.interceptor.attach(&mut request);
        debug!(attempt, authenticated = used.is_some(), "dispatching");

        let response = self.send_once(&request, handle).await?;
        if response.is_success() {
            return Ok(response);
        }
        if response.status != 401 {
            return Err(RequestError::from_status(response.status, response.body_text()));
        }

        if request.options.skip_auth_retry || self.interceptor.is_bypassed(&request.url) {
            debug!("401 on unauthenticated endpoint, not re-authenticating");
            return Err(RequestError::Auth(
                response.body_text().unwrap_or_else(|| "credential rejected".to_string()),
            ));
        }

        let rejected = used.as_ref().map(Credential::value);
        let settled = tokio::select! {
            biased;
            cancelled = handle.cancelled() => return Err(cancelled),
            settled = self.coordinator.await_credential(fingerprint, rejected) => settled,
        };
        let credential = settled.inspect_err(|_| reauth_rejected.store(true, Ordering::Release))?;

        request.set_authorization(credential.bearer());
        debug!("replaying with refreshed credential");
        let replayed = self.send_once(&request, handle).await?;
        match replayed.status {
            200..=299 => Ok(replayed),
            401 => Err(RequestError::Auth("credential rejected after re-authentication".into())),
            status => Err(RequestError::from_status(status, replayed.body_text())),
        }
    }

    /// Send once under the per-request timeout, racing the cancel handle.
    async fn send_once(
        &self,
        request: &RequestDescriptor,
        handle: &CancelHandle,
    ) -> Result<ApiResponse> {
        let timeout = request.options.timeout.unwrap_or_else(|| self.config.timeout());
        let outcome = tokio::select! {
            biased;
            cancelled = handle.cancelled() => return Err(cancelled),
            outcome = tokio::time::timeout(timeout, self.transport.send(request)) => outcome,
        };

        // A response that lands after cancellation is discarded.
        if handle.is_cancelled() {
            return Err(handle.error());
        }

        match outcome {
            Ok(result) => result,
            Err(_) => Err(RequestError::Timeout(timeout)),
        }
    }

    fn report_failure(&self, error: &RequestError, already_notified: bool) {
        if error.is_cancellation() {
            debug!(reason = %error, "request cancelled");
            return;
        }

        warn!(error = %error, "request failed");
        if already_notified {
            return;
        }

        let severity = match error.category() {
            ErrorCategory::Network => Severity::Warning,
            _ => Severity::Error,
        };
        self.notifier.notify(&error.user_message(), severity);
    }
}

/// Builder for [`RequestPipeline`].
pub struct RequestPipelineBuilder {
    config: PipelineConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn TokenStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    refresher: Option<Arc<dyn CredentialRefresher>>,
    prompt: Option<Arc<dyn LoginPrompt>>,
}

impl RequestPipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config, transport: None, store: None, notifier: None, refresher: None, prompt: None }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to a notifier that drops everything.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn refresher(mut self, refresher: Arc<dyn CredentialRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn login_prompt(mut self, prompt: Arc<dyn LoginPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// # Errors
    /// `RequestError::Config` when the configuration is invalid or the
    /// transport or token store is missing.
    pub fn build(self) -> Result<RequestPipeline> {
        self.config.validate()?;
        let transport = self
            .transport
            .ok_or_else(|| RequestError::Config("request pipeline needs a transport".into()))?;
        let store = self
            .store
            .ok_or_else(|| RequestError::Config("request pipeline needs a token store".into()))?;
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(NullNotifier));

        let (events, _) = broadcast::channel(self.config.events_capacity);

        let mut coordinator = ReauthCoordinator::new(
            store.clone(),
            notifier.clone(),
            events.clone(),
            self.config.auth.refresh_timeout(),
        );
        if let Some(refresher) = self.refresher {
            coordinator = coordinator.with_refresher(refresher);
        }
        if let Some(prompt) = self.prompt {
            coordinator = coordinator.with_login_prompt(prompt);
        }

        let interceptor = AuthInterceptor::new(
            self.config.base_url.clone(),
            self.config.auth.bypass_paths.clone(),
            store,
        );

        Ok(RequestPipeline {
            transport,
            interceptor,
            registry: Arc::new(InFlightRegistry::from_config(&self.config.dedup)),
            coordinator,
            retry: RetryPolicy::from_config(&self.config.retry),
            notifier,
            events,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct EmptyStore;

    impl TokenStore for EmptyStore {
        fn get(&self) -> Option<Credential> {
            None
        }

        fn set(&self, _credential: Credential) -> Result<()> {
            Ok(())
        }

        fn clear(&self) -> Result<()> {
            Ok(())
        }
    }

    struct Echo;

    #[async_trait::async_trait]
    impl Transport for Echo {
        async fn send(&self, request: &RequestDescriptor) -> Result<ApiResponse> {
            Ok(ApiResponse::new(200, serde_json::json!({ "url": request.url })))
        }
    }

    #[test]
    fn test_build_requires_transport_and_store() {
        let missing_transport = RequestPipeline::builder(PipelineConfig::default())
            .token_store(Arc::new(EmptyStore))
            .build();
        assert!(matches!(missing_transport, Err(RequestError::Config(_))));

        let missing_store =
            RequestPipeline::builder(PipelineConfig::default()).transport(Arc::new(Echo)).build();
        assert!(matches!(missing_store, Err(RequestError::Config(_))));
    }

    #[test]
    fn test_build_validates_config() {
        let mut config = PipelineConfig::default();
        config.timeout_secs = 0;
        let result = RequestPipeline::builder(config)
            .transport(Arc::new(Echo))
            .token_store(Arc::new(EmptyStore))
            .build();
        assert!(matches!(result, Err(RequestError::Config(_))));
    }

    #[tokio::test]
    async fn test_relative_urls_resolve_against_base() {
        let pipeline = RequestPipeline::builder(PipelineConfig::with_base_url("http://api.test/v1"))
            .transport(Arc::new(Echo))
            .token_store(Arc::new(EmptyStore))
            .build()
            .unwrap();

        let response = pipeline.request(RequestDescriptor::get("/profile")).await.unwrap();
        assert_eq!(response.body["url"], "http://api.test/v1/profile");
        assert!(pipeline.registry().is_empty());
    }
}
