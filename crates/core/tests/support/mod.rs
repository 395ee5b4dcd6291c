//! Shared test helpers for `tollgate-core` integration tests.
//!
//! In-memory doubles for every port so behaviour tests can script server
//! responses and observe side effects without a network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tollgate_core::{
    CredentialRefresher, Notifier, RefreshOutcome, RequestPipeline, TokenStore, Transport,
};
use tollgate_domain::{
    ApiResponse, Credential, PipelineConfig, RequestDescriptor, Result as DomainResult, Severity,
};

pub const BASE_URL: &str = "http://api.test";

type Responder = dyn Fn(&RequestDescriptor) -> DomainResult<ApiResponse> + Send + Sync;

/// Transport whose responses come from a closure.
///
/// Every call is recorded before the configured latency elapses, so a
/// request that is later cancelled still shows up in [`Self::calls`].
pub struct ScriptedTransport {
    responder: Box<Responder>,
    latency: Duration,
    calls: Mutex<Vec<RequestDescriptor>>,
}

impl ScriptedTransport {
    pub fn new(
        responder: impl Fn(&RequestDescriptor) -> DomainResult<ApiResponse> + Send + Sync + 'static,
    ) -> Self {
        Self { responder: Box::new(responder), latency: Duration::ZERO, calls: Mutex::new(Vec::new()) }
    }

    /// Answers 200 only for `Bearer {accepted}`, 401 otherwise.
    pub fn accepting(accepted: &'static str) -> Self {
        Self::new(move |request| {
            if request.authorization() == Some(format!("Bearer {accepted}").as_str()) {
                Ok(ApiResponse::new(200, json!({ "url": request.url })))
            } else {
                Ok(ApiResponse::new(401, json!({ "error": "token expired" })))
            }
        })
    }

    /// Always answers with `status`.
    pub fn status(status: u16) -> Self {
        Self::new(move |_| Ok(ApiResponse::new(status, json!({ "status": status }))))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<RequestDescriptor> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Authorization headers in call order.
    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.calls.lock().iter().map(|call| call.authorization().map(str::to_string)).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &RequestDescriptor) -> DomainResult<ApiResponse> {
        self.calls.lock().push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.responder)(request)
    }
}

#[derive(Default)]
pub struct InMemoryStore(Mutex<Option<Credential>>);

impl InMemoryStore {
    pub fn holding(token: &str) -> Self {
        Self(Mutex::new(Some(Credential::new(token))))
    }

    pub fn get_value(&self) -> Option<String> {
        self.0.lock().as_ref().map(|credential| credential.value().to_string())
    }
}

impl TokenStore for InMemoryStore {
    fn get(&self) -> Option<Credential> {
        self.0.lock().clone()
    }

    fn set(&self, credential: Credential) -> DomainResult<()> {
        *self.0.lock() = Some(credential);
        Ok(())
    }

    fn clear(&self) -> DomainResult<()> {
        *self.0.lock() = None;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, Severity)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.messages.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        self.messages.lock().push((message.to_string(), severity));
    }
}

/// Refresher that counts calls and returns a fixed outcome after a delay.
pub struct CountingRefresher {
    calls: AtomicUsize,
    outcome: DomainResult<RefreshOutcome>,
    latency: Duration,
}

impl CountingRefresher {
    pub fn issuing(token: &str) -> Self {
        Self::with_outcome(Ok(RefreshOutcome::Refreshed(Credential::new(token))))
    }

    pub fn with_outcome(outcome: DomainResult<RefreshOutcome>) -> Self {
        Self { calls: AtomicUsize::new(0), outcome, latency: Duration::from_millis(30) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialRefresher for CountingRefresher {
    async fn refresh(&self, _current: Option<Credential>) -> DomainResult<RefreshOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.outcome.clone()
    }
}

/// Test configuration: short backoff, default budgets.
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::with_base_url(BASE_URL);
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 40;
    config
}

pub struct Harness {
    pub pipeline: Arc<RequestPipeline>,
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<InMemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub refresher: Arc<CountingRefresher>,
}

impl Harness {
    pub fn new(
        transport: ScriptedTransport,
        store: InMemoryStore,
        refresher: CountingRefresher,
    ) -> Self {
        let transport = Arc::new(transport);
        let store = Arc::new(store);
        let notifier = Arc::new(RecordingNotifier::default());
        let refresher = Arc::new(refresher);

        let pipeline = RequestPipeline::builder(test_config())
            .transport(transport.clone())
            .token_store(store.clone())
            .notifier(notifier.clone())
            .refresher(refresher.clone())
            .build()
            .expect("pipeline should build");

        Self { pipeline: Arc::new(pipeline), transport, store, notifier, refresher }
    }
}
