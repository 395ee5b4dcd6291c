//! Shared helpers for `tollgate-infra` integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tollgate_core::{LoginPrompt, Notifier, RequestPipeline, TokenStore};
use tollgate_domain::{Credential, PipelineConfig, RequestError, Result as DomainResult, Severity};
use tollgate_infra::{http_pipeline, MemoryTokenStore};
use wiremock::MockServer;

/// Notifier that keeps every message for assertions.
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

/// Login prompt that answers with a fixed credential, or declines.
pub struct ScriptedPrompt {
    answer: Option<String>,
    prompts: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn answering(token: &str) -> Self {
        Self { answer: Some(token.to_string()), prompts: AtomicUsize::new(0) }
    }

    pub fn declining() -> Self {
        Self { answer: None, prompts: AtomicUsize::new(0) }
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LoginPrompt for ScriptedPrompt {
    async fn prompt_login(&self) -> DomainResult<Credential> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.answer
            .as_ref()
            .map(Credential::new)
            .ok_or_else(|| RequestError::cancelled("user dismissed the login dialog"))
    }
}

/// Config pointed at `server` with fast backoff.
pub fn config_for(server: &MockServer) -> PipelineConfig {
    let mut config = PipelineConfig::with_base_url(server.uri());
    config.timeout_secs = 5;
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 40;
    config.auth.refresh_timeout_secs = 5;
    config
}

pub struct TestPipeline {
    pub pipeline: Arc<RequestPipeline>,
    pub store: Arc<MemoryTokenStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestPipeline {
    pub fn new(server: &MockServer, prompt: Option<Arc<dyn LoginPrompt>>) -> Self {
        Self::with_config(config_for(server), prompt)
    }

    pub fn with_config(config: PipelineConfig, prompt: Option<Arc<dyn LoginPrompt>>) -> Self {
        let store = Arc::new(MemoryTokenStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = http_pipeline(config, store.clone(), notifier.clone(), prompt)
            .expect("pipeline should build");
        Self { pipeline: Arc::new(pipeline), store, notifier }
    }

    pub fn token(&self) -> Option<String> {
        self.store.get().map(|credential| credential.value().to_string())
    }
}
