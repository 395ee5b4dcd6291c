//! Wiring of the reqwest-backed pipeline

use std::sync::Arc;

use tollgate_core::{LoginPrompt, Notifier, RequestPipeline, TokenStore, Transport};
use tollgate_domain::{PipelineConfig, Result};
use tracing::info;

use crate::auth::HttpTokenRefresher;
use crate::http::ReqwestTransport;

const USER_AGENT: &str = concat!("tollgate/", env!("CARGO_PKG_VERSION"));

/// Build a pipeline that talks HTTP through reqwest and refreshes
/// credentials at the configured refresh endpoint.
///
/// # Errors
/// `RequestError::Config` for an invalid configuration or HTTP client.
pub fn http_pipeline(
    config: PipelineConfig,
    store: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
    prompt: Option<Arc<dyn LoginPrompt>>,
) -> Result<RequestPipeline> {
    let transport: Arc<dyn Transport> = Arc::new(
        ReqwestTransport::builder()
            .connect_timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()?,
    );
    let refresher = HttpTokenRefresher::new(transport.clone(), &config.base_url, &config.auth);
    info!(base_url = %config.base_url, refresh_url = %refresher.url(), "assembling request pipeline");

    let mut builder = RequestPipeline::builder(config)
        .transport(transport)
        .token_store(store)
        .notifier(notifier)
        .refresher(Arc::new(refresher));
    if let Some(prompt) = prompt {
        builder = builder.login_prompt(prompt);
    }
    builder.build()
}
