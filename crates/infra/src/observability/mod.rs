//! Tracing subscriber setup and the tracing-backed notifier

use anyhow::{anyhow, Context};
use tollgate_core::Notifier;
use tollgate_domain::Severity;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// Honours `RUST_LOG`, defaulting to `info`. `json` switches to one JSON
/// object per line for log shippers.
///
/// # Errors
/// Fails if the filter directive is invalid or a subscriber is already set.
pub fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid tracing filter")?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if json { builder.json().try_init() } else { builder.try_init() };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

/// Notifier that emits user-facing messages as log events.
///
/// Used when no UI is attached (CLIs, daemons, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => tracing::info!(target: "tollgate::notify", "{message}"),
            Severity::Warning => tracing::warn!(target: "tollgate::notify", "{message}"),
            Severity::Error => tracing::error!(target: "tollgate::notify", "{message}"),
        }
    }
}
