//! Cooperative cancellation shared by the registry and callers

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tollgate_domain::RequestError;

const DEFAULT_REASON: &str = "request aborted";

/// Abort capability for one logical request
///
/// Clones share state: cancelling any clone cancels them all. The first
/// reason given wins.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
    reason: Arc<Mutex<Option<String>>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel with a reason. Later calls do not overwrite the first reason.
    pub fn cancel(&self, reason: impl Into<String>) {
        {
            let mut slot = self.reason.lock();
            if slot.is_none() {
                *slot = Some(reason.into());
            }
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }

    /// Cancellation error describing why this handle fired.
    pub fn error(&self) -> RequestError {
        RequestError::cancelled(self.reason().unwrap_or_else(|| DEFAULT_REASON.to_string()))
    }

    /// Resolves once cancelled, yielding the cancellation error.
    pub async fn cancelled(&self) -> RequestError {
        self.token.cancelled().await;
        self.error()
    }
}
