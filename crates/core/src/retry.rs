//! Retry classification, backoff and the bounded resend loop

use std::future::Future;
use std::time::Duration;

use tollgate_domain::{ErrorCategory, RequestDescriptor, RequestError, Result, RetryConfig};
use tracing::{debug, warn};

use crate::cancel::CancelHandle;
use crate::endpoint::{path_matches, strip_query};

/// Remaining attempts for one logical request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    total: u32,
    used: u32,
}

impl RetryBudget {
    /// Budget of `total` attempts (the first attempt included). Zero is
    /// raised to one.
    pub fn new(total: u32) -> Self {
        Self { total: total.max(1), used: 0 }
    }

    /// Take one attempt from the budget. Returns the 1-based attempt number,
    /// or `None` when nothing is left.
    pub fn consume(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }
        self.used += 1;
        Some(self.used)
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn remaining(&self) -> u32 {
        self.total - self.used
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.total
    }
}

/// Decides which failures are transient and re-runs the request for them
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    no_retry_paths: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            no_retry_paths: config.no_retry_paths.clone(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Budget for `request`, honouring its per-request override.
    pub fn budget_for(&self, request: &RequestDescriptor) -> RetryBudget {
        RetryBudget::new(request.options.retry_budget.unwrap_or(self.max_attempts))
    }

    /// True when `error` is transport noise worth another attempt.
    ///
    /// Login/register failures are user-visible outcomes and never retried;
    /// cancellation is never retried. Network failures, timeouts and 5xx
    /// responses are retried.
    pub fn should_retry(&self, request: &RequestDescriptor, error: &RequestError) -> bool {
        let path = strip_query(&request.url);
        if self.no_retry_paths.iter().any(|pattern| path_matches(path, pattern)) {
            return false;
        }

        match error {
            RequestError::RetryExhausted { .. } => false,
            other => matches!(other.category(), ErrorCategory::Network | ErrorCategory::Server),
        }
    }

    /// Delay before the attempt following `attempt` (1-based): capped
    /// exponential, `min(base * 2^(attempt-1), max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << shift).min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails terminally, or the budget is
    /// spent.
    ///
    /// `operation` receives the 1-based attempt number and must perform the
    /// full send each time. Waiting between attempts aborts as soon as
    /// `cancel` fires. A retryable failure on the last attempt is wrapped in
    /// [`RequestError::RetryExhausted`].
    pub async fn execute<F, Fut, T>(
        &self,
        request: &RequestDescriptor,
        cancel: &CancelHandle,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut budget = self.budget_for(request);

        while let Some(attempt) = budget.consume() {
            let error = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, url = %request.url, "request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !self.should_retry(request, &error) {
                return Err(error);
            }

            if budget.is_exhausted() {
                warn!(
                    attempts = attempt,
                    url = %request.url,
                    error = %error,
                    "retry budget exhausted"
                );
                return Err(RequestError::RetryExhausted { attempts: attempt, last: Box::new(error) });
            }

            let delay = self.delay_for(attempt);
            debug!(
                attempt,
                remaining = budget.remaining(),
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient failure, retrying"
            );

            tokio::select! {
                biased;
                cancelled = cancel.cancelled() => return Err(cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }

        Err(RequestError::Internal("retry loop ended without an attempt".into()))
    }
}
