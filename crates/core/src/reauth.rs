//! Re-authentication coordinator
//!
//! Turns any number of concurrent 401s into a single refresh episode:
//!
//! - `Idle` + 401 → `Refreshing`; a background task refreshes silently or,
//!   failing that, asks the login prompt. The caller becomes the first
//!   waiter.
//! - `Refreshing` + 401 → the caller joins the waiter queue.
//! - Success → the credential is committed to the token store, then every
//!   waiter receives it in enqueue order and replays its own request.
//! - Failure → the credential is cleared and every waiter is rejected with
//!   the same `AuthError`.
//!
//! The episode runs on its own task so a caller dropping its future cannot
//! strand the queue. If the task dies anyway, its guard drains the queue with
//! an error and resets the state to `Idle`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tollgate_domain::{AuthEvent, Credential, RequestError, Result, Severity};
use tracing::{debug, info, instrument, warn};

use crate::fingerprint::Fingerprint;
use crate::ports::{CredentialRefresher, LoginPrompt, Notifier, RefreshOutcome, TokenStore};

/// Coordinator phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReauthState {
    Idle,
    Refreshing,
}

/// A request suspended until the current episode settles
struct WaitingCaller {
    fingerprint: Fingerprint,
    enqueued_at: Instant,
    reply: oneshot::Sender<Result<Credential>>,
}

struct CoordinatorState {
    phase: ReauthState,
    waiters: Vec<WaitingCaller>,
    episodes: u64,
}

struct Inner {
    state: Mutex<CoordinatorState>,
    store: Arc<dyn TokenStore>,
    refresher: Option<Arc<dyn CredentialRefresher>>,
    prompt: Option<Arc<dyn LoginPrompt>>,
    notifier: Arc<dyn Notifier>,
    events: broadcast::Sender<AuthEvent>,
    refresh_timeout: Duration,
}

/// Single-flight credential refresh shared by every request
#[derive(Clone)]
pub struct ReauthCoordinator {
    inner: Arc<Inner>,
}

impl ReauthCoordinator {
    pub fn new(
        store: Arc<dyn TokenStore>,
        notifier: Arc<dyn Notifier>,
        events: broadcast::Sender<AuthEvent>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(CoordinatorState {
                    phase: ReauthState::Idle,
                    waiters: Vec::new(),
                    episodes: 0,
                }),
                store,
                refresher: None,
                prompt: None,
                notifier,
                events,
                refresh_timeout,
            }),
        }
    }

    /// Install the silent refresher. Must be called before the coordinator is
    /// shared.
    pub fn with_refresher(mut self, refresher: Arc<dyn CredentialRefresher>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.refresher = Some(refresher);
        }
        self
    }

    /// Install the interactive login prompt. Must be called before the
    /// coordinator is shared.
    pub fn with_login_prompt(mut self, prompt: Arc<dyn LoginPrompt>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.prompt = Some(prompt);
        }
        self
    }

    pub fn state(&self) -> ReauthState {
        self.inner.state.lock().phase
    }

    /// Number of callers queued on the current episode.
    pub fn waiting(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }

    /// Number of refresh episodes started so far.
    pub fn episodes(&self) -> u64 {
        self.inner.state.lock().episodes
    }

    /// Wait for a credential that should be accepted where `rejected` was not.
    ///
    /// `rejected` is the credential value the 401'd request carried. If the
    /// store already holds a different credential (another episode finished
    /// while this request was in flight) it is returned straight away.
    /// Otherwise the caller joins the current episode, starting one if the
    /// coordinator is idle.
    ///
    /// # Errors
    /// `RequestError::Auth` when the episode fails or is aborted.
    #[instrument(skip_all, fields(fingerprint = %fingerprint))]
    pub async fn await_credential(
        &self,
        fingerprint: &Fingerprint,
        rejected: Option<&str>,
    ) -> Result<Credential> {
        let (reply, receiver) = oneshot::channel();
        {
            let mut state = self.inner.state.lock();
            if state.phase == ReauthState::Idle {
                if let Some(current) = self.inner.store.get() {
                    if rejected != Some(current.value()) {
                        debug!("credential already rotated, replaying without refresh");
                        return Ok(current);
                    }
                }

                state.phase = ReauthState::Refreshing;
                state.episodes += 1;
                info!(episode = state.episodes, "starting re-authentication");
                tokio::spawn(run_episode(self.inner.clone()));
            }

            state.waiters.push(WaitingCaller {
                fingerprint: fingerprint.clone(),
                enqueued_at: Instant::now(),
                reply,
            });
        }

        receiver
            .await
            .map_err(|_| RequestError::Auth("re-authentication was aborted".into()))?
    }

    /// Commit a credential obtained by an explicit login.
    ///
    /// # Errors
    /// Propagates token store failures.
    pub fn commit_login(&self, credential: Credential) -> Result<()> {
        self.inner.store.set(credential)?;
        self.inner.emit(AuthEvent::LoginSuccess);
        self.inner.emit(AuthEvent::AuthStateChanged { authenticated: true });
        Ok(())
    }

    /// Drop the credential (logout).
    ///
    /// # Errors
    /// Propagates token store failures.
    pub fn clear_session(&self) -> Result<()> {
        self.inner.store.clear()?;
        self.inner.emit(AuthEvent::AuthStateChanged { authenticated: false });
        Ok(())
    }
}

impl Inner {
    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn obtain_credential(&self) -> Result<Credential> {
        let mut silent_failure = None;

        if let Some(refresher) = &self.refresher {
            let current = self.store.get();
            match tokio::time::timeout(self.refresh_timeout, refresher.refresh(current)).await {
                Ok(Ok(RefreshOutcome::Refreshed(credential))) => return Ok(credential),
                Ok(Ok(RefreshOutcome::Unavailable)) => {
                    debug!("silent refresh unavailable");
                }
                Ok(Err(err)) => {
                    warn!(error = %err, "silent refresh failed");
                    silent_failure = Some(err);
                }
                Err(_) => {
                    warn!(timeout_ms = self.refresh_timeout.as_millis() as u64, "silent refresh timed out");
                    silent_failure = Some(RequestError::Timeout(self.refresh_timeout));
                }
            }
        }

        match &self.prompt {
            Some(prompt) => {
                self.emit(AuthEvent::LoginRequired);
                prompt
                    .prompt_login()
                    .await
                    .map_err(|err| RequestError::Auth(format!("interactive login failed: {err}")))
            }
            None => Err(RequestError::Auth(match silent_failure {
                Some(err) => format!("credential refresh failed: {err}"),
                None => "no way to refresh the credential".to_string(),
            })),
        }
    }

    /// Move every waiter out and return to `Idle` in one critical section.
    fn take_waiters(&self) -> Vec<WaitingCaller> {
        let mut state = self.state.lock();
        state.phase = ReauthState::Idle;
        std::mem::take(&mut state.waiters)
    }

    fn settle(&self, outcome: &Result<Credential>) {
        let waiters = self.take_waiters();
        debug!(waiters = waiters.len(), success = outcome.is_ok(), "draining re-auth queue");

        for waiter in waiters {
            debug!(
                fingerprint = %waiter.fingerprint,
                waited_ms = waiter.enqueued_at.elapsed().as_millis() as u64,
                "releasing waiter"
            );
            // A waiter whose caller went away has nothing to replay.
            let _ = waiter.reply.send(outcome.clone());
        }
    }
}

/// Resets the coordinator if the episode task stops before settling.
struct EpisodeGuard {
    inner: Arc<Inner>,
    settled: bool,
}

impl Drop for EpisodeGuard {
    fn drop(&mut self) {
        if !self.settled {
            warn!("re-authentication task ended without settling");
            self.inner.settle(&Err(RequestError::Auth("re-authentication was aborted".into())));
        }
    }
}

async fn run_episode(inner: Arc<Inner>) {
    let mut guard = EpisodeGuard { inner: inner.clone(), settled: false };

    let outcome = match inner.obtain_credential().await {
        Ok(credential) => inner.store.set(credential.clone()).map(|()| credential),
        Err(err) => Err(err),
    };

    match &outcome {
        Ok(_) => {
            info!("re-authentication succeeded");
            inner.emit(AuthEvent::LoginSuccess);
            inner.emit(AuthEvent::AuthStateChanged { authenticated: true });
        }
        Err(err) => {
            warn!(error = %err, "re-authentication failed, clearing credential");
            if let Err(clear_err) = inner.store.clear() {
                warn!(error = %clear_err, "failed to clear credential");
            }
            inner.emit(AuthEvent::AuthStateChanged { authenticated: false });
            inner.emit(AuthEvent::LoginRequired);
            inner.notifier.notify(&err.user_message(), Severity::Warning);
        }
    }

    let outcome = outcome.map_err(|err| match err {
        RequestError::Auth(_) => err,
        other => RequestError::Auth(other.to_string()),
    });
    inner.settle(&outcome);
    guard.settled = true;
}
