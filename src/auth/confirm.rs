//! The redirect-landing confirmation state machine.
//!
//! ```text
//! idle ─▶ checkingSession ─▶ checkingUser ─▶ confirmed
//!  │            │    ▲             │
//!  │            ▼    │             ▼
//!  │         retryWaiting ◀────────┘
//!  │            │
//!  ▼            ▼
//! blocked     failed
//! ```
//!
//! One cycle runs at a time per machine. Each retry restarts from the session
//! check; the wall-clock `hard_timeout` of the policy bounds the whole cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

use super::events::AuthEvents;
use super::flow::clear_markers;
use super::limiter::AttemptLimiter;
use super::state::{AuthAttemptState, ConfirmationOutcome, ConfirmationState};
use crate::browser::BrowserProfile;
use crate::error::{IdentityError, LandingError, Result, TerminalErrorKind};
use crate::identity::{IdentityService, Profile};
use crate::policy::{select_policy, ConfirmationPolicy};
use crate::storage::{keys, KeyValueStore};
use crate::util::retry::{Attempt, PollError, Polled};
use crate::util::timeout::with_timeout;

pub const DEFAULT_BLOCKED_REDIRECT_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_DESTINATION: &str = "/";

/// Confirms that a provider redirect produced a session and a profile.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use oauth_landing::auth::{AttemptLimiter, ConfirmationMachine, LimiterSettings};
/// use oauth_landing::browser::{classify, ClientHints};
/// use oauth_landing::identity::HttpIdentityService;
/// use oauth_landing::storage::{FileStore, MemoryStore};
/// use oauth_landing::util::clock::SystemClock;
///
/// # async fn example() -> oauth_landing::error::Result<()> {
/// let durable = Arc::new(FileStore::new_default());
/// let limiter = Arc::new(AttemptLimiter::new(
///     durable.clone(),
///     Arc::new(SystemClock),
///     LimiterSettings::default(),
/// ));
/// let identity =
///     HttpIdentityService::new("https://id.example.com/v1", "proj", Duration::from_secs(15))?;
/// let machine = ConfirmationMachine::builder()
///     .identity(Arc::new(identity))
///     .limiter(limiter)
///     .durable_store(durable)
///     .session_store(Arc::new(MemoryStore::new()))
///     .browser(classify("Mozilla/5.0 ...", &ClientHints::default()))
///     .destination("/feed")
///     .build();
/// let outcome = machine.run().await?;
/// println!("{outcome:?}");
/// # Ok(())
/// # }
/// ```
pub struct ConfirmationMachine {
    identity: Arc<dyn IdentityService>,
    limiter: Arc<AttemptLimiter>,
    durable: Arc<dyn KeyValueStore>,
    session: Option<Arc<dyn KeyValueStore>>,
    events: AuthEvents,
    browser: BrowserProfile,
    policy: ConfirmationPolicy,
    destination: String,
    blocked_redirect_delay: Duration,
    running: AtomicBool,
    cancel: CancellationToken,
    state: watch::Sender<AuthAttemptState>,
}

#[bon::bon]
impl ConfirmationMachine {
    #[builder]
    pub fn new(
        identity: Arc<dyn IdentityService>,
        limiter: Arc<AttemptLimiter>,
        durable_store: Arc<dyn KeyValueStore>,
        session_store: Option<Arc<dyn KeyValueStore>>,
        browser: BrowserProfile,
        policy: Option<ConfirmationPolicy>,
        #[builder(default)] events: AuthEvents,
        #[builder(into, default = DEFAULT_DESTINATION.to_string())] destination: String,
        #[builder(default = DEFAULT_BLOCKED_REDIRECT_DELAY)] blocked_redirect_delay: Duration,
    ) -> Self {
        let policy = policy.unwrap_or_else(|| select_policy(&browser).clone());
        let (state, _) = watch::channel(AuthAttemptState::new(policy.max_retries));
        Self {
            identity,
            limiter,
            durable: durable_store,
            session: session_store,
            events,
            browser,
            policy,
            destination,
            blocked_redirect_delay,
            running: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            state,
        }
    }
}

/// Result of the session phase of one attempt.
enum SessionCheck {
    Verified { user_id: String },
    /// The policy allowed moving on without a verified session; `cause` is
    /// why it could not be verified.
    Unverified {
        user_id: Option<String>,
        cause: IdentityError,
    },
    NotYet(IdentityError),
}

struct Confirmation {
    profile: Profile,
    unverified_session: bool,
}

impl ConfirmationMachine {
    pub fn policy(&self) -> &ConfirmationPolicy {
        &self.policy
    }

    pub fn browser(&self) -> &BrowserProfile {
        &self.browser
    }

    pub fn events(&self) -> &AuthEvents {
        &self.events
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> AuthAttemptState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthAttemptState> {
        self.state.subscribe()
    }

    pub fn state_stream(&self) -> WatchStream<AuthAttemptState> {
        WatchStream::new(self.state.subscribe())
    }

    /// Token cancelled on [`teardown`](Self::teardown) or drop.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the running cycle and refuse new ones. Pending timers are dropped.
    pub fn teardown(&self) {
        self.cancel.cancel();
    }

    /// Run one confirmation cycle.
    ///
    /// Identity errors never surface here; they drive retries and end up
    /// classified in [`ConfirmationOutcome::Failed`]. Calling `run` again
    /// after a terminal failure is the manual retry.
    ///
    /// # Errors
    /// [`LandingError::AlreadyRunning`] if a cycle is in flight, or a storage
    /// error from the attempt limiter.
    pub async fn run(&self) -> Result<ConfirmationOutcome> {
        let _guard = RunGuard::acquire(&self.running).ok_or(LandingError::AlreadyRunning)?;
        if self.cancel.is_cancelled() {
            return Ok(ConfirmationOutcome::Cancelled { retry_count: 0 });
        }
        self.state
            .send_replace(AuthAttemptState::new(self.policy.max_retries));

        if !self.limiter.record_attempt()? {
            return Ok(self.block());
        }

        tracing::debug!(
            policy = self.policy.name,
            browser = %self.browser.browser,
            os = %self.browser.os,
            max_retries = self.policy.max_retries,
            "Starting OAuth confirmation"
        );

        match with_timeout(self.policy.hard_timeout, self.drive()).await {
            Ok(outcome) => Ok(outcome),
            Err(timed_out) => {
                tracing::warn!(error = %timed_out, policy = self.policy.name, "OAuth confirmation hit hard timeout");
                let retry_count = self.state.borrow().retry_count;
                Ok(self.fail(TerminalErrorKind::Timeout, retry_count))
            }
        }
    }

    /// Escape hatch offered after a failure: give up on confirmation and go
    /// to the landing destination.
    pub fn continue_anyway(&self) -> Result<String> {
        if self.running.load(Ordering::Acquire) {
            return Err(LandingError::AlreadyRunning);
        }
        let state = self.state.borrow().state;
        if state != ConfirmationState::Failed {
            return Err(LandingError::InvalidState(format!(
                "continue is only offered after a failure (state: {state})"
            )));
        }
        self.clear_markers();
        tracing::info!(destination = %self.destination, "Continuing without confirmed sign-in");
        Ok(self.destination.clone())
    }

    async fn drive(&self) -> ConfirmationOutcome {
        let initial = self.policy.phase_delays.initial;
        if !initial.is_zero() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return ConfirmationOutcome::Cancelled { retry_count: 0 },
                _ = tokio::time::sleep(initial) => {}
            }
        }

        let polled = self
            .policy
            .retry_policy()
            .poll(
                &self.cancel,
                |retry| self.attempt(retry),
                |next_retry, delay| self.enter_retry_waiting(next_retry, delay),
            )
            .await;

        match polled {
            Ok(Polled { value, retries }) => self.confirm(value, retries),
            Err(PollError::Exhausted {
                retries,
                last_error,
            }) => {
                let kind = last_error
                    .as_ref()
                    .map_or(TerminalErrorKind::General, IdentityError::terminal_kind);
                self.fail(kind, retries)
            }
            Err(PollError::Cancelled) => {
                let retry_count = self.state.borrow().retry_count;
                tracing::debug!(retry_count, "OAuth confirmation cancelled");
                ConfirmationOutcome::Cancelled { retry_count }
            }
        }
    }

    /// session check → (account check) → profile lookup.
    async fn attempt(&self, retry: u32) -> Attempt<Confirmation, IdentityError> {
        self.state.send_modify(|s| {
            s.state = ConfirmationState::CheckingSession;
            s.retry_count = retry;
            s.seconds_until_next_retry = None;
            s.session_confirmed = false;
            s.unverified_session = false;
        });

        let (user_id, unverified_cause) = match self.check_session(retry).await {
            SessionCheck::Verified { user_id } => {
                self.state.send_modify(|s| s.session_confirmed = true);
                let settle = self.policy.phase_delays.post_confirmation;
                if !settle.is_zero() {
                    tokio::time::sleep(settle).await;
                }
                (Some(user_id), None)
            }
            SessionCheck::Unverified { user_id, cause } => {
                self.state.send_modify(|s| s.unverified_session = true);
                (user_id, Some(cause))
            }
            SessionCheck::NotYet(err) => return Attempt::NotYet(Some(err)),
        };

        self.state
            .send_modify(|s| s.state = ConfirmationState::CheckingUser);
        let Some(user_id) = user_id else {
            tracing::debug!(retry, "No user id to look up without a verified session");
            return Attempt::NotYet(unverified_cause);
        };

        match self.identity.get_profile_by_user_id(&user_id).await {
            Ok(Some(profile)) => Attempt::Ready(Confirmation {
                profile,
                unverified_session: unverified_cause.is_some(),
            }),
            Ok(None) => {
                tracing::debug!(retry, %user_id, "Profile not visible yet");
                Attempt::NotYet(unverified_cause)
            }
            Err(err) => {
                tracing::debug!(retry, error = %err, "Profile lookup failed");
                Attempt::NotYet(Some(err))
            }
        }
    }

    async fn check_session(&self, retry: u32) -> SessionCheck {
        let session = self.identity.get_current_session().await;

        let (hint, error) = if self.policy.require_account_confirmation {
            let pre_check = self.policy.phase_delays.pre_check;
            if !pre_check.is_zero() {
                tokio::time::sleep(pre_check).await;
            }
            match (session, self.identity.get_current_account().await) {
                (_, Ok(account)) => return SessionCheck::Verified { user_id: account.id },
                (Ok(session), Err(err)) => {
                    tracing::debug!(retry, error = %err, "Session visible without account; not trusted alone");
                    (Some(session.user_id), err)
                }
                (Err(err), Err(_)) => (None, err),
            }
        } else {
            match session {
                Ok(session) => {
                    return SessionCheck::Verified {
                        user_id: session.user_id,
                    }
                }
                Err(err) => (None, err),
            }
        };

        tracing::debug!(
            retry,
            kind = %error.failure_kind(),
            error = %error,
            "Session not confirmed"
        );

        if self.policy.allows_unverified_session(retry) {
            let user_id = match hint {
                Some(user_id) => Some(user_id),
                None => self.fallback_user_id().await,
            };
            tracing::warn!(
                retry,
                policy = self.policy.name,
                has_user = user_id.is_some(),
                "Proceeding to profile lookup without a verified session"
            );
            return SessionCheck::Unverified {
                user_id,
                cause: error,
            };
        }

        SessionCheck::NotYet(error)
    }

    /// User id of the session the redirect just created, when the service
    /// still lists it. Ids remembered from earlier sign-ins are not evidence.
    async fn fallback_user_id(&self) -> Option<String> {
        match self.identity.list_sessions().await {
            Ok(sessions) => sessions
                .into_iter()
                .find(|s| s.current)
                .map(|s| s.user_id),
            Err(err) => {
                tracing::debug!(error = %err, "Session listing failed");
                None
            }
        }
    }

    fn enter_retry_waiting(&self, next_retry: u32, delay: Duration) {
        tracing::debug!(
            next_retry,
            max_retries = self.policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            "Waiting before next confirmation attempt"
        );
        self.state.send_modify(|s| {
            s.state = ConfirmationState::RetryWaiting;
            s.seconds_until_next_retry = Some(delay.as_secs_f64().ceil() as u64);
        });
    }

    fn confirm(&self, confirmation: Confirmation, retry_count: u32) -> ConfirmationOutcome {
        let Confirmation {
            profile,
            unverified_session,
        } = confirmation;

        self.state.send_modify(|s| {
            s.state = ConfirmationState::Confirmed;
            s.retry_count = retry_count;
            s.user_confirmed = true;
            s.seconds_until_next_retry = None;
        });

        if let Err(err) = self.limiter.reset_on_success() {
            tracing::warn!(error = %err, "Could not reset OAuth attempt counter");
        }
        if let Err(err) = self.durable.set(keys::USER_ID, &profile.user_id) {
            tracing::warn!(error = %err, "Could not persist user id");
        }
        self.clear_markers();
        self.events.notify(Some(profile.clone()));

        tracing::info!(
            retry_count,
            unverified_session,
            user_id = %profile.user_id,
            policy = self.policy.name,
            "OAuth sign-in confirmed"
        );
        ConfirmationOutcome::Confirmed {
            profile,
            retry_count,
            unverified_session,
            destination: self.destination.clone(),
        }
    }

    fn fail(&self, error: TerminalErrorKind, retry_count: u32) -> ConfirmationOutcome {
        self.state.send_modify(|s| {
            s.state = ConfirmationState::Failed;
            s.retry_count = retry_count;
            s.seconds_until_next_retry = None;
            s.terminal_error = Some(error);
        });
        self.clear_markers();
        tracing::info!(%error, retry_count, policy = self.policy.name, "OAuth confirmation failed");
        ConfirmationOutcome::Failed {
            error,
            retry_count,
            suggestion: error.recovery_suggestion(),
        }
    }

    fn block(&self) -> ConfirmationOutcome {
        self.state
            .send_modify(|s| s.state = ConfirmationState::Blocked);
        self.clear_markers();
        tracing::info!(
            redirect_after_ms = self.blocked_redirect_delay.as_millis() as u64,
            "Too many OAuth attempts; not confirming"
        );
        ConfirmationOutcome::Blocked {
            redirect_after: self.blocked_redirect_delay,
            destination: self.destination.clone(),
        }
    }

    fn clear_markers(&self) {
        if let Some(session) = &self.session {
            if let Err(err) = clear_markers(session.as_ref()) {
                tracing::warn!(error = %err, "Could not clear OAuth markers");
            }
        }
    }
}

impl Drop for ConfirmationMachine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Reentrancy guard: at most one cycle per machine.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
