//! Shared test helpers: a scripted identity service and seeded stores.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use oauth_landing::auth::{AttemptLimiter, AuthEvents, ConfirmationMachine, LimiterSettings};
use oauth_landing::browser::{classify, ClientHints};
use oauth_landing::error::IdentityError;
use oauth_landing::identity::{Account, IdentityService, Profile, Session};
use oauth_landing::storage::MemoryStore;
use oauth_landing::util::clock::ManualClock;

pub const DESKTOP_CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";
pub const IOS_SAFARI: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";
pub const IOS_CHROME: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/123.0.6312.52 Mobile/15E148 Safari/604.1";
pub const MAC_SAFARI: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";
pub const ANDROID_CHROME: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Mobile Safari/537.36";
pub const ANDROID_FIREFOX: &str = "Mozilla/5.0 (Android 14; Mobile; rv:124.0) Gecko/124.0 Firefox/124.0";

/// Which identity call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Session,
    Account,
    ListSessions,
    Profile,
}

struct Script<T> {
    queue: VecDeque<Result<T, IdentityError>>,
    fallback: Option<Result<T, IdentityError>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            fallback: None,
        }
    }
}

impl<T: Clone> Script<T> {
    fn next(&mut self) -> Result<T, IdentityError> {
        self.queue
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Err(IdentityError::Network("unscripted call".to_string())))
    }
}

/// Identity service answering from per-call queues, then from a fallback reply.
#[derive(Default)]
pub struct ScriptedIdentity {
    sessions: Mutex<Script<Session>>,
    accounts: Mutex<Script<Account>>,
    listed: Mutex<Script<Vec<Session>>>,
    profiles: Mutex<Script<Option<Profile>>>,
    calls: Mutex<Vec<(Call, Instant)>>,
    profile_lookups: Mutex<Vec<String>>,
    hang_sessions: AtomicBool,
}

impl ScriptedIdentity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue_session(&self, reply: Result<Session, IdentityError>) {
        self.sessions.lock().unwrap().queue.push_back(reply);
    }

    pub fn always_session(&self, reply: Result<Session, IdentityError>) {
        self.sessions.lock().unwrap().fallback = Some(reply);
    }

    pub fn queue_account(&self, reply: Result<Account, IdentityError>) {
        self.accounts.lock().unwrap().queue.push_back(reply);
    }

    pub fn always_account(&self, reply: Result<Account, IdentityError>) {
        self.accounts.lock().unwrap().fallback = Some(reply);
    }

    pub fn always_list_sessions(&self, reply: Result<Vec<Session>, IdentityError>) {
        self.listed.lock().unwrap().fallback = Some(reply);
    }

    pub fn queue_profile(&self, reply: Result<Option<Profile>, IdentityError>) {
        self.profiles.lock().unwrap().queue.push_back(reply);
    }

    pub fn always_profile(&self, reply: Result<Option<Profile>, IdentityError>) {
        self.profiles.lock().unwrap().fallback = Some(reply);
    }

    /// Session checks never resolve.
    pub fn hang_sessions(&self) {
        self.hang_sessions.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(c, _)| *c).collect()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }

    pub fn call_times(&self, call: Call) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == call)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn profile_lookups(&self) -> Vec<String> {
        self.profile_lookups.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push((call, Instant::now()));
    }
}

#[async_trait]
impl IdentityService for ScriptedIdentity {
    async fn get_current_session(&self) -> Result<Session, IdentityError> {
        self.record(Call::Session);
        if self.hang_sessions.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.sessions.lock().unwrap().next()
    }

    async fn get_current_account(&self) -> Result<Account, IdentityError> {
        self.record(Call::Account);
        self.accounts.lock().unwrap().next()
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, IdentityError> {
        self.record(Call::ListSessions);
        self.listed.lock().unwrap().next()
    }

    async fn get_profile_by_user_id(&self, user_id: &str) -> Result<Option<Profile>, IdentityError> {
        self.record(Call::Profile);
        self.profile_lookups.lock().unwrap().push(user_id.to_string());
        self.profiles.lock().unwrap().next()
    }
}

pub fn session(user_id: &str) -> Session {
    Session {
        id: format!("session-{user_id}"),
        user_id: user_id.to_string(),
        provider: Some("google".to_string()),
        current: true,
        expire: None,
    }
}

pub fn account(user_id: &str) -> Account {
    Account {
        id: user_id.to_string(),
        name: Some("Test User".to_string()),
        email: Some("test@example.com".to_string()),
    }
}

pub fn profile(user_id: &str) -> Profile {
    Profile {
        id: format!("profile-{user_id}"),
        user_id: user_id.to_string(),
        username: Some("tester".to_string()),
        display_name: Some("Test User".to_string()),
        avatar_url: None,
    }
}

/// What a guest session gets back before the cookie is visible.
pub fn guest_error() -> IdentityError {
    IdentityError::Unauthorized {
        code: None,
        message: "User (role: guests) missing scope (account)".to_string(),
    }
}

pub fn cookie_error() -> IdentityError {
    IdentityError::Unauthorized {
        code: None,
        message: "Session cookie was not sent with the request".to_string(),
    }
}

/// Stores, clock and limiter around a [`ScriptedIdentity`].
pub struct Harness {
    pub identity: Arc<ScriptedIdentity>,
    pub durable: Arc<MemoryStore>,
    pub session: Arc<MemoryStore>,
    pub clock: ManualClock,
    pub limiter: Arc<AttemptLimiter>,
    pub events: AuthEvents,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(LimiterSettings::default())
    }

    pub fn with_settings(settings: LimiterSettings) -> Self {
        let durable = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(1_700_000_000_000);
        let limiter = Arc::new(AttemptLimiter::new(
            durable.clone(),
            Arc::new(clock.clone()),
            settings,
        ));
        Self {
            identity: ScriptedIdentity::new(),
            durable,
            session: Arc::new(MemoryStore::new()),
            clock,
            limiter,
            events: AuthEvents::default(),
        }
    }

    pub fn machine(&self, user_agent: &str) -> ConfirmationMachine {
        ConfirmationMachine::builder()
            .identity(self.identity.clone())
            .limiter(self.limiter.clone())
            .durable_store(self.durable.clone())
            .session_store(self.session.clone())
            .browser(classify(user_agent, &ClientHints::default()))
            .events(self.events.clone())
            .build()
    }
}

/// Paused-clock timers may round up to the next millisecond.
pub fn assert_elapsed(from: Instant, at: Instant, expected_ms: u64) {
    let actual = at.duration_since(from);
    let expected = Duration::from_millis(expected_ms);
    assert!(
        actual >= expected && actual <= expected + Duration::from_millis(5),
        "expected ~{expected:?}, got {actual:?}"
    );
}
