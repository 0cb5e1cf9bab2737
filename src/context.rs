//! Wiring of the collaborators a landing page needs.

use std::sync::Arc;

use crate::auth::{AttemptLimiter, AuthEvents, ConfirmationMachine, OAuthFlow, OAuthUrlBuilder};
use crate::browser::BrowserProfile;
use crate::config::LandingConfig;
use crate::error::{LandingError, Result};
use crate::identity::{HttpIdentityService, IdentityService};
use crate::storage::{FileStore, KeyValueStore, MemoryStore};
use crate::util::clock::{Clock, SystemClock};

/// Shared collaborators: identity client, stores, limiter and events.
#[derive(Clone)]
pub struct LandingContext {
    config: LandingConfig,
    identity: Arc<dyn IdentityService>,
    durable: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    limiter: Arc<AttemptLimiter>,
    events: AuthEvents,
}

impl std::fmt::Debug for LandingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LandingContext")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl LandingContext {
    /// HTTP identity client plus a file-backed durable store from `config`.
    ///
    /// # Errors
    /// [`LandingError::ContextUnavailable`] when the identity endpoint or
    /// project is not configured.
    pub fn from_config(config: LandingConfig) -> Result<Self> {
        Self::from_config_with_cookie(config, None)
    }

    /// Like [`LandingContext::from_config`], but identity requests carry
    /// `session_cookie` when one is given.
    pub fn from_config_with_cookie(
        config: LandingConfig,
        session_cookie: Option<String>,
    ) -> Result<Self> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            LandingError::ContextUnavailable("identity endpoint is not configured".to_string())
        })?;
        let project_id = config.project_id.clone().ok_or_else(|| {
            LandingError::ContextUnavailable("identity project id is not configured".to_string())
        })?;

        let mut identity = HttpIdentityService::new(endpoint, project_id, config.request_timeout())?
            .with_profile_collection(config.profile_collection.clone());
        if let Some(cookie) = session_cookie {
            identity = identity.with_session_cookie(cookie);
        }
        let durable = Arc::new(FileStore::new(config.storage()));

        Ok(Self::with_parts(
            config,
            Arc::new(identity),
            durable,
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
        ))
    }

    /// Assemble from explicit collaborators.
    pub fn with_parts(
        config: LandingConfig,
        identity: Arc<dyn IdentityService>,
        durable: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let limiter = Arc::new(AttemptLimiter::new(
            durable.clone(),
            clock.clone(),
            config.limiter_settings(),
        ));
        Self {
            config,
            identity,
            durable,
            session,
            clock,
            limiter,
            events: AuthEvents::default(),
        }
    }

    pub fn config(&self) -> &LandingConfig {
        &self.config
    }

    pub fn identity(&self) -> &Arc<dyn IdentityService> {
        &self.identity
    }

    pub fn limiter(&self) -> &Arc<AttemptLimiter> {
        &self.limiter
    }

    pub fn events(&self) -> &AuthEvents {
        &self.events
    }

    pub fn session_store(&self) -> &Arc<dyn KeyValueStore> {
        &self.session
    }

    pub fn durable_store(&self) -> &Arc<dyn KeyValueStore> {
        &self.durable
    }

    /// Start/landing helpers over the session store.
    pub fn flow(&self) -> Result<OAuthFlow> {
        let endpoint = self.config.endpoint.clone().ok_or_else(|| {
            LandingError::ContextUnavailable("identity endpoint is not configured".to_string())
        })?;
        let project_id = self.config.project_id.clone().unwrap_or_default();
        let urls = OAuthUrlBuilder::new(
            endpoint,
            project_id,
            self.config.success_url.clone(),
            self.config.failure_url.clone(),
        );
        Ok(OAuthFlow::new(self.session.clone(), self.clock.clone(), urls)
            .with_marker_ttl(self.config.oauth_marker_ttl()))
    }

    /// A confirmation machine for one landing, using the policy for `browser`.
    pub fn machine_for(&self, browser: BrowserProfile) -> ConfirmationMachine {
        ConfirmationMachine::builder()
            .identity(self.identity.clone())
            .limiter(self.limiter.clone())
            .durable_store(self.durable.clone())
            .session_store(self.session.clone())
            .browser(browser)
            .events(self.events.clone())
            .destination(self.config.landing_destination.clone())
            .blocked_redirect_delay(self.config.blocked_redirect_delay())
            .build()
    }
}
