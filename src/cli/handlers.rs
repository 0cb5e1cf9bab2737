//! CLI command handlers.

use std::path::Path;
use std::sync::Arc;

use crate::auth::{AttemptLimiter, ConfirmationOutcome};
use crate::browser::classify;
use crate::config::LandingConfig;
use crate::context::LandingContext;
use crate::error::Result;
use crate::policy::select_policy;
use crate::storage::FileStore;
use crate::util::clock::SystemClock;

use super::{AttemptsCommands, BrowserArgs, ConfirmArgs, OAuthUrlArgs};

/// File (if given) overlaid with `.env` and `OAUTH_LANDING_*`.
pub fn load_config(path: Option<&Path>) -> Result<LandingConfig> {
    let base = match path {
        Some(path) => LandingConfig::from_toml_file(path)?,
        None => LandingConfig::default(),
    };
    base.with_env()
}

/// Handle `oauth-landing classify <UA>`.
pub fn handle_classify(args: &BrowserArgs) -> Result<()> {
    let profile = classify(&args.user_agent, &args.hints());
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

/// Handle `oauth-landing policy <UA>`.
pub fn handle_policy(args: &BrowserArgs) -> Result<()> {
    let profile = classify(&args.user_agent, &args.hints());
    let policy = select_policy(&profile);
    println!("policy:              {}", policy.name);
    println!("browser:             {} on {}", profile.browser, profile.os);
    println!("max retries:         {}", policy.max_retries);
    println!("base delay:          {:?}", policy.base_delay);
    println!("backoff multiplier:  {}", policy.backoff_multiplier);
    println!("max delay:           {:?}", policy.max_delay);
    println!("initial delay:       {:?}", policy.phase_delays.initial);
    println!("pre-check delay:     {:?}", policy.phase_delays.pre_check);
    println!("post-confirm delay:  {:?}", policy.phase_delays.post_confirmation);
    println!("hard timeout:        {:?}", policy.hard_timeout);
    println!("account check:       {}", policy.require_account_confirmation);
    if let Some(after) = policy.unverified_session_fallback_after_retries {
        println!("unverified fallback: after {after} retries");
    }
    let schedule: Vec<String> = (0..policy.max_retries)
        .map(|retry| format!("{:?}", policy.delay_for(retry)))
        .collect();
    println!("retry delays:        [{}]", schedule.join(", "));
    Ok(())
}

/// Handle `oauth-landing attempts status|record|reset`.
pub fn handle_attempts(config: &LandingConfig, command: &AttemptsCommands) -> Result<()> {
    let store = Arc::new(FileStore::new(config.storage()));
    let limiter = AttemptLimiter::new(store, Arc::new(SystemClock), config.limiter_settings());

    match command {
        AttemptsCommands::Status => {}
        AttemptsCommands::Record => {
            if limiter.record_attempt()? {
                println!("Attempt recorded.");
            } else {
                println!("Attempt recorded; limit exceeded.");
            }
        }
        AttemptsCommands::Reset => {
            limiter.reset_on_success()?;
            println!("Attempt counter cleared.");
        }
    }

    let status = limiter.status()?;
    println!(
        "attempts: {}/{} (remaining {}){}",
        status.attempts_in_window,
        status.max_attempts_per_window,
        status.remaining(),
        if status.is_blocked() { " BLOCKED" } else { "" }
    );
    if let Some(expires_at) = status
        .window_expires_at_ms
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
    {
        println!("window ends: {}", expires_at.to_rfc3339());
    }
    Ok(())
}

/// Handle `oauth-landing oauth-url <UA>`.
pub fn handle_oauth_url(config: LandingConfig, args: &OAuthUrlArgs) -> Result<()> {
    let context = LandingContext::from_config(config)?;
    let start = context
        .flow()?
        .begin(&args.provider, &args.browser.user_agent, &args.browser.hints())?;
    println!("{}", start.url);
    Ok(())
}

/// Handle `oauth-landing confirm <UA>`.
pub async fn handle_confirm(config: LandingConfig, args: &ConfirmArgs) -> Result<()> {
    let context = LandingContext::from_config_with_cookie(config, args.cookie.clone())?;

    let browser = classify(&args.browser.user_agent, &args.browser.hints());
    let machine = context.machine_for(browser);
    println!("Using policy {}", machine.policy().name);

    let mut updates = machine.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            match state.seconds_until_next_retry {
                Some(secs) => eprintln!(
                    "  {} (retry {}/{}, next in {secs}s)",
                    state.state, state.retry_count, state.max_retries
                ),
                None => eprintln!(
                    "  {} (retry {}/{})",
                    state.state, state.retry_count, state.max_retries
                ),
            }
        }
    });

    let outcome = machine.run().await;
    drop(machine);
    let _ = printer.await;

    match outcome? {
        ConfirmationOutcome::Confirmed {
            profile,
            retry_count,
            unverified_session,
            destination,
        } => {
            let name = profile
                .display_name
                .or(profile.username)
                .unwrap_or_else(|| profile.user_id.clone());
            println!("Signed in as {name} after {retry_count} retries.");
            if unverified_session {
                println!("Session could not be verified directly.");
            }
            println!("Continue to {destination}");
        }
        ConfirmationOutcome::Failed {
            error,
            retry_count,
            suggestion,
        } => {
            println!("Sign-in not confirmed after {retry_count} retries: {error}");
            println!("Suggestion: {suggestion}");
        }
        ConfirmationOutcome::Blocked {
            redirect_after,
            destination,
        } => {
            println!("Too many sign-in attempts. Redirecting to {destination} in {redirect_after:?}.");
        }
        ConfirmationOutcome::Cancelled { .. } => println!("Cancelled."),
    }
    Ok(())
}
