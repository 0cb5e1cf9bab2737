//! CLI entry point for oauth-landing.

pub mod handlers;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::browser::ClientHints;

/// Inspect and drive the OAuth landing confirmation.
#[derive(Parser, Debug)]
#[command(name = "oauth-landing", version, about = "OAuth redirect-landing confirmation")]
pub struct Cli {
    /// TOML configuration file (environment variables still override it)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the browser profile for a user agent
    Classify(BrowserArgs),
    /// Print the confirmation policy selected for a user agent
    Policy(BrowserArgs),
    /// Inspect or change the global attempt counter
    Attempts(AttemptsArgs),
    /// Start an OAuth round-trip and print the provider URL
    OauthUrl(OAuthUrlArgs),
    /// Run one confirmation cycle against the identity service
    Confirm(ConfirmArgs),
}

/// User agent plus optional client hints.
#[derive(Args, Debug, Clone)]
pub struct BrowserArgs {
    /// User-agent string
    pub user_agent: String,

    /// `navigator.platform` value (e.g. MacIntel)
    #[arg(long)]
    pub platform: Option<String>,

    /// `navigator.maxTouchPoints` value
    #[arg(long, default_value_t = 0)]
    pub touch_points: u32,
}

impl BrowserArgs {
    pub fn hints(&self) -> ClientHints {
        ClientHints {
            platform: self.platform.clone(),
            max_touch_points: self.touch_points,
        }
    }
}

#[derive(Args, Debug)]
pub struct AttemptsArgs {
    #[command(subcommand)]
    pub command: AttemptsCommands,
}

#[derive(Subcommand, Debug)]
pub enum AttemptsCommands {
    /// Show the current window
    Status,
    /// Count one attempt
    Record,
    /// Clear the counter
    Reset,
}

#[derive(Args, Debug)]
pub struct OAuthUrlArgs {
    #[command(flatten)]
    pub browser: BrowserArgs,

    /// OAuth provider name
    #[arg(long, default_value = "google")]
    pub provider: String,
}

#[derive(Args, Debug)]
pub struct ConfirmArgs {
    #[command(flatten)]
    pub browser: BrowserArgs,

    /// Raw `Cookie` header carrying the identity session
    #[arg(long)]
    pub cookie: Option<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_classify_with_hints() {
        let cli = Cli::try_parse_from([
            "oauth-landing",
            "classify",
            "Mozilla/5.0 (Macintosh)",
            "--platform",
            "MacIntel",
            "--touch-points",
            "5",
        ])
        .unwrap();
        match cli.command {
            Commands::Classify(args) => {
                let hints = args.hints();
                assert_eq!(hints.platform.as_deref(), Some("MacIntel"));
                assert_eq!(hints.max_touch_points, 5);
            }
            other => panic!("expected Classify, got {other:?}"),
        }
    }

    #[test]
    fn parse_attempts_reset_with_global_config() {
        let cli = Cli::try_parse_from([
            "oauth-landing",
            "attempts",
            "reset",
            "--config",
            "landing.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("landing.toml")));
        match cli.command {
            Commands::Attempts(args) => assert!(matches!(args.command, AttemptsCommands::Reset)),
            other => panic!("expected Attempts, got {other:?}"),
        }
    }

    #[test]
    fn parse_oauth_url_defaults_to_google() {
        let cli = Cli::try_parse_from(["oauth-landing", "oauth-url", "ua"]).unwrap();
        match cli.command {
            Commands::OauthUrl(args) => {
                assert_eq!(args.provider, "google");
                assert_eq!(args.browser.touch_points, 0);
            }
            other => panic!("expected OauthUrl, got {other:?}"),
        }
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["oauth-landing"]).is_err());
    }

    #[test]
    fn parse_classify_missing_user_agent_is_error() {
        assert!(Cli::try_parse_from(["oauth-landing", "classify"]).is_err());
    }
}
