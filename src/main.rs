//! oauth-landing CLI binary entry point.

use clap::Parser;
use oauth_landing::cli::{handlers, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("oauth_landing=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> oauth_landing::error::Result<()> {
    match cli.command {
        Commands::Classify(args) => handlers::handle_classify(&args),
        Commands::Policy(args) => handlers::handle_policy(&args),
        Commands::Attempts(args) => {
            let config = handlers::load_config(cli.config.as_deref())?;
            handlers::handle_attempts(&config, &args.command)
        }
        Commands::OauthUrl(args) => {
            let config = handlers::load_config(cli.config.as_deref())?;
            handlers::handle_oauth_url(config, &args)
        }
        Commands::Confirm(args) => {
            let config = handlers::load_config(cli.config.as_deref())?;
            handlers::handle_confirm(config, &args).await
        }
    }
}
