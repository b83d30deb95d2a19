use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use changeset_release::cli::Args;
use changeset_release::config::Config;
use changeset_release::github::GitHubClient;
use changeset_release::process::SystemRunner;
use changeset_release::releaser::Releaser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing, RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config_path = args.config_path()?;
    let mut config = Config::discover(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    config.merge_with_args(&args);
    config.validate()?;

    let context = args.to_context()?;
    let github_client = GitHubClient::new(&context.actor)
        .context("Failed to create GitHub client")?
        .with_retry_config(config.retry.to_retry_config());
    let runner = SystemRunner;

    let outcome = Releaser::new(config, context, &runner, &github_client)
        .run()
        .await
        .context("Release run failed")?;
    tracing::info!("Finished: {:?}", outcome);

    Ok(())
}
