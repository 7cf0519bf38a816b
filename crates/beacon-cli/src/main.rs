//! beacon: Nostr bot runner

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use beacon_cli::{cli::Cli, commands::CommandDispatcher, config::AppConfig};
use beacon_nostr::ConnectionConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    if cli.local_relay {
        config.connection.relays = ConnectionConfig::local_development().relays;
    }

    CommandDispatcher::execute(cli.command, config)
        .await
        .context("command failed")?;

    info!("beacon exited");
    Ok(())
}

/// Setup logging from `RUST_LOG`, falling back to the verbosity flag
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
