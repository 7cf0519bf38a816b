//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use only a local relay (ws://localhost:7777)
    #[arg(long)]
    pub local_relay: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to the configured relays and answer events until interrupted
    Run {
        /// Ignore events older than this many seconds (overrides config)
        #[arg(short, long)]
        backlog_secs: Option<u64>,
    },
    /// Print an example configuration file
    Config,
    /// Decode a zap receipt from a JSON file and show the composed reply
    ParseZap {
        /// Path to the receipt event JSON
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::parse_from(["beacon", "-v", "--local-relay", "run", "--backlog-secs", "60"]);
        assert!(cli.verbose);
        assert!(cli.local_relay);
        assert!(matches!(cli.command, Commands::Run { backlog_secs: Some(60) }));
    }

    #[test]
    fn test_parse_zap_takes_path() {
        let cli = Cli::parse_from(["beacon", "--config", "bot.toml", "parse-zap", "receipt.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("bot.toml")));
        match cli.command {
            Commands::ParseZap { path } => assert_eq!(path, PathBuf::from("receipt.json")),
            _ => panic!("expected parse-zap"),
        }
    }
}
