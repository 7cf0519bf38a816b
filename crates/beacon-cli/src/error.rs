//! Error handling for the beacon CLI

use thiserror::Error;

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Relay client error: {0}")]
    Client(#[from] beacon_nostr::NostrClientError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not a zap receipt: kind {0}")]
    NotAZapReceipt(u16),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
