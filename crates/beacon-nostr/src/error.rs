//! Error types for the Nostr client core

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors raised by the relay pool, subscription and reconnection machinery
#[derive(Error, Debug)]
pub enum NostrClientError {
    #[error("Failed to construct relay pool: {0}")]
    PoolConstruction(String),

    #[error("Relay client error: {0}")]
    Client(#[from] nostr_sdk::client::Error),

    #[error("Key operation failed: {0}")]
    KeyOperationFailed(String),

    #[error("Invalid relay URL: {url}")]
    InvalidRelayUrl { url: String },

    #[error("No identity key configured")]
    MissingIdentity,

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Reconnection failed: {0}")]
    ReconnectFailed(String),

    #[error("Failed to decode event: {0}")]
    EventDecoding(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<nostr_sdk::key::Error> for NostrClientError {
    fn from(err: nostr_sdk::key::Error) -> Self {
        NostrClientError::KeyOperationFailed(err.to_string())
    }
}

/// Result type for core client operations
pub type Result<T> = std::result::Result<T, NostrClientError>;

/// Error returned by consumer-supplied event handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by consumer-supplied event handlers
pub type HandlerResult = std::result::Result<(), HandlerError>;
