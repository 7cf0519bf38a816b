//! Configuration for the relay connection manager

use nostr_sdk::{FromBech32, Keys, ToBech32};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::NostrClientError;

// ----------------------------------------------------------------------------
// Keys Serialization Helper Functions
// ----------------------------------------------------------------------------

fn serialize_keys<S>(keys: &Option<Keys>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match keys {
        Some(k) => {
            let nsec = k
                .secret_key()
                .map_err(serde::ser::Error::custom)?
                .to_bech32()
                .map_err(serde::ser::Error::custom)?;
            serializer.serialize_some(&nsec)
        }
        None => serializer.serialize_none(),
    }
}

fn deserialize_keys<'de, D>(deserializer: D) -> Result<Option<Keys>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt_string: Option<String> = Deserialize::deserialize(deserializer)?;
    match opt_string {
        Some(s) if s.starts_with("nsec") => {
            let secret_key = nostr_sdk::SecretKey::from_bech32(&s)
                .map_err(|e| serde::de::Error::custom(format!("Invalid secret key: {}", e)))?;
            Ok(Some(Keys::new(secret_key)))
        }
        Some(s) => {
            let secret_key = nostr_sdk::SecretKey::from_hex(&s)
                .map_err(|e| serde::de::Error::custom(format!("Invalid secret key: {}", e)))?;
            Ok(Some(Keys::new(secret_key)))
        }
        None => Ok(None),
    }
}

// ----------------------------------------------------------------------------
// Subscription Kinds
// ----------------------------------------------------------------------------

/// Which event categories the subscription asks relays for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionKinds {
    /// Text notes mentioning us
    pub text_notes: bool,
    /// NIP-04 encrypted direct messages
    pub direct_messages: bool,
    /// Reactions to our notes
    pub reactions: bool,
    /// NIP-59 gift-wrapped messages
    pub sealed_messages: bool,
    /// NIP-57 zap receipts
    pub zap_receipts: bool,
}

impl Default for SubscriptionKinds {
    fn default() -> Self {
        Self {
            text_notes: true,
            direct_messages: true,
            reactions: true,
            sealed_messages: true,
            zap_receipts: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Connection Configuration
// ----------------------------------------------------------------------------

/// Default public relays used when none are configured
pub const DEFAULT_RELAYS: [&str; 3] = [
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.nostr.band",
];

/// Configuration for the connection manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Relay URLs to subscribe through
    pub relays: Vec<String>,
    /// Event categories to subscribe to
    pub kinds: SubscriptionKinds,
    /// Seconds between health checks
    pub health_check_interval_secs: u64,
    /// Seconds without any event or EOSE before the connection is considered stale
    pub stale_threshold_secs: u64,
    /// Fixed wait between tearing down and rebuilding the pool
    pub reconnect_delay_ms: u64,
    /// Reconnection attempts before giving up for good
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff after a failed reconnection
    pub backoff_base_ms: u64,
    /// Upper bound on any single backoff delay
    pub max_backoff_secs: u64,
    /// Private key for the bot identity (nsec or hex)
    #[serde(
        serialize_with = "serialize_keys",
        deserialize_with = "deserialize_keys",
        skip_serializing_if = "Option::is_none"
    )]
    pub private_key: Option<Keys>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect(),
            kinds: SubscriptionKinds::default(),
            health_check_interval_secs: 60,
            stale_threshold_secs: 300,
            reconnect_delay_ms: 5_000,
            max_reconnect_attempts: 10,
            backoff_base_ms: 1_000,
            max_backoff_secs: 300,
            private_key: None,
        }
    }
}

impl ConnectionConfig {
    /// Create a configuration with a specific private key
    pub fn with_private_key(keys: Keys) -> Self {
        Self {
            private_key: Some(keys),
            ..Self::default()
        }
    }

    /// Create a configuration with a single relay (for local development)
    pub fn local_development() -> Self {
        Self {
            relays: vec!["ws://localhost:7777".to_string()],
            health_check_interval_secs: 15,
            stale_threshold_secs: 60,
            reconnect_delay_ms: 1_000,
            ..Self::default()
        }
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    /// Check relay URLs and timing values
    pub fn validate(&self) -> Result<(), NostrClientError> {
        for relay in &self.relays {
            let url = url::Url::parse(relay)
                .map_err(|_| NostrClientError::InvalidRelayUrl { url: relay.clone() })?;
            if url.scheme() != "ws" && url.scheme() != "wss" {
                return Err(NostrClientError::InvalidRelayUrl { url: relay.clone() });
            }
        }

        if self.health_check_interval_secs == 0 {
            return Err(NostrClientError::ConfigurationError(
                "Health check interval must be greater than 0".to_string(),
            ));
        }

        if self.stale_threshold_secs == 0 {
            return Err(NostrClientError::ConfigurationError(
                "Stale threshold must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
