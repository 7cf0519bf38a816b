//! Beacon configuration management
//!
//! Configuration is layered with figment, lowest priority first:
//! - built-in defaults
//! - `beacon.toml` in the working directory
//! - the file passed with `--config`
//! - `BEACON_` environment variables, nested with `__`
//!   (`BEACON_CONNECTION__STALE_THRESHOLD_SECS=120`)

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use beacon_nostr::ConnectionConfig;

/// Default file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "beacon.toml";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "BEACON_";

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the beacon binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Relay connection and health monitoring
    pub connection: ConnectionConfig,

    /// Bot behaviour
    pub bot: BotConfig,
}

/// Bot behaviour settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Events older than this many seconds at startup are ignored
    pub backlog_secs: u64,

    /// Mention the zapper (`nostr:npub…`) in acknowledgments
    pub mention_zappers: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            backlog_secs: 3_600,
            mention_zappers: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE));

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate configuration
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::Loading(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
        }

        let config: AppConfig = Self::figment(config_path)
            .extract()
            .map_err(|e| ConfigError::Loading(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connection
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if self.connection.max_backoff_secs == 0 {
            return Err(ConfigError::Validation(
                "Maximum backoff must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Create example configuration file content
    pub fn example_config() -> String {
        let example = AppConfig {
            bot: BotConfig {
                backlog_secs: 600,
                mention_zappers: true,
            },
            ..Default::default()
        };

        match toml::to_string_pretty(&example) {
            Ok(body) => format!(
                "# Bot identity goes under [connection] as nsec or hex.\n\
                 # Without it the bot stays idle.\n\
                 #   private_key = \"nsec1...\"\n\n{}",
                body
            ),
            Err(_) => "# Failed to generate example config".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
