//! Command handlers for the beacon CLI

use std::path::Path;

use serde_json::json;
use tracing::info;

use beacon_nostr::{kind_label, ProtocolEvent, ZapReceipt, KIND_ZAP_RECEIPT};

use crate::app::{acknowledge_zap, BeaconApp};
use crate::cli::Commands;
use crate::config::AppConfig;
use crate::error::{CliError, Result};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(command: Commands, mut config: AppConfig) -> Result<()> {
        match command {
            Commands::Run { backlog_secs } => {
                if let Some(backlog_secs) = backlog_secs {
                    config.bot.backlog_secs = backlog_secs;
                }
                Self::handle_run_command(config).await
            }
            Commands::Config => {
                println!("{}", AppConfig::example_config());
                Ok(())
            }
            Commands::ParseZap { path } => {
                let report = Self::handle_parse_zap_command(&path, &config)?;
                println!("{}", report);
                Ok(())
            }
        }
    }

    async fn handle_run_command(config: AppConfig) -> Result<()> {
        info!(
            "Starting beacon on {} relay(s), backlog {}s",
            config.connection.relays.len(),
            config.bot.backlog_secs
        );
        BeaconApp::new(config).run().await
    }

    /// Decode a receipt file and render what the bot makes of it
    pub fn handle_parse_zap_command(path: &Path, config: &AppConfig) -> Result<String> {
        let raw = std::fs::read_to_string(path)?;
        let event = ProtocolEvent::from_json(&raw)?;
        if event.kind != KIND_ZAP_RECEIPT {
            return Err(CliError::NotAZapReceipt(event.kind));
        }

        let zap = ZapReceipt::parse(&event);
        let reply = acknowledge_zap(&event, config.bot.mention_zappers);
        let report = json!({
            "kind": kind_label(event.kind),
            "amount_msats": zap.amount_msats,
            "amount_sats": zap.amount_sats(),
            "sender_pubkey": zap.sender_pubkey,
            "target_event_id": zap.target_event_id,
            "reply": reply,
        });
        Ok(serde_json::to_string_pretty(&report)?)
    }
}
