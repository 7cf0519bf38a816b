//! The beacon bot application
//!
//! Wires an [`EventRouter`] into a [`ConnectionManager`], answers zaps with a
//! composed acknowledgment and keeps the subscription alive until ctrl-c.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use beacon_nostr::{
    compose, thanks_text, ConnectionManager, EventRouter, HandlerResult, HealthReport,
    IdentityEncoder, ManagerHooks, Nip19Encoder, NostrSdkPoolFactory, ProtocolEvent,
    SetupOptions, TagThreadResolver, ThanksPost, ThanksRequest, ThreadResolver, ZapReceipt,
};

use crate::config::AppConfig;
use crate::error::Result;

// ----------------------------------------------------------------------------
// Event Handlers
// ----------------------------------------------------------------------------

/// Parse a receipt and compose the reply the bot would post for it
pub fn acknowledge_zap(event: &ProtocolEvent, mention_zapper: bool) -> ThanksPost {
    let zap = ZapReceipt::parse(event);
    let text = thanks_text(zap.amount_msats);
    let encoder: Option<&dyn IdentityEncoder> = if mention_zapper {
        Some(&Nip19Encoder)
    } else {
        None
    };
    compose(ThanksRequest::from_receipt(&zap, &text), encoder)
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Router answering mentions, DMs, sealed messages and zaps
pub fn build_router(resolver: Arc<dyn ThreadResolver>, mention_zappers: bool) -> EventRouter {
    EventRouter::standard(
        move |event| {
            let thread = resolver.thread_root(event);
            info!(
                "Mention from {} in thread {}",
                short(&event.pubkey),
                thread.as_deref().map(short).unwrap_or("(new)")
            );
            Ok(())
        },
        |event| {
            info!("Encrypted DM from {} ({} bytes)", short(&event.pubkey), event.content.len());
            Ok(())
        },
        |event| {
            info!("Sealed message {}", short(&event.id));
            Ok(())
        },
        move |event| -> HandlerResult {
            let post = acknowledge_zap(event, mention_zappers);
            info!("Zap acknowledgment: {}", serde_json::to_string(&post)?);
            Ok(())
        },
    )
}

/// Logs every health check
struct LoggingHooks;

impl ManagerHooks for LoggingHooks {
    fn on_health_check(&self, report: &HealthReport) {
        debug!(
            "Health check: connected={} attempts={} last event {:?} ago",
            report.connected, report.reconnect_attempts, report.elapsed_since_event
        );
    }
}

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

/// Long-running bot
pub struct BeaconApp {
    config: AppConfig,
    manager: ConnectionManager,
    resolver: Arc<dyn ThreadResolver>,
}

impl BeaconApp {
    pub fn new(config: AppConfig) -> Self {
        let manager = ConnectionManager::new(
            config.connection.clone(),
            Arc::new(NostrSdkPoolFactory::default()),
        );
        let resolver: Arc<dyn ThreadResolver> = Arc::new(TagThreadResolver);

        manager.set_handlers(Arc::new(build_router(
            Arc::clone(&resolver),
            config.bot.mention_zappers,
        )));
        manager.set_hooks(Arc::new(LoggingHooks));

        Self {
            config,
            manager,
            resolver,
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Unix timestamp before which events are ignored
    pub fn message_cutoff(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        now.saturating_sub(self.config.bot.backlog_secs)
    }

    /// Connect, monitor and block until ctrl-c
    pub async fn run(&self) -> Result<()> {
        if self.config.connection.private_key.is_none() {
            warn!("No private key configured; set connection.private_key to receive events");
        }

        self.manager
            .setup(SetupOptions {
                message_cutoff: self.message_cutoff(),
                thread_resolver: Some(Arc::clone(&self.resolver)),
                home_feed: None,
            })
            .await;
        self.manager.start_monitoring();

        info!("Beacon running, press ctrl-c to stop");
        let signal = tokio::signal::ctrl_c().await;

        info!("Shutting down");
        self.manager.stop().await;
        signal?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_nostr::{ReplyParent, KIND_ZAP_RECEIPT};
    use serde_json::json;

    const SENDER: &str = "82341f882b6eabcd2ba7f1ef90aad961cf074af15b9ef44a09f9d2a8fbfbe6a2";

    fn zap_event() -> ProtocolEvent {
        let description = json!({ "pubkey": SENDER, "kind": 9734 }).to_string();
        serde_json::from_value(json!({
            "id": "receipt",
            "kind": KIND_ZAP_RECEIPT,
            "created_at": 1_700_000_000u64,
            "tags": [
                ["bolt11", "lnbc210n1pjxyz"],
                ["e", "zapped-note"],
                ["description", description],
            ],
        }))
        .unwrap()
    }

    #[test]
    fn test_acknowledge_zap_mentions_sender() {
        let post = acknowledge_zap(&zap_event(), true);
        assert!(post.text.contains("nostr:npub1"));
        assert_eq!(post.options.extra_p_tags, vec![SENDER.to_string()]);
        assert_eq!(post.parent, ReplyParent::Event { id: "zapped-note".to_string() });
    }

    #[test]
    fn test_acknowledge_zap_without_mention() {
        let post = acknowledge_zap(&zap_event(), false);
        assert!(!post.text.contains("nostr:"));
        assert!(post.options.extra_p_tags.is_empty());
        assert!(post.options.skip_reaction);
    }

    #[test]
    fn test_router_handles_bot_kinds() {
        let router = build_router(Arc::new(TagThreadResolver), true);
        assert_eq!(router.kinds(), vec![1, 4, 1059, 9735]);
        assert!(router.dispatch(&zap_event()).is_ok());
    }

    #[test]
    fn test_message_cutoff_respects_backlog() {
        let mut config = AppConfig::default();
        config.bot.backlog_secs = u64::MAX;
        let app = BeaconApp::new(config);
        assert_eq!(app.message_cutoff(), 0);
        assert!(!app.manager().is_connected());
    }
}
