//! Relay pool abstraction and its nostr-sdk implementation
//!
//! The connection manager only talks to the traits in this module, which
//! lets tests drive it with an in-memory pool. [`NostrSdkPoolFactory`] is the
//! production implementation on top of `nostr_sdk::Client`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nostr_sdk::prelude::*;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{NostrClientError, Result};
use crate::event::ProtocolEvent;
use crate::filters::{SubscriptionFilter, SubscriptionRequest};

// ----------------------------------------------------------------------------
// Pool Traits
// ----------------------------------------------------------------------------

/// Low-level callbacks a pool invokes for one subscription
pub trait SubscriptionCallbacks: Send + Sync {
    fn on_event(&self, relay_url: &str, event: ProtocolEvent);
    fn on_eose(&self, relay_url: &str);
    fn on_close(&self, relay_url: &str, reason: &str);
}

/// An active multiplexed subscription
#[async_trait]
pub trait Subscription: Send + Sync {
    async fn close(&self) -> Result<()>;
}

/// A set of relay connections that can carry one logical subscription
#[async_trait]
pub trait RelayPool: Send + Sync {
    /// Subscribe every (relay, filter) pair and report through `callbacks`
    async fn subscribe_many(
        &self,
        requests: Vec<SubscriptionRequest>,
        callbacks: Arc<dyn SubscriptionCallbacks>,
    ) -> Result<Box<dyn Subscription>>;

    /// Disconnect from every relay
    async fn close(&self) -> Result<()>;
}

/// Builds pools for the connection manager
#[async_trait]
pub trait PoolFactory: Send + Sync {
    async fn create(&self, relays: &[String], keys: &Keys) -> Result<Arc<dyn RelayPool>>;
}

// ----------------------------------------------------------------------------
// nostr-sdk Implementation
// ----------------------------------------------------------------------------

/// Creates [`NostrSdkPool`]s
#[derive(Debug, Clone)]
pub struct NostrSdkPoolFactory {
    /// Grace period for the initial websocket handshakes
    pub connect_wait: Duration,
}

impl Default for NostrSdkPoolFactory {
    fn default() -> Self {
        Self {
            connect_wait: Duration::from_secs(2),
        }
    }
}

#[async_trait]
impl PoolFactory for NostrSdkPoolFactory {
    async fn create(&self, relays: &[String], keys: &Keys) -> Result<Arc<dyn RelayPool>> {
        let client = Client::new(keys);

        let mut added = 0usize;
        for relay_url in relays {
            let url = match Url::parse(relay_url) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Skipping invalid relay URL {}: {}", relay_url, e);
                    continue;
                }
            };
            match client.add_relay(url).await {
                Ok(_) => {
                    added += 1;
                    debug!("Added relay: {}", relay_url);
                }
                Err(e) => warn!("Failed to add relay {}: {}", relay_url, e),
            }
        }

        if added == 0 {
            return Err(NostrClientError::PoolConstruction(
                "no relay could be added".to_string(),
            ));
        }

        client.connect().await;
        sleep(self.connect_wait).await;

        info!("Relay pool initialized with {} relays", added);
        Ok(Arc::new(NostrSdkPool { client }))
    }
}

/// Relay pool backed by a `nostr_sdk::Client`
pub struct NostrSdkPool {
    client: Client,
}

impl NostrSdkPool {
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn to_sdk_filter(filter: &SubscriptionFilter) -> Result<Filter> {
    let mut sdk_filter = Filter::new().kinds(filter.kinds.iter().map(|k| Kind::from(*k)));
    if !filter.p_tags.is_empty() {
        let pubkeys = filter
            .p_tags
            .iter()
            .map(PublicKey::from_hex)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        sdk_filter = sdk_filter.pubkeys(pubkeys);
    }
    Ok(sdk_filter)
}

#[async_trait]
impl RelayPool for NostrSdkPool {
    async fn subscribe_many(
        &self,
        requests: Vec<SubscriptionRequest>,
        callbacks: Arc<dyn SubscriptionCallbacks>,
    ) -> Result<Box<dyn Subscription>> {
        // The client fans every filter out to all of its relays, so the
        // request set collapses to its distinct filters.
        let mut distinct: Vec<&SubscriptionFilter> = Vec::new();
        for request in &requests {
            if !distinct.contains(&&request.filter) {
                distinct.push(&request.filter);
            }
        }
        if distinct.is_empty() {
            return Err(NostrClientError::SubscriptionFailed(
                "empty request set".to_string(),
            ));
        }
        let filters = distinct
            .into_iter()
            .map(to_sdk_filter)
            .collect::<Result<Vec<_>>>()?;

        let mut notifications = self.client.notifications();
        let subscription_id = self.client.subscribe(filters, None).await;
        let watched_id = subscription_id.clone();

        let task = tokio::spawn(async move {
            loop {
                match notifications.recv().await {
                    Ok(RelayPoolNotification::Event {
                        relay_url,
                        subscription_id,
                        event,
                    }) => {
                        if subscription_id != watched_id {
                            continue;
                        }
                        match ProtocolEvent::from_json(&event.as_json()) {
                            Ok(event) => callbacks.on_event(relay_url.as_str(), event),
                            Err(e) => debug!("Dropping undecodable event from {}: {}", relay_url, e),
                        }
                    }
                    Ok(RelayPoolNotification::Message { relay_url, message }) => match message {
                        RelayMessage::EndOfStoredEvents(id) if id == watched_id => {
                            callbacks.on_eose(relay_url.as_str());
                        }
                        RelayMessage::Closed {
                            subscription_id,
                            message,
                        } if subscription_id == watched_id => {
                            callbacks.on_close(relay_url.as_str(), &message);
                        }
                        _ => {}
                    },
                    Ok(RelayPoolNotification::Shutdown) => {
                        info!("Relay pool shutdown");
                        callbacks.on_close("pool", "shutdown");
                        break;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Notification stream lagged, skipped {} messages", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        info!(
            "Subscribed {} request(s) as {}",
            requests.len(),
            subscription_id
        );

        Ok(Box::new(NostrSdkSubscription {
            client: self.client.clone(),
            id: subscription_id,
            task: Mutex::new(Some(task)),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.client.disconnect().await?;
        info!("Relay pool closed");
        Ok(())
    }
}

/// Subscription handle on a nostr-sdk client
pub struct NostrSdkSubscription {
    client: Client,
    id: SubscriptionId,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl Subscription for NostrSdkSubscription {
    async fn close(&self) -> Result<()> {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.abort();
        }
        self.client.unsubscribe(self.id.clone()).await;
        debug!("Closed subscription {}", self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_sdk_filter_rejects_bad_pubkey() {
        let filter = SubscriptionFilter::addressed_to(1, "not-hex");
        assert!(to_sdk_filter(&filter).is_err());
    }

    #[test]
    fn test_to_sdk_filter_accepts_valid_pubkey() {
        let keys = Keys::generate();
        let filter = SubscriptionFilter::addressed_to(9735, &keys.public_key().to_hex());
        assert!(to_sdk_filter(&filter).is_ok());
    }

    fn factory() -> NostrSdkPoolFactory {
        NostrSdkPoolFactory {
            connect_wait: Duration::from_millis(0),
        }
    }

    #[tokio::test]
    async fn test_factory_fails_when_no_relay_is_usable() {
        let relays = vec!["not a url".to_string(), "://".to_string()];
        let result = factory().create(&relays, &Keys::generate()).await;
        assert!(matches!(result, Err(NostrClientError::PoolConstruction(_))));
    }

    #[tokio::test]
    async fn test_factory_skips_invalid_urls() {
        let relays = vec!["not a url".to_string(), "ws://127.0.0.1:1".to_string()];
        let pool = factory()
            .create(&relays, &Keys::generate())
            .await
            .expect("one usable relay is enough");
        pool.close().await.ok();
    }
}
