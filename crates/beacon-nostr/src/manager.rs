//! Self-healing relay connection manager
//!
//! The manager owns the relay pool and the one logical subscription running
//! over it. Every inbound event refreshes a watermark before it is handed to
//! the consumer's handler table. A timer task compares the watermark against
//! the staleness threshold and, when the stream has gone quiet, tears the
//! pool down and asks the reconnect hook to rebuild it, backing off
//! exponentially between failed attempts until the attempt budget runs out.
//!
//! Nothing here propagates errors to the caller: pool construction, teardown
//! and handler failures are logged and absorbed. Exhausting the attempt
//! budget is the one deliberate halt.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{NostrClientError, Result};
use crate::event::ProtocolEvent;
use crate::filters::{build_filters, cross_product};
use crate::handlers::{EventHandlers, NoopHandlers, ThreadResolver};
use crate::pool::{PoolFactory, RelayPool, Subscription, SubscriptionCallbacks};

// ----------------------------------------------------------------------------
// Hooks
// ----------------------------------------------------------------------------

/// Starts the bot's home feed once a subscription is live
#[async_trait]
pub trait HomeFeed: Send + Sync {
    async fn start(&self, pool: Arc<dyn RelayPool>) -> Result<()>;
}

/// Lifecycle hooks for the manager's owner
#[async_trait]
pub trait ManagerHooks: Send + Sync {
    /// Observability only; never influences control flow
    fn on_health_check(&self, _report: &HealthReport) {}

    /// Rebuild the connection after a teardown
    ///
    /// The default re-runs [`ConnectionManager::setup`] with the last options
    /// and fails if that left the manager without a live subscription.
    async fn on_reconnect(&self, manager: &ConnectionManager) -> Result<()> {
        manager.setup(manager.setup_options()).await;
        if manager.is_connected() {
            Ok(())
        } else {
            Err(NostrClientError::ReconnectFailed(
                "no live subscription after setup".to_string(),
            ))
        }
    }
}

/// Hooks with default behaviour only
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl ManagerHooks for DefaultHooks {}

// ----------------------------------------------------------------------------
// Setup Options and Health Report
// ----------------------------------------------------------------------------

/// Per-setup parameters
#[derive(Clone, Default)]
pub struct SetupOptions {
    /// Events created before this unix timestamp are dropped
    pub message_cutoff: u64,
    /// Thread resolver made available to handlers
    pub thread_resolver: Option<Arc<dyn ThreadResolver>>,
    /// Feed started after the subscription is live
    pub home_feed: Option<Arc<dyn HomeFeed>>,
}

impl SetupOptions {
    pub fn with_cutoff(message_cutoff: u64) -> Self {
        Self {
            message_cutoff,
            ..Self::default()
        }
    }
}

/// Snapshot of the connection health
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub connected: bool,
    pub monitoring: bool,
    pub reconnect_attempts: u32,
    pub elapsed_since_event: Duration,
}

// ----------------------------------------------------------------------------
// Health State
// ----------------------------------------------------------------------------

struct HealthState {
    last_event_received_at: Mutex<Instant>,
    reconnect_attempts: AtomicU32,
}

impl HealthState {
    fn new() -> Self {
        Self {
            last_event_received_at: Mutex::new(Instant::now()),
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    /// Move the watermark to now; never backwards
    fn touch(&self) {
        let now = Instant::now();
        let mut watermark = self.last_event_received_at.lock();
        if now > *watermark {
            *watermark = now;
        }
    }

    fn elapsed(&self) -> Duration {
        self.last_event_received_at.lock().elapsed()
    }
}

type HandlerSlot = Arc<RwLock<Arc<dyn EventHandlers>>>;

/// Callbacks registered with the pool
struct SubscriptionSink {
    health: Arc<HealthState>,
    handlers: HandlerSlot,
    message_cutoff: u64,
}

impl SubscriptionSink {
    fn current_handlers(&self) -> Arc<dyn EventHandlers> {
        Arc::clone(&self.handlers.read())
    }
}

impl SubscriptionCallbacks for SubscriptionSink {
    fn on_event(&self, relay_url: &str, event: ProtocolEvent) {
        self.health.touch();

        if event.created_at < self.message_cutoff {
            debug!("Skipping old event {} from {}", event.id, relay_url);
            return;
        }

        debug!("{} via {}", event.summary(), relay_url);

        if let Err(e) = self.current_handlers().on_event(&event) {
            warn!("Event handler failed for {} (kind {}): {}", event.id, event.kind, e);
        }
    }

    fn on_eose(&self, relay_url: &str) {
        self.health.touch();
        debug!("End of stored events from {}", relay_url);

        if let Err(e) = self.current_handlers().on_eose() {
            warn!("EOSE handler failed: {}", e);
        }
    }

    fn on_close(&self, relay_url: &str, reason: &str) {
        info!("Subscription closed by {}: {}", relay_url, reason);

        if let Err(e) = self.current_handlers().on_close(reason) {
            warn!("Close handler failed: {}", e);
        }
    }
}

// ----------------------------------------------------------------------------
// Connection Manager
// ----------------------------------------------------------------------------

#[derive(Default)]
struct Connection {
    pool: Option<Arc<dyn RelayPool>>,
    subscription: Option<Box<dyn Subscription>>,
}

struct ManagerInner {
    config: ConnectionConfig,
    factory: Arc<dyn PoolFactory>,
    handlers: HandlerSlot,
    hooks: RwLock<Arc<dyn ManagerHooks>>,
    health: Arc<HealthState>,
    connection: Mutex<Connection>,
    options: Mutex<SetupOptions>,
    health_timer: Mutex<Option<JoinHandle<()>>>,
    retry_timer: Mutex<Option<JoinHandle<()>>>,
}

/// Keeps one subscription alive across relay churn
///
/// Cloning is cheap and yields another handle to the same manager.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    /// Create an idle manager; call [`setup`](Self::setup) to connect
    pub fn new(config: ConnectionConfig, factory: Arc<dyn PoolFactory>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                config,
                factory,
                handlers: Arc::new(RwLock::new(Arc::new(NoopHandlers))),
                hooks: RwLock::new(Arc::new(DefaultHooks)),
                health: Arc::new(HealthState::new()),
                connection: Mutex::new(Connection::default()),
                options: Mutex::new(SetupOptions::default()),
                health_timer: Mutex::new(None),
                retry_timer: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Replace the handler table; takes effect from the next callback
    pub fn set_handlers(&self, handlers: Arc<dyn EventHandlers>) {
        *self.inner.handlers.write() = handlers;
    }

    pub fn set_hooks(&self, hooks: Arc<dyn ManagerHooks>) {
        *self.inner.hooks.write() = hooks;
    }

    /// Options passed to the most recent setup
    pub fn setup_options(&self) -> SetupOptions {
        self.inner.options.lock().clone()
    }

    pub fn thread_resolver(&self) -> Option<Arc<dyn ThreadResolver>> {
        self.inner.options.lock().thread_resolver.clone()
    }

    pub fn is_connected(&self) -> bool {
        let connection = self.inner.connection.lock();
        connection.pool.is_some() && connection.subscription.is_some()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.health.reconnect_attempts.load(Ordering::SeqCst)
    }

    pub fn is_monitoring(&self) -> bool {
        Self::timer_pending(&self.inner.health_timer)
    }

    /// Whether a backoff retry is waiting to fire
    pub fn has_pending_retry(&self) -> bool {
        Self::timer_pending(&self.inner.retry_timer)
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            connected: self.is_connected(),
            monitoring: self.is_monitoring(),
            reconnect_attempts: self.reconnect_attempts(),
            elapsed_since_event: self.inner.health.elapsed(),
        }
    }

    fn timer_pending(slot: &Mutex<Option<JoinHandle<()>>>) -> bool {
        slot.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Build the pool and open the subscription
    ///
    /// Leaves the manager idle, without failing, when there are no relays, no
    /// identity key, or the pool cannot be built. A previous connection is
    /// torn down first.
    pub async fn setup(&self, options: SetupOptions) {
        self.teardown_connection().await;
        *self.inner.options.lock() = options.clone();

        let config = &self.inner.config;
        if config.relays.is_empty() {
            info!("No relays configured, connection manager stays idle");
            return;
        }
        let Some(keys) = config.private_key.as_ref() else {
            warn!("No identity key configured, connection manager stays idle");
            return;
        };

        let pool = match self.inner.factory.create(&config.relays, keys).await {
            Ok(pool) => pool,
            Err(e) => {
                error!("Failed to construct relay pool: {}", e);
                return;
            }
        };

        let public_key = keys.public_key().to_hex();
        let filters = build_filters(&public_key, &config.kinds);
        let requests = cross_product(&config.relays, &filters);

        let sink = Arc::new(SubscriptionSink {
            health: Arc::clone(&self.inner.health),
            handlers: Arc::clone(&self.inner.handlers),
            message_cutoff: options.message_cutoff,
        });

        let subscription = match pool.subscribe_many(requests, sink).await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!("Failed to subscribe: {}", e);
                Self::close_pool(pool).await;
                return;
            }
        };

        {
            let mut connection = self.inner.connection.lock();
            connection.pool = Some(Arc::clone(&pool));
            connection.subscription = Some(subscription);
        }
        self.inner.health.touch();

        info!(
            "Subscribed to {} filter(s) on {} relay(s)",
            filters.len(),
            config.relays.len()
        );

        if let Some(home_feed) = options.home_feed {
            if let Err(e) = home_feed.start(pool).await {
                warn!("Failed to start home feed: {}", e);
            }
        }
    }

    /// Schedule the next health check unless one is already pending
    pub fn start_monitoring(&self) {
        let mut slot = self.inner.health_timer.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let manager = self.clone();
        let interval = self.inner.config.health_check_interval();
        *slot = Some(tokio::spawn(async move {
            sleep(interval).await;
            // Release the slot first so stop() cannot abort an in-flight check
            manager.inner.health_timer.lock().take();
            manager.check_health().await;
        }));
    }

    /// Compare the watermark against the staleness threshold
    pub async fn check_health(&self) {
        let report = self.health();
        let hooks = Arc::clone(&self.inner.hooks.read());
        hooks.on_health_check(&report);

        let threshold = self.inner.config.stale_threshold();
        if report.elapsed_since_event > threshold {
            warn!(
                "No events for {:?} (threshold {:?}), reconnecting",
                report.elapsed_since_event, threshold
            );
            self.attempt_reconnection().await;
        } else {
            debug!(
                "Connection healthy, last event {:?} ago",
                report.elapsed_since_event
            );
            self.start_monitoring();
        }
    }

    /// One step of the reconnection state machine
    pub fn attempt_reconnection(&self) -> BoxFuture<'static, ()> {
        let manager = self.clone();
        async move { manager.reconnect_step().await }.boxed()
    }

    async fn reconnect_step(&self) {
        let config = &self.inner.config;
        let attempts = self.inner.health.reconnect_attempts.load(Ordering::SeqCst);
        if attempts >= config.max_reconnect_attempts {
            error!(
                "Giving up after {} reconnection attempts; restart required",
                attempts
            );
            return;
        }

        let attempt = attempts + 1;
        self.inner
            .health
            .reconnect_attempts
            .store(attempt, Ordering::SeqCst);
        info!(
            "Reconnection attempt {}/{}",
            attempt, config.max_reconnect_attempts
        );

        self.teardown_connection().await;
        sleep(config.reconnect_delay()).await;

        let hooks = Arc::clone(&self.inner.hooks.read());
        match hooks.on_reconnect(self).await {
            Ok(()) => {
                self.inner.health.reconnect_attempts.store(0, Ordering::SeqCst);
                self.inner.health.touch();
                info!("Reconnected after {} attempt(s)", attempt);
                self.start_monitoring();
            }
            Err(e) => {
                let delay = self.backoff_delay(attempt);
                warn!(
                    "Reconnection attempt {} failed: {}; retrying in {:?}",
                    attempt, e, delay
                );
                self.schedule_retry(delay);
            }
        }
    }

    /// `backoff_base * 2^(attempt - 1)`, capped at `max_backoff`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let config = &self.inner.config;
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        config
            .backoff_base()
            .saturating_mul(factor)
            .min(config.max_backoff())
    }

    fn schedule_retry(&self, delay: Duration) {
        let manager = self.clone();
        let mut slot = self.inner.retry_timer.lock();
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(tokio::spawn(async move {
            sleep(delay).await;
            manager.inner.retry_timer.lock().take();
            manager.attempt_reconnection().await;
        }));
    }

    /// Cancel timers, close the subscription, then the pool
    ///
    /// Idempotent and safe on a manager that never finished setup.
    pub async fn stop(&self) {
        if let Some(timer) = self.inner.health_timer.lock().take() {
            timer.abort();
        }
        if let Some(timer) = self.inner.retry_timer.lock().take() {
            timer.abort();
        }
        self.teardown_connection().await;
        debug!("Connection manager stopped");
    }

    async fn teardown_connection(&self) {
        let (subscription, pool) = {
            let mut connection = self.inner.connection.lock();
            (connection.subscription.take(), connection.pool.take())
        };

        if let Some(subscription) = subscription {
            if let Err(e) = subscription.close().await {
                warn!("Failed to close subscription: {}", e);
            }
        }
        if let Some(pool) = pool {
            Self::close_pool(pool).await;
        }
    }

    async fn close_pool(pool: Arc<dyn RelayPool>) {
        if let Err(e) = pool.close().await {
            warn!("Failed to close relay pool: {}", e);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
