//! Kind-based event routing
//!
//! The router holds an explicit kind -> handler table. An event reaches at
//! most one handler: kinds missing from the table are dropped rather than
//! falling through to a default. Handler errors are returned to the caller
//! untouched; isolating them is the job of whoever wires the router into a
//! transport callback.

use hashbrown::HashMap;
use serde_json::Value;
use tracing::trace;

use crate::error::HandlerResult;
use crate::event::{
    ProtocolEvent, KIND_ENCRYPTED_DM, KIND_SEALED_MESSAGE, KIND_TEXT_NOTE, KIND_ZAP_RECEIPT,
};
use crate::handlers::EventHandlers;

/// Handler for a single event kind
pub type RouteHandler = Box<dyn Fn(&ProtocolEvent) -> HandlerResult + Send + Sync>;

/// Dispatches events to exactly one handler by kind
#[derive(Default)]
pub struct EventRouter {
    routes: HashMap<u16, RouteHandler>,
}

impl EventRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Router for the four kinds a bot answers: notes, DMs, sealed messages and zaps
    pub fn standard<P, D, S, Z>(on_post: P, on_direct_message: D, on_sealed: S, on_zap: Z) -> Self
    where
        P: Fn(&ProtocolEvent) -> HandlerResult + Send + Sync + 'static,
        D: Fn(&ProtocolEvent) -> HandlerResult + Send + Sync + 'static,
        S: Fn(&ProtocolEvent) -> HandlerResult + Send + Sync + 'static,
        Z: Fn(&ProtocolEvent) -> HandlerResult + Send + Sync + 'static,
    {
        Self::new()
            .route(KIND_TEXT_NOTE, on_post)
            .route(KIND_ENCRYPTED_DM, on_direct_message)
            .route(KIND_SEALED_MESSAGE, on_sealed)
            .route(KIND_ZAP_RECEIPT, on_zap)
    }

    /// Register `handler` for `kind`, replacing any previous one
    pub fn route<F>(mut self, kind: u16, handler: F) -> Self
    where
        F: Fn(&ProtocolEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.routes.insert(kind, Box::new(handler));
        self
    }

    /// Kinds with a registered handler
    pub fn kinds(&self) -> Vec<u16> {
        let mut kinds: Vec<u16> = self.routes.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn handles(&self, kind: u16) -> bool {
        self.routes.contains_key(&kind)
    }

    /// Dispatch a typed event. Unknown kinds are ignored.
    pub fn dispatch(&self, event: &ProtocolEvent) -> HandlerResult {
        match self.routes.get(&event.kind) {
            Some(handler) => handler(event),
            None => {
                trace!("No route for kind {}", event.kind);
                Ok(())
            }
        }
    }

    /// Dispatch a raw JSON value
    ///
    /// Anything that is not an object with an integer `kind` is silently
    /// ignored. Other fields are decoded best effort.
    pub fn dispatch_value(&self, raw: &Value) -> HandlerResult {
        if !raw.is_object() {
            return Ok(());
        }
        match ProtocolEvent::from_value_lossy(raw) {
            Some(event) => self.dispatch(&event),
            None => {
                trace!("Ignoring event without an integer kind");
                Ok(())
            }
        }
    }

    /// Dispatch raw JSON text; undecodable input is ignored
    pub fn dispatch_json(&self, raw: &str) -> HandlerResult {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => self.dispatch_value(&value),
            Err(_) => Ok(()),
        }
    }
}

impl EventHandlers for EventRouter {
    fn on_event(&self, event: &ProtocolEvent) -> HandlerResult {
        self.dispatch(event)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
