//! Consumer-facing handler traits
//!
//! The connection manager forwards subscription callbacks to an
//! [`EventHandlers`] table. Every slot defaults to a no-op, so a consumer only
//! implements what it cares about.

use crate::error::HandlerResult;
use crate::event::ProtocolEvent;

// ----------------------------------------------------------------------------
// Event Handler Table
// ----------------------------------------------------------------------------

/// Callbacks for one logical subscription
pub trait EventHandlers: Send + Sync {
    /// A live or stored event passed the age filter
    fn on_event(&self, _event: &ProtocolEvent) -> HandlerResult {
        Ok(())
    }

    /// A relay finished delivering its stored backlog
    fn on_eose(&self) -> HandlerResult {
        Ok(())
    }

    /// A relay closed the subscription
    fn on_close(&self, _reason: &str) -> HandlerResult {
        Ok(())
    }
}

/// Handler table that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandlers;

impl EventHandlers for NoopHandlers {}

// ----------------------------------------------------------------------------
// Thread Resolution
// ----------------------------------------------------------------------------

/// Resolves the thread an event belongs to
pub trait ThreadResolver: Send + Sync {
    /// Root event id of the thread, if the event is a reply
    fn thread_root(&self, event: &ProtocolEvent) -> Option<String>;
}

/// NIP-10 resolver: the `e` tag marked `root`, else the first `e` tag
#[derive(Debug, Default, Clone, Copy)]
pub struct TagThreadResolver;

impl ThreadResolver for TagThreadResolver {
    fn thread_root(&self, event: &ProtocolEvent) -> Option<String> {
        event
            .tags_named("e")
            .find(|tag| tag.get(3).map(String::as_str) == Some("root"))
            .or_else(|| event.tags_named("e").next())
            .and_then(|tag| tag.get(1))
            .filter(|id| !id.is_empty())
            .cloned()
    }
}
