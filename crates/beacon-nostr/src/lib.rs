//! Resilient Nostr relay client for bots
//!
//! This crate keeps a single multiplexed subscription alive across a set of
//! relays, routes inbound events to per-kind handlers, decodes NIP-57 zap
//! receipts and composes the acknowledgment replies a bot posts for them.
//!
//! The [`ConnectionManager`] is the entry point. It talks to relays through
//! the [`RelayPool`] trait; [`NostrSdkPoolFactory`] provides the production
//! pool on top of `nostr-sdk`.

pub mod config;
pub mod error;
pub mod event;
pub mod filters;
pub mod handlers;
pub mod manager;
pub mod pool;
pub mod router;
pub mod thanks;
pub mod zap;

pub use config::{ConnectionConfig, SubscriptionKinds, DEFAULT_RELAYS};
pub use error::{HandlerError, HandlerResult, NostrClientError, Result};
pub use event::{
    kind_label, ProtocolEvent, KIND_ENCRYPTED_DM, KIND_REACTION, KIND_SEALED_MESSAGE,
    KIND_TEXT_NOTE, KIND_ZAP_RECEIPT, KIND_ZAP_REQUEST,
};
pub use filters::{build_filters, cross_product, SubscriptionFilter, SubscriptionRequest};
pub use handlers::{EventHandlers, NoopHandlers, TagThreadResolver, ThreadResolver};
pub use manager::{
    ConnectionManager, DefaultHooks, HealthReport, HomeFeed, ManagerHooks, SetupOptions,
};
pub use pool::{
    NostrSdkPool, NostrSdkPoolFactory, NostrSdkSubscription, PoolFactory, RelayPool,
    Subscription, SubscriptionCallbacks,
};
pub use router::{EventRouter, RouteHandler};
pub use thanks::{
    compose, IdentityEncoder, Nip19Encoder, PostOptions, ReplyParent, ThanksPost, ThanksRequest,
};
pub use zap::{thanks_text, ZapReceipt};

// Re-export the key type callers need to configure an identity
pub use nostr_sdk::Keys;
