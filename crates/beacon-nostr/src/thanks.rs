//! Composition of zap acknowledgment replies

use nostr_sdk::{PublicKey, ToBech32};
use serde::Serialize;
use tracing::debug;

use crate::event::ProtocolEvent;
use crate::zap::{normalize_pubkey, ZapReceipt};

// ----------------------------------------------------------------------------
// Identity Encoding
// ----------------------------------------------------------------------------

/// Turns a hex public key into its display / mention form
pub trait IdentityEncoder {
    fn encode(&self, pubkey_hex: &str) -> Option<String>;
}

impl<F> IdentityEncoder for F
where
    F: Fn(&str) -> Option<String>,
{
    fn encode(&self, pubkey_hex: &str) -> Option<String> {
        self(pubkey_hex)
    }
}

/// NIP-19 `npub` encoder
#[derive(Debug, Default, Clone, Copy)]
pub struct Nip19Encoder;

impl IdentityEncoder for Nip19Encoder {
    fn encode(&self, pubkey_hex: &str) -> Option<String> {
        PublicKey::from_hex(pubkey_hex).ok()?.to_bech32().ok()
    }
}

// ----------------------------------------------------------------------------
// Thanks Post
// ----------------------------------------------------------------------------

/// What the reply threads under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyParent {
    /// The zapped event
    Event { id: String },
    /// The receipt itself, for zaps without a target
    Receipt { event: ProtocolEvent },
}

impl ReplyParent {
    pub fn event_id(&self) -> &str {
        match self {
            ReplyParent::Event { id } => id,
            ReplyParent::Receipt { event } => &event.id,
        }
    }
}

/// Posting flags handed to the publisher
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostOptions {
    /// Do not add the usual reaction; the reply is the reaction
    pub skip_reaction: bool,
    /// Additional `p` tags
    pub extra_p_tags: Vec<String>,
    /// Key the mention in `text` must resolve to
    pub expected_mention_pubkey: Option<String>,
}

/// A fully composed acknowledgment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThanksPost {
    pub text: String,
    pub parent: ReplyParent,
    pub options: PostOptions,
}

/// Inputs for [`compose`]
#[derive(Debug, Clone, Copy)]
pub struct ThanksRequest<'a> {
    pub receipt: &'a ProtocolEvent,
    pub amount_msats: Option<u64>,
    pub sender_pubkey: Option<&'a str>,
    pub target_event_id: Option<&'a str>,
    pub text: &'a str,
}

impl<'a> ThanksRequest<'a> {
    /// Request built from a parsed receipt
    pub fn from_receipt(zap: &'a ZapReceipt, text: &'a str) -> Self {
        Self {
            receipt: &zap.receipt,
            amount_msats: zap.amount_msats,
            sender_pubkey: zap.sender_pubkey.as_deref(),
            target_event_id: zap.target_event_id.as_deref(),
            text,
        }
    }
}

/// Build the reply text, parent and mention metadata for a zap
pub fn compose(request: ThanksRequest<'_>, encoder: Option<&dyn IdentityEncoder>) -> ThanksPost {
    let mut text = request.text.to_string();
    let mut options = PostOptions {
        skip_reaction: true,
        ..PostOptions::default()
    };

    let sender = request.sender_pubkey.and_then(normalize_pubkey);
    if let (Some(sender), Some(encoder)) = (sender, encoder) {
        match encoder.encode(&sender) {
            Some(encoded) => {
                let mention = format!("nostr:{}", encoded);
                text = if text.trim().is_empty() {
                    mention
                } else {
                    format!("{} {}", text.trim_end(), mention)
                };
                options.extra_p_tags.push(sender.clone());
                options.expected_mention_pubkey = Some(sender);
            }
            None => debug!("Could not encode zap sender {}, skipping mention", sender),
        }
    }

    let parent = match request.target_event_id.filter(|id| !id.is_empty()) {
        Some(id) => ReplyParent::Event { id: id.to_string() },
        None => ReplyParent::Receipt {
            event: request.receipt.clone(),
        },
    };

    ThanksPost {
        text,
        parent,
        options,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SENDER: &str = "82341f882b6eabcd2ba7f1ef90aad961cf074af15b9ef44a09f9d2a8fbfbe6a2";

    fn receipt() -> ProtocolEvent {
        ProtocolEvent::from_json(r#"{"id":"receipt-id","kind":9735,"created_at":1700000000}"#)
            .unwrap()
    }

    fn fake_encoder(pubkey: &str) -> Option<String> {
        Some(format!("npub1fake{}", &pubkey[..6]))
    }

    #[test]
    fn test_valid_sender_gets_mention_and_tag() {
        let receipt = receipt();
        let request = ThanksRequest {
            receipt: &receipt,
            amount_msats: Some(21_000),
            sender_pubkey: Some(SENDER),
            target_event_id: Some("note-1"),
            text: "Thanks for the zap!",
        };

        let post = compose(request, Some(&fake_encoder));
        assert_eq!(post.text, "Thanks for the zap! nostr:npub1fake82341f");
        assert_eq!(post.options.extra_p_tags, vec![SENDER.to_string()]);
        assert_eq!(post.options.expected_mention_pubkey.as_deref(), Some(SENDER));
        assert!(post.options.skip_reaction);
    }

    #[test]
    fn test_missing_sender_leaves_text_unchanged() {
        let receipt = receipt();
        let request = ThanksRequest {
            receipt: &receipt,
            amount_msats: None,
            sender_pubkey: None,
            target_event_id: None,
            text: "Thanks!",
        };

        let post = compose(request, Some(&fake_encoder));
        assert_eq!(post.text, "Thanks!");
        assert!(post.options.extra_p_tags.is_empty());
        assert_eq!(post.options.expected_mention_pubkey, None);
        assert!(post.options.skip_reaction);
    }

    #[test]
    fn test_invalid_sender_or_missing_encoder() {
        let receipt = receipt();
        let mut request = ThanksRequest {
            receipt: &receipt,
            amount_msats: None,
            sender_pubkey: Some(&SENDER[..63]),
            target_event_id: None,
            text: "Thanks!",
        };
        assert_eq!(compose(request, Some(&fake_encoder)).text, "Thanks!");

        request.sender_pubkey = Some(SENDER);
        let post = compose(request, None);
        assert_eq!(post.text, "Thanks!");
        assert!(post.options.extra_p_tags.is_empty());

        let failing = |_: &str| -> Option<String> { None };
        let post = compose(request, Some(&failing));
        assert_eq!(post.text, "Thanks!");
        assert!(post.options.extra_p_tags.is_empty());
    }

    #[test]
    fn test_parent_resolution() {
        let receipt = receipt();
        let mut request = ThanksRequest {
            receipt: &receipt,
            amount_msats: None,
            sender_pubkey: None,
            target_event_id: Some("note-1"),
            text: "Thanks!",
        };
        assert_eq!(
            compose(request, None).parent,
            ReplyParent::Event { id: "note-1".to_string() }
        );

        request.target_event_id = None;
        let parent = compose(request, None).parent;
        assert_eq!(parent, ReplyParent::Receipt { event: receipt.clone() });
        assert_eq!(parent.event_id(), "receipt-id");
    }

    #[test]
    fn test_nip19_encoder() {
        let npub = Nip19Encoder.encode(SENDER).unwrap();
        assert!(npub.starts_with("npub1"));
        assert_eq!(Nip19Encoder.encode("not-a-key"), None);
    }

    #[test]
    fn test_from_receipt() {
        let description = format!(r#"{{"pubkey":"{}"}}"#, SENDER);
        let mut event = receipt();
        event.tags = vec![
            vec!["amount".to_string(), "5000".to_string()],
            vec!["description".to_string(), description],
        ];
        let zap = ZapReceipt::parse(&event);
        let post = compose(ThanksRequest::from_receipt(&zap, "Thanks!"), Some(&Nip19Encoder));

        assert!(post.text.starts_with("Thanks! nostr:npub1"));
        assert_eq!(post.parent.event_id(), "receipt-id");
    }
}
