//! Protocol event format as received from relays

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::NostrClientError;

// ----------------------------------------------------------------------------
// Event Kinds
// ----------------------------------------------------------------------------

/// Short text note (NIP-01)
pub const KIND_TEXT_NOTE: u16 = 1;
/// Encrypted direct message (NIP-04)
pub const KIND_ENCRYPTED_DM: u16 = 4;
/// Reaction (NIP-25)
pub const KIND_REACTION: u16 = 7;
/// Gift-wrapped sealed message (NIP-59)
pub const KIND_SEALED_MESSAGE: u16 = 1059;
/// Zap request embedded in a receipt's description (NIP-57)
pub const KIND_ZAP_REQUEST: u16 = 9734;
/// Zap receipt (NIP-57)
pub const KIND_ZAP_RECEIPT: u16 = 9735;

/// Human readable label for an event kind
pub fn kind_label(kind: u16) -> &'static str {
    match kind {
        KIND_TEXT_NOTE => "note",
        KIND_ENCRYPTED_DM => "dm",
        KIND_REACTION => "reaction",
        KIND_SEALED_MESSAGE => "sealed",
        KIND_ZAP_REQUEST => "zap-request",
        KIND_ZAP_RECEIPT => "zap",
        _ => "other",
    }
}

// ----------------------------------------------------------------------------
// Protocol Event
// ----------------------------------------------------------------------------

/// A relay event in wire shape
///
/// Only `kind` is mandatory when decoding; everything else defaults so that
/// shape validation is limited to the type tag. Signatures are verified by
/// the transport before an event reaches this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub pubkey: String,
    pub kind: u16,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sig: String,
}

impl ProtocolEvent {
    /// Decode an event from its JSON wire form
    pub fn from_json(json: &str) -> Result<Self, NostrClientError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Best-effort decode: only `kind` must be a `u16` integer
    ///
    /// Fields of the wrong type fall back to their defaults. Non-string tag
    /// elements keep their JSON text, `null` becomes an empty string.
    pub fn from_value_lossy(raw: &Value) -> Option<Self> {
        let kind = raw.get("kind")?.as_u64()?;
        let kind = u16::try_from(kind).ok()?;

        let text = |field: &str| {
            raw.get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let tags = raw
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_array)
                    .map(|tag| tag.iter().map(tag_element).collect())
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            id: text("id"),
            pubkey: text("pubkey"),
            kind,
            created_at: raw.get("created_at").and_then(Value::as_u64).unwrap_or_default(),
            tags,
            content: text("content"),
            sig: text("sig"),
        })
    }

    /// First non-empty value of the first tag named `name`
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.first().map(String::as_str) == Some(name))
            .and_then(|tag| tag.get(1))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Iterate over all tags named `name`
    pub fn tags_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Vec<String>> + 'a {
        self.tags
            .iter()
            .filter(move |tag| tag.first().map(String::as_str) == Some(name))
    }

    /// One-line description for logs
    pub fn summary(&self) -> String {
        let author: String = self.pubkey.chars().take(8).collect();
        let mut preview: String = self.content.chars().take(60).collect();
        if self.content.chars().count() > 60 {
            preview.push('…');
        }
        if self.kind == KIND_ENCRYPTED_DM || self.kind == KIND_SEALED_MESSAGE {
            preview = "<encrypted>".to_string();
        }
        format!(
            "[{}] from {} at {}: {}",
            kind_label(self.kind),
            author,
            self.created_at,
            preview.replace('\n', " ")
        )
    }
}

fn tag_element(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
