//! Subscription filters and the relay x filter request set

use serde::{Deserialize, Serialize};

use crate::config::SubscriptionKinds;
use crate::event::{
    KIND_ENCRYPTED_DM, KIND_REACTION, KIND_SEALED_MESSAGE, KIND_TEXT_NOTE, KIND_ZAP_RECEIPT,
};

/// Declarative relay filter: kinds plus `#p` tag equality
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    pub kinds: Vec<u16>,
    #[serde(rename = "#p", default, skip_serializing_if = "Vec::is_empty")]
    pub p_tags: Vec<String>,
}

impl SubscriptionFilter {
    /// Filter for events of `kind` tagging `pubkey`
    pub fn addressed_to(kind: u16, pubkey: &str) -> Self {
        Self {
            kinds: vec![kind],
            p_tags: vec![pubkey.to_string()],
        }
    }
}

/// One (relay, filter) pair handed to the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub relay_url: String,
    pub filter: SubscriptionFilter,
}

/// Filters for everything addressed to `pubkey`, honouring the enabled kinds
pub fn build_filters(pubkey: &str, kinds: &SubscriptionKinds) -> Vec<SubscriptionFilter> {
    [
        (kinds.text_notes, KIND_TEXT_NOTE),
        (kinds.direct_messages, KIND_ENCRYPTED_DM),
        (kinds.reactions, KIND_REACTION),
        (kinds.sealed_messages, KIND_SEALED_MESSAGE),
        (kinds.zap_receipts, KIND_ZAP_RECEIPT),
    ]
    .into_iter()
    .filter(|(enabled, _)| *enabled)
    .map(|(_, kind)| SubscriptionFilter::addressed_to(kind, pubkey))
    .collect()
}

/// Every relay gets every filter
pub fn cross_product(relays: &[String], filters: &[SubscriptionFilter]) -> Vec<SubscriptionRequest> {
    relays
        .iter()
        .flat_map(|relay| {
            filters.iter().map(move |filter| SubscriptionRequest {
                relay_url: relay.clone(),
                filter: filter.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBKEY: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    #[test]
    fn test_default_kinds_build_five_filters() {
        let filters = build_filters(PUBKEY, &SubscriptionKinds::default());
        let kinds: Vec<u16> = filters.iter().flat_map(|f| f.kinds.clone()).collect();
        assert_eq!(kinds, vec![1, 4, 7, 1059, 9735]);
        assert!(filters.iter().all(|f| f.p_tags == vec![PUBKEY.to_string()]));
    }

    #[test]
    fn test_disabled_kinds_are_skipped() {
        let kinds = SubscriptionKinds {
            reactions: false,
            sealed_messages: false,
            ..SubscriptionKinds::default()
        };
        let filters = build_filters(PUBKEY, &kinds);
        assert_eq!(filters.len(), 3);
        assert!(!filters.iter().any(|f| f.kinds.contains(&KIND_REACTION)));
    }

    #[test]
    fn test_cross_product_covers_every_pair() {
        let relays = vec!["wss://a.example".to_string(), "wss://b.example".to_string()];
        let filters = build_filters(PUBKEY, &SubscriptionKinds::default());
        let requests = cross_product(&relays, &filters);

        assert_eq!(requests.len(), 10);
        assert_eq!(requests.iter().filter(|r| r.relay_url == "wss://b.example").count(), 5);
        assert!(cross_product(&[], &filters).is_empty());
    }

    #[test]
    fn test_filter_wire_shape() {
        let json = serde_json::to_value(SubscriptionFilter::addressed_to(9735, PUBKEY)).unwrap();
        assert_eq!(json["kinds"][0], 9735);
        assert_eq!(json["#p"][0], PUBKEY);
    }
}
