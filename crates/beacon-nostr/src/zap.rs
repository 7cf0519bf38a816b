//! NIP-57 zap receipt decoding
//!
//! All functions are pure and never fail outward: anything undecodable comes
//! back as `None`.

use rand::seq::SliceRandom;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

use crate::event::ProtocolEvent;

/// Human-readable part of a BOLT11 invoice: `ln` + currency + amount + unit, then the `1` separator
static BOLT11_AMOUNT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^ln[a-z]*?(\d+)([munp]?)1").expect("bolt11 regex should compile")
});

/// Fallback for descriptions that are not valid JSON
static PUBKEY_FRAGMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""pubkey"\s*:\s*"([0-9a-fA-F]+)""#).expect("pubkey regex should compile")
});

const MSATS_PER_SAT: u64 = 1_000;

// ----------------------------------------------------------------------------
// Parsed Receipt
// ----------------------------------------------------------------------------

/// Fields recovered from a zap receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZapReceipt {
    pub amount_msats: Option<u64>,
    pub target_event_id: Option<String>,
    /// Always 64 lowercase hex characters when present
    pub sender_pubkey: Option<String>,
    pub receipt: ProtocolEvent,
}

impl ZapReceipt {
    pub fn parse(event: &ProtocolEvent) -> Self {
        Self {
            amount_msats: amount_msats(event),
            target_event_id: target_event_id(event),
            sender_pubkey: sender_pubkey(event),
            receipt: event.clone(),
        }
    }

    pub fn amount_sats(&self) -> Option<u64> {
        self.amount_msats.map(|msats| msats / MSATS_PER_SAT)
    }
}

// ----------------------------------------------------------------------------
// Amount
// ----------------------------------------------------------------------------

/// Amount in millisatoshis: the `amount` tag, else the invoice amount
pub fn amount_msats(event: &ProtocolEvent) -> Option<u64> {
    if let Some(amount) = event.tag_value("amount").and_then(parse_amount_tag) {
        return Some(amount);
    }

    event
        .tag_value("bolt11")
        .or_else(|| event.tag_value("invoice"))
        .and_then(bolt11_amount_msats)
}

fn parse_amount_tag(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<u64>() {
        return (value > 0).then_some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.is_finite() && value >= 1.0 && value <= u64::MAX as f64).then(|| value.round() as u64)
}

/// Decode the amount encoded in a BOLT11 invoice's human-readable part
pub fn bolt11_amount_msats(invoice: &str) -> Option<u64> {
    let captures = BOLT11_AMOUNT_REGEX.captures(invoice.trim())?;
    let magnitude: u128 = captures.get(1)?.as_str().parse().ok()?;
    let unit = captures
        .get(2)
        .and_then(|m| m.as_str().chars().next())
        .map(|c| c.to_ascii_lowercase());

    let msats = match unit {
        None => magnitude.checked_mul(100_000_000_000)?,
        Some('m') => magnitude.checked_mul(100_000_000)?,
        Some('u') => magnitude.checked_mul(100_000)?,
        Some('n') => magnitude.checked_mul(100)?,
        Some('p') => magnitude.checked_add(5)? / 10,
        Some(_) => return None,
    };

    u64::try_from(msats).ok().filter(|msats| *msats > 0)
}

// ----------------------------------------------------------------------------
// Target and Sender
// ----------------------------------------------------------------------------

/// The zapped event, if the receipt names one
pub fn target_event_id(event: &ProtocolEvent) -> Option<String> {
    event.tag_value("e").map(str::to_string)
}

/// Zap sender recovered from the embedded zap request
pub fn sender_pubkey(event: &ProtocolEvent) -> Option<String> {
    let description = event.tag_value("description")?;

    let candidate = match serde_json::from_str::<Value>(description) {
        Ok(request) => request.get("pubkey")?.as_str()?.to_string(),
        Err(_) => PUBKEY_FRAGMENT_REGEX
            .captures(description)?
            .get(1)?
            .as_str()
            .to_string(),
    };

    normalize_pubkey(&candidate)
}

/// Lowercased key if `raw` is exactly 64 hex characters
pub fn normalize_pubkey(raw: &str) -> Option<String> {
    (raw.len() == 64 && raw.chars().all(|c| c.is_ascii_hexdigit())).then(|| raw.to_ascii_lowercase())
}

// ----------------------------------------------------------------------------
// Thanks Text
// ----------------------------------------------------------------------------

const HUGE_ZAP_PHRASES: &[&str] = &[
    "WOW, {sats} sats?! You're incredible, thank you so much! ⚡⚡⚡",
    "{sats} sats! I'm speechless. Thank you for the massive zap! 🙏",
    "A {sats} sat zap! That's huge, thank you! 🚀",
];

const BIG_ZAP_PHRASES: &[&str] = &[
    "{sats} sats, thank you so much! ⚡",
    "Thanks for the generous {sats} sat zap! 🧡",
    "Whoa, {sats} sats! Really appreciate it! 🙌",
];

const MEDIUM_ZAP_PHRASES: &[&str] = &[
    "Thanks for the {sats} sats! ⚡",
    "Appreciate the {sats} sat zap! 🧡",
    "{sats} sats received, thank you! 🙏",
];

const SMALL_ZAP_PHRASES: &[&str] = &[
    "Thanks for the zap! ⚡",
    "{sats} sats, every one counts, thank you! 🧡",
    "Zap received, thanks! 🙏",
];

const UNKNOWN_ZAP_PHRASES: &[&str] = &[
    "Thanks for the zap! ⚡",
    "Zap received, thank you so much! 🧡",
    "Appreciate the zap! 🙏",
];

/// Acknowledgment text scaled to the zap amount
pub fn thanks_text(amount_msats: Option<u64>) -> String {
    let Some(sats) = amount_msats.map(|msats| msats / MSATS_PER_SAT) else {
        return pick(UNKNOWN_ZAP_PHRASES).to_string();
    };

    let pool = match sats {
        10_000.. => HUGE_ZAP_PHRASES,
        1_000.. => BIG_ZAP_PHRASES,
        100.. => MEDIUM_ZAP_PHRASES,
        _ => SMALL_ZAP_PHRASES,
    };

    pick(pool).replace("{sats}", &sats.to_string())
}

fn pick(pool: &'static [&'static str]) -> &'static str {
    pool.choose(&mut rand::thread_rng()).copied().unwrap_or("Thanks! ⚡")
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
