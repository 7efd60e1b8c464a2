//! Market references and resolved market snapshots

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::intent::Outcome;

/// The different ways a caller can point at a market.
///
/// Numeric ids, slugs, condition ids and market maker addresses all occur in
/// the wild; the resolver normalizes whichever one it is given into a
/// [`MarketSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRef {
    /// Numeric market id from the catalog API
    Id(String),
    /// URL slug, e.g. "will-btc-close-above-100k"
    Slug(String),
    /// 0x-prefixed condition id (32-byte hex)
    ConditionId(String),
    /// 0x-prefixed market maker contract address (20-byte hex)
    MakerAddress(String),
}

impl MarketRef {
    /// Classify a free-form token the way a human would type it: hex strings
    /// become condition ids or maker addresses depending on length, all-digit
    /// strings become numeric ids, anything else is treated as a slug.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if let Some(hex) = trimmed.strip_prefix("0x") {
            if hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return MarketRef::MakerAddress(trimmed.to_string());
            }
            if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return MarketRef::ConditionId(trimmed.to_string());
            }
        }
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            return MarketRef::Id(trimmed.to_string());
        }
        MarketRef::Slug(trimmed.to_string())
    }

    /// Stable cache key; distinct variants never collide even when the
    /// underlying strings are equal.
    pub fn cache_key(&self) -> String {
        match self {
            MarketRef::Id(id) => format!("id:{id}"),
            MarketRef::Slug(slug) => format!("slug:{slug}"),
            MarketRef::ConditionId(cid) => format!("condition:{}", cid.to_lowercase()),
            MarketRef::MakerAddress(addr) => format!("maker:{}", addr.to_lowercase()),
        }
    }
}

impl std::fmt::Display for MarketRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketRef::Id(id) => write!(f, "id {id}"),
            MarketRef::Slug(slug) => write!(f, "slug {slug}"),
            MarketRef::ConditionId(cid) => write!(f, "condition {cid}"),
            MarketRef::MakerAddress(addr) => write!(f, "maker {addr}"),
        }
    }
}

/// A market resolved to the fields the trading pipeline actually needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Numeric id on the catalog API
    pub id: String,

    /// Human-readable title/question
    pub title: String,

    /// 0x-prefixed condition id, when the catalog exposes it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_id: Option<String>,

    /// Outcome token id for the affirmative ("Yes") outcome
    pub yes_token_id: String,

    /// Outcome token id for the negative ("No") outcome
    pub no_token_id: String,

    /// Available liquidity in collateral units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<Decimal>,

    /// Trailing 24h volume in collateral units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<Decimal>,

    /// Best bid for the affirmative token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_bid: Option<Decimal>,

    /// Best ask for the affirmative token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_ask: Option<Decimal>,

    /// When the market was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Whether the market is accepting orders
    pub active: bool,

    /// Whether the market has closed
    pub closed: bool,

    /// Category (e.g. "Politics", "Crypto")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Whether orders for this market settle through the negative-risk
    /// exchange rather than the standard one
    #[serde(default)]
    pub neg_risk: bool,
}

impl MarketSnapshot {
    /// Outcome token id for the chosen side of the question.
    pub fn token_id_for(&self, outcome: Outcome) -> &str {
        match outcome {
            Outcome::Yes => &self.yes_token_id,
            Outcome::No => &self.no_token_id,
        }
    }

    /// Bid/ask spread, when both sides of the book are quoted.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Market age relative to `now`, when the creation time is known.
    pub fn age_hours(&self, now: DateTime<Utc>) -> Option<i64> {
        self.created_at.map(|created| (now - created).num_hours())
    }
}
