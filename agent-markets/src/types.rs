//! Gamma catalog API response types
//!
//! The catalog encodes arrays as JSON strings and numbers as either strings
//! or floats, depending on the endpoint and the market's age. Every accessor
//! here degrades through the formats observed in the wild before giving up.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Base URL for the Gamma catalog API
pub const GAMMA_API_BASE: &str = "https://gamma-api.polymarket.com";

/// A market as returned by the Gamma catalog API
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    /// Unique identifier
    pub id: String,

    /// Market question
    pub question: String,

    /// URL slug
    #[serde(default)]
    pub slug: Option<String>,

    /// Condition ID (used for CLOB)
    #[serde(default)]
    pub condition_id: Option<String>,

    /// On-chain market maker contract address
    #[serde(default)]
    pub market_maker_address: Option<String>,

    /// When the market was created
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Category
    #[serde(default)]
    pub category: Option<String>,

    /// Total liquidity as a string
    #[serde(default)]
    pub liquidity: Option<String>,

    /// Numeric liquidity (some responses have this)
    #[serde(default)]
    pub liquidity_num: Option<f64>,

    /// Trailing 24h volume
    #[serde(default)]
    pub volume_24hr: Option<f64>,

    /// Total volume as a string (fallback when 24h volume is absent)
    #[serde(default)]
    pub volume: Option<String>,

    /// Outcome prices as JSON string (e.g., "[0.65, 0.35]")
    #[serde(default)]
    pub outcome_prices: Option<String>,

    /// CLOB token IDs (for trading)
    #[serde(default)]
    pub clob_token_ids: Option<String>,

    /// Best bid for the YES token
    #[serde(default)]
    pub best_bid: Option<f64>,

    /// Best ask for the YES token
    #[serde(default)]
    pub best_ask: Option<f64>,

    /// Whether the market is active
    #[serde(default)]
    pub active: Option<bool>,

    /// Whether the market is closed
    #[serde(default)]
    pub closed: Option<bool>,

    /// Whether the market settles via the negative-risk exchange
    #[serde(default)]
    pub neg_risk: Option<bool>,
}

/// Some catalog endpoints return a bare object, others a one-element list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// First item, whichever shape the payload took.
    pub fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(items) => items.into_iter().next(),
        }
    }
}

impl GammaMarket {
    /// Parse outcome prices from the JSON string
    /// The API returns prices in various formats:
    /// - JSON array of strings: "[\"0.0115\", \"0.9885\"]"
    /// - JSON array of numbers: "[0.0115, 0.9885]"
    /// - Comma-separated: "0.0115, 0.9885"
    pub fn parse_outcome_prices(&self) -> Option<(Decimal, Decimal)> {
        let prices_str = self.outcome_prices.as_ref()?;

        // Try to parse as JSON array of strings first (most common format)
        if let Ok(prices) = serde_json::from_str::<Vec<String>>(prices_str) {
            if prices.len() >= 2 {
                let yes = Decimal::from_str(&prices[0]).unwrap_or(Decimal::ZERO);
                let no = Decimal::from_str(&prices[1]).unwrap_or(Decimal::ZERO);
                return Some((yes, no));
            }
        }

        // Try to parse as JSON array of numbers
        if let Ok(prices) = serde_json::from_str::<Vec<f64>>(prices_str) {
            if prices.len() >= 2 {
                let yes = Decimal::from_str(&prices[0].to_string()).unwrap_or(Decimal::ZERO);
                let no = Decimal::from_str(&prices[1].to_string()).unwrap_or(Decimal::ZERO);
                return Some((yes, no));
            }
        }

        // Try parsing as comma-separated (fallback)
        let parts: Vec<&str> = prices_str
            .trim_matches(|c| c == '[' || c == ']')
            .split(',')
            .collect();
        if parts.len() >= 2 {
            let yes = Decimal::from_str(parts[0].trim().trim_matches('"')).unwrap_or(Decimal::ZERO);
            let no = Decimal::from_str(parts[1].trim().trim_matches('"')).unwrap_or(Decimal::ZERO);
            return Some((yes, no));
        }

        None
    }

    /// Parse CLOB token IDs from the JSON string
    /// Returns (yes_token_id, no_token_id) if available
    ///
    /// Token ids are 256-bit integers, so bare-number arrays are split as
    /// raw text instead of deserialized (serde_json would read them as f64
    /// and lose digits).
    pub fn parse_clob_token_ids(&self) -> Option<(String, String)> {
        let ids_str = self.clob_token_ids.as_ref()?;

        // Parse as JSON array of strings (most common format)
        if let Ok(ids) = serde_json::from_str::<Vec<String>>(ids_str) {
            if ids.len() >= 2 {
                return Some((ids[0].clone(), ids[1].clone()));
            }
        }

        // Bare-number arrays and comma-separated fallback
        let parts: Vec<&str> = ids_str
            .trim_matches(|c| c == '[' || c == ']')
            .split(',')
            .map(|p| p.trim().trim_matches('"'))
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() >= 2 {
            return Some((parts[0].to_string(), parts[1].to_string()));
        }

        None
    }

    /// Parse liquidity, preferring the numeric field
    pub fn parse_liquidity(&self) -> Option<Decimal> {
        if let Some(l) = self.liquidity_num {
            return Decimal::from_str(&l.to_string()).ok();
        }

        self.liquidity
            .as_ref()
            .and_then(|l| Decimal::from_str(l).ok())
    }

    /// Parse 24h volume, falling back to total volume
    pub fn parse_volume_24h(&self) -> Option<Decimal> {
        if let Some(v) = self.volume_24hr {
            return Decimal::from_str(&v.to_string()).ok();
        }

        self.volume
            .as_ref()
            .and_then(|v| Decimal::from_str(v).ok())
    }

    /// Best bid as a Decimal
    pub fn parse_best_bid(&self) -> Option<Decimal> {
        self.best_bid
            .and_then(|b| Decimal::from_str(&b.to_string()).ok())
    }

    /// Best ask as a Decimal
    pub fn parse_best_ask(&self) -> Option<Decimal> {
        self.best_ask
            .and_then(|a| Decimal::from_str(&a.to_string()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market_with(clob_token_ids: Option<&str>, outcome_prices: Option<&str>) -> GammaMarket {
        GammaMarket {
            id: "1".to_string(),
            question: "?".to_string(),
            slug: None,
            condition_id: None,
            market_maker_address: None,
            created_at: None,
            category: None,
            liquidity: None,
            liquidity_num: None,
            volume_24hr: None,
            volume: None,
            outcome_prices: outcome_prices.map(String::from),
            clob_token_ids: clob_token_ids.map(String::from),
            best_bid: None,
            best_ask: None,
            active: None,
            closed: None,
            neg_risk: None,
        }
    }

    #[test]
    fn token_ids_from_string_array() {
        let m = market_with(Some(r#"["123456789", "987654321"]"#), None);
        assert_eq!(
            m.parse_clob_token_ids(),
            Some(("123456789".to_string(), "987654321".to_string()))
        );
    }

    #[test]
    fn token_ids_from_number_array() {
        // 256-bit ids exceed f64 precision; raw JSON numbers must survive intact
        let m = market_with(
            Some("[11528909939971131413, 98765432109876543210987654321]"),
            None,
        );
        assert_eq!(
            m.parse_clob_token_ids(),
            Some((
                "11528909939971131413".to_string(),
                "98765432109876543210987654321".to_string()
            ))
        );
    }

    #[test]
    fn token_ids_from_comma_separated() {
        let m = market_with(Some("123, 456"), None);
        assert_eq!(
            m.parse_clob_token_ids(),
            Some(("123".to_string(), "456".to_string()))
        );
    }

    #[test]
    fn token_ids_missing() {
        let m = market_with(None, None);
        assert_eq!(m.parse_clob_token_ids(), None);

        let m = market_with(Some("[]"), None);
        assert_eq!(m.parse_clob_token_ids(), None);
    }

    #[test]
    fn outcome_prices_all_formats() {
        let m = market_with(None, Some(r#"["0.65", "0.35"]"#));
        assert_eq!(m.parse_outcome_prices(), Some((dec!(0.65), dec!(0.35))));

        let m = market_with(None, Some("[0.65, 0.35]"));
        assert_eq!(m.parse_outcome_prices(), Some((dec!(0.65), dec!(0.35))));

        let m = market_with(None, Some("0.65, 0.35"));
        assert_eq!(m.parse_outcome_prices(), Some((dec!(0.65), dec!(0.35))));
    }

    #[test]
    fn liquidity_prefers_numeric_field() {
        let mut m = market_with(None, None);
        m.liquidity = Some("1000.5".to_string());
        assert_eq!(m.parse_liquidity(), Some(dec!(1000.5)));

        m.liquidity_num = Some(2000.0);
        assert_eq!(m.parse_liquidity(), Some(dec!(2000)));
    }

    #[test]
    fn one_or_many_takes_first() {
        let many: OneOrMany<u32> = serde_json::from_str("[7, 8]").unwrap();
        assert_eq!(many.into_first(), Some(7));

        let one: OneOrMany<u32> = serde_json::from_str("7").unwrap();
        assert_eq!(one.into_first(), Some(7));

        let empty: OneOrMany<u32> = serde_json::from_str("[]").unwrap();
        assert_eq!(empty.into_first(), None);
    }
}
