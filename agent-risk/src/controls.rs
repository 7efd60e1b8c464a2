//! Configurable trading limits
//!
//! Every field has a conservative default so a partially-specified config
//! file still yields a fully-armed gate.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Limits the risk gate enforces on every proposed trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingControls {
    /// Maximum number of trades per UTC day
    #[serde(default = "default_max_trades_per_day")]
    pub max_trades_per_day: u32,

    /// Maximum collateral notional per single trade
    #[serde(default = "default_max_amount_per_trade")]
    pub max_amount_per_trade: Decimal,

    /// Maximum total open exposure across all positions
    #[serde(default = "default_max_exposure_total")]
    pub max_exposure_total: Decimal,

    /// Minimum market liquidity required to trade
    #[serde(default = "default_min_liquidity")]
    pub min_liquidity: Decimal,

    /// Minimum trailing 24h volume required to trade
    #[serde(default = "default_min_volume_24h")]
    pub min_volume_24h: Decimal,

    /// Minimum market age in hours; brand-new markets are skipped
    #[serde(default = "default_min_market_age_hours")]
    pub min_market_age_hours: i64,

    /// Maximum tolerated bid/ask spread
    #[serde(default = "default_max_spread")]
    pub max_spread: Decimal,

    /// Outcome token ids that may be traded; empty means all
    #[serde(default)]
    pub allowed_assets: Vec<String>,

    /// Outcome token ids that must never be traded
    #[serde(default)]
    pub blocked_assets: Vec<String>,

    /// Market categories that may be traded; empty means all
    #[serde(default)]
    pub allowed_categories: Vec<String>,

    /// Market categories that must never be traded
    #[serde(default)]
    pub blocked_categories: Vec<String>,

    /// Lowest implied probability worth trading
    #[serde(default = "default_min_probability")]
    pub min_probability: Decimal,

    /// Highest implied probability worth trading
    #[serde(default = "default_max_probability")]
    pub max_probability: Decimal,
}

fn default_max_trades_per_day() -> u32 {
    10
}

fn default_max_amount_per_trade() -> Decimal {
    dec!(100)
}

fn default_max_exposure_total() -> Decimal {
    dec!(500)
}

fn default_min_liquidity() -> Decimal {
    dec!(10000)
}

fn default_min_volume_24h() -> Decimal {
    dec!(1000)
}

fn default_min_market_age_hours() -> i64 {
    24
}

fn default_max_spread() -> Decimal {
    dec!(0.05)
}

fn default_min_probability() -> Decimal {
    dec!(0.05)
}

fn default_max_probability() -> Decimal {
    dec!(0.95)
}

impl Default for TradingControls {
    fn default() -> Self {
        Self {
            max_trades_per_day: default_max_trades_per_day(),
            max_amount_per_trade: default_max_amount_per_trade(),
            max_exposure_total: default_max_exposure_total(),
            min_liquidity: default_min_liquidity(),
            min_volume_24h: default_min_volume_24h(),
            min_market_age_hours: default_min_market_age_hours(),
            max_spread: default_max_spread(),
            allowed_assets: Vec::new(),
            blocked_assets: Vec::new(),
            allowed_categories: Vec::new(),
            blocked_categories: Vec::new(),
            min_probability: default_min_probability(),
            max_probability: default_max_probability(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_in_defaults() {
        let controls: TradingControls =
            serde_json::from_str(r#"{"max_trades_per_day": 3}"#).unwrap();
        assert_eq!(controls.max_trades_per_day, 3);
        assert_eq!(controls.min_liquidity, dec!(10000));
        assert!(controls.allowed_assets.is_empty());
    }

    #[test]
    fn defaults_match_serde_defaults() {
        let from_empty: TradingControls = serde_json::from_str("{}").unwrap();
        let from_default = TradingControls::default();
        assert_eq!(
            serde_json::to_value(&from_empty).unwrap(),
            serde_json::to_value(&from_default).unwrap()
        );
    }
}
