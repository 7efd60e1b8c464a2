//! Trade intents: what the caller wants to do, before any risk or
//! exchange-specific processing has happened.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::MarketRef;

/// Buy or sell side of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire encoding used by the exchange contract (0 = buy, 1 = sell)
    pub fn as_u8(&self) -> u8 {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the question an order trades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Yes => "YES",
            Outcome::No => "NO",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed trade, expressed in human units (shares and probability price)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    /// Which market to trade
    pub market: MarketRef,

    /// Buy or sell
    pub side: Side,

    /// Affirmative or negative outcome token
    pub outcome: Outcome,

    /// Number of shares, fractional allowed
    pub quantity: Decimal,

    /// Limit price per share in (0, 1)
    pub price: Decimal,

    /// Optional caller override for the limit price; takes precedence over
    /// `price` when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_override: Option<Decimal>,

    /// How long the resting order should live, in seconds. None means
    /// good-until-cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

impl TradeIntent {
    pub fn new(
        market: MarketRef,
        side: Side,
        outcome: Outcome,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            market,
            side,
            outcome,
            quantity,
            price,
            price_override: None,
            ttl_secs: None,
        }
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }

    /// The price the order will actually be placed at.
    pub fn limit_price(&self) -> Decimal {
        self.price_override.unwrap_or(self.price)
    }

    /// Collateral at stake: quantity times limit price.
    pub fn notional(&self) -> Decimal {
        self.quantity * self.limit_price()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn side_wire_encoding() {
        assert_eq!(Side::Buy.as_u8(), 0);
        assert_eq!(Side::Sell.as_u8(), 1);
        assert_eq!(Side::Buy.as_str(), "BUY");
    }

    #[test]
    fn override_takes_precedence() {
        let mut intent = TradeIntent::new(
            MarketRef::Id("1".to_string()),
            Side::Buy,
            Outcome::Yes,
            dec!(10),
            dec!(0.45),
        );
        assert_eq!(intent.limit_price(), dec!(0.45));
        assert_eq!(intent.notional(), dec!(4.50));

        intent.price_override = Some(dec!(0.50));
        assert_eq!(intent.limit_price(), dec!(0.50));
        assert_eq!(intent.notional(), dec!(5.00));
    }
}
