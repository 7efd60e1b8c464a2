//! Position reconstruction from open orders
//!
//! The CLOB has no "positions" endpoint on the trading surface, so working
//! exposure is reconstructed from resting orders: group by outcome token and
//! side, sum the unmatched remainder, and carry a volume-weighted price.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::types::{OpenOrder, Side};

/// Aggregated resting exposure on one (token, side)
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingPosition {
    pub market_id: String,
    pub token_id: String,
    pub side: Side,
    /// Unmatched size still resting on the book
    pub remaining_size: Decimal,
    /// Volume-weighted limit price across the contributing orders
    pub price: Decimal,
}

impl WorkingPosition {
    pub fn notional(&self) -> Decimal {
        self.remaining_size * self.price
    }
}

/// Collapse open orders into working positions. Fully matched orders and rows
/// with unparseable numeric fields contribute nothing.
pub fn working_positions(orders: &[OpenOrder]) -> Vec<WorkingPosition> {
    let mut grouped: HashMap<(String, Side), WorkingPosition> = HashMap::new();

    for order in orders {
        let side = match order.side.to_uppercase().as_str() {
            "BUY" => Side::Buy,
            "SELL" => Side::Sell,
            other => {
                debug!("Skipping order {} with unknown side {:?}", order.id, other);
                continue;
            }
        };

        let (original, matched, price) = match (
            order.original_size.parse::<Decimal>(),
            order.size_matched.parse::<Decimal>(),
            order.price.parse::<Decimal>(),
        ) {
            (Ok(o), Ok(m), Ok(p)) => (o, m, p),
            _ => {
                debug!("Skipping order {} with unparseable fields", order.id);
                continue;
            }
        };

        let remaining = original - matched;
        if remaining <= Decimal::ZERO {
            continue;
        }

        let key = (order.asset_id.clone(), side);
        match grouped.get_mut(&key) {
            Some(position) => {
                // Weighted average over the remainders
                let total = position.remaining_size + remaining;
                position.price =
                    (position.price * position.remaining_size + price * remaining) / total;
                position.remaining_size = total;
            }
            None => {
                grouped.insert(
                    key,
                    WorkingPosition {
                        market_id: order.market.clone(),
                        token_id: order.asset_id.clone(),
                        side,
                        remaining_size: remaining,
                        price,
                    },
                );
            }
        }
    }

    let mut positions: Vec<WorkingPosition> = grouped.into_values().collect();
    positions.sort_by(|a, b| a.token_id.cmp(&b.token_id));
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(id: &str, token: &str, side: &str, original: &str, matched: &str, price: &str) -> OpenOrder {
        OpenOrder {
            id: id.to_string(),
            market: "0xcondition".to_string(),
            asset_id: token.to_string(),
            side: side.to_string(),
            original_size: original.to_string(),
            size_matched: matched.to_string(),
            price: price.to_string(),
            status: "LIVE".to_string(),
            created_at: "1700000000".to_string(),
            expiration: None,
            order_type: None,
        }
    }

    #[test]
    fn test_partial_fill_leaves_remainder() {
        let positions = working_positions(&[order("a", "tok1", "BUY", "10", "4", "0.45")]);

        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].remaining_size, dec!(6));
        assert_eq!(positions[0].price, dec!(0.45));
        assert_eq!(positions[0].side, Side::Buy);
    }

    #[test]
    fn test_same_token_and_side_aggregates_with_weighted_price() {
        let positions = working_positions(&[
            order("a", "tok1", "BUY", "10", "0", "0.40"),
            order("b", "tok1", "BUY", "10", "0", "0.60"),
        ]);

        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].remaining_size, dec!(20));
        assert_eq!(positions[0].price, dec!(0.50));
    }

    #[test]
    fn test_opposite_sides_stay_separate() {
        let positions = working_positions(&[
            order("a", "tok1", "BUY", "10", "0", "0.45"),
            order("b", "tok1", "SELL", "5", "0", "0.55"),
        ]);

        assert_eq!(positions.len(), 2);
    }

    #[test]
    fn test_fully_matched_orders_are_dropped() {
        let positions = working_positions(&[order("a", "tok1", "BUY", "10", "10", "0.45")]);
        assert!(positions.is_empty());
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let positions = working_positions(&[
            order("a", "tok1", "BUY", "not-a-number", "0", "0.45"),
            order("b", "tok1", "HOLD", "10", "0", "0.45"),
            order("c", "tok2", "BUY", "3", "1", "0.30"),
        ]);

        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].token_id, "tok2");
        assert_eq!(positions[0].remaining_size, dec!(2));
    }

    #[test]
    fn test_notional() {
        let positions = working_positions(&[order("a", "tok1", "BUY", "10", "0", "0.45")]);
        assert_eq!(positions[0].notional(), dec!(4.5));
    }
}
