//! Quantization of human-unit quantities into on-chain base units
//!
//! All conversions round toward zero: an order can only ever be for slightly
//! less than the caller asked, never more. An amount that truncates to zero
//! base units is an error, not a zero-amount order.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::types::{Result, Side, TradingError};

/// Convert a decimal amount into integer base units, truncating.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<U256> {
    let scale = 10u64.checked_pow(decimals).ok_or_else(|| {
        TradingError::Quantization(format!("{} decimals exceeds the base-unit range", decimals))
    })?;
    let scale = Decimal::from(scale);
    let scaled = amount.checked_mul(scale).ok_or_else(|| {
        TradingError::Quantization(format!("amount {} overflows at {} decimals", amount, decimals))
    })?;

    let truncated = scaled.trunc();
    if truncated <= Decimal::ZERO {
        return Err(TradingError::Quantization(format!(
            "amount {} rounds to zero base units at {} decimals",
            amount, decimals
        )));
    }

    let units = truncated.to_u128().ok_or_else(|| {
        TradingError::Quantization(format!("amount {} does not fit in base units", amount))
    })?;

    Ok(U256::from(units))
}

/// Maker and taker amounts for an order, derived from side, quantity and
/// price.
///
/// A BUY gives collateral (quantity x price) and receives shares; a SELL is
/// the mirror image. Both legs are truncated independently.
pub fn order_amounts(
    side: Side,
    quantity: Decimal,
    price: Decimal,
    share_decimals: u32,
    collateral_decimals: u32,
) -> Result<(U256, U256)> {
    let shares = to_base_units(quantity, share_decimals)?;

    let notional = quantity.checked_mul(price).ok_or_else(|| {
        TradingError::Quantization(format!("notional {} x {} overflows", quantity, price))
    })?;
    let collateral = to_base_units(notional, collateral_decimals)?;

    Ok(match side {
        Side::Buy => (collateral, shares),
        Side::Sell => (shares, collateral),
    })
}
