//! Order creation and signing for the CLOB

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::ExecutionConfig;
use crate::eip712::{current_timestamp, generate_salt};
use crate::quantize::order_amounts;
use crate::types::{Order, Result, Side, SignatureType, SignedOrder, TradingError};
use crate::wallet::TradingWallet;

/// Order type for submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Good-Til-Cancelled - rests in book until filled or cancelled
    Gtc,
    /// Good-Til-Date - expires at specified timestamp
    Gtd,
    /// Fill-Or-Kill - must fill entirely or cancel immediately
    Fok,
    /// Fill-And-Kill - fill what you can, cancel the rest
    Fak,
}

impl OrderType {
    pub fn as_str(&self) -> &str {
        match self {
            OrderType::Gtc => "GTC",
            OrderType::Gtd => "GTD",
            OrderType::Fok => "FOK",
            OrderType::Fak => "FAK",
        }
    }
}

/// Builder for CLOB orders
#[derive(Debug, Clone)]
pub struct OrderBuilder {
    /// Token ID (CLOB token ID for the outcome)
    token_id: String,
    /// Price per share in (0, 1)
    price: Decimal,
    /// Size (number of shares, fractional allowed)
    size: Decimal,
    /// Side (Buy or Sell)
    side: Side,
    /// Expiration timestamp (0 for no expiry)
    expiration: u64,
    /// Maker nonce, defaults to the build-time Unix timestamp so every
    /// fresh order carries a fresh nonce
    nonce: Option<u64>,
    /// Fee rate in basis points (default 0)
    fee_rate_bps: u64,
    /// Whether this is a neg risk market
    is_neg_risk: bool,
}

impl OrderBuilder {
    /// Create a new order builder
    pub fn new(token_id: impl Into<String>, price: Decimal, size: Decimal, side: Side) -> Self {
        Self {
            token_id: token_id.into(),
            price,
            size,
            side,
            expiration: 0,
            nonce: None,
            fee_rate_bps: 0,
            is_neg_risk: false,
        }
    }

    /// Set expiration timestamp
    pub fn with_expiration(mut self, expiration: u64) -> Self {
        self.expiration = expiration;
        self
    }

    /// Pin the maker nonce, e.g. when resubmitting a rejected order
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Set fee rate in basis points
    pub fn with_fee_rate(mut self, fee_rate_bps: u64) -> Self {
        self.fee_rate_bps = fee_rate_bps;
        self
    }

    /// Set whether this order targets the negative-risk exchange
    pub fn with_neg_risk(mut self, is_neg_risk: bool) -> Self {
        self.is_neg_risk = is_neg_risk;
        self
    }

    /// Check if this order targets the negative-risk exchange
    pub fn is_neg_risk(&self) -> bool {
        self.is_neg_risk
    }

    /// Validate order parameters
    fn validate(&self) -> Result<()> {
        if self.price <= Decimal::ZERO || self.price >= Decimal::ONE {
            return Err(TradingError::InvalidOrder(format!(
                "Price must be strictly between 0 and 1, got {}",
                self.price
            )));
        }

        if self.size <= Decimal::ZERO {
            return Err(TradingError::InvalidOrder(format!(
                "Size must be positive, got {}",
                self.size
            )));
        }

        if self.token_id.is_empty() {
            return Err(TradingError::InvalidOrder(
                "Token ID cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the order struct (unsigned)
    pub fn build(&self, wallet: &TradingWallet, config: &ExecutionConfig) -> Result<Order> {
        self.validate()?;

        let maker = wallet.address();
        let signer = wallet.address();
        // Zero taker keeps the order open to anyone
        let taker = Address::ZERO;

        let token_id = U256::from_str(&self.token_id)
            .map_err(|e| TradingError::InvalidOrder(format!("Invalid token ID: {}", e)))?;

        // makerAmount is what we give, takerAmount what we receive.
        // BUY gives collateral and receives shares, SELL the reverse.
        let (maker_amount, taker_amount) = order_amounts(
            self.side,
            self.size,
            self.price,
            config.share_decimals,
            config.collateral_decimals,
        )?;

        Ok(Order {
            salt: generate_salt(),
            maker,
            signer,
            taker,
            token_id,
            maker_amount,
            taker_amount,
            expiration: U256::from(self.expiration),
            nonce: U256::from(self.nonce.unwrap_or_else(current_timestamp)),
            fee_rate_bps: U256::from(self.fee_rate_bps),
            side: self.side.as_u8(),
            signature_type: SignatureType::Eoa as u8,
        })
    }

    /// Build and sign the order against the exchange the market settles on
    pub async fn build_and_sign(
        &self,
        wallet: &TradingWallet,
        config: &ExecutionConfig,
    ) -> Result<SignedOrder> {
        let order = self.build(wallet, config)?;
        let domain = config.order_domain(self.is_neg_risk);
        let signature = wallet.sign_order(&order, &domain).await?;

        Ok(SignedOrder { order, signature })
    }
}
