//! Pre-trade risk controls for the trading agent
//!
//! A [`RiskGate`] evaluates every [`agent_core::TradeIntent`] against a fixed
//! battery of guardrails before anything touches the exchange, and an
//! [`ExposureLedger`] tracks the daily trade count and open positions the
//! guardrails are measured against.

pub mod controls;
pub mod gate;
pub mod ledger;

pub use controls::TradingControls;
pub use gate::{LimitsStatus, RiskDecision, RiskGate, RiskRule};
pub use ledger::{ExposureLedger, Fill, LedgerSnapshot, OpenPosition, PendingTrade, ReserveError};
