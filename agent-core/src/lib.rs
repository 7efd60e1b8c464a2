//! Core types for the prediction market trading agent
//!
//! This crate defines the shared data structures used across the agent,
//! including market references, resolved snapshots, and trade intents.

pub mod error;
pub mod intent;
pub mod market;

pub use error::{AgentError, AgentResult};
pub use intent::{Outcome, Side, TradeIntent};
pub use market::{MarketRef, MarketSnapshot};
