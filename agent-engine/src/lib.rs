//! Trading session orchestration
//!
//! Wires the market resolver, risk gate, exposure ledger and CLOB client into
//! a single execute path: resolve, evaluate, reserve, submit, commit.

pub mod session;

pub use session::{TradeAck, TradingSession};
