//! Market catalog integration for the trading agent
//!
//! Talks to the Gamma catalog API, tolerates its loosely-typed payloads, and
//! resolves any [`agent_core::MarketRef`] into a normalized
//! [`agent_core::MarketSnapshot`].

pub mod client;
pub mod resolver;
pub mod types;

pub use client::MarketsClient;
pub use resolver::MarketResolver;
pub use types::GammaMarket;
