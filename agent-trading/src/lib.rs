//! Trade execution against the Polymarket CLOB
//!
//! This crate provides:
//! - Wallet management (generation, loading from env, EIP-712 signing)
//! - On-chain collateral and position-token approvals for the exchange contracts
//! - Order quantization, creation, signing, and submission
//! - Authenticated CLOB API client with L1/L2 auth

pub mod approvals;
pub mod backoff;
pub mod clob_client;
pub mod config;
pub mod eip712;
pub mod order;
pub mod positions;
pub mod quantize;
pub mod rpc;
pub mod types;
pub mod wallet;

pub use approvals::{ApprovalAction, ApprovalManager, ApprovalReport, SpenderApproval};
pub use backoff::with_backoff;
pub use clob_client::ClobClient;
pub use config::{ExecutionConfig, ExecutionMode};
pub use order::{OrderBuilder, OrderType};
pub use positions::{working_positions, WorkingPosition};
pub use quantize::{order_amounts, to_base_units};
pub use rpc::RpcClient;
pub use types::*;
pub use wallet::TradingWallet;
