//! Execution configuration: endpoints, contracts, decimals, and mode
//!
//! Defaults target Polygon mainnet; every field can be overridden from a
//! config file, which is how tests point the client at doubles.

use alloy::primitives::Address;
use alloy::sol_types::Eip712Domain;
use serde::{Deserialize, Serialize};

use crate::eip712::exchange_domain;
use crate::types::{
    CTF_ADDRESS, CTF_EXCHANGE_ADDRESS, NEG_RISK_ADAPTER_ADDRESS, NEG_RISK_CTF_EXCHANGE_ADDRESS,
    POLYGON_CHAIN_ID, USDC_ADDRESS,
};

/// Whether orders actually reach the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Build and sign orders, but fabricate the acknowledgement locally
    Paper,
    /// Submit orders to the live exchange
    Live,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Paper
    }
}

/// Execution-side configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// CLOB REST endpoint
    #[serde(default = "default_clob_url")]
    pub clob_url: String,

    /// JSON-RPC endpoint for on-chain reads and approval transactions
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Chain id orders and transactions are bound to
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Exchange contract for binary markets
    #[serde(default = "default_exchange")]
    pub exchange_address: Address,

    /// Exchange contract for negative-risk (multi-outcome) markets
    #[serde(default = "default_neg_risk_exchange")]
    pub neg_risk_exchange_address: Address,

    /// Negative-risk adapter contract
    #[serde(default = "default_neg_risk_adapter")]
    pub neg_risk_adapter_address: Address,

    /// Collateral (USDC) token contract
    #[serde(default = "default_collateral")]
    pub collateral_address: Address,

    /// Conditional token (ERC-1155) contract
    #[serde(default = "default_ctf")]
    pub ctf_address: Address,

    /// Decimal exponent for collateral base units
    #[serde(default = "default_decimals")]
    pub collateral_decimals: u32,

    /// Decimal exponent for share base units
    #[serde(default = "default_decimals")]
    pub share_decimals: u32,

    /// Paper or live execution
    #[serde(default)]
    pub mode: ExecutionMode,

    /// How long to wait for an approval transaction to confirm
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,

    /// Poll interval while waiting for confirmation
    #[serde(default = "default_confirmation_poll_secs")]
    pub confirmation_poll_secs: u64,
}

fn default_clob_url() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_rpc_url() -> String {
    "https://polygon-rpc.com".to_string()
}

fn default_chain_id() -> u64 {
    POLYGON_CHAIN_ID
}

fn parse_addr(s: &str) -> Address {
    s.parse().expect("valid contract address constant")
}

fn default_exchange() -> Address {
    parse_addr(CTF_EXCHANGE_ADDRESS)
}

fn default_neg_risk_exchange() -> Address {
    parse_addr(NEG_RISK_CTF_EXCHANGE_ADDRESS)
}

fn default_neg_risk_adapter() -> Address {
    parse_addr(NEG_RISK_ADAPTER_ADDRESS)
}

fn default_collateral() -> Address {
    parse_addr(USDC_ADDRESS)
}

fn default_ctf() -> Address {
    parse_addr(CTF_ADDRESS)
}

fn default_decimals() -> u32 {
    6
}

fn default_confirmation_timeout_secs() -> u64 {
    60
}

fn default_confirmation_poll_secs() -> u64 {
    2
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("empty config deserializes via defaults")
    }
}

impl ExecutionConfig {
    /// The three contracts that need spending rights before any order can
    /// settle: both exchanges and the negative-risk adapter.
    pub fn spenders(&self) -> [Address; 3] {
        [
            self.exchange_address,
            self.neg_risk_exchange_address,
            self.neg_risk_adapter_address,
        ]
    }

    /// EIP-712 domain that order signatures are bound to, selected per
    /// market kind.
    pub fn order_domain(&self, neg_risk: bool) -> Eip712Domain {
        let contract = if neg_risk {
            self.neg_risk_exchange_address
        } else {
            self.exchange_address
        };
        exchange_domain(contract, self.chain_id)
    }
}
