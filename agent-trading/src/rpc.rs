//! On-chain reads and transaction submission via JSON-RPC
//!
//! Contract reads go through hand-packed eth_call payloads; approval
//! transactions are built as EIP-1559, signed locally, and broadcast with
//! eth_sendRawTransaction. Reads retry on transient failures; a broadcast is
//! attempted exactly once.

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, TxKind, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::backoff::with_backoff;
use crate::types::{Result, TradingError};
use crate::wallet::TradingWallet;

/// ERC20 / ERC1155 function selectors
const ALLOWANCE_SELECTOR: &str = "dd62ed3e"; // allowance(address,address)
const APPROVE_SELECTOR: &str = "095ea7b3"; // approve(address,uint256)
const BALANCE_OF_SELECTOR: &str = "70a08231"; // balanceOf(address)
const IS_APPROVED_FOR_ALL_SELECTOR: &str = "e985e9c5"; // isApprovedForAll(address,address)
const SET_APPROVAL_FOR_ALL_SELECTOR: &str = "a22cb465"; // setApprovalForAll(address,bool)

/// Gas limit for approve/setApprovalForAll calls
const APPROVAL_GAS_LIMIT: u64 = 100_000;

/// Priority fee floor (Polygon validators ignore anything lower)
const PRIORITY_FEE_WEI: u128 = 30_000_000_000;

/// Read attempts before giving up
const READ_ATTEMPTS: u32 = 3;

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: &'static str,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    message: String,
}

/// Minimal transaction receipt view
#[derive(Debug, Clone)]
pub struct ReceiptStatus {
    pub succeeded: bool,
    pub block_number: Option<String>,
}

/// JSON-RPC client for one chain
#[derive(Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
    chain_id: u64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>, chain_id: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: url.into(),
            chain_id,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    // ========================================================================
    // Contract reads
    // ========================================================================

    /// ERC20 allowance(owner, spender) on `token`
    pub async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let data = format!(
            "0x{}{}{}",
            ALLOWANCE_SELECTOR,
            pad_address(owner),
            pad_address(spender)
        );
        let result = self.eth_call_with_retry(token, data).await?;
        parse_uint256(&result)
    }

    /// ERC20 balanceOf(owner) on `token`
    pub async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let data = format!("0x{}{}", BALANCE_OF_SELECTOR, pad_address(owner));
        let result = self.eth_call_with_retry(token, data).await?;
        parse_uint256(&result)
    }

    /// ERC1155 isApprovedForAll(owner, operator) on `token`
    pub async fn is_approved_for_all(
        &self,
        token: Address,
        owner: Address,
        operator: Address,
    ) -> Result<bool> {
        let data = format!(
            "0x{}{}{}",
            IS_APPROVED_FOR_ALL_SELECTOR,
            pad_address(owner),
            pad_address(operator)
        );
        let result = self.eth_call_with_retry(token, data).await?;
        Ok(parse_uint256(&result)? != U256::ZERO)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Send approve(spender, amount) to an ERC20 token. Returns the tx hash.
    pub async fn send_approve(
        &self,
        wallet: &TradingWallet,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<String> {
        let calldata = format!(
            "{}{}{:064x}",
            APPROVE_SELECTOR,
            pad_address(spender),
            amount
        );
        self.send_transaction(wallet, token, &calldata).await
    }

    /// Send setApprovalForAll(operator, true) to an ERC1155 token.
    pub async fn send_set_approval_for_all(
        &self,
        wallet: &TradingWallet,
        token: Address,
        operator: Address,
    ) -> Result<String> {
        let calldata = format!(
            "{}{}{:064x}",
            SET_APPROVAL_FOR_ALL_SELECTOR,
            pad_address(operator),
            U256::from(1u8)
        );
        self.send_transaction(wallet, token, &calldata).await
    }

    /// Build, sign and broadcast an EIP-1559 transaction carrying `calldata`
    /// (hex, no 0x prefix). Broadcast exactly once.
    async fn send_transaction(
        &self,
        wallet: &TradingWallet,
        to: Address,
        calldata: &str,
    ) -> Result<String> {
        // Everything up to the signature is retryable
        let nonce = self.transaction_count(wallet.address()).await?;
        let gas_price = self.gas_price().await?;

        let input = hex::decode(calldata)
            .map_err(|e| TradingError::Signing(format!("Invalid calldata: {}", e)))?;

        let mut tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            gas_limit: APPROVAL_GAS_LIMIT,
            max_fee_per_gas: gas_price * 2 + PRIORITY_FEE_WEI,
            max_priority_fee_per_gas: PRIORITY_FEE_WEI,
            to: TxKind::Call(to),
            value: U256::ZERO,
            access_list: Default::default(),
            input: input.into(),
        };

        let signature = wallet
            .signer()
            .sign_transaction_sync(&mut tx)
            .map_err(|e| TradingError::Signing(format!("Failed to sign transaction: {}", e)))?;

        let envelope: TxEnvelope = tx.into_signed(signature).into();
        let raw = format!("0x{}", hex::encode(envelope.encoded_2718()));

        info!("Broadcasting transaction to {} (nonce {})", to, nonce);
        let result = self
            .request("eth_sendRawTransaction", vec![serde_json::json!(raw)])
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TradingError::Api("Transaction hash missing from response".to_string()))
    }

    /// Poll for a transaction receipt until it lands or `timeout` elapses.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        timeout: Duration,
        poll: Duration,
    ) -> Result<ReceiptStatus> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(receipt) = self.get_receipt(tx_hash).await? {
                if !receipt.succeeded {
                    return Err(TradingError::Approval(format!(
                        "Transaction {} reverted",
                        tx_hash
                    )));
                }
                debug!("Transaction {} confirmed", tx_hash);
                return Ok(receipt);
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(TradingError::Transient(format!(
                    "Timed out waiting for receipt of {}",
                    tx_hash
                )));
            }

            tokio::time::sleep(poll).await;
        }
    }

    async fn get_receipt(&self, tx_hash: &str) -> Result<Option<ReceiptStatus>> {
        let result = self
            .request("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
            .await?;

        if result.is_null() {
            return Ok(None);
        }

        let succeeded = result
            .get("status")
            .and_then(|s| s.as_str())
            .map(|s| s == "0x1")
            .unwrap_or(false);
        let block_number = result
            .get("blockNumber")
            .and_then(|b| b.as_str())
            .map(str::to_string);

        Ok(Some(ReceiptStatus {
            succeeded,
            block_number,
        }))
    }

    async fn transaction_count(&self, address: Address) -> Result<u64> {
        let result = with_backoff("eth_getTransactionCount", READ_ATTEMPTS, || {
            self.request(
                "eth_getTransactionCount",
                vec![
                    serde_json::json!(address.to_checksum(None)),
                    serde_json::json!("pending"),
                ],
            )
        })
        .await?;

        parse_hex_u64(result.as_str().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<u128> {
        let result = with_backoff("eth_gasPrice", READ_ATTEMPTS, || {
            self.request("eth_gasPrice", vec![])
        })
        .await?;

        let hex = result.as_str().unwrap_or_default();
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        u128::from_str_radix(hex, 16)
            .map_err(|e| TradingError::Api(format!("Failed to parse gas price: {}", e)))
    }

    async fn eth_call_with_retry(&self, to: Address, data: String) -> Result<String> {
        let result = with_backoff("eth_call", READ_ATTEMPTS, || {
            self.request(
                "eth_call",
                vec![
                    serde_json::json!({
                        "to": to.to_checksum(None),
                        "data": data,
                    }),
                    serde_json::json!("latest"),
                ],
            )
        })
        .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TradingError::Api("No result in RPC response".to_string()))
    }

    async fn request(
        &self,
        method: &'static str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        debug!("RPC {} -> {}", method, self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    TradingError::Transient(format!("RPC request failed: {}", e))
                } else {
                    TradingError::Api(format!("RPC request failed: {}", e))
                }
            })?;

        // Rate limits and upstream hiccups get retried by the callers' backoff
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(TradingError::Transient(format!(
                "RPC node returned {}",
                status
            )));
        }

        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| TradingError::Api(format!("Failed to parse RPC response: {}", e)))?;

        if let Some(error) = rpc_response.error {
            return Err(TradingError::Api(format!("RPC error: {}", error.message)));
        }

        Ok(rpc_response.result.unwrap_or(serde_json::Value::Null))
    }
}

/// Pad an address to 32 bytes (64 hex chars)
fn pad_address(address: Address) -> String {
    format!("{:0>64}", hex::encode(address.as_slice()))
}

/// Parse a 0x-prefixed hex word as a U256
fn parse_uint256(hex_str: &str) -> Result<U256> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);

    if hex_str.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(hex_str, 16)
        .map_err(|e| TradingError::Api(format!("Failed to parse uint256: {}", e)))
}

fn parse_hex_u64(hex_str: &str) -> Result<u64> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    u64::from_str_radix(hex_str, 16)
        .map_err(|e| TradingError::Api(format!("Failed to parse hex u64: {}", e)))
}
