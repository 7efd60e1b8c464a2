//! Idempotent token approvals for the exchange contracts
//!
//! Before any order can settle, the exchange, neg-risk exchange and neg-risk
//! adapter each need an unlimited collateral allowance and operator approval
//! on the outcome token contract. `ensure_approved` checks current on-chain
//! state first and only sends transactions for what is missing, so it is safe
//! to call on every startup.

use alloy::primitives::{Address, U256};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use crate::config::ExecutionConfig;
use crate::rpc::RpcClient;
use crate::types::{Result, TradingError};
use crate::wallet::TradingWallet;

/// What happened to a single (spender, token) grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalAction {
    /// On-chain state was already sufficient, no transaction sent
    AlreadyApproved,
    /// An approval transaction was sent and confirmed
    Granted { tx_hash: String },
    /// The grant could not be established
    Failed(String),
    /// Not attempted because the collateral step for this spender failed
    Skipped,
}

impl ApprovalAction {
    pub fn sent_transaction(&self) -> bool {
        matches!(self, ApprovalAction::Granted { .. })
    }

    pub fn is_approved(&self) -> bool {
        matches!(
            self,
            ApprovalAction::AlreadyApproved | ApprovalAction::Granted { .. }
        )
    }
}

/// Outcome for one spender contract
#[derive(Debug, Clone)]
pub struct SpenderApproval {
    pub spender: Address,
    /// ERC20 allowance on the collateral token
    pub collateral: ApprovalAction,
    /// ERC1155 operator approval on the outcome token contract
    pub position_tokens: ApprovalAction,
}

impl SpenderApproval {
    pub fn is_approved(&self) -> bool {
        self.collateral.is_approved() && self.position_tokens.is_approved()
    }
}

/// Result of a full approval pass
#[derive(Debug, Clone, Default)]
pub struct ApprovalReport {
    pub spenders: Vec<SpenderApproval>,
}

impl ApprovalReport {
    /// True once every spender holds both grants
    pub fn all_approved(&self) -> bool {
        !self.spenders.is_empty() && self.spenders.iter().all(|s| s.is_approved())
    }

    /// Number of transactions this pass actually broadcast
    pub fn transactions_sent(&self) -> usize {
        self.spenders
            .iter()
            .map(|s| {
                s.collateral.sent_transaction() as usize
                    + s.position_tokens.sent_transaction() as usize
            })
            .sum()
    }
}

/// Grants and verifies exchange approvals for one wallet
pub struct ApprovalManager {
    rpc: RpcClient,
    config: ExecutionConfig,
}

impl ApprovalManager {
    pub fn new(rpc: RpcClient, config: ExecutionConfig) -> Self {
        Self { rpc, config }
    }

    /// Bring every exchange spender up to full approval. A failure on one
    /// spender's collateral step skips its operator step but does not stop
    /// the remaining spenders; the report carries the per-step outcome.
    #[instrument(skip(self, wallet), fields(owner = %wallet.address()))]
    pub async fn ensure_approved(&self, wallet: &TradingWallet) -> Result<ApprovalReport> {
        let owner = wallet.address();
        let mut report = ApprovalReport::default();

        for spender in self.config.spenders() {
            let collateral = match self
                .ensure_collateral_allowance(wallet, owner, spender)
                .await
            {
                Ok(action) => action,
                Err(e) => {
                    error!("Collateral approval for {} failed: {}", spender, e);
                    ApprovalAction::Failed(e.to_string())
                }
            };

            let position_tokens = if collateral.is_approved() {
                match self.ensure_operator_approval(wallet, owner, spender).await {
                    Ok(action) => action,
                    Err(e) => {
                        error!("Operator approval for {} failed: {}", spender, e);
                        ApprovalAction::Failed(e.to_string())
                    }
                }
            } else {
                ApprovalAction::Skipped
            };

            info!(
                "Spender {}: collateral {:?}, position tokens {:?}",
                spender, collateral, position_tokens
            );

            report.spenders.push(SpenderApproval {
                spender,
                collateral,
                position_tokens,
            });
        }

        Ok(report)
    }

    async fn ensure_collateral_allowance(
        &self,
        wallet: &TradingWallet,
        owner: Address,
        spender: Address,
    ) -> Result<ApprovalAction> {
        let current = self
            .rpc
            .allowance(self.config.collateral_address, owner, spender)
            .await?;

        if allowance_sufficient(current) {
            debug!("Allowance for {} already sufficient", spender);
            return Ok(ApprovalAction::AlreadyApproved);
        }

        info!("Granting collateral allowance to {}", spender);
        let tx_hash = self
            .rpc
            .send_approve(wallet, self.config.collateral_address, spender, U256::MAX)
            .await?;

        self.confirm(&tx_hash).await?;

        // Verify the state we just paid for
        let after = self
            .rpc
            .allowance(self.config.collateral_address, owner, spender)
            .await?;
        if !allowance_sufficient(after) {
            return Err(TradingError::Approval(format!(
                "Allowance for {} still insufficient after {}",
                spender, tx_hash
            )));
        }

        Ok(ApprovalAction::Granted { tx_hash })
    }

    async fn ensure_operator_approval(
        &self,
        wallet: &TradingWallet,
        owner: Address,
        operator: Address,
    ) -> Result<ApprovalAction> {
        let approved = self
            .rpc
            .is_approved_for_all(self.config.ctf_address, owner, operator)
            .await?;

        if approved {
            debug!("Operator approval for {} already set", operator);
            return Ok(ApprovalAction::AlreadyApproved);
        }

        info!("Granting operator approval to {}", operator);
        let tx_hash = self
            .rpc
            .send_set_approval_for_all(wallet, self.config.ctf_address, operator)
            .await?;

        self.confirm(&tx_hash).await?;

        let after = self
            .rpc
            .is_approved_for_all(self.config.ctf_address, owner, operator)
            .await?;
        if !after {
            return Err(TradingError::Approval(format!(
                "Operator approval for {} still unset after {}",
                operator, tx_hash
            )));
        }

        Ok(ApprovalAction::Granted { tx_hash })
    }

    async fn confirm(&self, tx_hash: &str) -> Result<()> {
        self.rpc
            .wait_for_receipt(
                tx_hash,
                Duration::from_secs(self.config.confirmation_timeout_secs),
                Duration::from_secs(self.config.confirmation_poll_secs),
            )
            .await?;
        Ok(())
    }
}

/// An allowance counts as sufficient when it is effectively unlimited. Spent
/// allowance ticks the value down from U256::MAX, so compare against half.
fn allowance_sufficient(allowance: U256) -> bool {
    allowance >= U256::MAX / U256::from(2u8)
}
