//! EIP-712 typed data signing for CLOB orders
//!
//! The CLOB uses EIP-712 for:
//! 1. L1 Authentication (deriving/creating API keys)
//! 2. Order signing

use alloy::primitives::{Address, U256};
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct, eip712_domain};

use crate::types::Result;
use crate::wallet::TradingWallet;

/// The fixed message for CLOB auth
const CLOB_AUTH_MESSAGE: &str = "This message attests that I control the given wallet";

// IMPORTANT: Alloy's sol! macro allows "address address;" syntax which produces
// the correct EIP-712 type hash "ClobAuth(address address,string timestamp,uint256 nonce,string message)"
sol! {
    struct ClobAuth {
        address address;
        string timestamp;
        uint256 nonce;
        string message;
    }
}

// The struct MUST be named "Order" for the type hash the exchange verifies
sol! {
    #[derive(Debug)]
    struct Order {
        uint256 salt;
        address maker;
        address signer;
        address taker;
        uint256 tokenId;
        uint256 makerAmount;
        uint256 takerAmount;
        uint256 expiration;
        uint256 nonce;
        uint256 feeRateBps;
        uint8 side;
        uint8 signatureType;
    }
}

/// EIP-712 domain for ClobAuth (L1 authentication)
fn clob_auth_domain(chain_id: u64) -> Eip712Domain {
    eip712_domain! {
        name: "ClobAuthDomain",
        version: "1",
        chain_id: chain_id,
    }
}

/// EIP-712 domain for an exchange contract
///
/// The domain name and version are shared by the binary and negative-risk
/// exchanges; only the verifying contract differs, which is what stops a
/// signature for one exchange from being replayed against the other.
pub fn exchange_domain(verifying_contract: Address, chain_id: u64) -> Eip712Domain {
    eip712_domain! {
        name: "Polymarket CTF Exchange",
        version: "1",
        chain_id: chain_id,
        verifying_contract: verifying_contract,
    }
}

impl TradingWallet {
    /// Sign an order against the given exchange domain.
    ///
    /// The domain (exchange contract + chain id) is baked into the hash, so
    /// the produced signature is only valid for that exchange.
    pub async fn sign_order(
        &self,
        order: &crate::types::Order,
        domain: &Eip712Domain,
    ) -> Result<String> {
        let eip712_order = Order {
            salt: order.salt,
            maker: order.maker,
            signer: order.signer,
            taker: order.taker,
            tokenId: order.token_id,
            makerAmount: order.maker_amount,
            takerAmount: order.taker_amount,
            expiration: order.expiration,
            nonce: order.nonce,
            feeRateBps: order.fee_rate_bps,
            side: order.side,
            signatureType: order.signature_type,
        };

        let signing_hash = eip712_order.eip712_signing_hash(domain);
        tracing::debug!("Order signing hash: 0x{}", hex::encode(signing_hash));

        let signature = self.sign_hash(signing_hash).await?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }

    /// Sign an L1 authentication message using EIP-712 typed data
    ///
    /// Used for creating or deriving API keys.
    pub async fn sign_l1_auth(&self, timestamp: u64, nonce: u64, chain_id: u64) -> Result<String> {
        let clob_auth = ClobAuth {
            address: self.address(),
            timestamp: timestamp.to_string(),
            nonce: U256::from(nonce),
            message: CLOB_AUTH_MESSAGE.to_string(),
        };

        let domain = clob_auth_domain(chain_id);
        let signing_hash = clob_auth.eip712_signing_hash(&domain);

        let signature = self.sign_hash(signing_hash).await?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }
}

/// Generate a random salt for order uniqueness
/// Salt stays within u64 range per CLOB convention
pub fn generate_salt() -> U256 {
    use rand::Rng;
    let mut rng = rand::rng();

    let timestamp_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    // Timestamp base plus random bits, mirroring the official client
    let random_bits: u32 = rng.random();
    let salt = timestamp_ms
        .wrapping_mul(1000)
        .wrapping_add(random_bits as u64);

    U256::from(salt)
}

/// Generate a nonce (timestamp-based)
pub fn generate_nonce() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Current timestamp in seconds
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionConfig;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn sample_order(wallet: &TradingWallet) -> crate::types::Order {
        crate::types::Order {
            salt: U256::from(12345u64),
            maker: wallet.address(),
            signer: wallet.address(),
            taker: Address::ZERO,
            token_id: U256::from(123456789u64),
            maker_amount: U256::from(4_500_000u64),
            taker_amount: U256::from(10_000_000u64),
            expiration: U256::ZERO,
            nonce: U256::ZERO,
            fee_rate_bps: U256::ZERO,
            side: 0,
            signature_type: 0,
        }
    }

    #[test]
    fn test_generate_salt() {
        let salt1 = generate_salt();
        let salt2 = generate_salt();
        assert_ne!(salt1, salt2);
    }

    #[tokio::test]
    async fn test_sign_l1_auth() {
        let wallet = TradingWallet::from_private_key(TEST_KEY).unwrap();

        let signature = wallet.sign_l1_auth(1700000000, 12345, 137).await.unwrap();
        assert!(signature.starts_with("0x"));
        // 65 bytes = 130 hex chars + "0x" prefix
        assert_eq!(signature.len(), 132);
    }

    #[tokio::test]
    async fn test_order_signature_depends_on_exchange() {
        let wallet = TradingWallet::from_private_key(TEST_KEY).unwrap();
        let config = ExecutionConfig::default();
        let order = sample_order(&wallet);

        let binary = wallet
            .sign_order(&order, &config.order_domain(false))
            .await
            .unwrap();
        let neg_risk = wallet
            .sign_order(&order, &config.order_domain(true))
            .await
            .unwrap();

        assert_eq!(binary.len(), 132);
        // Same order, different verifying contract, different signature
        assert_ne!(binary, neg_risk);
    }

    #[tokio::test]
    async fn test_order_signature_is_deterministic() {
        let wallet = TradingWallet::from_private_key(TEST_KEY).unwrap();
        let config = ExecutionConfig::default();
        let order = sample_order(&wallet);
        let domain = config.order_domain(false);

        let a = wallet.sign_order(&order, &domain).await.unwrap();
        let b = wallet.sign_order(&order, &domain).await.unwrap();
        assert_eq!(a, b);
    }
}
