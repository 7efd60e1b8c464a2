//! Authenticated CLOB API client
//!
//! Two auth layers: L1 is an EIP-712 signature over a fixed attestation
//! message, used only to create or derive API credentials. L2 is an
//! HMAC-SHA256 over timestamp + method + path + body with those credentials,
//! used for every trading call. Order posts are never retried.

use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use sha2::Sha256;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ExecutionConfig, ExecutionMode};
use crate::eip712::{current_timestamp, generate_nonce};
use crate::order::{OrderBuilder, OrderType};
use crate::positions::{working_positions, WorkingPosition};
use crate::types::{
    ApiCredentials, ApiKeyResponse, MidpointResponse, OpenOrder, OrderBook, OrderResponse,
    OrderScoring, PostOrderRequest, PriceResponse, Result, Side, SignedOrder, TradingError,
    UserTrade,
};
use crate::wallet::TradingWallet;

// Header names
const HEADER_ADDRESS: &str = "POLY_ADDRESS";
const HEADER_SIGNATURE: &str = "POLY_SIGNATURE";
const HEADER_TIMESTAMP: &str = "POLY_TIMESTAMP";
const HEADER_NONCE: &str = "POLY_NONCE";
const HEADER_API_KEY: &str = "POLY_API_KEY";
const HEADER_PASSPHRASE: &str = "POLY_PASSPHRASE";

type HmacSha256 = Hmac<Sha256>;

/// Authenticated client for the CLOB API
pub struct ClobClient {
    wallet: TradingWallet,
    http_client: reqwest::Client,
    config: ExecutionConfig,
}

impl ClobClient {
    /// Create a new CLOB client with the given wallet
    pub fn new(wallet: TradingWallet, config: ExecutionConfig) -> Self {
        // Build HTTP client with proper headers to avoid Cloudflare blocks.
        // The timeout bounds how long an exchange call can hold a ledger
        // reservation open.
        let http_client = reqwest::Client::builder()
            .user_agent("prediction-agent/1.0")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            wallet,
            http_client,
            config,
        }
    }

    /// Create a new CLOB client from environment
    pub fn from_env(config: ExecutionConfig) -> Result<Self> {
        let wallet = TradingWallet::from_env()?;
        Ok(Self::new(wallet, config))
    }

    /// Get the wallet address
    pub fn address(&self) -> String {
        self.wallet.address_string()
    }

    /// Get a reference to the wallet
    pub fn wallet(&self) -> &TradingWallet {
        &self.wallet
    }

    /// Get a mutable reference to the wallet
    pub fn wallet_mut(&mut self) -> &mut TradingWallet {
        &mut self.wallet
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    // ========================================================================
    // L1 Authentication (EIP-712 signing for API key management)
    // ========================================================================

    /// Build L1 authentication headers
    async fn build_l1_headers(&self) -> Result<HeaderMap> {
        let timestamp = current_timestamp();
        let nonce = generate_nonce();

        let address = self.wallet.address_string();
        debug!("Building L1 auth headers for {}", address);

        let signature = self
            .wallet
            .sign_l1_auth(timestamp, nonce, self.config.chain_id)
            .await?;

        let mut headers = HeaderMap::new();
        headers.insert(
            HEADER_ADDRESS,
            HeaderValue::from_str(&address)
                .map_err(|e| TradingError::Api(format!("Invalid header value: {}", e)))?,
        );
        headers.insert(
            HEADER_SIGNATURE,
            HeaderValue::from_str(&signature)
                .map_err(|e| TradingError::Api(format!("Invalid header value: {}", e)))?,
        );
        headers.insert(
            HEADER_TIMESTAMP,
            HeaderValue::from_str(&timestamp.to_string())
                .map_err(|e| TradingError::Api(format!("Invalid header value: {}", e)))?,
        );
        headers.insert(
            HEADER_NONCE,
            HeaderValue::from_str(&nonce.to_string())
                .map_err(|e| TradingError::Api(format!("Invalid header value: {}", e)))?,
        );

        Ok(headers)
    }

    /// Create new API credentials (L1 auth)
    pub async fn create_api_key(&mut self) -> Result<ApiCredentials> {
        info!(
            "Creating new API key for wallet {}",
            self.wallet.address_string()
        );

        let headers = self.build_l1_headers().await?;
        let url = format!("{}/auth/api-key", self.config.clob_url);

        let response = self.http_client.post(&url).headers(headers).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Failed to create API key: {} - {}", status, body);
            return Err(TradingError::Api(format!(
                "Failed to create API key: {} - {}",
                status, body
            )));
        }

        let api_key_response: ApiKeyResponse = response.json().await?;

        let credentials = ApiCredentials {
            api_key: api_key_response.api_key,
            secret: api_key_response.secret,
            passphrase: api_key_response.passphrase,
        };

        self.wallet.set_api_credentials(credentials.clone());
        info!("API key created successfully");

        Ok(credentials)
    }

    /// Derive existing API credentials (L1 auth)
    pub async fn derive_api_key(&mut self) -> Result<ApiCredentials> {
        info!(
            "Deriving API key for wallet {}",
            self.wallet.address_string()
        );

        let headers = self.build_l1_headers().await?;
        let url = format!("{}/auth/derive-api-key", self.config.clob_url);

        let response = self.http_client.get(&url).headers(headers).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Failed to derive API key: {} - {}", status, body);

            // The server is inconsistent about how it says "no key exists":
            // 404, "not found", or "Could not derive"
            if status == 404 || body.contains("not found") || body.contains("Could not derive") {
                info!("No existing API key found, creating new one");
                return self.create_api_key().await;
            }

            return Err(TradingError::Api(format!(
                "Failed to derive API key: {} - {}",
                status, body
            )));
        }

        let api_key_response: ApiKeyResponse = response.json().await?;

        let credentials = ApiCredentials {
            api_key: api_key_response.api_key,
            secret: api_key_response.secret,
            passphrase: api_key_response.passphrase,
        };

        self.wallet.set_api_credentials(credentials.clone());
        info!("API key derived successfully");

        Ok(credentials)
    }

    /// Ensure we have API credentials, deriving them if necessary
    pub async fn ensure_api_key(&mut self) -> Result<()> {
        if self.wallet.has_api_credentials() {
            return Ok(());
        }

        self.derive_api_key().await?;
        Ok(())
    }

    // ========================================================================
    // L2 Authentication (HMAC signing for trading operations)
    // ========================================================================

    /// Build HMAC signature for L2 auth
    fn build_hmac_signature(
        &self,
        secret: &str,
        timestamp: &str,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<String> {
        let message = format!("{}{}{}{}", timestamp, method, path, body);

        // The secret arrives as URL-safe base64, sometimes without padding.
        // Try the strict decoders first, then re-pad by hand.
        let secret_bytes =
            base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, secret)
                .or_else(|_| {
                    base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE, secret)
                })
                .or_else(|_| {
                    let padded = match secret.len() % 4 {
                        2 => format!("{}==", secret),
                        3 => format!("{}=", secret),
                        _ => secret.to_string(),
                    };
                    base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE, &padded)
                })
                .map_err(|e| TradingError::Signing(format!("Invalid secret encoding: {}", e)))?;

        let mut mac = HmacSha256::new_from_slice(&secret_bytes)
            .map_err(|e| TradingError::Signing(format!("Failed to create HMAC: {}", e)))?;

        mac.update(message.as_bytes());
        let result_bytes = mac.finalize().into_bytes();

        // IMPORTANT: the server expects URL-safe base64 WITH padding,
        // so URL_SAFE rather than URL_SAFE_NO_PAD
        Ok(base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE,
            result_bytes,
        ))
    }

    /// Build L2 authentication headers. `path` must include the query string
    /// when there is one, the HMAC covers it.
    fn build_l2_headers(&self, method: &str, path: &str, body: &str) -> Result<HeaderMap> {
        let credentials = self.wallet.api_credentials().ok_or_else(|| {
            TradingError::NotAuthenticated("API credentials not set".to_string())
        })?;

        let timestamp = current_timestamp().to_string();
        let signature = self.build_hmac_signature(&credentials.secret, &timestamp, method, path, body)?;

        let address = self.wallet.address_string();

        let mut headers = HeaderMap::new();
        headers.insert(
            HEADER_ADDRESS,
            HeaderValue::from_str(&address)
                .map_err(|e| TradingError::Api(format!("Invalid header value: {}", e)))?,
        );
        headers.insert(
            HEADER_SIGNATURE,
            HeaderValue::from_str(&signature)
                .map_err(|e| TradingError::Api(format!("Invalid header value: {}", e)))?,
        );
        headers.insert(
            HEADER_TIMESTAMP,
            HeaderValue::from_str(&timestamp)
                .map_err(|e| TradingError::Api(format!("Invalid header value: {}", e)))?,
        );
        headers.insert(
            HEADER_API_KEY,
            HeaderValue::from_str(&credentials.api_key)
                .map_err(|e| TradingError::Api(format!("Invalid header value: {}", e)))?,
        );
        headers.insert(
            HEADER_PASSPHRASE,
            HeaderValue::from_str(&credentials.passphrase)
                .map_err(|e| TradingError::Api(format!("Invalid header value: {}", e)))?,
        );

        Ok(headers)
    }

    // ========================================================================
    // Trading Operations (L2 authenticated)
    // ========================================================================

    /// Submit a signed order to the CLOB. A post is attempted exactly once;
    /// on a network failure the order state is unknown and the caller must
    /// reconcile via get_open_orders rather than resubmit.
    pub async fn post_order(
        &self,
        signed_order: SignedOrder,
        order_type: OrderType,
    ) -> Result<OrderResponse> {
        debug!("Submitting order: {:?}", signed_order);

        if self.config.mode == ExecutionMode::Paper {
            info!(
                "Paper mode: order for token {} accepted locally",
                signed_order.order.token_id
            );
            return Ok(OrderResponse {
                success: true,
                error_msg: None,
                order_id: Some(format!("paper-{}", uuid::Uuid::new_v4())),
                transaction_hashes: Vec::new(),
                status: Some("paper".to_string()),
            });
        }

        // The owner field carries the API key, not the wallet address
        let credentials = self.wallet.api_credentials().ok_or_else(|| {
            TradingError::NotAuthenticated("API credentials required for order submission".to_string())
        })?;

        let path = "/order";
        let request = PostOrderRequest {
            order: signed_order,
            owner: credentials.api_key.clone(),
            order_type: order_type.as_str().to_string(),
        };

        let body = serde_json::to_string(&request)?;
        let headers = self.build_l2_headers("POST", path, &body)?;

        let url = format!("{}{}", self.config.clob_url, path);
        let response = self
            .http_client
            .post(&url)
            .headers(headers)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Order submission failed: {} - {}", status, body);
            return Err(TradingError::OrderRejected(format!("{} - {}", status, body)));
        }

        let order_response: OrderResponse = response.json().await?;

        if !order_response.success {
            return Err(TradingError::OrderRejected(
                order_response
                    .error_msg
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        info!("Order submitted successfully: {:?}", order_response.order_id);
        Ok(order_response)
    }

    /// Build, sign and submit an order in one call
    #[instrument(skip(self), fields(token_id = %token_id))]
    pub async fn submit_order(
        &self,
        token_id: &str,
        price: Decimal,
        size: Decimal,
        side: Side,
        neg_risk: bool,
        order_type: OrderType,
    ) -> Result<OrderResponse> {
        let builder = OrderBuilder::new(token_id, price, size, side).with_neg_risk(neg_risk);
        let signed_order = builder.build_and_sign(&self.wallet, &self.config).await?;
        self.post_order(signed_order, order_type).await
    }

    /// Cancel an order by ID
    pub async fn cancel_order(&self, order_id: &str) -> Result<()> {
        info!("Cancelling order: {}", order_id);

        let path = "/order";
        let body = serde_json::json!({ "orderID": order_id }).to_string();
        let headers = self.build_l2_headers("DELETE", path, &body)?;

        let url = format!("{}{}", self.config.clob_url, path);
        let response = self
            .http_client
            .delete(&url)
            .headers(headers)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Cancel order failed: {} - {}", status, body);
            return Err(TradingError::Api(format!(
                "Failed to cancel order: {} - {}",
                status, body
            )));
        }

        info!("Order cancelled successfully: {}", order_id);
        Ok(())
    }

    /// Cancel all orders
    pub async fn cancel_all_orders(&self) -> Result<()> {
        info!("Cancelling all orders");

        let path = "/cancel-all";
        let headers = self.build_l2_headers("DELETE", path, "")?;

        let url = format!("{}{}", self.config.clob_url, path);
        let response = self.http_client.delete(&url).headers(headers).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Cancel all orders failed: {} - {}", status, body);
            return Err(TradingError::Api(format!(
                "Failed to cancel all orders: {} - {}",
                status, body
            )));
        }

        info!("All orders cancelled successfully");
        Ok(())
    }

    /// Get open orders, optionally filtered by market condition id or maker
    /// address
    pub async fn get_open_orders(
        &self,
        market: Option<&str>,
        maker: Option<&str>,
    ) -> Result<Vec<OpenOrder>> {
        debug!("Fetching open orders");

        let path = filtered_path("/data/orders", market, maker);
        let headers = self.build_l2_headers("GET", &path, "")?;

        let url = format!("{}{}", self.config.clob_url, path);
        let response = self.http_client.get(&url).headers(headers).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TradingError::Api(format!(
                "Failed to get orders: {} - {}",
                status, body
            )));
        }

        // API returns paginated response: {"data": [...], "next_cursor": "...", ...}
        #[derive(serde::Deserialize)]
        struct PaginatedResponse {
            data: Vec<OpenOrder>,
        }
        let response: PaginatedResponse = response.json().await?;
        Ok(response.data)
    }

    /// Get the user's trade history, optionally filtered by market condition
    /// id or maker address
    pub async fn get_trades(
        &self,
        market: Option<&str>,
        maker: Option<&str>,
    ) -> Result<Vec<UserTrade>> {
        debug!("Fetching trades");

        let path = filtered_path("/data/trades", market, maker);
        let headers = self.build_l2_headers("GET", &path, "")?;

        let url = format!("{}{}", self.config.clob_url, path);
        let response = self.http_client.get(&url).headers(headers).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TradingError::Api(format!(
                "Failed to get trades: {} - {}",
                status, body
            )));
        }

        #[derive(serde::Deserialize)]
        struct PaginatedResponse {
            data: Vec<UserTrade>,
        }
        let response: PaginatedResponse = response.json().await?;
        Ok(response.data)
    }

    /// Check whether an order is currently scoring (counting toward rewards)
    pub async fn get_order_scoring(&self, order_id: &str) -> Result<OrderScoring> {
        debug!("Fetching order scoring for {}", order_id);

        let path = format!("/order-scoring?order_id={}", order_id);
        let headers = self.build_l2_headers("GET", &path, "")?;

        let url = format!("{}{}", self.config.clob_url, path);
        let response = self.http_client.get(&url).headers(headers).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TradingError::Api(format!(
                "Failed to get order scoring: {} - {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    /// Get the best price for a token on one side of the book. Public
    /// endpoint, no auth needed.
    pub async fn get_price(&self, token_id: &str, side: Side) -> Result<Decimal> {
        let url = format!(
            "{}/price?token_id={}&side={}",
            self.config.clob_url,
            token_id,
            side.as_str()
        );

        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TradingError::Api(format!(
                "Failed to get price: {} - {}",
                status, body
            )));
        }

        let price_response: PriceResponse = response.json().await?;
        price_response
            .price
            .parse::<Decimal>()
            .map_err(|e| TradingError::Api(format!("Failed to parse price: {}", e)))
    }

    /// Get the midpoint of the book for a token. Public endpoint.
    pub async fn get_midpoint(&self, token_id: &str) -> Result<Decimal> {
        let url = format!("{}/midpoint?token_id={}", self.config.clob_url, token_id);

        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TradingError::Api(format!(
                "Failed to get midpoint: {} - {}",
                status, body
            )));
        }

        let midpoint: MidpointResponse = response.json().await?;
        midpoint
            .mid
            .parse::<Decimal>()
            .map_err(|e| TradingError::Api(format!("Failed to parse midpoint: {}", e)))
    }

    /// Get order book depth for a token. Public endpoint.
    pub async fn get_order_book(&self, token_id: &str) -> Result<OrderBook> {
        let url = format!("{}/book?token_id={}", self.config.clob_url, token_id);

        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TradingError::Api(format!(
                "Failed to get order book: {} - {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    /// Best-effort view of working exposure, reconstructed from open orders.
    /// Only covers resting orders; filled positions live on chain.
    pub async fn open_positions(&self) -> Result<Vec<WorkingPosition>> {
        let orders = self.get_open_orders(None, None).await?;
        Ok(working_positions(&orders))
    }
}

/// Append market/maker query parameters to a data path. The result feeds the
/// HMAC, so it must match the request URL byte for byte.
fn filtered_path(base: &str, market: Option<&str>, maker: Option<&str>) -> String {
    let mut path = base.to_string();
    let mut sep = '?';
    if let Some(m) = market {
        path.push(sep);
        path.push_str("market=");
        path.push_str(m);
        sep = '&';
    }
    if let Some(m) = maker {
        path.push(sep);
        path.push_str("maker=");
        path.push_str(m);
    }
    path
}

impl std::fmt::Debug for ClobClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClobClient")
            .field("wallet", &self.wallet)
            .field("clob_url", &self.config.clob_url)
            .field("mode", &self.config.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ClobClient {
        let wallet = TradingWallet::from_private_key(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        ClobClient::new(wallet, ExecutionConfig::default())
    }

    #[test]
    fn test_hmac_signature_is_deterministic() {
        let c = client();
        // URL-safe base64 of a 32-byte secret
        let secret = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

        let a = c
            .build_hmac_signature(secret, "1700000000", "POST", "/order", "{}")
            .unwrap();
        let b = c
            .build_hmac_signature(secret, "1700000000", "POST", "/order", "{}")
            .unwrap();

        assert_eq!(a, b);
        // URL-safe base64 of 32 HMAC bytes, with padding
        assert_eq!(a.len(), 44);
        assert!(a.ends_with('='));
        assert!(!a.contains('+') && !a.contains('/'));
    }

    #[test]
    fn test_hmac_accepts_unpadded_secret() {
        let c = client();
        let padded = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";
        let unpadded = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

        let a = c
            .build_hmac_signature(padded, "1700000000", "GET", "/data/orders", "")
            .unwrap();
        let b = c
            .build_hmac_signature(unpadded, "1700000000", "GET", "/data/orders", "")
            .unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_hmac_covers_query_string() {
        let c = client();
        let secret = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

        let bare = c
            .build_hmac_signature(secret, "1700000000", "GET", "/data/orders", "")
            .unwrap();
        let filtered = c
            .build_hmac_signature(secret, "1700000000", "GET", "/data/orders?market=0xabc", "")
            .unwrap();

        assert_ne!(bare, filtered);
    }

    #[test]
    fn test_filtered_path() {
        assert_eq!(filtered_path("/data/orders", None, None), "/data/orders");
        assert_eq!(
            filtered_path("/data/orders", Some("0xabc"), None),
            "/data/orders?market=0xabc"
        );
        assert_eq!(
            filtered_path("/data/trades", Some("0xabc"), Some("0xdef")),
            "/data/trades?market=0xabc&maker=0xdef"
        );
        assert_eq!(
            filtered_path("/data/trades", None, Some("0xdef")),
            "/data/trades?maker=0xdef"
        );
    }

    #[test]
    fn test_l2_headers_require_credentials() {
        let c = client();
        let err = c.build_l2_headers("GET", "/data/orders", "").unwrap_err();
        assert!(matches!(err, TradingError::NotAuthenticated(_)));
    }

    #[tokio::test]
    async fn test_paper_mode_accepts_order_without_network() {
        let c = client();
        let builder = OrderBuilder::new(
            "71321045679252212594626385532706912750332728571942532289631379312455583992563",
            rust_decimal_macros::dec!(0.45),
            rust_decimal_macros::dec!(10),
            Side::Buy,
        );
        let signed = builder.build_and_sign(c.wallet(), c.config()).await.unwrap();

        let response = c.post_order(signed, OrderType::Gtc).await.unwrap();
        assert!(response.success);
        assert!(response.order_id.unwrap().starts_with("paper-"));
        assert_eq!(response.status.as_deref(), Some("paper"));
    }
}
