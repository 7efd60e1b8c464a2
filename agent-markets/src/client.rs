//! Gamma catalog API client
//!
//! Thin HTTP layer over the catalog endpoints the resolver needs. Lookup
//! endpoints sometimes answer with a bare object and sometimes with a
//! one-element list, so every response goes through [`OneOrMany`].

use crate::types::{GammaMarket, OneOrMany, GAMMA_API_BASE};
use agent_core::{AgentError, AgentResult};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

/// Catalog API client
#[derive(Clone)]
pub struct MarketsClient {
    client: Client,
    base_url: String,
}

impl MarketsClient {
    /// Create a new catalog client against the public API
    pub fn new() -> Self {
        Self::with_base_url(GAMMA_API_BASE)
    }

    /// Create a catalog client against a specific base URL (used in tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look up a market by its numeric catalog id
    #[instrument(skip(self))]
    pub async fn get_market_by_id(&self, id: &str) -> AgentResult<GammaMarket> {
        self.lookup(&format!("id={}", id), id).await
    }

    /// Look up a market by its URL slug
    #[instrument(skip(self))]
    pub async fn get_market_by_slug(&self, slug: &str) -> AgentResult<GammaMarket> {
        self.lookup(&format!("slug={}", slug), slug).await
    }

    /// Look up a market by its condition id
    #[instrument(skip(self))]
    pub async fn get_market_by_condition_id(&self, condition_id: &str) -> AgentResult<GammaMarket> {
        self.lookup(&format!("condition_ids={}", condition_id), condition_id)
            .await
    }

    /// Look up a market by its on-chain market maker address
    #[instrument(skip(self))]
    pub async fn get_market_by_maker_address(&self, address: &str) -> AgentResult<GammaMarket> {
        self.lookup(&format!("market_maker_address={}", address), address)
            .await
    }

    async fn lookup(&self, query: &str, subject: &str) -> AgentResult<GammaMarket> {
        let url = format!("{}/markets?{}", self.base_url, query);
        debug!("Fetching market from: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AgentError::network(format!("Failed to fetch market: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AgentError::not_found(subject));
        }

        // Rate limits and server-side failures are worth retrying
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(AgentError::network(format!(
                "Catalog API unavailable ({})",
                status
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::api(format!(
                "Catalog API error ({}): {}",
                status, body
            )));
        }

        let payload: OneOrMany<GammaMarket> = response
            .json()
            .await
            .map_err(|e| AgentError::parse(format!("Failed to parse market response: {}", e)))?;

        payload
            .into_first()
            .ok_or_else(|| AgentError::not_found(subject))
    }
}

impl Default for MarketsClient {
    fn default() -> Self {
        Self::new()
    }
}
