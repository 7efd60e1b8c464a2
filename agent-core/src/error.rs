//! Error types shared across the agent

use thiserror::Error;

/// Agent-wide error type
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Market not found: {0}")]
    NotFound(String),

    #[error("Outcome token ids unavailable for market {0}")]
    TokenIdsUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn api(msg: impl Into<String>) -> Self {
        AgentError::Api(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        AgentError::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        AgentError::Parse(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AgentError::NotFound(msg.into())
    }

    pub fn token_ids_unavailable(market: impl Into<String>) -> Self {
        AgentError::TokenIdsUnavailable(market.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        AgentError::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AgentError::Internal(msg.into())
    }

    /// Whether a retry of the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AgentError::Network(_))
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
