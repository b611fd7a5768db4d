//! Error types for the reasoning-service layer.

use dossier_core::{RetryClass, Transient};
use thiserror::Error;

/// Errors raised while talking to a reasoning service.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The service refused the API key
    #[error("{provider} rejected the API key (HTTP {status})")]
    Unauthorized {
        /// Provider name
        provider: String,
        /// HTTP status code
        status: u16,
    },

    /// The service asked us to slow down
    #[error("{provider} rate limit exceeded: {message}")]
    RateLimited {
        /// Provider name
        provider: String,
        /// Service message
        message: String,
    },

    /// Any other non-success status
    #[error("{provider} returned HTTP {status}: {message}")]
    Status {
        /// Provider name
        provider: String,
        /// HTTP status code
        status: u16,
        /// Service message
        message: String,
    },

    /// The request could not be sent as built
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response body did not have the expected shape
    #[error("unexpected response from {provider}: {message}")]
    UnexpectedResponse {
        /// Provider name
        provider: String,
        /// What was wrong
        message: String,
    },

    /// Transport failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON encoding or decoding failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No answer within the configured timeout
    #[error("request timed out after {seconds}s")]
    Timeout {
        /// Configured timeout
        seconds: u64,
    },

    /// Client construction or other local failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl LlmError {
    /// Map a non-success HTTP status to the matching variant.
    #[must_use]
    pub fn from_status(provider: &str, status: u16, message: String) -> Self {
        let provider = provider.to_string();
        match status {
            401 | 403 => Self::Unauthorized { provider, status },
            429 => Self::RateLimited { provider, message },
            _ => Self::Status {
                provider,
                status,
                message,
            },
        }
    }
}

impl Transient for LlmError {
    fn retry_class(&self) -> Option<RetryClass> {
        match self {
            Self::RateLimited { .. } => Some(RetryClass::RateLimited),
            Self::Status { status, .. } if *status >= 500 => Some(RetryClass::Transient),
            Self::Network(_) | Self::Timeout { .. } => Some(RetryClass::Transient),
            _ => None,
        }
    }
}

/// Result type alias for reasoning-service operations.
pub type Result<T> = std::result::Result<T, LlmError>;
