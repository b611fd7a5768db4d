//! Provider exporters.
//!
//! Each exporter fetches the subject's data from one third-party provider and
//! returns it as a single hierarchical value. Exporters are collaborators of
//! the orchestrator; they own pagination, caps and provider-specific error
//! mapping, and route every request through the injected retry policy.

mod client;
pub mod github;
pub mod stripe;

pub use github::GithubExporter;
pub use stripe::StripeExporter;

use async_trait::async_trait;
use dossier_core::{RetryClass, StageCapability, SubjectId, Transient};
use serde_json::Value;
use thiserror::Error;

/// What to export.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Person the data belongs to
    pub subject: SubjectId,
    /// Provider-specific scope, e.g. an organisation or connected account
    pub scope: Option<String>,
}

impl ExportRequest {
    /// Request for `subject` without a scope.
    #[must_use]
    pub fn new(subject: SubjectId) -> Self {
        Self {
            subject,
            scope: None,
        }
    }

    /// Set the provider scope.
    #[must_use]
    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }
}

/// Errors raised while exporting from a provider.
#[derive(Error, Debug)]
pub enum ExportError {
    /// No credential was supplied for the provider
    #[error("no {key} credential for {provider}")]
    MissingCredential {
        /// Provider name
        provider: String,
        /// Credential key that was looked up
        key: String,
    },

    /// The provider refused the credential (absent, expired or revoked)
    #[error("{provider} rejected the credential (HTTP {status})")]
    CredentialRejected {
        /// Provider name
        provider: String,
        /// HTTP status code
        status: u16,
    },

    /// The provider throttled the request
    #[error("{provider} rate limit exceeded")]
    RateLimited {
        /// Provider name
        provider: String,
    },

    /// The requested resource does not exist
    #[error("{provider} resource not found")]
    NotFound {
        /// Provider name
        provider: String,
    },

    /// Any other non-success response. The body is not kept; it may hold subject data.
    #[error("{provider} API error: HTTP {status}")]
    Api {
        /// Provider name
        provider: String,
        /// HTTP status code
        status: u16,
    },

    /// Transport failure
    #[error("{provider} network error: {source}")]
    Network {
        /// Provider name
        provider: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out
    #[error("{provider} request timed out after {seconds}s")]
    Timeout {
        /// Provider name
        provider: String,
        /// Configured timeout
        seconds: u64,
    },

    /// Response body was not the expected JSON
    #[error("failed to parse {provider} response: {message}")]
    Parse {
        /// Provider name
        provider: String,
        /// Parser message
        message: String,
    },

    /// Client construction or other local failure
    #[error("internal export error: {0}")]
    Internal(String),
}

impl ExportError {
    /// Map a non-success status. `throttled` marks a 403 that is really a rate limit.
    #[must_use]
    pub fn from_status(provider: &str, status: u16, throttled: bool) -> Self {
        let provider = provider.to_string();
        match status {
            429 => Self::RateLimited { provider },
            403 if throttled => Self::RateLimited { provider },
            401 | 403 => Self::CredentialRejected { provider, status },
            404 => Self::NotFound { provider },
            _ => Self::Api { provider, status },
        }
    }
}

impl Transient for ExportError {
    fn retry_class(&self) -> Option<RetryClass> {
        match self {
            Self::RateLimited { .. } => Some(RetryClass::RateLimited),
            Self::Api { status, .. } if *status >= 500 => Some(RetryClass::Transient),
            Self::Network { .. } | Self::Timeout { .. } => Some(RetryClass::Transient),
            _ => None,
        }
    }
}

/// A source of subject data.
#[async_trait]
pub trait ProviderExporter: Send + Sync {
    /// Provider name, used as the dataset key.
    fn provider(&self) -> &str;

    /// Stage this exporter implements.
    fn capability(&self) -> StageCapability;

    /// Credential key holding the provider token.
    fn credential_key(&self) -> &str {
        self.capability().credential_key()
    }

    /// Whether the run may continue without this provider.
    fn is_optional(&self) -> bool {
        self.capability().is_optional()
    }

    /// Fetch everything the provider holds about the subject.
    async fn export(&self, request: &ExportRequest, token: &str) -> Result<Value, ExportError>;
}
