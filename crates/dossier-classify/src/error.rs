//! Error types for the classification stage.

use dossier_llm::LlmError;
use thiserror::Error;

/// Errors that end the classification stage.
#[derive(Error, Debug)]
pub enum ClassificationError {
    /// The reasoning service could not be reached or rejected the call
    #[error("reasoning service call failed: {0}")]
    Service(#[from] LlmError),

    /// The service answered with no text
    #[error("reasoning service returned an empty response")]
    EmptyResponse,

    /// The service answered with text that is not a classification array
    #[error("malformed classification response: {reason}")]
    MalformedResponse {
        /// What was wrong with the response
        reason: String,
    },

    /// Building the request payload failed
    #[error("failed to build classification request: {0}")]
    Request(#[from] serde_json::Error),
}

impl ClassificationError {
    /// True when the service answered but with unusable content.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::EmptyResponse | Self::MalformedResponse { .. })
    }
}

/// Result type alias for classification operations.
pub type Result<T> = std::result::Result<T, ClassificationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_malformed() {
        let garbage = ClassificationError::MalformedResponse {
            reason: "expected array".to_string(),
        };
        assert!(garbage.is_malformed());
        assert!(ClassificationError::EmptyResponse.is_malformed());

        let unreachable = ClassificationError::Service(LlmError::Timeout { seconds: 60 });
        assert!(!unreachable.is_malformed());
        assert_eq!(
            unreachable.to_string(),
            "reasoning service call failed: request timed out after 60s"
        );
    }
}
