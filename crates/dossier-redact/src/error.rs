//! Error types for redaction and scrubbing.

use thiserror::Error;

/// Errors raised while building a pattern registry.
#[derive(Error, Debug)]
pub enum RedactError {
    /// A custom pattern failed to compile
    #[error("invalid pattern '{name}': {source}")]
    InvalidPattern {
        /// Pattern name from configuration
        name: String,
        /// Regex compilation error
        #[source]
        source: regex::Error,
    },

    /// The placeholder would itself be redacted, so output could never be clean
    #[error("placeholder '{placeholder}' matches pattern '{name}'")]
    PlaceholderMatches {
        /// Configured placeholder
        placeholder: String,
        /// Pattern that matched it
        name: String,
    },
}

/// Errors raised while scrubbing a value.
#[derive(Error, Debug)]
pub enum ScrubError {
    /// Input nests deeper than the configured limit
    #[error("value nesting exceeds maximum depth of {max_depth}")]
    DepthExceeded {
        /// Configured limit
        max_depth: usize,
    },

    /// Serializing for statistics failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for registry construction.
pub type Result<T> = std::result::Result<T, RedactError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScrubError::DepthExceeded { max_depth: 64 };
        assert_eq!(err.to_string(), "value nesting exceeds maximum depth of 64");

        let err = RedactError::PlaceholderMatches {
            placeholder: "x@y.com".to_string(),
            name: "email".to_string(),
        };
        assert!(err.to_string().contains("matches pattern 'email'"));
    }
}
