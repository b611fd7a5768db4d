//! Reasoning-service trait and single-turn request/response types.
//!
//! Classification is a one-shot exchange: a system instruction plus one
//! JSON payload in, one text answer out. There is no conversation state.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Generation cap used when a request does not set one.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// A reasoning-service backend.
///
/// Shared behind an `Arc` by the classifier, hence `Send + Sync`.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one request and wait for the full answer.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Short identifier used in logs, e.g. `"anthropic"`.
    fn provider_id(&self) -> &str;
}

/// One prompt with its generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Instruction that frames the task
    pub system: Option<String>,
    /// The payload to answer
    pub prompt: String,
    /// Generation cap
    pub max_tokens: u32,
    /// Sampling temperature; low values keep classifications stable
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Request answering `prompt` with default settings.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    /// Set the system instruction.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the generation cap.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// The service's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Answer text, text blocks joined by newlines
    pub content: String,
    /// Model that answered
    pub model: String,
    /// Why generation stopped, as reported by the service
    pub stop_reason: Option<String>,
    /// Token accounting
    pub usage: Usage,
}

impl CompletionResponse {
    /// Response carrying `content` with no metadata.
    #[must_use]
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            stop_reason: None,
            usage: Usage::default(),
        }
    }

    /// Whether the answer was cut off by the generation cap.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.stop_reason.as_deref() == Some("max_tokens")
    }
}

/// Token usage for one exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Generated tokens
    pub output_tokens: u32,
}

impl Usage {
    /// Prompt plus generated tokens.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = CompletionRequest::new("{\"fieldPaths\":[]}")
            .with_system("You are a compliance analyst")
            .with_temperature(0.1)
            .with_max_tokens(1024);

        assert_eq!(req.prompt, "{\"fieldPaths\":[]}");
        assert_eq!(req.system.as_deref(), Some("You are a compliance analyst"));
        assert_eq!(req.temperature, Some(0.1));
        assert_eq!(req.max_tokens, 1024);
    }

    #[test]
    fn test_request_defaults() {
        let req = CompletionRequest::new("payload");
        assert_eq!(req.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(req.system.is_none());
        assert!(req.temperature.is_none());
    }

    #[test]
    fn test_truncation_flag() {
        let mut response = CompletionResponse::new("[{\"field\":", "model");
        assert!(!response.is_truncated());
        response.stop_reason = Some("max_tokens".to_string());
        assert!(response.is_truncated());
    }

    #[test]
    fn test_usage_total() {
        let usage = Usage {
            input_tokens: 10,
            output_tokens: 20,
        };
        assert_eq!(usage.total(), 30);
        assert_eq!(
            Usage {
                input_tokens: u32::MAX,
                output_tokens: 1
            }
            .total(),
            u32::MAX
        );
    }
}
