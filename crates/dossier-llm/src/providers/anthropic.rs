//! Anthropic Messages API backend.

use crate::error::{LlmError, Result};
use crate::provider::{CompletionRequest, CompletionResponse, LlmProvider, Usage};
use async_trait::async_trait;
use dossier_core::ClassificationConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use zeroize::Zeroizing;

const PROVIDER: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";

/// Classifies field paths through the Anthropic Messages API.
pub struct AnthropicProvider {
    api_key: Zeroizing<String>,
    model: String,
    endpoint: String,
    timeout_secs: u64,
    client: Client,
}

impl AnthropicProvider {
    /// Build a provider from the `[classification]` config section.
    pub fn from_config(api_key: impl Into<String>, config: &ClassificationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Internal(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            api_key: Zeroizing::new(api_key.into()),
            model: config.model.clone(),
            endpoint: format!("{}/messages", config.api_url.trim_end_matches('/')),
            timeout_secs: config.timeout_secs,
            client,
        })
    }

    /// Model this provider asks for.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> MessagesBody<'a> {
        MessagesBody {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            temperature: request.temperature,
            messages: [Turn {
                role: "user",
                content: &request.prompt,
            }],
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout {
                seconds: self.timeout_secs,
            }
        } else {
            LlmError::Network(err)
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if request.prompt.trim().is_empty() {
            return Err(LlmError::InvalidRequest("empty prompt".to_string()));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", API_VERSION)
            .json(&self.body(&request))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(LlmError::from_status(
                PROVIDER,
                status.as_u16(),
                error_message(&text),
            ));
        }

        let reply = parse_reply(&text)?;
        tracing::debug!(
            model = %reply.model,
            stop_reason = ?reply.stop_reason,
            tokens = reply.usage.total(),
            "classification request answered"
        );
        Ok(reply)
    }

    fn provider_id(&self) -> &str {
        PROVIDER
    }
}

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: [Turn<'a>; 1],
}

#[derive(Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct Reply {
    model: String,
    #[serde(default)]
    content: Vec<Block>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn parse_reply(text: &str) -> Result<CompletionResponse> {
    let reply: Reply = serde_json::from_str(text).map_err(|e| LlmError::UnexpectedResponse {
        provider: PROVIDER.to_string(),
        message: e.to_string(),
    })?;

    let content = reply
        .content
        .into_iter()
        .filter_map(|block| match block {
            Block::Text { text } => Some(text),
            Block::Unsupported => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(CompletionResponse {
        content,
        model: reply.model,
        stop_reason: reply.stop_reason,
        usage: reply.usage,
    })
}

/// The service's own message when the body is an error envelope, else the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}
