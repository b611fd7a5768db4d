//! Shared HTTP plumbing for provider exporters.

use super::ExportError;
use dossier_core::{retry, ExportConfig, RetryPolicy};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// JSON-over-HTTPS client bound to one provider.
pub(crate) struct ProviderClient {
    provider: &'static str,
    http: Client,
    base_url: String,
    timeout_secs: u64,
    retry_policy: Arc<dyn RetryPolicy>,
}

impl ProviderClient {
    pub(crate) fn new(
        provider: &'static str,
        base_url: &str,
        config: &ExportConfig,
        retry_policy: Arc<dyn RetryPolicy>,
    ) -> Result<Self, ExportError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ExportError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            provider,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
            retry_policy,
        })
    }

    /// GET `path` with retries, returning the parsed JSON body.
    pub(crate) async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        token: &str,
        headers: &[(&'static str, String)],
    ) -> Result<Value, ExportError> {
        let label = format!("{} request", self.provider);
        retry(self.retry_policy.as_ref(), &label, move || {
            self.send(path, query, token, headers)
        })
        .await
    }

    async fn send(
        &self,
        path: &str,
        query: &[(&str, String)],
        token: &str,
        headers: &[(&'static str, String)],
    ) -> Result<Value, ExportError> {
        let mut request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .query(query);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status.is_success() {
            return response.json::<Value>().await.map_err(|e| ExportError::Parse {
                provider: self.provider.to_string(),
                message: e.to_string(),
            });
        }

        let throttled = response
            .headers()
            .get("x-ratelimit-remaining")
            .is_some_and(|v| v.as_bytes() == b"0");
        Err(ExportError::from_status(self.provider, status.as_u16(), throttled))
    }

    fn transport_error(&self, e: reqwest::Error) -> ExportError {
        if e.is_timeout() {
            ExportError::Timeout {
                provider: self.provider.to_string(),
                seconds: self.timeout_secs,
            }
        } else {
            ExportError::Network {
                provider: self.provider.to_string(),
                source: e,
            }
        }
    }
}

/// How many more records fit under `cap` given `collected` so far.
pub(crate) fn remaining(cap: usize, collected: usize) -> usize {
    cap.saturating_sub(collected)
}
