//! GitHub exporter: profile, public events and organisation membership.

use super::client::{remaining, ProviderClient};
use super::{ExportError, ExportRequest, ProviderExporter};
use async_trait::async_trait;
use dossier_core::{ExportConfig, RetryPolicy, StageCapability};
use serde_json::{json, Value};
use std::sync::Arc;

const PROVIDER: &str = "github";
const PER_PAGE: usize = 100;
const API_VERSION: &str = "2022-11-28";

/// Exports the authenticated user's GitHub data.
pub struct GithubExporter {
    client: ProviderClient,
    max_records: usize,
}

impl GithubExporter {
    /// Create an exporter from the `[export]` section.
    pub fn new(config: &ExportConfig, retry_policy: Arc<dyn RetryPolicy>) -> Result<Self, ExportError> {
        Ok(Self {
            client: ProviderClient::new(PROVIDER, &config.github_api_url, config, retry_policy)?,
            max_records: config.max_records,
        })
    }

    fn headers() -> [(&'static str, String); 2] {
        [
            ("accept", "application/vnd.github+json".to_string()),
            ("x-github-api-version", API_VERSION.to_string()),
        ]
    }

    async fn fetch_events(&self, login: &str, token: &str) -> Result<Vec<Value>, ExportError> {
        let path = format!("/users/{login}/events");
        let mut events = Vec::new();
        let mut page = 1usize;

        loop {
            let want = remaining(self.max_records, events.len());
            if want == 0 {
                tracing::debug!("GitHub events capped at {}", self.max_records);
                break;
            }

            let query = [
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            let body = self
                .client
                .get_json(&path, &query, token, &Self::headers())
                .await?;
            let (items, fetched) = take_page(body, want)?;
            events.extend(items);

            if fetched < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(events)
    }

    async fn fetch_membership(&self, org: &str, token: &str) -> Result<Value, ExportError> {
        let path = format!("/user/memberships/orgs/{org}");
        match self.client.get_json(&path, &[], token, &Self::headers()).await {
            Ok(membership) => Ok(membership),
            Err(ExportError::NotFound { .. }) => Ok(Value::Null),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ProviderExporter for GithubExporter {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn capability(&self) -> StageCapability {
        StageCapability::GithubExport
    }

    async fn export(&self, request: &ExportRequest, token: &str) -> Result<Value, ExportError> {
        let profile = self
            .client
            .get_json("/user", &[], token, &Self::headers())
            .await?;
        let login = profile
            .get("login")
            .and_then(Value::as_str)
            .ok_or_else(|| ExportError::Parse {
                provider: PROVIDER.to_string(),
                message: "profile has no login".to_string(),
            })?
            .to_string();

        let events = self.fetch_events(&login, token).await?;

        let mut export = json!({
            "profile": profile,
            "events": events,
        });
        if let Some(org) = request.scope.as_deref() {
            export["organization"] = self.fetch_membership(org, token).await?;
        }

        tracing::info!(
            "GitHub export finished: {} events{}",
            export["events"].as_array().map_or(0, Vec::len),
            if request.scope.is_some() { ", with organisation membership" } else { "" }
        );
        Ok(export)
    }
}

/// Items from one page, truncated to `want`, plus how many the page held.
fn take_page(body: Value, want: usize) -> Result<(Vec<Value>, usize), ExportError> {
    match body {
        Value::Array(items) => {
            let fetched = items.len();
            Ok((items.into_iter().take(want).collect(), fetched))
        }
        _ => Err(ExportError::Parse {
            provider: PROVIDER.to_string(),
            message: "expected an array page".to_string(),
        }),
    }
}
