//! Stripe exporter: customers for the subject and their charges.

use super::client::{remaining, ProviderClient};
use super::{ExportError, ExportRequest, ProviderExporter};
use async_trait::async_trait;
use dossier_core::{ExportConfig, RetryPolicy, StageCapability};
use serde_json::{json, Value};
use std::sync::Arc;

const PROVIDER: &str = "stripe";
const PAGE_LIMIT: usize = 100;

/// Exports customer and charge records from Stripe.
pub struct StripeExporter {
    client: ProviderClient,
    max_records: usize,
}

/// One page of a Stripe list response.
struct ListPage {
    data: Vec<Value>,
    has_more: bool,
}

impl StripeExporter {
    /// Create an exporter from the `[export]` section.
    pub fn new(config: &ExportConfig, retry_policy: Arc<dyn RetryPolicy>) -> Result<Self, ExportError> {
        Ok(Self {
            client: ProviderClient::new(PROVIDER, &config.stripe_api_url, config, retry_policy)?,
            max_records: config.max_records,
        })
    }

    fn headers(scope: Option<&str>) -> Vec<(&'static str, String)> {
        scope
            .map(|account| ("stripe-account", account.to_string()))
            .into_iter()
            .collect()
    }

    /// Walk a list endpoint with cursor pagination until exhausted or capped.
    async fn list_all(
        &self,
        path: &str,
        filter: (&str, &str),
        token: &str,
        headers: &[(&'static str, String)],
    ) -> Result<Vec<Value>, ExportError> {
        let mut records: Vec<Value> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let want = remaining(self.max_records, records.len());
            if want == 0 {
                tracing::debug!("Stripe {} capped at {}", path, self.max_records);
                break;
            }

            let mut query = vec![
                (filter.0, filter.1.to_string()),
                ("limit", want.min(PAGE_LIMIT).to_string()),
            ];
            if let Some(after) = &cursor {
                query.push(("starting_after", after.clone()));
            }

            let body = self.client.get_json(path, &query, token, headers).await?;
            let page = parse_list(body)?;
            cursor = page.data.last().and_then(record_id);
            records.extend(page.data.into_iter().take(want));

            if !page.has_more || cursor.is_none() {
                break;
            }
        }

        Ok(records)
    }

    async fn find_customers(
        &self,
        request: &ExportRequest,
        token: &str,
        headers: &[(&'static str, String)],
    ) -> Result<Vec<Value>, ExportError> {
        let subject = request.subject.as_str();
        if subject.starts_with("cus_") {
            let path = format!("/v1/customers/{subject}");
            return match self.client.get_json(&path, &[], token, headers).await {
                Ok(customer) => Ok(vec![customer]),
                Err(ExportError::NotFound { .. }) => Ok(Vec::new()),
                Err(e) => Err(e),
            };
        }
        if request.subject.is_email() {
            return self
                .list_all("/v1/customers", ("email", subject), token, headers)
                .await;
        }

        tracing::warn!("Stripe export needs an email or customer id as subject, skipping lookup");
        Ok(Vec::new())
    }
}

#[async_trait]
impl ProviderExporter for StripeExporter {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn capability(&self) -> StageCapability {
        StageCapability::PaymentsExport
    }

    async fn export(&self, request: &ExportRequest, token: &str) -> Result<Value, ExportError> {
        let headers = Self::headers(request.scope.as_deref());
        let customers = self.find_customers(request, token, &headers).await?;

        let mut charges = Vec::new();
        for id in customers.iter().filter_map(record_id) {
            if remaining(self.max_records, charges.len()) == 0 {
                break;
            }
            let found = self
                .list_all("/v1/charges", ("customer", id.as_str()), token, &headers)
                .await?;
            let want = remaining(self.max_records, charges.len());
            charges.extend(found.into_iter().take(want));
        }

        tracing::info!(
            "Stripe export finished: {} customers, {} charges",
            customers.len(),
            charges.len()
        );
        Ok(json!({
            "customers": customers,
            "charges": charges,
        }))
    }
}

fn parse_list(body: Value) -> Result<ListPage, ExportError> {
    let has_more = body.get("has_more").and_then(Value::as_bool).unwrap_or(false);
    match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(data)) => Ok(ListPage { data, has_more }),
            _ => Err(ExportError::Parse {
                provider: PROVIDER.to_string(),
                message: "list response has no data array".to_string(),
            }),
        },
        _ => Err(ExportError::Parse {
            provider: PROVIDER.to_string(),
            message: "expected a list object".to_string(),
        }),
    }
}

fn record_id(record: &Value) -> Option<String> {
    record.get("id").and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_core::NoRetry;

    #[test]
    fn test_parse_list() {
        let page = parse_list(json!({
            "object": "list",
            "data": [{"id": "cus_1"}, {"id": "cus_2"}],
            "has_more": true
        }))
        .expect("page");
        assert_eq!(page.data.len(), 2);
        assert!(page.has_more);
        assert_eq!(page.data.last().and_then(record_id).as_deref(), Some("cus_2"));
    }

    #[test]
    fn test_parse_list_rejects_bad_shape() {
        assert!(matches!(
            parse_list(json!([1, 2])),
            Err(ExportError::Parse { .. })
        ));
        assert!(matches!(
            parse_list(json!({"object": "list"})),
            Err(ExportError::Parse { .. })
        ));
    }

    #[test]
    fn test_account_scope_header() {
        assert!(StripeExporter::headers(None).is_empty());
        let headers = StripeExporter::headers(Some("acct_123"));
        assert_eq!(headers, vec![("stripe-account", "acct_123".to_string())]);
    }

    #[test]
    fn test_exporter_metadata() {
        let exporter =
            StripeExporter::new(&ExportConfig::default(), Arc::new(NoRetry)).expect("exporter");
        assert_eq!(exporter.provider(), "stripe");
        assert_eq!(exporter.credential_key(), "STRIPE_API_KEY");
        assert!(exporter.is_optional());
    }
}
