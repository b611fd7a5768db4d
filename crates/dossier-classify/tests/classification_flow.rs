//! Scrub-then-classify flow against a scripted reasoning service.

use async_trait::async_trait;
use dossier_classify::{ClassificationError, Classifier, FieldPathExtractor};
use dossier_core::{ClassificationConfig, NoRetry, Sensitivity};
use dossier_llm::{CompletionRequest, CompletionResponse, LlmProvider};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Answers with a response computed from the request payload.
struct ScriptedService {
    script: Box<dyn Fn(&Value) -> String + Send + Sync>,
    seen: Mutex<Vec<Value>>,
}

impl ScriptedService {
    fn new(script: impl Fn(&Value) -> String + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LlmProvider for ScriptedService {
    async fn complete(&self, request: CompletionRequest) -> dossier_llm::Result<CompletionResponse> {
        let payload: Value = serde_json::from_str(&request.prompt)?;
        let content = (self.script)(&payload);
        self.seen.lock().expect("lock").push(payload);
        Ok(CompletionResponse::new(content, "scripted"))
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

fn scrubbed_export() -> Value {
    json!({
        "github": {
            "profile": {"login": "[REDACTED]", "email": "[REDACTED]", "created_at": "2020-01-01"},
            "events": [{"type": "PushEvent", "repo": {"name": "org/repo"}}]
        },
        "stripe": {
            "customers": [{"id": "cus_123", "phone": "[REDACTED]"}]
        }
    })
}

/// Classifies every path it is given, alternating sensitivity.
fn classify_everything(payload: &Value) -> String {
    let records: Vec<Value> = payload["fieldPaths"]
        .as_array()
        .map(|paths| {
            paths
                .iter()
                .enumerate()
                .map(|(i, path)| {
                    json!({
                        "field": path,
                        "ruleReference": if i % 2 == 0 { "GDPR Art. 6(1)(b)" } else { "GDPR Art. 6(1)(f)" },
                        "rationale": "needed for the service",
                        "category": "identity",
                        "sensitivity": if i % 3 == 0 { "high" } else { "low" },
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    format!("```json\n{}\n```", Value::Array(records))
}

#[tokio::test]
async fn every_extracted_path_is_classified() {
    let data = scrubbed_export();
    let expected = FieldPathExtractor::default().extract(&data);
    let service = ScriptedService::new(classify_everything);
    let classifier = Classifier::new(
        Arc::clone(&service) as Arc<dyn LlmProvider>,
        ClassificationConfig::default(),
        Arc::new(NoRetry),
    );

    let result = classifier.classify(&data).await.expect("classify");

    let fields: Vec<&str> = result
        .classifications
        .iter()
        .map(|r| r.field.as_str())
        .collect();
    assert_eq!(fields, expected);
    assert_eq!(result.summary.total_fields, expected.len());
    assert_eq!(result.summary.distinct_rule_references, 2);
    assert_eq!(
        result.summary.high_sensitivity_count,
        result
            .classifications
            .iter()
            .filter(|r| r.sensitivity == Sensitivity::High)
            .count()
    );

    let seen = service.seen.lock().expect("lock");
    assert_eq!(seen.len(), 1);
    let sent = seen[0].to_string();
    assert!(!sent.contains("cus_123"));
    assert!(!sent.contains("PushEvent"));
}

#[tokio::test]
async fn hallucinated_fields_are_dropped() {
    let service = ScriptedService::new(|_| {
        json!([
            {"field": "github.profile.email", "ruleReference": "GDPR Art. 6", "rationale": "r", "category": "contact", "sensitivity": "medium"},
            {"field": "github.profile.password", "ruleReference": "GDPR Art. 32", "rationale": "r", "category": "technical", "sensitivity": "high"}
        ])
        .to_string()
    });
    let classifier = Classifier::new(service, ClassificationConfig::default(), Arc::new(NoRetry));

    let result = classifier.classify(&scrubbed_export()).await.expect("classify");

    assert_eq!(result.classifications.len(), 1);
    assert_eq!(result.classifications[0].field, "github.profile.email");
    assert_eq!(result.summary.high_sensitivity_count, 0);
}

#[tokio::test]
async fn prose_answer_is_a_distinct_failure() {
    let service = ScriptedService::new(|_| "I could not find any personal data.".to_string());
    let classifier = Classifier::new(service, ClassificationConfig::default(), Arc::new(NoRetry));

    let err = classifier
        .classify(&scrubbed_export())
        .await
        .expect_err("prose is malformed");
    assert!(matches!(err, ClassificationError::MalformedResponse { .. }));
}

#[tokio::test]
async fn shallow_depth_limits_payload() {
    let service = ScriptedService::new(|_| "[]".to_string());
    let config = ClassificationConfig {
        max_path_depth: 1,
        ..ClassificationConfig::default()
    };
    let classifier = Classifier::new(
        Arc::clone(&service) as Arc<dyn LlmProvider>,
        config,
        Arc::new(NoRetry),
    );

    let result = classifier.classify(&scrubbed_export()).await.expect("classify");
    assert_eq!(result.summary.total_fields, 2);

    let seen = service.seen.lock().expect("lock");
    assert_eq!(seen[0]["fieldPaths"], json!(["github", "stripe"]));
}
