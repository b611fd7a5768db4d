//! Field classification through an external reasoning service.
//!
//! The service only ever sees field paths and a type-tag outline of the
//! scrubbed data. Its answer must parse as a JSON array; individual records
//! that fail validation are dropped, a response that fails to parse fails the
//! whole pass.

use crate::error::{ClassificationError, Result};
use crate::paths::{structural_sample, FieldPathExtractor};
use crate::types::{ClassificationRecord, ClassificationResult};
use dossier_core::{retry, ClassificationConfig, RetryPolicy, Sensitivity};
use dossier_llm::{CompletionRequest, LlmProvider};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

const SYSTEM_PROMPT: &str = r#"You are a data-protection analyst preparing a compliance evidence package.

You receive a JSON object with:
- "fieldPaths": addresses of fields found in a personal-data export, using dotted keys and [0] for array elements
- "structuralSample": the shape of that export with every value replaced by its type

For each field path that holds or describes personal data, return one object with:
- "field": the field path, copied exactly from fieldPaths
- "ruleReference": the regulation article that governs it (e.g. "GDPR Art. 6(1)(b)", "GDPR Art. 9(1)", "CCPA 1798.140(v)")
- "rationale": one sentence explaining why the article applies
- "category": one of "identity", "contact", "financial", "behavioral", "technical", "special_category", "other"
- "sensitivity": one of "low", "medium", "high"

Respond ONLY with a JSON array of these objects, no other text. Return [] if no field holds personal data."#;

/// Classifies the fields of scrubbed provider data.
pub struct Classifier {
    provider: Arc<dyn LlmProvider>,
    extractor: FieldPathExtractor,
    config: ClassificationConfig,
    retry_policy: Arc<dyn RetryPolicy>,
}

impl Classifier {
    /// Create a classifier over `provider` using the `[classification]` section.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: ClassificationConfig,
        retry_policy: Arc<dyn RetryPolicy>,
    ) -> Self {
        Self {
            provider,
            extractor: FieldPathExtractor::from_config(&config),
            config,
            retry_policy,
        }
    }

    /// Identifier of the backing reasoning service.
    #[must_use]
    pub fn provider_id(&self) -> &str {
        self.provider.provider_id()
    }

    /// Classify the fields of `scrubbed`.
    ///
    /// Input without any field paths yields an empty result and no service call.
    pub async fn classify(&self, scrubbed: &Value) -> Result<ClassificationResult> {
        let started = Instant::now();
        let paths = self.extractor.extract(scrubbed);
        if paths.is_empty() {
            tracing::debug!("No field paths extracted, skipping classification call");
            return Ok(ClassificationResult::empty());
        }

        let request = self.build_request(scrubbed, &paths)?;
        tracing::info!(
            "Classifying {} field paths via {}",
            paths.len(),
            self.provider.provider_id()
        );

        let provider: &dyn LlmProvider = self.provider.as_ref();
        let response = retry(self.retry_policy.as_ref(), "classification", move || {
            provider.complete(request.clone())
        })
        .await?;
        if response.is_truncated() {
            tracing::warn!(
                "Classification answer hit the {} token cap and may be cut off",
                self.config.max_tokens
            );
        }

        let text = response.content.trim();
        if text.is_empty() {
            return Err(ClassificationError::EmptyResponse);
        }

        let records = parse_response(text, &paths)?;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let result = ClassificationResult::new(records, paths.len(), elapsed_ms);

        tracing::info!(
            "Classification finished: {}/{} fields classified, {} high sensitivity, {}ms",
            result.classifications.len(),
            result.summary.total_fields,
            result.summary.high_sensitivity_count,
            elapsed_ms
        );
        Ok(result)
    }

    fn build_request(&self, scrubbed: &Value, paths: &[String]) -> Result<CompletionRequest> {
        let payload = json!({
            "fieldPaths": paths,
            "structuralSample": structural_sample(
                scrubbed,
                self.config.sample_depth,
                self.config.sample_keys,
            ),
        });

        Ok(CompletionRequest::new(serde_json::to_string(&payload)?)
            .with_system(SYSTEM_PROMPT)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens))
    }
}

/// Parse the service text into validated records.
///
/// Fails only when the text is not a JSON array; bad elements are dropped.
pub fn parse_response(text: &str, paths: &[String]) -> Result<Vec<ClassificationRecord>> {
    let body = strip_code_fence(text);
    let items: Vec<Value> =
        serde_json::from_str(body).map_err(|e| ClassificationError::MalformedResponse {
            reason: e.to_string(),
        })?;

    let known: HashSet<&str> = paths.iter().map(String::as_str).collect();
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match validate_record(item, &known) {
            Ok(record) => records.push(record),
            Err(reason) => {
                tracing::debug!("Dropping classification record {}: {}", index, reason);
            }
        }
    }
    Ok(records)
}

// The service may wrap its answer in a markdown code block
fn strip_code_fence(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn validate_record(
    item: &Value,
    known: &HashSet<&str>,
) -> std::result::Result<ClassificationRecord, &'static str> {
    let obj = item.as_object().ok_or("not an object")?;

    let field = text_attr(obj, &["field"]).ok_or("missing field")?;
    if !known.contains(field) {
        return Err("field is not an extracted path");
    }
    let rule_reference = text_attr(obj, &["ruleReference", "rule_reference", "article"])
        .ok_or("missing ruleReference")?;
    let rationale = text_attr(obj, &["rationale"]).ok_or("missing rationale")?;
    let category = text_attr(obj, &["category"]).ok_or("missing category")?;
    let sensitivity = text_attr(obj, &["sensitivity"])
        .ok_or("missing sensitivity")
        .and_then(|s| parse_sensitivity(s).ok_or("invalid sensitivity"))?;

    Ok(ClassificationRecord {
        field: field.to_string(),
        rule_reference: rule_reference.to_string(),
        rationale: rationale.to_string(),
        category: category.to_string(),
        sensitivity,
    })
}

/// First non-blank string among `keys`.
fn text_attr<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn parse_sensitivity(s: &str) -> Option<Sensitivity> {
    match s.to_ascii_lowercase().as_str() {
        "low" => Some(Sensitivity::Low),
        "medium" => Some(Sensitivity::Medium),
        "high" => Some(Sensitivity::High),
        _ => None,
    }
}
