//! Classification records and the per-run result.

use dossier_core::Sensitivity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One validated field classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRecord {
    /// Field path this record classifies
    pub field: String,
    /// Regulation citation, e.g. "GDPR Art. 6(1)(b)"
    pub rule_reference: String,
    /// Why the rule applies
    pub rationale: String,
    /// Data category, e.g. "contact", "financial"
    pub category: String,
    /// Assigned sensitivity
    pub sensitivity: Sensitivity,
}

/// Aggregate figures for one classification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationSummary {
    /// Extracted field paths, whether or not they were classified
    pub total_fields: usize,
    /// Distinct rule references across validated records
    pub distinct_rule_references: usize,
    /// Validated records rated high
    pub high_sensitivity_count: usize,
    /// Wall-clock time of the pass
    pub processing_time_ms: u64,
}

/// Validated records plus summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Records that passed validation, in response order
    pub classifications: Vec<ClassificationRecord>,
    /// Summary figures
    pub summary: ClassificationSummary,
}

impl ClassificationResult {
    /// Build a result, deriving the summary from `classifications`.
    #[must_use]
    pub fn new(
        classifications: Vec<ClassificationRecord>,
        total_fields: usize,
        processing_time_ms: u64,
    ) -> Self {
        let distinct_rule_references = classifications
            .iter()
            .map(|r| r.rule_reference.as_str())
            .collect::<HashSet<_>>()
            .len();
        let high_sensitivity_count = classifications
            .iter()
            .filter(|r| r.sensitivity == Sensitivity::High)
            .count();

        Self {
            summary: ClassificationSummary {
                total_fields,
                distinct_rule_references,
                high_sensitivity_count,
                processing_time_ms,
            },
            classifications,
        }
    }

    /// Result for input with no classifiable fields.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no record survived validation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classifications.is_empty()
    }
}
