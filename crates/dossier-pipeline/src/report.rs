//! Run report returned by every pipeline run.

use crate::package::ArchiveOutcome;
use crate::state::PipelineState;
use dossier_classify::ClassificationSummary;
use dossier_core::StageCapability;
use dossier_runtime::MonitorSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// An optional stage that did not contribute to the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedStage {
    /// Stage that was skipped or substituted
    pub stage: StageCapability,
    /// Why
    pub reason: String,
}

impl DegradedStage {
    /// Record a degraded stage.
    pub fn new(stage: StageCapability, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Unique run identifier
    pub run_id: String,
    /// `Done` or `Failed`
    pub final_state: PipelineState,
    /// Every state visited, in order
    pub history: Vec<PipelineState>,
    /// Optional stages that were skipped or substituted
    pub degraded: Vec<DegradedStage>,
    /// Redactions per pattern
    pub scrub_stats: BTreeMap<String, usize>,
    /// Serialized size before scrubbing minus after
    pub bytes_reduced: i64,
    /// Classification summary when classification succeeded
    pub classification: Option<ClassificationSummary>,
    /// Artifacts produced by packaging
    pub artifacts: Vec<PathBuf>,
    /// Whether the artifacts still exist on disk
    pub artifacts_retained: bool,
    /// Archival outcome when archiving was attempted
    pub archive: Option<ArchiveOutcome>,
    /// Time and memory figures for the run
    pub resources: Option<MonitorSummary>,
    /// Stage-tagged failure message
    pub error: Option<String>,
}

impl RunReport {
    pub(crate) fn new(run_id: String) -> Self {
        Self {
            run_id,
            final_state: PipelineState::Init,
            history: Vec::new(),
            degraded: Vec::new(),
            scrub_stats: BTreeMap::new(),
            bytes_reduced: 0,
            classification: None,
            artifacts: Vec::new(),
            artifacts_retained: false,
            archive: None,
            resources: None,
            error: None,
        }
    }

    /// Whether the run reached `Done`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.final_state == PipelineState::Done
    }

    /// Whether any optional stage was skipped or substituted.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    /// Whether `stage` is listed as degraded.
    #[must_use]
    pub fn was_degraded(&self, stage: StageCapability) -> bool {
        self.degraded.iter().any(|d| d.stage == stage)
    }
}
