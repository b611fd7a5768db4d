//! Error types for pipeline orchestration.

use crate::state::PipelineState;
use dossier_core::ConfigError;
use dossier_redact::RedactError;
use thiserror::Error;

/// Boxed error carried by a failed stage.
pub type StageSource = Box<dyn std::error::Error + Send + Sync>;

/// Errors that end a pipeline run or prevent one from starting.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage failed; the run ends in `Failed`
    #[error("{stage} stage failed: {source}")]
    Stage {
        /// Stage that was running
        stage: PipelineState,
        /// Underlying failure
        #[source]
        source: StageSource,
    },

    /// A transition the state machine does not allow
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current state
        from: PipelineState,
        /// Requested state
        to: PipelineState,
    },

    /// Configuration failed validation
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Redaction patterns could not be built
    #[error("redaction setup failed: {0}")]
    Redaction(#[from] RedactError),

    /// A required collaborator was not supplied or could not be built
    #[error("pipeline setup failed: {0}")]
    Setup(String),
}

impl PipelineError {
    /// Tag `source` with the stage it happened in.
    pub fn stage(stage: PipelineState, source: impl Into<StageSource>) -> Self {
        Self::Stage {
            stage,
            source: source.into(),
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
