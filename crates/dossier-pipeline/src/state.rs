//! Pipeline state machine.
//!
//! States advance strictly in order. The only shortcut is Scrubbing to
//! Packaging when classification is skipped; any non-terminal state may
//! move to `Failed`.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Not started
    Init,
    /// Fetching provider data
    Exporting,
    /// Assembling the raw dataset
    Merging,
    /// Redacting PII
    Scrubbing,
    /// Classifying fields
    Classifying,
    /// Writing artifacts
    Packaging,
    /// Bundling artifacts
    Archiving,
    /// Finished successfully
    Done,
    /// Ended with an error
    Failed,
}

impl PipelineState {
    /// Lowercase stage name used in messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Exporting => "exporting",
            Self::Merging => "merging",
            Self::Scrubbing => "scrubbing",
            Self::Classifying => "classifying",
            Self::Packaging => "packaging",
            Self::Archiving => "archiving",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// The state that normally follows this one.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::Exporting),
            Self::Exporting => Some(Self::Merging),
            Self::Merging => Some(Self::Scrubbing),
            Self::Scrubbing => Some(Self::Classifying),
            Self::Classifying => Some(Self::Packaging),
            Self::Packaging => Some(Self::Archiving),
            Self::Archiving => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    /// True for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether moving from `self` to `to` is allowed.
    #[must_use]
    pub fn can_transition_to(&self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Failed
            || self.next() == Some(to)
            || (*self == Self::Scrubbing && to == Self::Packaging)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus every state visited.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: PipelineState,
    history: Vec<PipelineState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Machine in `Init`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: PipelineState::Init,
            history: vec![PipelineState::Init],
        }
    }

    /// Current state.
    #[must_use]
    pub fn current(&self) -> PipelineState {
        self.current
    }

    /// Visited states in order, including the current one.
    #[must_use]
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Move to `to` if allowed.
    pub fn transition(&mut self, to: PipelineState) -> Result<()> {
        if !self.current.can_transition_to(to) {
            return Err(PipelineError::InvalidTransition {
                from: self.current,
                to,
            });
        }
        tracing::info!("Pipeline stage: {} -> {}", self.current, to);
        self.current = to;
        self.history.push(to);
        Ok(())
    }

    /// Move to `Failed` unless already terminal.
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            tracing::info!("Pipeline stage: {} -> {}", self.current, PipelineState::Failed);
            self.current = PipelineState::Failed;
            self.history.push(PipelineState::Failed);
        }
    }
}
