//! Capability registry for optional pipeline stages.
//!
//! A run degrades gracefully when an optional stage's credential is absent.
//! The registry records which stages can run for the current credential set
//! so the orchestrator can skip the rest and report them.

use crate::credentials::{
    Credentials, ANTHROPIC_API_KEY, ARCHIVE_PASSPHRASE, GITHUB_TOKEN, STRIPE_API_KEY,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifies stages whose availability depends on a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCapability {
    /// Source-control provider export
    GithubExport,
    /// Payments provider export
    PaymentsExport,
    /// Field classification through the reasoning service
    Classification,
    /// Passphrase-protected bundling of the package
    Archiving,
}

impl StageCapability {
    /// Get a human-readable name for this stage.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::GithubExport => "GitHub Export",
            Self::PaymentsExport => "Payments Export",
            Self::Classification => "Field Classification",
            Self::Archiving => "Archiving",
        }
    }

    /// Credential key that unlocks this stage.
    #[must_use]
    pub fn credential_key(&self) -> &'static str {
        match self {
            Self::GithubExport => GITHUB_TOKEN,
            Self::PaymentsExport => STRIPE_API_KEY,
            Self::Classification => ANTHROPIC_API_KEY,
            Self::Archiving => ARCHIVE_PASSPHRASE,
        }
    }

    /// Whether a run may continue without this stage.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        !matches!(self, Self::GithubExport | Self::Archiving)
    }

    /// Every known stage capability.
    #[must_use]
    pub fn all() -> &'static [StageCapability] {
        &[
            Self::GithubExport,
            Self::PaymentsExport,
            Self::Classification,
            Self::Archiving,
        ]
    }
}

/// Registry tracking which credential-gated stages are available.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    available: HashSet<StageCapability>,
}

impl CapabilityRegistry {
    /// Registry with nothing available.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive availability from the credentials supplied for a run.
    #[must_use]
    pub fn from_credentials(credentials: &Credentials) -> Self {
        let mut registry = Self::new();
        for stage in StageCapability::all() {
            if credentials.contains(stage.credential_key()) {
                registry.enable(*stage);
            }
        }
        registry
    }

    /// Check if a stage can run.
    #[must_use]
    pub fn is_available(&self, stage: StageCapability) -> bool {
        self.available.contains(&stage)
    }

    /// Mark a stage available.
    pub fn enable(&mut self, stage: StageCapability) {
        tracing::debug!("Enabling stage: {:?}", stage);
        self.available.insert(stage);
    }

    /// Mark a stage unavailable.
    pub fn disable(&mut self, stage: StageCapability) {
        tracing::debug!("Disabling stage: {:?}", stage);
        self.available.remove(&stage);
    }

    /// Optional stages that will be skipped, in declaration order.
    #[must_use]
    pub fn degraded_stages(&self) -> Vec<StageCapability> {
        StageCapability::all()
            .iter()
            .copied()
            .filter(|s| s.is_optional() && !self.is_available(*s))
            .collect()
    }

    /// Required stages whose credential is missing.
    #[must_use]
    pub fn missing_required(&self) -> Vec<StageCapability> {
        StageCapability::all()
            .iter()
            .copied()
            .filter(|s| !s.is_optional() && !self.is_available(*s))
            .collect()
    }
}
