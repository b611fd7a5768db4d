//! Dossier Core - Foundation crate for the Dossier evidence pipeline.
//!
//! This crate provides shared types, error handling, configuration management,
//! credentials and retry policy that all other Dossier crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and data carriers (`SubjectId`, `RawDataset`, `Sensitivity`)
//! - [`credentials`] - Per-run secret mapping and stores
//! - [`retry`] - Injectable retry/backoff policy for external calls
//! - [`capabilities`] - Credential-gated stage availability
//!
//! # Example
//!
//! ```rust
//! use dossier_core::{AppConfig, CapabilityRegistry, Credentials, StageCapability};
//!
//! let config = AppConfig::default();
//! assert!(config.redaction.email);
//!
//! let credentials = Credentials::new().with("GITHUB_TOKEN", "ghp_example");
//! let registry = CapabilityRegistry::from_credentials(&credentials);
//! assert!(!registry.is_available(StageCapability::Classification));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod capabilities;
pub mod config;
pub mod credentials;
pub mod error;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use capabilities::{CapabilityRegistry, StageCapability};
pub use config::{
    AppConfig, ClassificationConfig, CustomPattern, ExportConfig, OutputConfig, RedactionConfig,
    ResourceConfig, RetryConfig,
};
pub use credentials::{
    CredentialStore, Credentials, EnvCredentialStore, StaticCredentialStore, ANTHROPIC_API_KEY,
    ARCHIVE_PASSPHRASE, GITHUB_TOKEN, KNOWN_KEYS, STRIPE_API_KEY,
};
pub use error::{ConfigError, ConfigResult, DossierError, Result};
pub use retry::{retry, ExponentialBackoff, NoRetry, RetryClass, RetryPolicy, Transient};
pub use types::{RawDataset, Sensitivity, SubjectId, Timestamp};
