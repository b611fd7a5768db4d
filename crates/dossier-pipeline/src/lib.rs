//! Dossier Pipeline - evidence package orchestration.
//!
//! Sequences a run for one subject:
//!
//! ```text
//! Init -> Exporting -> Merging -> Scrubbing -> Classifying -> Packaging -> Archiving -> Done
//! ```
//!
//! Any non-terminal state may move to `Failed`. Classification is skipped
//! (Scrubbing -> Packaging) when the reasoning-service credential is absent.
//!
//! # Example
//!
//! ```no_run
//! use dossier_core::{AppConfig, Credentials, SubjectId};
//! use dossier_pipeline::{init_tracing, ArchiveOutcome, Archiver, PipelineOrchestrator};
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//!
//! struct Bundler;
//!
//! #[async_trait::async_trait]
//! impl Archiver for Bundler {
//!     async fn archive(&self, _: &[PathBuf], _: &str, dest: &Path) -> ArchiveOutcome {
//!         ArchiveOutcome::succeeded(dest.to_path_buf(), 0.4)
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! init_tracing();
//! let credentials = Credentials::new()
//!     .with("GITHUB_TOKEN", "ghp_example")
//!     .with("ARCHIVE_PASSPHRASE", "correct horse");
//! let orchestrator = PipelineOrchestrator::builder(AppConfig::load()?)
//!     .with_credentials(credentials)
//!     .with_archiver(Arc::new(Bundler))
//!     .build()?;
//!
//! let report = orchestrator.run(&SubjectId::new("user@example.com")?).await;
//! println!("{} -> {}", report.run_id, report.final_state);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod export;
pub mod orchestrator;
pub mod package;
pub mod report;
pub mod state;
pub mod telemetry;

pub use error::{PipelineError, Result, StageSource};
pub use export::{ExportError, ExportRequest, GithubExporter, ProviderExporter, StripeExporter};
pub use orchestrator::{PipelineOrchestrator, PipelineOrchestratorBuilder, ReasoningFactory};
pub use package::{
    ArchiveOutcome, Archiver, JsonPackager, PackageInput, PackageOutcome, Packager,
};
pub use report::{DegradedStage, RunReport};
pub use state::{PipelineState, StateMachine};
pub use telemetry::init_tracing;
