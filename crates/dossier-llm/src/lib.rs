//! Dossier LLM - Reasoning-service abstraction for field classification.
//!
//! This crate provides a unified interface over the external reasoning
//! service that classifies extracted field paths against a regulation
//! taxonomy. Only already-scrubbed, structure-only payloads are ever sent.
//!
//! # Example
//!
//! ```rust,no_run
//! use dossier_core::ClassificationConfig;
//! use dossier_llm::{AnthropicProvider, CompletionRequest, LlmProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = AnthropicProvider::from_config("sk-ant-...", &ClassificationConfig::default())?;
//! let request = CompletionRequest::new("{\"fieldPaths\":[\"github.login\"]}")
//!     .with_system("Classify the fields")
//!     .with_temperature(0.1);
//! let response = provider.complete(request).await?;
//! println!("{}", response.content);
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
pub mod provider;
pub mod providers;

// Re-export commonly used types
pub use error::{LlmError, Result};
pub use provider::{CompletionRequest, CompletionResponse, LlmProvider, Usage, DEFAULT_MAX_TOKENS};
pub use providers::AnthropicProvider;
