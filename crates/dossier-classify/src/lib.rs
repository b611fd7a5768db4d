//! Dossier Classify - field-level sensitivity classification.
//!
//! [`FieldPathExtractor`] turns scrubbed provider data into addressable field
//! paths; [`Classifier`] sends those paths plus a type-only outline of the
//! data to a reasoning service and validates what comes back.
//!
//! # Example
//!
//! ```rust
//! use dossier_classify::FieldPathExtractor;
//! use serde_json::json;
//!
//! let paths = FieldPathExtractor::default().extract(&json!({"a": {"b": 1}}));
//! assert_eq!(paths, vec!["a", "a.b"]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod classifier;
pub mod error;
pub mod paths;
pub mod types;

pub use classifier::{parse_response, Classifier};
pub use error::{ClassificationError, Result};
pub use paths::{structural_sample, FieldPathExtractor};
pub use types::{ClassificationRecord, ClassificationResult, ClassificationSummary};
