//! Dossier Redact - PII redaction for exported provider data.
//!
//! A [`PatternRegistry`] holds the active patterns in a fixed order and the
//! placeholder they are replaced with. A [`Scrubber`] walks a whole value
//! and returns a redacted deep copy together with per-pattern match counts.
//!
//! # Example
//!
//! ```rust
//! use dossier_core::RedactionConfig;
//! use dossier_redact::Scrubber;
//! use serde_json::json;
//!
//! let scrubber = Scrubber::new(&RedactionConfig::default()).expect("default patterns compile");
//! let result = scrubber
//!     .scrub(&json!({"email": "user@example.com", "note": "call 555-123-4567"}))
//!     .expect("shallow input");
//!
//! assert_eq!(result.scrubbed_data()["email"], "[REDACTED]");
//! assert_eq!(result.stats()["phone"], 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod patterns;
pub mod scrubber;

pub use error::{RedactError, ScrubError};
pub use patterns::{PatternCategory, PatternRegistry, RedactionPattern};
pub use scrubber::{merge_stats, ScrubResult, Scrubber};
