//! Dossier Runtime - resource tracking and bounded processing.
//!
//! - [`ResourceMonitor`] samples process memory on an interval, keeps the
//!   peak and warns when a soft ceiling is crossed.
//! - [`ChunkProcessor`] drives record sets through a worker either in
//!   fixed-size chunks or one item at a time, yielding between units.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod chunk;
pub mod error;
pub mod memory;
pub mod monitor;

pub use chunk::ChunkProcessor;
pub use error::ChunkError;
pub use memory::current_memory_mb;
pub use monitor::{MemoryProbe, MonitorSummary, ReclaimHook, ResourceMonitor, ResourceSnapshot};
