//! Error types for chunked processing.

use thiserror::Error;

/// Failure of a chunked or sequential traversal.
#[derive(Error, Debug)]
pub enum ChunkError<E> {
    /// Chunk size of zero
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    /// The worker failed; no partial results are kept
    #[error("worker failed on unit {unit}: {source}")]
    Worker {
        /// Index of the failing chunk or item
        unit: usize,
        /// Error returned by the worker
        #[source]
        source: E,
    },
}

impl<E> ChunkError<E> {
    /// The worker's own error, if that is what failed.
    pub fn into_worker_error(self) -> Option<E> {
        match self {
            Self::Worker { source, .. } => Some(source),
            Self::InvalidChunkSize => None,
        }
    }
}
