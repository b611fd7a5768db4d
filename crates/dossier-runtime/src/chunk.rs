//! Chunked and sequential processing of record sets.
//!
//! Both modes preserve input order, yield to the scheduler at explicit unit
//! boundaries and fail fast: the first worker error aborts the traversal and
//! no partial results are returned.

use crate::error::ChunkError;
use crate::monitor::ResourceMonitor;
use dossier_core::ResourceConfig;
use std::future::Future;
use std::sync::Arc;

/// Drives items through a worker in bounded units of work.
#[derive(Clone)]
pub struct ChunkProcessor {
    stage: String,
    reclaim_every: usize,
    monitor: Option<Arc<ResourceMonitor>>,
}

impl ChunkProcessor {
    /// Default items between reclamation requests in sequential mode.
    pub const DEFAULT_RECLAIM_EVERY: usize = 50;

    /// Processor reporting progress under `stage`.
    #[must_use]
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            reclaim_every: Self::DEFAULT_RECLAIM_EVERY,
            monitor: None,
        }
    }

    /// Processor using `[resources] reclaim_every`.
    #[must_use]
    pub fn from_config(stage: impl Into<String>, config: &ResourceConfig) -> Self {
        Self::new(stage).with_reclaim_every(config.reclaim_every)
    }

    /// Report progress and reclamation requests to `monitor`.
    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<ResourceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Items between reclamation requests in sequential mode. Zero disables.
    #[must_use]
    pub fn with_reclaim_every(mut self, every: usize) -> Self {
        self.reclaim_every = every;
        self
    }

    /// Stage name used in progress reports.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Run `worker` over contiguous chunks of at most `chunk_size` items.
    ///
    /// Chunks run one after another; results are concatenated in order.
    pub async fn process_in_chunks<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        chunk_size: usize,
        mut worker: F,
    ) -> Result<Vec<R>, ChunkError<E>>
    where
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = Result<Vec<R>, E>>,
    {
        if chunk_size == 0 {
            return Err(ChunkError::InvalidChunkSize);
        }

        let total = items.len();
        let mut results = Vec::with_capacity(total);
        let mut processed = 0;
        let mut remaining = items.into_iter().peekable();
        let mut unit = 0;

        while remaining.peek().is_some() {
            let chunk: Vec<T> = remaining.by_ref().take(chunk_size).collect();
            let len = chunk.len();

            let output = worker(chunk)
                .await
                .map_err(|source| ChunkError::Worker { unit, source })?;
            results.extend(output);

            processed += len;
            unit += 1;
            self.report(processed, total);
            tokio::task::yield_now().await;
        }

        Ok(results)
    }

    /// Run `worker(item, index)` one item at a time.
    ///
    /// Every `reclaim_every` items, requests reclamation and yields.
    pub async fn process_sequentially<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        mut worker: F,
    ) -> Result<Vec<R>, ChunkError<E>>
    where
        F: FnMut(T, usize) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let total = items.len();
        let mut results = Vec::with_capacity(total);

        for (index, item) in items.into_iter().enumerate() {
            let output = worker(item, index)
                .await
                .map_err(|source| ChunkError::Worker { unit: index, source })?;
            results.push(output);

            let done = index + 1;
            self.report(done, total);
            if self.reclaim_every > 0 && done % self.reclaim_every == 0 {
                if let Some(monitor) = &self.monitor {
                    monitor.request_reclamation();
                }
                tokio::task::yield_now().await;
            }
        }

        Ok(results)
    }

    fn report(&self, processed: usize, total: usize) {
        if let Some(monitor) = &self.monitor {
            monitor.update_progress(&self.stage, processed, Some(total));
        }
        tracing::debug!("{}: processed {}/{}", self.stage, processed, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use thiserror::Error;

    #[derive(Error, Debug, PartialEq)]
    #[error("bad item {0}")]
    struct BadItem(u32);

    async fn double_all(chunk: Vec<u32>) -> Result<Vec<u32>, Infallible> {
        Ok(chunk.into_iter().map(|n| n * 2).collect())
    }

    #[tokio::test]
    async fn test_chunked_matches_sequential() {
        let processor = ChunkProcessor::new("test");
        for n in 0..20u32 {
            let items: Vec<u32> = (0..n).collect();
            let sequential = processor
                .process_sequentially(items.clone(), |item, _| async move {
                    Ok::<_, Infallible>(item * 2)
                })
                .await
                .expect("sequential");

            for k in 1..6 {
                let chunked = processor
                    .process_in_chunks(items.clone(), k, double_all)
                    .await
                    .expect("chunked");
                assert_eq!(chunked, sequential, "n={n} k={k}");
            }
        }
    }

    #[tokio::test]
    async fn test_chunks_are_contiguous() {
        let mut seen = Vec::new();
        ChunkProcessor::new("test")
            .process_in_chunks((1..=7).collect(), 3, |chunk: Vec<u32>| {
                seen.push(chunk.clone());
                async move { Ok::<_, Infallible>(chunk) }
            })
            .await
            .expect("chunked");

        assert_eq!(seen, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
    }

    #[tokio::test]
    async fn test_zero_chunk_size_rejected() {
        let err = ChunkProcessor::new("test")
            .process_in_chunks(vec![1u32], 0, double_all)
            .await
            .expect_err("zero chunk size");
        assert!(matches!(err, ChunkError::InvalidChunkSize));
    }

    #[tokio::test]
    async fn test_chunked_fails_fast() {
        let mut calls = 0;
        let err = ChunkProcessor::new("test")
            .process_in_chunks((0..10u32).collect(), 2, |chunk: Vec<u32>| {
                calls += 1;
                async move {
                    if chunk.contains(&5) {
                        Err(BadItem(5))
                    } else {
                        Ok(chunk)
                    }
                }
            })
            .await
            .expect_err("worker error");

        assert_eq!(calls, 3);
        assert!(matches!(err, ChunkError::Worker { unit: 2, .. }));
        assert_eq!(err.into_worker_error(), Some(BadItem(5)));
    }

    #[tokio::test]
    async fn test_sequential_fails_fast_with_index() {
        let mut visited = Vec::new();
        let err = ChunkProcessor::new("test")
            .process_sequentially(vec![1u32, 2, 3, 4], |item, index| {
                visited.push(index);
                async move {
                    if item == 3 {
                        Err(BadItem(item))
                    } else {
                        Ok(item)
                    }
                }
            })
            .await
            .expect_err("worker error");

        assert_eq!(visited, vec![0, 1, 2]);
        assert_eq!(err.to_string(), "worker failed on unit 2: bad item 3");
    }

    #[tokio::test]
    async fn test_progress_and_reclamation_reported() {
        let monitor = Arc::new(ResourceMonitor::new(ResourceConfig::default()));
        let processor = ChunkProcessor::new("exporting")
            .with_reclaim_every(2)
            .with_monitor(Arc::clone(&monitor));

        let out = processor
            .process_sequentially(vec!["a", "b", "c", "d", "e"], |item, _| async move {
                Ok::<_, Infallible>(item.len())
            })
            .await
            .expect("sequential");

        assert_eq!(out, vec![1; 5]);
        assert_eq!(monitor.reclamations(), 2);
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.stage, "exporting");
        assert_eq!(snapshot.processed_items, 5);
        assert_eq!(snapshot.estimated_total, Some(5));
    }

    #[tokio::test]
    async fn test_chunk_progress_is_cumulative() {
        let monitor = Arc::new(ResourceMonitor::new(ResourceConfig::default()));
        let processor = ChunkProcessor::from_config("scrubbing", &ResourceConfig::default())
            .with_monitor(Arc::clone(&monitor));

        processor
            .process_in_chunks((0..11u32).collect(), 4, double_all)
            .await
            .expect("chunked");

        assert_eq!(monitor.snapshot().processed_items, 11);
        assert_eq!(processor.stage(), "scrubbing");
    }
}
