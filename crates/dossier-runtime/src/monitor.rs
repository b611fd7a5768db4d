//! Advisory resource monitor.
//!
//! Tracks elapsed time, stage progress and process memory. A background task
//! samples memory at a fixed interval and keeps the running peak. Crossing
//! the ceiling only logs a warning and requests reclamation; it never stops
//! the pipeline.

use crate::memory::current_memory_mb;
use dossier_core::ResourceConfig;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Reads current memory use in MB.
pub type MemoryProbe = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Called when reclamation is requested.
pub type ReclaimHook = Arc<dyn Fn() + Send + Sync>;

/// Latest progress report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    /// Stage being reported
    pub stage: String,
    /// Items processed so far in that stage
    pub processed_items: usize,
    /// Expected total, when known
    pub estimated_total: Option<usize>,
    /// Most recently sampled memory use
    pub memory_mb: u64,
}

/// Final figures emitted by [`ResourceMonitor::stop`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSummary {
    /// Time since the monitor was created
    pub duration_ms: u64,
    /// Highest sampled memory use
    pub peak_memory_mb: u64,
    /// Last stage reported
    pub final_stage: String,
    /// Items processed in the last stage
    pub processed_items: usize,
    /// Configured ceiling
    pub ceiling_mb: u64,
    /// Informational pass/fail against the ceiling
    pub within_ceiling: bool,
    /// Number of reclamation requests
    pub reclamations: u64,
}

#[derive(Default)]
struct Counters {
    last_mb: AtomicU64,
    peak_mb: AtomicU64,
    reclamations: AtomicU64,
}

struct Sampler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Tracks time, progress and memory for one pipeline run.
pub struct ResourceMonitor {
    config: ResourceConfig,
    started: Instant,
    probe: MemoryProbe,
    reclaim_hook: Option<ReclaimHook>,
    counters: Arc<Counters>,
    snapshot: Mutex<ResourceSnapshot>,
    sampler: Mutex<Option<Sampler>>,
}

impl ResourceMonitor {
    /// Create a monitor using the `[resources]` section.
    #[must_use]
    pub fn new(config: ResourceConfig) -> Self {
        Self {
            config,
            started: Instant::now(),
            probe: Arc::new(current_memory_mb),
            reclaim_hook: None,
            counters: Arc::new(Counters::default()),
            snapshot: Mutex::new(ResourceSnapshot::default()),
            sampler: Mutex::new(None),
        }
    }

    /// Replace the process memory probe.
    #[must_use]
    pub fn with_memory_probe(mut self, probe: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    /// Install a hook invoked on every reclamation request.
    #[must_use]
    pub fn with_reclaim_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.reclaim_hook = Some(Arc::new(hook));
        self
    }

    /// Configured ceiling in MB.
    #[must_use]
    pub fn ceiling_mb(&self) -> u64 {
        self.config.memory_ceiling_mb
    }

    /// Time since the monitor was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Instantaneous memory use in MB.
    #[must_use]
    pub fn current_memory_mb(&self) -> u64 {
        (self.probe)()
    }

    /// Highest memory use sampled so far.
    #[must_use]
    pub fn peak_memory_mb(&self) -> u64 {
        self.counters.peak_mb.load(Ordering::Relaxed)
    }

    /// Number of reclamation requests so far.
    #[must_use]
    pub fn reclamations(&self) -> u64 {
        self.counters.reclamations.load(Ordering::Relaxed)
    }

    /// Begin periodic sampling. Must be called inside a Tokio runtime.
    ///
    /// Calling it again while sampling is running has no effect.
    pub fn start(&self) {
        let mut sampler = self.sampler.lock().unwrap_or_else(PoisonError::into_inner);
        if sampler.is_some() {
            return;
        }

        self.sample_now();

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let probe = Arc::clone(&self.probe);
        let hook = self.reclaim_hook.clone();
        let counters = Arc::clone(&self.counters);
        let ceiling = self.config.memory_ceiling_mb;
        let period = Duration::from_millis(self.config.sample_interval_ms.max(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        record_sample(&probe, &counters, hook.as_ref(), ceiling);
                    }
                }
            }
        });

        tracing::debug!(
            "Resource monitor started: ceiling={}MB interval={:?}",
            ceiling,
            period
        );
        *sampler = Some(Sampler { cancel, handle });
    }

    /// Take a memory sample immediately, updating the peak.
    pub fn sample_now(&self) -> u64 {
        record_sample(
            &self.probe,
            &self.counters,
            self.reclaim_hook.as_ref(),
            self.config.memory_ceiling_mb,
        )
    }

    /// Record progress for `stage`. Pure bookkeeping.
    pub fn update_progress(&self, stage: &str, processed: usize, estimated_total: Option<usize>) {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        if snapshot.stage != stage {
            snapshot.stage = stage.to_string();
        }
        snapshot.processed_items = processed;
        snapshot.estimated_total = estimated_total;
        snapshot.memory_mb = self.counters.last_mb.load(Ordering::Relaxed);
    }

    /// Last progress report.
    #[must_use]
    pub fn snapshot(&self) -> ResourceSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Ask the host to release memory. Advisory; a no-op without a hook.
    pub fn request_reclamation(&self) {
        reclaim(&self.counters, self.reclaim_hook.as_ref());
    }

    /// Stop sampling and summarise the run. Safe to call more than once.
    pub async fn stop(&self) -> MonitorSummary {
        let sampler = self
            .sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sampler) = sampler {
            sampler.cancel.cancel();
            if let Err(e) = sampler.handle.await {
                tracing::debug!("Resource sampler ended abnormally: {}", e);
            }
        }

        self.sample_now();
        let snapshot = self.snapshot();
        let peak = self.peak_memory_mb();
        let ceiling = self.config.memory_ceiling_mb;

        let summary = MonitorSummary {
            duration_ms: u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX),
            peak_memory_mb: peak,
            final_stage: snapshot.stage,
            processed_items: snapshot.processed_items,
            ceiling_mb: ceiling,
            within_ceiling: peak <= ceiling,
            reclamations: self.reclamations(),
        };

        tracing::info!(
            "Resource summary: {}ms, peak {}MB of {}MB ({}), final stage '{}'",
            summary.duration_ms,
            summary.peak_memory_mb,
            summary.ceiling_mb,
            if summary.within_ceiling { "within ceiling" } else { "over ceiling" },
            summary.final_stage
        );
        summary
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        if let Some(sampler) = self
            .sampler
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            sampler.cancel.cancel();
        }
    }
}

fn record_sample(
    probe: &MemoryProbe,
    counters: &Counters,
    hook: Option<&ReclaimHook>,
    ceiling_mb: u64,
) -> u64 {
    let mb = probe();
    counters.last_mb.store(mb, Ordering::Relaxed);
    counters.peak_mb.fetch_max(mb, Ordering::Relaxed);

    if mb > ceiling_mb {
        tracing::warn!(
            "Memory ceiling exceeded: {}MB in use, ceiling {}MB",
            mb,
            ceiling_mb
        );
        reclaim(counters, hook);
    }
    mb
}

fn reclaim(counters: &Counters, hook: Option<&ReclaimHook>) {
    counters.reclamations.fetch_add(1, Ordering::Relaxed);
    if let Some(hook) = hook {
        hook();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn config(ceiling: u64) -> ResourceConfig {
        ResourceConfig {
            memory_ceiling_mb: ceiling,
            sample_interval_ms: 100,
            ..ResourceConfig::default()
        }
    }

    fn fixed_probe(value: &Arc<AtomicU64>) -> impl Fn() -> u64 + Send + Sync + 'static {
        let value = Arc::clone(value);
        move || value.load(Ordering::SeqCst)
    }

    #[test]
    fn test_update_progress_is_bookkeeping() {
        let monitor = ResourceMonitor::new(config(300)).with_memory_probe(|| 10);
        monitor.update_progress("scrubbing", 40, Some(100));

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.stage, "scrubbing");
        assert_eq!(snapshot.processed_items, 40);
        assert_eq!(snapshot.estimated_total, Some(100));
        assert_eq!(monitor.peak_memory_mb(), 0);
        assert_eq!(monitor.reclamations(), 0);
    }

    #[test]
    fn test_reclamation_calls_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let monitor = ResourceMonitor::new(config(300))
            .with_reclaim_hook(move || {
                counted.fetch_add(1, Ordering::SeqCst);
            });

        monitor.request_reclamation();
        monitor.request_reclamation();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(monitor.reclamations(), 2);
    }

    #[test]
    fn test_reclamation_without_hook_is_noop() {
        let monitor = ResourceMonitor::new(config(300));
        monitor.request_reclamation();
        assert_eq!(monitor.reclamations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_tracks_peak_and_breach() {
        let memory = Arc::new(AtomicU64::new(120));
        let monitor = ResourceMonitor::new(config(300)).with_memory_probe(fixed_probe(&memory));
        monitor.start();
        assert_eq!(monitor.peak_memory_mb(), 120);

        memory.store(450, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(250)).await;
        memory.store(200, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(250)).await;

        monitor.update_progress("packaging", 3, None);
        let summary = monitor.stop().await;

        assert_eq!(summary.peak_memory_mb, 450);
        assert!(!summary.within_ceiling);
        assert!(summary.reclamations >= 1);
        assert_eq!(summary.final_stage, "packaging");
        assert_eq!(summary.ceiling_mb, 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_within_ceiling_and_idempotent() {
        let monitor = ResourceMonitor::new(config(300)).with_memory_probe(|| 64);
        monitor.start();
        monitor.start();

        let first = monitor.stop().await;
        let second = monitor.stop().await;

        assert!(first.within_ceiling);
        assert_eq!(first.peak_memory_mb, 64);
        assert_eq!(second.peak_memory_mb, 64);
        assert_eq!(first.reclamations, 0);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = MonitorSummary {
            duration_ms: 5,
            peak_memory_mb: 1,
            final_stage: "done".to_string(),
            processed_items: 0,
            ceiling_mb: 300,
            within_ceiling: true,
            reclamations: 0,
        };
        let value = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(value["peakMemoryMb"], 1);
        assert_eq!(value["withinCeiling"], true);
    }
}
