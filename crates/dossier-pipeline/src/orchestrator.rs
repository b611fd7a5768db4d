//! Pipeline orchestrator for producing one evidence package.
//!
//! `PipelineOrchestrator` walks the state machine from export to archive,
//! passing each stage's output to the next. Optional stages degrade instead
//! of failing: a missing or failing payments export becomes an empty dataset
//! and a failing classification becomes an absent result. Every other failure
//! ends the run in `Failed` with a stage-tagged message.

use crate::error::{PipelineError, Result};
use crate::export::{ExportError, ExportRequest, GithubExporter, ProviderExporter, StripeExporter};
use crate::package::{Archiver, JsonPackager, PackageInput, Packager};
use crate::report::{DegradedStage, RunReport};
use crate::state::{PipelineState, StateMachine};
use dossier_classify::{ClassificationResult, Classifier};
use dossier_core::{
    AppConfig, CapabilityRegistry, Credentials, DossierError, ExponentialBackoff, RawDataset,
    RetryPolicy, StageCapability, SubjectId, Timestamp, ANTHROPIC_API_KEY, ARCHIVE_PASSPHRASE,
};
use dossier_llm::{AnthropicProvider, LlmError, LlmProvider};
use dossier_redact::{merge_stats, ScrubResult, Scrubber};
use dossier_runtime::{ChunkError, ChunkProcessor, MemoryProbe, ResourceMonitor};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Builds a reasoning provider from the reasoning-service credential.
pub type ReasoningFactory =
    Arc<dyn Fn(&str) -> std::result::Result<Arc<dyn LlmProvider>, LlmError> + Send + Sync>;

/// Nesting depth of a provider's value inside the merged dataset.
const PROVIDER_DEPTH: usize = 1;

/// Data returned by one exporter, or the reason it contributed nothing.
struct ExportOutcome {
    provider: String,
    data: Value,
    degraded: Option<DegradedStage>,
}

/// Assembles a [`PipelineOrchestrator`].
pub struct PipelineOrchestratorBuilder {
    config: AppConfig,
    credentials: Credentials,
    exporters: Vec<Arc<dyn ProviderExporter>>,
    reasoning_factory: Option<ReasoningFactory>,
    packager: Option<Arc<dyn Packager>>,
    archiver: Option<Arc<dyn Archiver>>,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    memory_probe: Option<MemoryProbe>,
}

impl PipelineOrchestratorBuilder {
    /// Start from `config` with no credentials.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            credentials: Credentials::new(),
            exporters: Vec::new(),
            reasoning_factory: None,
            packager: None,
            archiver: None,
            retry_policy: None,
            memory_probe: None,
        }
    }

    /// Per-run secrets.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Add an exporter. Exporters run in the order added.
    ///
    /// When none are added the GitHub and Stripe exporters are used.
    #[must_use]
    pub fn with_exporter(mut self, exporter: Arc<dyn ProviderExporter>) -> Self {
        self.exporters.push(exporter);
        self
    }

    /// Replace how the reasoning provider is built from its credential.
    #[must_use]
    pub fn with_reasoning_factory(
        mut self,
        factory: impl Fn(&str) -> std::result::Result<Arc<dyn LlmProvider>, LlmError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.reasoning_factory = Some(Arc::new(factory));
        self
    }

    /// Replace the default [`JsonPackager`].
    #[must_use]
    pub fn with_packager(mut self, packager: Arc<dyn Packager>) -> Self {
        self.packager = Some(packager);
        self
    }

    /// Archiver for the final bundle. Required.
    #[must_use]
    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = Some(archiver);
        self
    }

    /// Replace the retry policy built from `[retry]`.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Replace the process memory probe used by the resource monitor.
    #[must_use]
    pub fn with_memory_probe(mut self, probe: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.memory_probe = Some(Arc::new(probe));
        self
    }

    /// Validate the configuration and build the orchestrator.
    pub fn build(self) -> Result<PipelineOrchestrator> {
        self.config.validate()?;

        let archiver = self
            .archiver
            .ok_or_else(|| PipelineError::Setup("no archiver configured".to_string()))?;
        let output_dir = self.config.output_dir()?;
        let scrubber = Scrubber::new(&self.config.redaction)?;
        let retry_policy = self
            .retry_policy
            .unwrap_or_else(|| Arc::new(ExponentialBackoff::from_config(&self.config.retry)));

        let exporters = if self.exporters.is_empty() {
            default_exporters(&self.config, &retry_policy)
                .map_err(|e| PipelineError::Setup(e.to_string()))?
        } else {
            self.exporters
        };

        let packager = self
            .packager
            .unwrap_or_else(|| Arc::new(JsonPackager::new(&output_dir)));

        let reasoning_factory = self.reasoning_factory.unwrap_or_else(|| {
            let classification = self.config.classification.clone();
            let factory: ReasoningFactory = Arc::new(
                move |api_key: &str| -> std::result::Result<Arc<dyn LlmProvider>, LlmError> {
                    let provider = AnthropicProvider::from_config(api_key, &classification)?;
                    Ok(Arc::new(provider))
                },
            );
            factory
        });

        let capabilities = CapabilityRegistry::from_credentials(&self.credentials);
        for stage in capabilities.degraded_stages() {
            tracing::debug!("Stage '{}' unavailable for this credential set", stage.display_name());
        }

        Ok(PipelineOrchestrator {
            config: self.config,
            credentials: self.credentials,
            capabilities,
            exporters,
            scrubber,
            reasoning_factory,
            packager,
            archiver,
            retry_policy,
            memory_probe: self.memory_probe,
            output_dir,
        })
    }
}

fn default_exporters(
    config: &AppConfig,
    retry_policy: &Arc<dyn RetryPolicy>,
) -> std::result::Result<Vec<Arc<dyn ProviderExporter>>, ExportError> {
    let github: Arc<dyn ProviderExporter> =
        Arc::new(GithubExporter::new(&config.export, Arc::clone(retry_policy))?);
    let stripe: Arc<dyn ProviderExporter> =
        Arc::new(StripeExporter::new(&config.export, Arc::clone(retry_policy))?);
    Ok(vec![github, stripe])
}

/// Runs the evidence pipeline for one subject at a time.
pub struct PipelineOrchestrator {
    config: AppConfig,
    credentials: Credentials,
    capabilities: CapabilityRegistry,
    exporters: Vec<Arc<dyn ProviderExporter>>,
    scrubber: Scrubber,
    reasoning_factory: ReasoningFactory,
    packager: Arc<dyn Packager>,
    archiver: Arc<dyn Archiver>,
    retry_policy: Arc<dyn RetryPolicy>,
    memory_probe: Option<MemoryProbe>,
    output_dir: PathBuf,
}

impl PipelineOrchestrator {
    /// Start building an orchestrator.
    #[must_use]
    pub fn builder(config: AppConfig) -> PipelineOrchestratorBuilder {
        PipelineOrchestratorBuilder::new(config)
    }

    /// Stages available for the configured credentials.
    #[must_use]
    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    /// Directory receiving run artifacts and archives.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run the pipeline for `subject`.
    ///
    /// Always returns a report; failures are described in it rather than
    /// returned as errors.
    pub async fn run(&self, subject: &SubjectId) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let mut report = RunReport::new(run_id.clone());
        let mut machine = StateMachine::new();

        let monitor = Arc::new(self.new_monitor());
        monitor.start();

        tracing::info!("Pipeline run {} started", run_id);

        if let Err(e) = self
            .execute(subject, &run_id, &mut machine, &monitor, &mut report)
            .await
        {
            tracing::error!("Pipeline run {} failed: {}", run_id, e);
            report.error = Some(e.to_string());
            machine.fail();
        }

        report.resources = Some(monitor.stop().await);
        report.final_state = machine.current();
        report.history = machine.history().to_vec();

        tracing::info!(
            "Pipeline run {} finished: state={}, degraded={}, redactions={}, artifacts={}",
            run_id,
            report.final_state,
            report.degraded.len(),
            report.scrub_stats.values().sum::<usize>(),
            report.artifacts.len()
        );
        report
    }

    fn new_monitor(&self) -> ResourceMonitor {
        let monitor = ResourceMonitor::new(self.config.resources.clone());
        match &self.memory_probe {
            Some(probe) => {
                let probe = Arc::clone(probe);
                monitor.with_memory_probe(move || probe())
            }
            None => monitor,
        }
    }

    async fn execute(
        &self,
        subject: &SubjectId,
        run_id: &str,
        machine: &mut StateMachine,
        monitor: &Arc<ResourceMonitor>,
        report: &mut RunReport,
    ) -> Result<()> {
        self.check_required_credentials()?;

        machine.transition(PipelineState::Exporting)?;
        let fragments = self.export_all(subject, monitor, report).await?;
        checkpoint(monitor, PipelineState::Exporting, fragments.len());

        machine.transition(PipelineState::Merging)?;
        let raw = RawDataset::new(subject.clone(), Timestamp::now(), fragments);
        tracing::debug!("Merged providers: {:?}", raw.provider_names());
        checkpoint(monitor, PipelineState::Merging, raw.providers().len());

        machine.transition(PipelineState::Scrubbing)?;
        let scrub = self.scrub_dataset(&raw, monitor).await?;
        report.scrub_stats = scrub.stats().clone();
        report.bytes_reduced = scrub.bytes_reduced();
        checkpoint(monitor, PipelineState::Scrubbing, scrub.total_redactions());

        let classification = if self.capabilities.is_available(StageCapability::Classification) {
            machine.transition(PipelineState::Classifying)?;
            let result = self.classify(scrub.scrubbed_data(), report).await;
            checkpoint(
                monitor,
                PipelineState::Classifying,
                result.as_ref().map_or(0, |r| r.classifications.len()),
            );
            result
        } else {
            degrade(
                report,
                StageCapability::Classification,
                format!("no {ANTHROPIC_API_KEY} credential"),
            );
            None
        };
        report.classification = classification.as_ref().map(|c| c.summary.clone());

        let passphrase = self
            .credentials
            .require(ARCHIVE_PASSPHRASE)
            .map_err(|e| PipelineError::stage(PipelineState::Packaging, e))?;

        machine.transition(PipelineState::Packaging)?;
        let outcome = self
            .packager
            .package(&PackageInput {
                run_id,
                raw: &raw,
                scrub: &scrub,
                classification: classification.as_ref(),
            })
            .await;
        report.artifacts_retained = !outcome.artifacts.is_empty();
        report.artifacts = outcome.artifacts;
        if !outcome.success {
            let message = outcome
                .error
                .unwrap_or_else(|| "packager reported failure".to_string());
            return Err(PipelineError::stage(PipelineState::Packaging, message));
        }
        drop(raw);
        checkpoint(monitor, PipelineState::Packaging, report.artifacts.len());

        machine.transition(PipelineState::Archiving)?;
        let destination = self.output_dir.join(format!("{run_id}.zip"));
        let archive = self
            .archiver
            .archive(&report.artifacts, passphrase, &destination)
            .await;
        let archive_error = (!archive.success).then(|| {
            archive
                .error
                .clone()
                .unwrap_or_else(|| "archiver reported failure".to_string())
        });
        report.archive = Some(archive);
        if let Some(message) = archive_error {
            return Err(PipelineError::stage(PipelineState::Archiving, message));
        }

        if self.config.output.keep_artifacts {
            tracing::debug!("Keeping {} intermediate artifacts", report.artifacts.len());
        } else {
            report.artifacts_retained = !remove_artifacts(&report.artifacts).await;
        }

        machine.transition(PipelineState::Done)?;
        Ok(())
    }

    /// Fail before any data leaves a provider when a required secret is absent.
    fn check_required_credentials(&self) -> Result<()> {
        for stage in self.capabilities.missing_required() {
            let (state, used) = match stage {
                StageCapability::Archiving => (PipelineState::Packaging, true),
                other => (
                    PipelineState::Exporting,
                    self.exporters
                        .iter()
                        .any(|e| e.capability() == other && !e.is_optional()),
                ),
            };
            if used {
                return Err(PipelineError::stage(
                    state,
                    DossierError::MissingCredential {
                        key: stage.credential_key().to_string(),
                    },
                ));
            }
        }
        Ok(())
    }

    async fn export_all(
        &self,
        subject: &SubjectId,
        monitor: &Arc<ResourceMonitor>,
        report: &mut RunReport,
    ) -> Result<Map<String, Value>> {
        let processor = ChunkProcessor::from_config("exporting", &self.config.resources)
            .with_monitor(Arc::clone(monitor));

        let outcomes = processor
            .process_sequentially(self.exporters.clone(), move |exporter, _| {
                self.export_one(exporter, subject)
            })
            .await
            .map_err(|e| chunk_failure(PipelineState::Exporting, e))?;

        let mut fragments = Map::new();
        for outcome in outcomes {
            if let Some(degraded) = outcome.degraded {
                report.degraded.push(degraded);
            }
            fragments.insert(outcome.provider, outcome.data);
        }
        Ok(fragments)
    }

    async fn export_one(
        &self,
        exporter: Arc<dyn ProviderExporter>,
        subject: &SubjectId,
    ) -> std::result::Result<ExportOutcome, ExportError> {
        let provider = exporter.provider().to_string();
        let capability = exporter.capability();

        let Some(token) = self.credentials.get(exporter.credential_key()) else {
            if exporter.is_optional() {
                let reason = format!("no {} credential", exporter.credential_key());
                return Ok(skipped(provider, capability, reason));
            }
            return Err(ExportError::MissingCredential {
                provider,
                key: exporter.credential_key().to_string(),
            });
        };

        let request = ExportRequest::new(subject.clone()).with_scope(self.scope_for(capability));
        match exporter.export(&request, token).await {
            Ok(data) => Ok(ExportOutcome {
                provider,
                data,
                degraded: None,
            }),
            Err(e) if exporter.is_optional() => Ok(skipped(provider, capability, e.to_string())),
            Err(e) => Err(e),
        }
    }

    fn scope_for(&self, capability: StageCapability) -> Option<String> {
        match capability {
            StageCapability::GithubExport => self.config.export.github_org.clone(),
            StageCapability::PaymentsExport => self.config.export.stripe_account.clone(),
            StageCapability::Classification | StageCapability::Archiving => None,
        }
    }

    /// Scrub the merged dataset, driving top-level collections through chunks.
    ///
    /// Everything except those collections is scrubbed as one skeleton so key
    /// redaction and collision handling match a whole-value scrub. Scrubbed
    /// objects keep their entry order, which lets the chunked collections be
    /// put back by position. Chunks are scrubbed at the depth their collection
    /// sits at, so the depth limit applies to the dataset as a whole.
    async fn scrub_dataset(
        &self,
        raw: &RawDataset,
        monitor: &Arc<ResourceMonitor>,
    ) -> Result<ScrubResult> {
        let processor = ChunkProcessor::from_config("scrubbing", &self.config.resources)
            .with_monitor(Arc::clone(monitor));

        let skeleton: Map<String, Value> = raw
            .providers()
            .iter()
            .map(|(name, value)| (name.clone(), hollow(value)))
            .collect();
        let (mut scrubbed, mut stats, _) = self
            .scrubber
            .scrub(&Value::Object(skeleton))
            .map_err(|e| PipelineError::stage(PipelineState::Scrubbing, e))?
            .into_parts();

        if let Value::Object(out) = &mut scrubbed {
            for ((_, source), target) in raw.providers().iter().zip(out.values_mut()) {
                match (source, target) {
                    (Value::Array(items), target) => {
                        *target = Value::Array(
                            self.scrub_items(&processor, items, PROVIDER_DEPTH, &mut stats)
                                .await?,
                        );
                    }
                    (Value::Object(fields), Value::Object(out_fields)) => {
                        for ((_, field), out_field) in fields.iter().zip(out_fields.values_mut()) {
                            if let Value::Array(items) = field {
                                *out_field = Value::Array(
                                    self.scrub_items(&processor, items, PROVIDER_DEPTH + 1, &mut stats)
                                        .await?,
                                );
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        let before = serde_json::to_string(&raw.to_value()).map_err(|e| PipelineError::stage(PipelineState::Scrubbing, e))?;
        let after = serde_json::to_string(&scrubbed).map_err(|e| PipelineError::stage(PipelineState::Scrubbing, e))?;
        let bytes_reduced = byte_len(&before) - byte_len(&after);

        Ok(ScrubResult::from_parts(scrubbed, stats, bytes_reduced))
    }

    async fn scrub_items(
        &self,
        processor: &ChunkProcessor,
        items: &[Value],
        depth: usize,
        stats: &mut BTreeMap<String, usize>,
    ) -> Result<Vec<Value>> {
        let chunk_size = self.config.resources.chunk_size;
        let results = processor
            .process_in_chunks(items.iter().collect(), chunk_size, |chunk: Vec<&Value>| {
                let batch = Value::Array(chunk.into_iter().cloned().collect());
                let result = self.scrubber.scrub_nested(&batch, depth).map(|r| vec![r]);
                async move { result }
            })
            .await
            .map_err(|e| chunk_failure(PipelineState::Scrubbing, e))?;

        let mut scrubbed = Vec::with_capacity(items.len());
        for result in results {
            let (data, chunk_stats, _) = result.into_parts();
            merge_stats(stats, &chunk_stats);
            if let Value::Array(values) = data {
                scrubbed.extend(values);
            }
        }
        Ok(scrubbed)
    }

    async fn classify(&self, scrubbed: &Value, report: &mut RunReport) -> Option<ClassificationResult> {
        let api_key = self.credentials.get(ANTHROPIC_API_KEY)?;

        let provider = match (self.reasoning_factory)(api_key) {
            Ok(provider) => provider,
            Err(e) => {
                degrade(report, StageCapability::Classification, e.to_string());
                return None;
            }
        };

        let classifier = Classifier::new(
            provider,
            self.config.classification.clone(),
            Arc::clone(&self.retry_policy),
        );
        match classifier.classify(scrubbed).await {
            Ok(result) => {
                tracing::info!(
                    "Classified {} of {} fields via {}",
                    result.classifications.len(),
                    result.summary.total_fields,
                    classifier.provider_id()
                );
                Some(result)
            }
            Err(e) => {
                degrade(report, StageCapability::Classification, e.to_string());
                None
            }
        }
    }
}

fn skipped(provider: String, capability: StageCapability, reason: String) -> ExportOutcome {
    tracing::warn!(
        degraded = true,
        "Skipping {} ({}): {}",
        capability.display_name(),
        provider,
        reason
    );
    ExportOutcome {
        provider,
        data: Value::Object(Map::new()),
        degraded: Some(DegradedStage::new(capability, reason)),
    }
}

fn degrade(report: &mut RunReport, stage: StageCapability, reason: String) {
    tracing::warn!(degraded = true, "Skipping {}: {}", stage.display_name(), reason);
    report.degraded.push(DegradedStage::new(stage, reason));
}

fn checkpoint(monitor: &ResourceMonitor, stage: PipelineState, processed: usize) {
    monitor.update_progress(stage.as_str(), processed, Some(processed));
    monitor.sample_now();
    monitor.request_reclamation();
}

fn chunk_failure<E>(stage: PipelineState, e: ChunkError<E>) -> PipelineError
where
    E: std::error::Error + Send + Sync + 'static,
{
    match e {
        ChunkError::Worker { source, .. } => PipelineError::stage(stage, source),
        other => PipelineError::stage(stage, other),
    }
}

/// `value` with its top-level collections emptied.
fn hollow(value: &Value) -> Value {
    match value {
        Value::Array(_) => Value::Array(Vec::new()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, field)| {
                    let field = match field {
                        Value::Array(_) => Value::Array(Vec::new()),
                        other => other.clone(),
                    };
                    (key.clone(), field)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

async fn remove_artifacts(artifacts: &[PathBuf]) -> bool {
    let mut removed_all = true;
    for path in artifacts {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!("Failed to remove artifact {}: {}", path.display(), e);
            removed_all = false;
        }
    }

    let dirs: BTreeSet<&Path> = artifacts.iter().filter_map(|p| p.parent()).collect();
    for dir in dirs {
        if let Err(e) = tokio::fs::remove_dir(dir).await {
            tracing::debug!("Left run directory {} in place: {}", dir.display(), e);
        }
    }
    removed_all
}

#[allow(clippy::cast_possible_wrap)]
fn byte_len(s: &str) -> i64 {
    s.len() as i64
}
