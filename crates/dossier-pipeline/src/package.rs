//! Packaging and archival collaborators.
//!
//! Both report failure through structured outcomes rather than errors so the
//! orchestrator can still describe a partially successful run.

use async_trait::async_trait;
use dossier_classify::{ClassificationRecord, ClassificationResult};
use dossier_core::RawDataset;
use dossier_redact::ScrubResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Scrubbed data written to every run directory.
pub const SCRUBBED_DATA_FILE: &str = "scrubbed-data.json";
/// Field-to-rule mapping table.
pub const FIELD_MAPPING_FILE: &str = "field-mapping.csv";
/// Full classification result, present only when classification ran.
pub const CLASSIFICATION_FILE: &str = "classification.json";
/// Run manifest with artifact digests.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Everything a packager may read.
#[derive(Debug, Clone, Copy)]
pub struct PackageInput<'a> {
    /// Run identifier, names the output directory
    pub run_id: &'a str,
    /// Unscrubbed provider data, for metadata only
    pub raw: &'a RawDataset,
    /// Scrubbed data and statistics
    pub scrub: &'a ScrubResult,
    /// Classification, when the stage ran and succeeded
    pub classification: Option<&'a ClassificationResult>,
}

/// Result of packaging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOutcome {
    /// Whether every artifact was written
    pub success: bool,
    /// Artifacts written, including those written before a failure
    pub artifacts: Vec<PathBuf>,
    /// Failure description
    pub error: Option<String>,
}

impl PackageOutcome {
    /// Successful outcome.
    #[must_use]
    pub fn succeeded(artifacts: Vec<PathBuf>) -> Self {
        Self {
            success: true,
            artifacts,
            error: None,
        }
    }

    /// Failed outcome, keeping whatever was written.
    #[must_use]
    pub fn failed(artifacts: Vec<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            artifacts,
            error: Some(error.into()),
        }
    }
}

/// Result of archival.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveOutcome {
    /// Whether the bundle was produced
    pub success: bool,
    /// Path of the bundle
    pub archive_path: Option<PathBuf>,
    /// Bundle size over input size
    pub compression_ratio: Option<f64>,
    /// Failure description
    pub error: Option<String>,
}

impl ArchiveOutcome {
    /// Successful outcome.
    #[must_use]
    pub fn succeeded(archive_path: PathBuf, compression_ratio: f64) -> Self {
        Self {
            success: true,
            archive_path: Some(archive_path),
            compression_ratio: Some(compression_ratio),
            error: None,
        }
    }

    /// Failed outcome.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            archive_path: None,
            compression_ratio: None,
            error: Some(error.into()),
        }
    }
}

/// Turns pipeline results into file artifacts.
#[async_trait]
pub trait Packager: Send + Sync {
    /// Write the artifacts for one run.
    async fn package(&self, input: &PackageInput<'_>) -> PackageOutcome;
}

/// Bundles artifacts into a single protected file.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Compress `artifacts` into `destination` under `passphrase`.
    async fn archive(&self, artifacts: &[PathBuf], passphrase: &str, destination: &Path) -> ArchiveOutcome;
}

#[derive(Error, Debug)]
enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Writes JSON and CSV artifacts under `<root>/<run_id>/`.
#[derive(Debug, Clone)]
pub struct JsonPackager {
    output_root: PathBuf,
}

impl JsonPackager {
    /// Packager writing below `output_root`.
    #[must_use]
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    /// Directory a run's artifacts land in.
    #[must_use]
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.output_root.join(run_id)
    }

    async fn write_all(
        &self,
        input: &PackageInput<'_>,
        written: &mut Vec<PathBuf>,
    ) -> Result<(), WriteError> {
        let dir = self.run_dir(input.run_id);
        fs::create_dir_all(&dir).await?;

        let mut digests = Vec::new();

        let scrubbed = serde_json::to_vec_pretty(input.scrub.scrubbed_data())?;
        write_artifact(&dir, SCRUBBED_DATA_FILE, &scrubbed, written, &mut digests).await?;

        let records = input
            .classification
            .map_or(&[][..], |c| c.classifications.as_slice());
        let mapping = field_mapping_csv(records);
        write_artifact(&dir, FIELD_MAPPING_FILE, mapping.as_bytes(), written, &mut digests).await?;

        if let Some(classification) = input.classification {
            let body = serde_json::to_vec_pretty(classification)?;
            write_artifact(&dir, CLASSIFICATION_FILE, &body, written, &mut digests).await?;
        }

        let manifest = serde_json::to_vec_pretty(&manifest(input, &digests))?;
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, manifest).await?;
        written.push(path);

        Ok(())
    }
}

#[async_trait]
impl Packager for JsonPackager {
    async fn package(&self, input: &PackageInput<'_>) -> PackageOutcome {
        let mut written = Vec::new();
        match self.write_all(input, &mut written).await {
            Ok(()) => {
                tracing::info!(
                    "Packaged {} artifacts into {}",
                    written.len(),
                    self.run_dir(input.run_id).display()
                );
                PackageOutcome::succeeded(written)
            }
            Err(e) => {
                tracing::error!("Packaging failed after {} artifacts: {}", written.len(), e);
                PackageOutcome::failed(written, e.to_string())
            }
        }
    }
}

async fn write_artifact(
    dir: &Path,
    name: &str,
    bytes: &[u8],
    written: &mut Vec<PathBuf>,
    digests: &mut Vec<(String, String)>,
) -> Result<(), WriteError> {
    let path = dir.join(name);
    fs::write(&path, bytes).await?;
    digests.push((name.to_string(), sha256_hex(bytes)));
    written.push(path);
    Ok(())
}

/// Hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn manifest(input: &PackageInput<'_>, digests: &[(String, String)]) -> Value {
    let providers: Vec<Value> = input
        .raw
        .provider_names()
        .into_iter()
        .map(|name| json!({ "name": name, "recordCount": input.raw.record_count(name) }))
        .collect();
    let artifacts: Vec<Value> = digests
        .iter()
        .map(|(file, digest)| json!({ "file": file, "sha256": digest }))
        .collect();

    json!({
        "runId": input.run_id,
        "subject": input.raw.subject().as_str(),
        "exportedAt": input.raw.exported_at().to_rfc3339(),
        "providers": providers,
        "scrubStats": input.scrub.stats(),
        "bytesReduced": input.scrub.bytes_reduced(),
        "classification": input.classification.map(|c| &c.summary),
        "artifacts": artifacts,
    })
}

fn field_mapping_csv(records: &[ClassificationRecord]) -> String {
    let mut out = String::from("field,category,sensitivity,rule_reference,rationale\n");
    for record in records {
        let row = [
            record.field.as_str(),
            record.category.as_str(),
            record.sensitivity.as_str(),
            record.rule_reference.as_str(),
            record.rationale.as_str(),
        ];
        let cells: Vec<String> = row.iter().map(|cell| csv_cell(cell)).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

fn csv_cell(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_core::{Sensitivity, SubjectId, Timestamp};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn raw() -> RawDataset {
        let providers = json!({
            "github": { "profile": { "email": "octo@example.com" }, "events": [1, 2, 3] },
            "stripe": { "customers": [], "charges": [] }
        });
        let Value::Object(map) = providers else {
            panic!("fixture is an object");
        };
        RawDataset::new(
            SubjectId::new("octocat").expect("subject"),
            Timestamp::now(),
            map,
        )
    }

    fn scrub() -> ScrubResult {
        let mut stats = BTreeMap::new();
        stats.insert("email".to_string(), 1);
        ScrubResult::from_parts(
            json!({ "github": { "profile": { "email": "[REDACTED]" } } }),
            stats,
            6,
        )
    }

    fn classification() -> ClassificationResult {
        ClassificationResult::new(
            vec![ClassificationRecord {
                field: "github.profile.email".to_string(),
                rule_reference: "GDPR Art. 6(1)(b)".to_string(),
                rationale: "Contact address, used for account \"login\"".to_string(),
                category: "contact".to_string(),
                sensitivity: Sensitivity::Medium,
            }],
            4,
            12,
        )
    }

    #[test]
    fn test_csv_cell_escaping() {
        assert_eq!(csv_cell("plain"), "plain");
        assert_eq!(csv_cell("a,b"), "\"a,b\"");
        assert_eq!(csv_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_field_mapping_rows() {
        let csv = field_mapping_csv(&classification().classifications);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("github.profile.email,contact,medium,"));
    }

    #[tokio::test]
    async fn test_package_writes_artifacts() {
        let dir = TempDir::new().expect("tempdir");
        let packager = JsonPackager::new(dir.path());
        let raw = raw();
        let scrub = scrub();
        let classification = classification();

        let outcome = packager
            .package(&PackageInput {
                run_id: "run-1",
                raw: &raw,
                scrub: &scrub,
                classification: Some(&classification),
            })
            .await;

        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.artifacts.len(), 4);

        let manifest: Value = serde_json::from_str(
            &std::fs::read_to_string(packager.run_dir("run-1").join(MANIFEST_FILE))
                .expect("manifest"),
        )
        .expect("manifest json");
        assert_eq!(manifest["providers"][0]["recordCount"], 3);
        assert_eq!(manifest["scrubStats"]["email"], 1);
        assert_eq!(manifest["classification"]["totalFields"], 4);
        assert_eq!(manifest["artifacts"].as_array().map(Vec::len), Some(3));

        let scrubbed = std::fs::read(packager.run_dir("run-1").join(SCRUBBED_DATA_FILE))
            .expect("scrubbed");
        assert_eq!(manifest["artifacts"][0]["sha256"], sha256_hex(&scrubbed));
    }

    #[tokio::test]
    async fn test_package_without_classification() {
        let dir = TempDir::new().expect("tempdir");
        let packager = JsonPackager::new(dir.path());
        let raw = raw();
        let scrub = scrub();

        let outcome = packager
            .package(&PackageInput {
                run_id: "run-2",
                raw: &raw,
                scrub: &scrub,
                classification: None,
            })
            .await;

        assert!(outcome.success);
        assert!(!packager.run_dir("run-2").join(CLASSIFICATION_FILE).exists());
        for artifact in &outcome.artifacts {
            let body = std::fs::read_to_string(artifact).expect("artifact");
            assert!(!body.contains("octo@example.com"), "{}", artifact.display());
        }
    }

    #[tokio::test]
    async fn test_package_failure_is_structured() {
        let dir = TempDir::new().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").expect("blocker");
        let packager = JsonPackager::new(&blocker);
        let raw = raw();
        let scrub = scrub();

        let outcome = packager
            .package(&PackageInput {
                run_id: "run-3",
                raw: &raw,
                scrub: &scrub,
                classification: None,
            })
            .await;

        assert!(!outcome.success);
        assert!(outcome.artifacts.is_empty());
        assert!(outcome.error.is_some());
    }
}
