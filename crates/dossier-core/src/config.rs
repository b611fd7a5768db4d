//! Configuration management for Dossier.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Every section carries `#[serde(default)]`
//! so a partial file only overrides what it names.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Every Dossier setting, one field per TOML section.
///
/// Read from `<config dir>/dossier/config.toml`; a missing file means defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// PII redaction settings
    pub redaction: RedactionConfig,
    /// Field classification settings
    pub classification: ClassificationConfig,
    /// Memory ceiling and chunking settings
    pub resources: ResourceConfig,
    /// Provider export settings
    pub export: ExportConfig,
    /// Retry/backoff settings for external calls
    pub retry: RetryConfig,
    /// Artifact output settings
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load from the platform config path, or defaults when no file exists.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`, or defaults when it does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// [`AppConfig::load`] followed by the `DOSSIER_*` environment overrides:
    ///
    /// - `DOSSIER_MEMORY_CEILING_MB`: advisory memory ceiling
    /// - `DOSSIER_OUTPUT_DIR`: artifact output directory
    /// - `DOSSIER_REDACT_NETWORK_ADDRESS`: IP redaction toggle (`true`/`false`)
    /// - `DOSSIER_CHUNK_SIZE`: scrub chunk size
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `DOSSIER_*` overrides. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(mb) = env_parse("DOSSIER_MEMORY_CEILING_MB") {
            self.resources.memory_ceiling_mb = mb;
        }
        if let Some(dir) = std::env::var_os("DOSSIER_OUTPUT_DIR").filter(|v| !v.is_empty()) {
            self.output.directory = Some(PathBuf::from(dir));
        }
        if let Some(enabled) = env_parse("DOSSIER_REDACT_NETWORK_ADDRESS") {
            self.redaction.network_address = enabled;
        }
        if let Some(size) = env_parse("DOSSIER_CHUNK_SIZE") {
            self.resources.chunk_size = size;
        }
    }

    /// Check constraints serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        let checks = [
            (self.resources.chunk_size == 0, "resources.chunk_size", "must be at least 1"),
            (
                self.resources.sample_interval_ms == 0,
                "resources.sample_interval_ms",
                "must be at least 1",
            ),
            (
                self.redaction.placeholder.is_empty(),
                "redaction.placeholder",
                "must not be empty",
            ),
            (self.redaction.max_depth == 0, "redaction.max_depth", "must be at least 1"),
            (
                self.redaction
                    .custom_patterns
                    .iter()
                    .any(|p| p.name.trim().is_empty()),
                "redaction.custom_patterns",
                "pattern name must not be empty",
            ),
        ];

        match checks.iter().find(|(failed, _, _)| *failed) {
            Some((_, field, reason)) => Err(ConfigError::InvalidValue {
                field: (*field).to_string(),
                reason: (*reason).to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Write to the platform config path, creating its directory.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Write to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(write_err)?;
        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// `<config dir>/dossier/config.toml`.
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// `<data dir>/dossier`.
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    /// Directory that receives per-run artifacts; `<data dir>/runs` when unset.
    pub fn output_dir(&self) -> ConfigResult<PathBuf> {
        match &self.output.directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::data_dir()?.join("runs")),
        }
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "dossier", "dossier").ok_or(ConfigError::NoConfigDir)
}

fn env_parse<T: std::str::FromStr + std::fmt::Display>(var: &str) -> Option<T> {
    let value = std::env::var(var).ok()?.parse().ok()?;
    tracing::debug!("{} override: {}", var, value);
    Some(value)
}

/// PII redaction settings.
///
/// Credential-like tokens are always redacted and have no toggle here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RedactionConfig {
    /// Redact email addresses
    pub email: bool,
    /// Redact phone numbers
    pub phone: bool,
    /// Redact government identifiers (SSN-style)
    pub government_id: bool,
    /// Redact payment card numbers
    pub payment_card: bool,
    /// Redact IPv4 addresses (off by default, often needed for audit context)
    pub network_address: bool,
    /// Replacement text for every match
    pub placeholder: String,
    /// Maximum nesting depth the scrubber accepts before failing
    pub max_depth: usize,
    /// Extra patterns applied after the built-in categories, in order
    pub custom_patterns: Vec<CustomPattern>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            email: true,
            phone: true,
            government_id: true,
            payment_card: true,
            network_address: false,
            placeholder: "[REDACTED]".to_string(),
            max_depth: 64,
            custom_patterns: Vec::new(),
        }
    }
}

/// A user-supplied redaction pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomPattern {
    /// Name reported in scrub statistics
    pub name: String,
    /// Regular expression source
    pub pattern: String,
}

/// Field classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Maximum number of key levels emitted by the field path extractor
    pub max_path_depth: usize,
    /// Maximum depth of the structural sample sent to the reasoning service
    pub sample_depth: usize,
    /// Maximum keys kept per object level in the structural sample
    pub sample_keys: usize,
    /// Sampling temperature for the reasoning request
    pub temperature: f32,
    /// Maximum tokens the reasoning service may generate
    pub max_tokens: u32,
    /// Reasoning model identifier
    pub model: String,
    /// Reasoning service base URL
    pub api_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            max_path_depth: 3,
            sample_depth: 2,
            sample_keys: 5,
            temperature: 0.1,
            max_tokens: 4096,
            model: "claude-3-5-sonnet-20241022".to_string(),
            api_url: "https://api.anthropic.com/v1".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Memory ceiling and chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Advisory memory ceiling in megabytes
    pub memory_ceiling_mb: u64,
    /// Interval between background memory samples
    pub sample_interval_ms: u64,
    /// Records per chunk when scrubbing large provider collections
    pub chunk_size: usize,
    /// Sequential processing requests reclamation every N items
    pub reclaim_every: usize,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            memory_ceiling_mb: 300,
            sample_interval_ms: 5000,
            chunk_size: 100,
            reclaim_every: 50,
        }
    }
}

/// Provider export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Upper bound on records fetched per collection
    pub max_records: usize,
    /// GitHub REST API base URL
    pub github_api_url: String,
    /// Stripe REST API base URL
    pub stripe_api_url: String,
    /// Optional GitHub organization scope
    pub github_org: Option<String>,
    /// Optional Stripe connected-account scope
    pub stripe_account: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent sent to providers
    pub user_agent: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_records: 500,
            github_api_url: "https://api.github.com".to_string(),
            stripe_api_url: "https://api.stripe.com".to_string(),
            github_org: None,
            stripe_account: None,
            timeout_secs: 30,
            user_agent: "Dossier/0.1.0 (+https://github.com/dossier-privacy/dossier)".to_string(),
        }
    }
}

/// Retry/backoff settings for external calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds
    pub base_delay_ms: u64,
    /// Growth factor between consecutive retries
    pub backoff_multiplier: u64,
    /// Extra factor applied when the provider signalled a rate limit
    pub rate_limit_multiplier: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            backoff_multiplier: 2,
            rate_limit_multiplier: 3,
        }
    }
}

/// Artifact output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where run directories are created (platform data dir when unset)
    pub directory: Option<PathBuf>,
    /// Keep intermediate artifacts after a successful archive
    pub keep_artifacts: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.redaction.email);
        assert!(config.redaction.phone);
        assert!(config.redaction.government_id);
        assert!(config.redaction.payment_card);
        assert!(!config.redaction.network_address);
        assert_eq!(config.redaction.placeholder, "[REDACTED]");
        assert_eq!(config.classification.max_path_depth, 3);
        assert_eq!(config.classification.sample_depth, 2);
        assert_eq!(config.classification.sample_keys, 5);
        assert_eq!(config.resources.memory_ceiling_mb, 300);
        assert_eq!(config.retry.max_retries, 3);
        assert!(!config.output.keep_artifacts);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[redaction]"));
        assert!(toml_str.contains("[classification]"));
        assert!(toml_str.contains("[resources]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.redaction.placeholder, config.redaction.placeholder);
        assert_eq!(parsed.export.max_records, config.export.max_records);
    }

    #[test]
    fn test_save_to_and_load_from() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.redaction.network_address = true;
        config.resources.memory_ceiling_mb = 512;
        config.save_to(&path).expect("save config");

        let loaded = AppConfig::load_from(&path).expect("load config");
        assert!(loaded.redaction.network_address);
        assert_eq!(loaded.resources.memory_ceiling_mb, 512);
    }

    #[test]
    fn test_load_from_missing_file_gives_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let config = AppConfig::load_from(&tmp.path().join("absent.toml")).expect("defaults");
        assert_eq!(config.resources.chunk_size, 100);
    }

    #[test]
    fn test_load_from_reports_path_on_bad_toml() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[resources\nchunk_size = ").expect("write broken config");

        let err = AppConfig::load_from(&path).expect_err("invalid toml");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_load_from_validates() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[resources]\nchunk_size = 0\n").expect("write config");

        let err = AppConfig::load_from(&path).expect_err("zero chunk size");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[redaction]
network_address = true

[[redaction.custom_patterns]]
name = "employee_id"
pattern = "EMP-\\d{6}"

[resources]
chunk_size = 25
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert!(config.redaction.network_address);
        assert_eq!(config.redaction.custom_patterns.len(), 1);
        assert_eq!(config.redaction.custom_patterns[0].name, "employee_id");
        assert_eq!(config.resources.chunk_size, 25);
        // These should be defaults
        assert!(config.redaction.email);
        assert_eq!(config.resources.memory_ceiling_mb, 300);
        assert_eq!(config.classification.max_path_depth, 3);
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut config = AppConfig::default();
        config.resources.chunk_size = 0;
        let err = config.validate().expect_err("zero chunk size is invalid");
        assert!(err.to_string().contains("resources.chunk_size"));
    }

    #[test]
    fn test_validate_rejects_empty_placeholder() {
        let mut config = AppConfig::default();
        config.redaction.placeholder = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_dir_override() {
        let mut config = AppConfig::default();
        config.output.directory = Some(PathBuf::from("/tmp/dossier-runs"));
        assert_eq!(
            config.output_dir().expect("explicit output dir"),
            PathBuf::from("/tmp/dossier-runs")
        );
    }
}
