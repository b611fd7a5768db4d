//! Shared types used across Dossier.
//!
//! This module defines the newtypes and data carriers that flow between
//! pipeline stages.

use crate::error::DossierError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of the data subject an evidence package is assembled for.
///
/// Usually an email address or a provider login. Must be non-empty and free
/// of control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(String);

impl SubjectId {
    /// Create a new `SubjectId` from a string.
    ///
    /// # Errors
    /// Returns error if the identifier is blank, longer than 320 characters,
    /// or contains control characters.
    pub fn new(id: impl Into<String>) -> Result<Self, DossierError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(DossierError::Validation(
                "invalid subject: must not be empty".to_string(),
            ));
        }
        if id.len() > 320 {
            return Err(DossierError::Validation(format!(
                "invalid subject: must be at most 320 characters, got {}",
                id.len()
            )));
        }
        if id.chars().any(char::is_control) {
            return Err(DossierError::Validation(
                "invalid subject: contains control characters".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the subject looks like an email address.
    #[must_use]
    pub fn is_email(&self) -> bool {
        self.0.contains('@')
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `DateTime<Utc>`.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, DossierError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| DossierError::Validation(format!("invalid timestamp: {e}")))
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

/// Ordinal sensitivity assigned to a classified field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    /// Low sensitivity
    Low,
    /// Medium sensitivity
    Medium,
    /// High sensitivity
    High,
}

impl Sensitivity {
    /// Lowercase label used on the wire and in artifacts.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider data captured for one subject.
///
/// Immutable once built: the merge stage assembles it from the exporter
/// outputs and every later stage only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDataset {
    subject: SubjectId,
    exported_at: Timestamp,
    providers: Map<String, Value>,
}

impl RawDataset {
    /// Capture a dataset. Provider order is preserved.
    #[must_use]
    pub fn new(subject: SubjectId, exported_at: Timestamp, providers: Map<String, Value>) -> Self {
        Self {
            subject,
            exported_at,
            providers,
        }
    }

    /// Subject the data belongs to.
    #[must_use]
    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    /// When the export finished.
    #[must_use]
    pub fn exported_at(&self) -> Timestamp {
        self.exported_at
    }

    /// Provider name → provider payload.
    #[must_use]
    pub fn providers(&self) -> &Map<String, Value> {
        &self.providers
    }

    /// Payload for one provider.
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&Value> {
        self.providers.get(name)
    }

    /// Provider names in capture order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Approximate number of records a provider contributed.
    ///
    /// Arrays count their elements, objects count the elements of their
    /// top-level arrays (or 1 when they hold no arrays), null counts as 0.
    #[must_use]
    pub fn record_count(&self, name: &str) -> usize {
        match self.providers.get(name) {
            None | Some(Value::Null) => 0,
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(map)) => {
                let mut arrays = map.values().filter_map(Value::as_array).peekable();
                if arrays.peek().is_some() {
                    arrays.map(Vec::len).sum()
                } else {
                    usize::from(!map.is_empty())
                }
            }
            Some(_) => 1,
        }
    }

    /// All provider payloads as a single object keyed by provider name.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.providers.clone())
    }
}
