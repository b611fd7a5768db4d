//! Redaction patterns and the registry that applies them.
//!
//! Built-in categories are compiled once into static regexes. Credential and
//! provider-token categories are always applied; the rest follow the
//! `[redaction]` config toggles. Patterns run in a fixed order: email, phone,
//! government ID, payment card, network address, credential token, provider
//! token, then custom patterns in config order.

use crate::error::{RedactError, Result};
use dossier_core::RedactionConfig;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Upper bound on redaction passes over a single string.
const MAX_PASSES: usize = 16;

// Built-in patterns (compiled once, reused across runs)
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
        .expect("email regex is valid")
});

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\b1[-.\s]?)?(?:\(|\b)[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b")
        .expect("phone regex is valid")
});

static GOVERNMENT_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("government id regex is valid"));

static PAYMENT_CARD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{4}[-\s]?){3}\d{4}\b").expect("payment card regex is valid")
});

static NETWORK_ADDRESS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b|\b(?:[0-9A-Fa-f]{1,4}:){7}[0-9A-Fa-f]{1,4}\b")
        .expect("network address regex is valid")
});

// Bearer values, AWS access keys, JWTs and key=value secrets
static CREDENTIAL_TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i:\bbearer\s+[A-Za-z0-9\-._~+/]{16,}=*)",
        r"|\bAKIA[0-9A-Z]{16}\b",
        r"|\beyJ[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}",
        r#"|(?i:\b(?:api[_-]?key|secret|password|passwd|access[_-]?token)\s*[:=]\s*["']?[^\s"',;\[\]]{8,})"#,
    ))
    .expect("credential token regex is valid")
});

// Tokens issued by the providers this pipeline talks to
static PROVIDER_TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\bgh[pousr]_[A-Za-z0-9]{36,}\b",
        r"|\bgithub_pat_[A-Za-z0-9_]{22,}\b",
        r"|\b(?:sk|pk|rk)_(?:live|test)_[A-Za-z0-9]{10,}\b",
        r"|\bwhsec_[A-Za-z0-9]{20,}\b",
        r"|\bsk-ant-[A-Za-z0-9_-]{20,}",
    ))
    .expect("provider token regex is valid")
});

/// Category a redaction pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    /// Email addresses
    Email,
    /// Phone numbers
    Phone,
    /// Government identifiers (SSN format)
    GovernmentId,
    /// Payment card numbers
    PaymentCard,
    /// IPv4 and full-form IPv6 addresses
    NetworkAddress,
    /// Generic credential material (bearer tokens, cloud keys, JWTs)
    CredentialToken,
    /// Provider-issued API tokens
    ProviderToken,
    /// User-configured pattern
    Custom,
}

impl PatternCategory {
    /// Built-in categories in application order.
    pub const BUILT_IN: [PatternCategory; 7] = [
        Self::Email,
        Self::Phone,
        Self::GovernmentId,
        Self::PaymentCard,
        Self::NetworkAddress,
        Self::CredentialToken,
        Self::ProviderToken,
    ];

    /// Name used as the statistics key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::GovernmentId => "government_id",
            Self::PaymentCard => "payment_card",
            Self::NetworkAddress => "network_address",
            Self::CredentialToken => "credential_token",
            Self::ProviderToken => "provider_token",
            Self::Custom => "custom",
        }
    }

    /// Whether config toggles can turn this category off.
    #[must_use]
    pub fn is_always_on(&self) -> bool {
        matches!(self, Self::CredentialToken | Self::ProviderToken)
    }

    fn is_enabled(self, config: &RedactionConfig) -> bool {
        match self {
            Self::Email => config.email,
            Self::Phone => config.phone,
            Self::GovernmentId => config.government_id,
            Self::PaymentCard => config.payment_card,
            Self::NetworkAddress => config.network_address,
            Self::CredentialToken | Self::ProviderToken | Self::Custom => true,
        }
    }

    fn built_in_regex(self) -> Option<&'static Regex> {
        match self {
            Self::Email => Some(&*EMAIL_REGEX),
            Self::Phone => Some(&*PHONE_REGEX),
            Self::GovernmentId => Some(&*GOVERNMENT_ID_REGEX),
            Self::PaymentCard => Some(&*PAYMENT_CARD_REGEX),
            Self::NetworkAddress => Some(&*NETWORK_ADDRESS_REGEX),
            Self::CredentialToken => Some(&*CREDENTIAL_TOKEN_REGEX),
            Self::ProviderToken => Some(&*PROVIDER_TOKEN_REGEX),
            Self::Custom => None,
        }
    }
}

impl std::fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named pattern with its compiled regex.
#[derive(Debug, Clone)]
pub struct RedactionPattern {
    name: String,
    category: PatternCategory,
    regex: Regex,
}

impl RedactionPattern {
    /// Build a pattern from an already compiled regex.
    #[must_use]
    pub fn new(name: impl Into<String>, category: PatternCategory, regex: Regex) -> Self {
        Self {
            name: name.into(),
            category,
            regex,
        }
    }

    /// Compile a user-supplied pattern.
    pub fn custom(name: &str, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| RedactError::InvalidPattern {
            name: name.to_string(),
            source,
        })?;
        Ok(Self::new(name, PatternCategory::Custom, regex))
    }

    /// Statistics key for this pattern.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Category of this pattern.
    #[must_use]
    pub fn category(&self) -> PatternCategory {
        self.category
    }

    /// Count non-overlapping matches in `text`.
    #[must_use]
    pub fn count_matches(&self, text: &str) -> usize {
        self.regex.find_iter(text).count()
    }

    /// Whether `text` contains a match.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Replace every match with `placeholder`. Borrows when nothing matched.
    #[must_use]
    pub fn redact<'a>(&self, text: &'a str, placeholder: &str) -> Cow<'a, str> {
        self.regex.replace_all(text, NoExpand(placeholder))
    }
}

/// Ordered set of active patterns plus the replacement placeholder.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    patterns: Vec<RedactionPattern>,
    placeholder: String,
}

impl PatternRegistry {
    /// Build the registry from the `[redaction]` config section.
    ///
    /// Fails if a custom pattern does not compile, or if the placeholder
    /// itself would be matched by an active pattern.
    pub fn new(config: &RedactionConfig) -> Result<Self> {
        let mut patterns: Vec<RedactionPattern> = PatternCategory::BUILT_IN
            .iter()
            .copied()
            .filter(|c| c.is_enabled(config))
            .filter_map(|c| {
                c.built_in_regex()
                    .map(|re| RedactionPattern::new(c.as_str(), c, re.clone()))
            })
            .collect();

        for custom in &config.custom_patterns {
            patterns.push(RedactionPattern::custom(&custom.name, &custom.pattern)?);
        }

        if let Some(p) = patterns.iter().find(|p| p.is_match(&config.placeholder)) {
            return Err(RedactError::PlaceholderMatches {
                placeholder: config.placeholder.clone(),
                name: p.name().to_string(),
            });
        }

        tracing::debug!(
            "Redaction registry built with {} patterns: {:?}",
            patterns.len(),
            patterns.iter().map(RedactionPattern::name).collect::<Vec<_>>()
        );

        Ok(Self {
            patterns,
            placeholder: config.placeholder.clone(),
        })
    }

    /// Registry using default config toggles.
    pub fn with_defaults() -> Result<Self> {
        Self::new(&RedactionConfig::default())
    }

    /// Active patterns in application order.
    #[must_use]
    pub fn patterns(&self) -> &[RedactionPattern] {
        &self.patterns
    }

    /// Replacement text for matches.
    #[must_use]
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Apply every pattern in order, repeating until a full pass changes nothing.
    ///
    /// A string that still changes after the last pass is replaced by the
    /// placeholder as a whole, so the result never contains a match.
    #[must_use]
    pub fn redact<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut current = Cow::Borrowed(text);

        for _ in 0..MAX_PASSES {
            let mut changed = false;
            for pattern in &self.patterns {
                let replaced = match pattern.redact(&current, &self.placeholder) {
                    Cow::Owned(s) => Some(s),
                    Cow::Borrowed(_) => None,
                };
                if let Some(s) = replaced {
                    current = Cow::Owned(s);
                    changed = true;
                }
            }
            if !changed {
                return current;
            }
        }

        if self.is_clean(&current) {
            return current;
        }
        tracing::warn!(
            "Redaction did not settle after {} passes, replacing whole value",
            MAX_PASSES
        );
        Cow::Owned(self.placeholder.clone())
    }

    /// Count matches per pattern name. Every active pattern gets an entry.
    #[must_use]
    pub fn count_matches(&self, text: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for pattern in &self.patterns {
            *counts.entry(pattern.name().to_string()).or_insert(0) +=
                pattern.count_matches(text);
        }
        counts
    }

    /// True when no active pattern matches `text`.
    #[must_use]
    pub fn is_clean(&self, text: &str) -> bool {
        !self.patterns.iter().any(|p| p.is_match(text))
    }
}
