//! Per-run secrets.
//!
//! Secrets arrive as a flat key → value mapping. Missing optional secrets are
//! a normal condition; callers decide which keys are required.

use crate::error::{DossierError, Result};
use std::collections::HashMap;
use std::fmt;
use zeroize::Zeroizing;

/// GitHub personal access token.
pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
/// Stripe secret key.
pub const STRIPE_API_KEY: &str = "STRIPE_API_KEY";
/// Reasoning service (Anthropic) API key.
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
/// Passphrase protecting the final archive.
pub const ARCHIVE_PASSPHRASE: &str = "ARCHIVE_PASSPHRASE";

/// Every key Dossier knows how to use.
pub const KNOWN_KEYS: &[&str] = &[
    GITHUB_TOKEN,
    STRIPE_API_KEY,
    ANTHROPIC_API_KEY,
    ARCHIVE_PASSPHRASE,
];

/// Source of per-run secrets.
pub trait CredentialStore: Send + Sync {
    /// Load the current secrets.
    fn load(&self) -> Result<Credentials>;
}

/// Flat secret mapping. Values are zeroed on drop and never printed.
#[derive(Clone, Default)]
pub struct Credentials {
    secrets: HashMap<String, Zeroizing<String>>,
}

impl Credentials {
    /// Empty credential set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a secret. Blank values are ignored.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            return;
        }
        self.secrets.insert(key.into(), Zeroizing::new(value));
    }

    /// Builder-style [`Credentials::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a secret.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.secrets.get(key).map(|v| v.as_str())
    }

    /// Whether a secret is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.secrets.contains_key(key)
    }

    /// Look up a secret that must be present.
    ///
    /// # Errors
    /// Returns `DossierError::MissingCredential` when the key is absent.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| DossierError::MissingCredential {
            key: key.to_string(),
        })
    }

    /// Present keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.secrets.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.keys())
            .finish()
    }
}

/// Reads the well-known keys from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialStore {
    prefix: Option<String>,
}

impl EnvCredentialStore {
    /// Read `GITHUB_TOKEN`, `STRIPE_API_KEY`, ... as-is.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `<prefix>GITHUB_TOKEN`, `<prefix>STRIPE_API_KEY`, ...
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl CredentialStore for EnvCredentialStore {
    fn load(&self) -> Result<Credentials> {
        let mut credentials = Credentials::new();
        for key in KNOWN_KEYS {
            let var = match &self.prefix {
                Some(prefix) => format!("{prefix}{key}"),
                None => (*key).to_string(),
            };
            match std::env::var(&var) {
                Ok(value) => credentials.insert(*key, value),
                Err(std::env::VarError::NotPresent) => {}
                Err(std::env::VarError::NotUnicode(_)) => {
                    return Err(DossierError::Credentials(format!(
                        "environment variable {var} is not valid UTF-8"
                    )));
                }
            }
        }
        tracing::debug!("Loaded credentials from environment: {:?}", credentials.keys());
        Ok(credentials)
    }
}

/// In-memory store, handy for embedding callers and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    credentials: Credentials,
}

impl StaticCredentialStore {
    /// Wrap an existing credential set.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl CredentialStore for StaticCredentialStore {
    fn load(&self) -> Result<Credentials> {
        Ok(self.credentials.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let creds = Credentials::new()
            .with(GITHUB_TOKEN, "ghp_example")
            .with(STRIPE_API_KEY, "   ");

        assert_eq!(creds.get(GITHUB_TOKEN), Some("ghp_example"));
        assert!(!creds.contains(STRIPE_API_KEY), "blank values count as absent");
        assert_eq!(creds.keys(), vec![GITHUB_TOKEN]);
    }

    #[test]
    fn test_require_missing() {
        let creds = Credentials::new();
        let err = creds.require(ARCHIVE_PASSPHRASE).expect_err("passphrase missing");
        assert!(matches!(err, DossierError::MissingCredential { ref key } if key == ARCHIVE_PASSPHRASE));
    }

    #[test]
    fn test_debug_hides_values() {
        let creds = Credentials::new().with(ANTHROPIC_API_KEY, "sk-ant-secret-value");
        let printed = format!("{creds:?}");
        assert!(printed.contains(ANTHROPIC_API_KEY));
        assert!(!printed.contains("sk-ant-secret-value"));
    }

    #[test]
    fn test_env_store_with_prefix() {
        std::env::set_var("DOSSIER_TEST_CREDS_GITHUB_TOKEN", "ghp_from_env");
        let store = EnvCredentialStore::with_prefix("DOSSIER_TEST_CREDS_");
        let creds = store.load().expect("load env credentials");
        assert_eq!(creds.get(GITHUB_TOKEN), Some("ghp_from_env"));
        assert!(!creds.contains(STRIPE_API_KEY));
        std::env::remove_var("DOSSIER_TEST_CREDS_GITHUB_TOKEN");
    }

    #[test]
    fn test_static_store() {
        let store = StaticCredentialStore::new(Credentials::new().with(ARCHIVE_PASSPHRASE, "pw"));
        let creds = store.load().expect("load static credentials");
        assert_eq!(creds.require(ARCHIVE_PASSPHRASE).expect("present"), "pw");
    }
}
