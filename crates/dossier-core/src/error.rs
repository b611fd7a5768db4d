//! Foundation error types.
//!
//! Subsystem crates keep their own enums; [`DossierError`] covers shared
//! types and credentials, [`ConfigError`] covers `config.toml`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the foundation layer.
#[derive(Error, Debug)]
pub enum DossierError {
    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A credential store could not produce secrets
    #[error("credential store error: {0}")]
    Credentials(String),

    /// A required secret is absent
    #[error("missing required credential: {key}")]
    MissingCredential {
        /// Credential key that was expected
        key: String,
    },

    /// A shared type rejected its input
    #[error("validation error: {0}")]
    Validation(String),
}

/// Errors raised while reading, writing or checking `config.toml`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The platform has no config directory for this user
    #[error("no platform config directory available")]
    NoConfigDir,

    /// The file exists but could not be read
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// Config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`crate::AppConfig`]
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        /// Config file
        path: PathBuf,
        /// TOML error
        #[source]
        source: toml::de::Error,
    },

    /// The file or its directory could not be written
    #[error("cannot write {}: {source}", path.display())]
    Write {
        /// Config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The config could not be rendered as TOML
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but breaks a constraint
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field name, e.g. `resources.chunk_size`
        field: String,
        /// Constraint that failed
        reason: String,
    },
}

/// Result type alias using `DossierError`.
pub type Result<T> = std::result::Result<T, DossierError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DossierError::MissingCredential {
            key: "ARCHIVE_PASSPHRASE".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing required credential: ARCHIVE_PASSPHRASE"
        );

        let err = ConfigError::InvalidValue {
            field: "resources.chunk_size".to_string(),
            reason: "must be at least 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for resources.chunk_size: must be at least 1"
        );
    }

    #[test]
    fn test_config_error_carries_path() {
        let err = ConfigError::Read {
            path: PathBuf::from("/etc/dossier/config.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "cannot read /etc/dossier/config.toml: denied");

        let wrapped: DossierError = err.into();
        assert!(matches!(wrapped, DossierError::Config(ConfigError::Read { .. })));
    }
}
