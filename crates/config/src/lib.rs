//! Configuration for the certex ACME certificate extractor
//!
//! The extractor is configured entirely from the process environment:
//!
//! | Variable               | Required | Default | Meaning                                  |
//! |------------------------|----------|---------|------------------------------------------|
//! | `ACME_FILE_PATH`       | yes      |         | Traefik ACME storage file to watch       |
//! | `CERTS_DIR`            | yes      |         | Output directory for extracted artifacts |
//! | `SETTLE_INTERVAL_MS`   | no       | `1000`  | Debounce window after a file write       |
//! | `EXTRACT_TIMEOUT_SECS` | no       | unset   | Upper bound for a single extraction run  |
//!
//! The resulting [`ExtractorConfig`] is passed explicitly to every component
//! that needs it; there is no global configuration state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod validate;

pub use validate::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};

/// Default debounce window applied after a write event.
pub const DEFAULT_SETTLE_INTERVAL_MS: u64 = 1000;

/// Errors produced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variables missing or malformed
    #[error("invalid environment configuration: {0}")]
    Env(#[from] envy::Error),

    /// Configuration loaded but failed validation
    #[error("configuration validation failed: {0}")]
    Invalid(String),
}

/// Extractor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Traefik ACME storage file (`ACME_FILE_PATH`)
    pub acme_file_path: PathBuf,

    /// Directory receiving one sub-directory per domain (`CERTS_DIR`)
    pub certs_dir: PathBuf,

    /// Debounce window in milliseconds (`SETTLE_INTERVAL_MS`)
    #[serde(default = "default_settle_interval_ms")]
    pub settle_interval_ms: u64,

    /// Optional bound on a single extraction run (`EXTRACT_TIMEOUT_SECS`)
    #[serde(default)]
    pub extract_timeout_secs: Option<u64>,
}

fn default_settle_interval_ms() -> u64 {
    DEFAULT_SETTLE_INTERVAL_MS
}

impl ExtractorConfig {
    /// Create a configuration with default timings.
    pub fn new(acme_file_path: impl Into<PathBuf>, certs_dir: impl Into<PathBuf>) -> Self {
        Self {
            acme_file_path: acme_file_path.into(),
            certs_dir: certs_dir.into(),
            settle_interval_ms: DEFAULT_SETTLE_INTERVAL_MS,
            extract_timeout_secs: None,
        }
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = envy::from_env()?;
        debug!(
            acme_file = %config.acme_file_path.display(),
            certs_dir = %config.certs_dir.display(),
            settle_interval_ms = config.settle_interval_ms,
            extract_timeout_secs = ?config.extract_timeout_secs,
            "Loaded configuration from environment"
        );
        Ok(config)
    }

    /// Load configuration from explicit `(NAME, value)` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::from_iter(vars)?)
    }

    /// Set the debounce window.
    pub fn with_settle_interval(mut self, interval: Duration) -> Self {
        self.settle_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Bound every extraction run by `timeout`.
    pub fn with_extract_timeout(mut self, timeout: Duration) -> Self {
        self.extract_timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn acme_file(&self) -> &Path {
        &self.acme_file_path
    }

    pub fn certs_dir(&self) -> &Path {
        &self.certs_dir
    }

    /// Debounce window applied after a write event.
    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    /// Extraction timeout, if one is configured.
    pub fn extract_timeout(&self) -> Option<Duration> {
        self.extract_timeout_secs.map(Duration::from_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ValidationResult {
        let mut result = validate::validate_paths(self);
        result.merge(validate::validate_timings(self));
        result
    }
}
