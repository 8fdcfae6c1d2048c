//! Configuration module for FolderLift.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! [`UploadOptions`] is the per-run subset handed to the engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for FolderLift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upload: UploadConfig,
    pub retry: RetryConfig,
    pub ledger: LedgerConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

/// Upload run defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Concurrent file transfers.
    pub workers: usize,
    /// Files per scheduling batch.
    pub batch_size: usize,
    /// Wall-clock budget for a run, in minutes.
    pub timeout_minutes: Option<u64>,
    /// Re-upload folders the ledger already knows.
    pub force: bool,
}

/// Backoff settings for transient remote failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in seconds; doubles each retry.
    pub base_delay_secs: u64,
    /// Upper bound for any single delay, in seconds.
    pub max_delay_secs: u64,
}

/// Ledger database settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite database file.
    pub path: PathBuf,
}

/// Remote drive endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Metadata API base URL.
    pub api_base_url: String,
    /// Upload API base URL.
    pub upload_base_url: String,
    /// File holding a bearer access token.
    pub token_file: Option<PathBuf>,
    /// Folder id uploads go into when none is given on the command line.
    pub default_parent_id: Option<String>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/folderlift/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("folderlift")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            batch_size: 100,
            timeout_minutes: None,
            force: false,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 6,
            base_delay_secs: 2,
            max_delay_secs: 60,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("folderlift")
                .join("ledger.db"),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base_url: "https://www.googleapis.com/upload/drive/v3".to_string(),
            token_file: None,
            default_parent_id: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"upload.workers"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- upload ---
        if let Err(e) = UploadOptions::from(&self.upload).validate() {
            errors.extend(e);
        }

        // --- retry ---
        if self.retry.base_delay_secs == 0 {
            errors.push(ValidationError {
                field: "retry.base_delay_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.retry.max_delay_secs < self.retry.base_delay_secs {
            errors.push(ValidationError {
                field: "retry.max_delay_secs".into(),
                message: format!(
                    "must be at least retry.base_delay_secs ({})",
                    self.retry.base_delay_secs
                ),
            });
        }

        // --- ledger ---
        if self.ledger.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "ledger.path".into(),
                message: "must not be empty".into(),
            });
        }

        // --- remote ---
        for (field, url) in [
            ("remote.api_base_url", &self.remote.api_base_url),
            ("remote.upload_base_url", &self.remote.upload_base_url),
        ] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("must be an http(s) URL, got '{url}'"),
                });
            }
        }
        if let Some(ref parent) = self.remote.default_parent_id {
            if let Err(e) = crate::domain::RemoteId::new(parent.clone()) {
                errors.push(ValidationError {
                    field: "remote.default_parent_id".into(),
                    message: e.to_string(),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// UploadOptions
// ---------------------------------------------------------------------------

/// Options for a single upload run, validated once before any work starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOptions {
    pub force: bool,
    pub workers: usize,
    pub batch_size: usize,
    pub timeout_minutes: Option<u64>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl From<&UploadConfig> for UploadOptions {
    fn from(cfg: &UploadConfig) -> Self {
        Self {
            force: cfg.force,
            workers: cfg.workers,
            batch_size: cfg.batch_size,
            timeout_minutes: cfg.timeout_minutes,
        }
    }
}

impl UploadOptions {
    /// Checks every field, collecting all problems
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.workers == 0 {
            errors.push(ValidationError {
                field: "upload.workers".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.batch_size == 0 {
            errors.push(ValidationError {
                field: "upload.batch_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.timeout_minutes == Some(0) {
            errors.push(ValidationError {
                field: "upload.timeout_minutes".into(),
                message: "must be greater than 0 when set".into(),
            });
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validates and folds the problems into a single [`DomainError`]
    pub fn validated(self) -> Result<Self, DomainError> {
        self.validate().map_err(|errors| {
            DomainError::ValidationFailed(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        Ok(self)
    }

    /// The run's wall-clock budget
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_minutes.map(|m| Duration::from_secs(m * 60))
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`].
///
/// ```
/// use folderlift_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .upload_workers(8)
///     .logging_level("debug")
///     .build();
/// assert_eq!(config.upload.workers, 8);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- upload ---

    pub fn upload_workers(mut self, n: usize) -> Self {
        self.config.upload.workers = n;
        self
    }

    pub fn upload_batch_size(mut self, n: usize) -> Self {
        self.config.upload.batch_size = n;
        self
    }

    pub fn upload_timeout_minutes(mut self, minutes: Option<u64>) -> Self {
        self.config.upload.timeout_minutes = minutes;
        self
    }

    pub fn upload_force(mut self, force: bool) -> Self {
        self.config.upload.force = force;
        self
    }

    // --- retry ---

    pub fn retry_max_retries(mut self, n: u32) -> Self {
        self.config.retry.max_retries = n;
        self
    }

    pub fn retry_base_delay_secs(mut self, secs: u64) -> Self {
        self.config.retry.base_delay_secs = secs;
        self
    }

    pub fn retry_max_delay_secs(mut self, secs: u64) -> Self {
        self.config.retry.max_delay_secs = secs;
        self
    }

    // --- ledger ---

    pub fn ledger_path(mut self, path: PathBuf) -> Self {
        self.config.ledger.path = path;
        self
    }

    // --- remote ---

    pub fn remote_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.api_base_url = url.into();
        self
    }

    pub fn remote_upload_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.upload_base_url = url.into();
        self
    }

    pub fn remote_token_file(mut self, path: PathBuf) -> Self {
        self.config.remote.token_file = Some(path);
        self
    }

    pub fn remote_default_parent_id(mut self, id: impl Into<String>) -> Self {
        self.config.remote.default_parent_id = Some(id.into());
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
