//! Failure handling policy and its YAML configuration.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use tailrace_core::config::{ConfigPath, load_documents};
use tailrace_core::error::{ConfigError, InvalidQueueCapacitySnafu};

/// Policy source consulted on every processing-failure submission.
///
/// Implementations may change their answers at runtime; the service reads
/// them per call and never caches.
#[cfg_attr(test, mockall::automock)]
pub trait FailureHandlingConfiguration: Send + Sync {
    /// Whether processing failures are submitted at all.
    fn submit_processing_failures(&self) -> bool;

    /// Whether a failed message continues through the pipeline as a
    /// duplicate of its failure record, rather than being dropped.
    fn keep_failed_message_duplicate(&self) -> bool;
}

/// Static failure handling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailureHandlingConfig {
    #[serde(default)]
    pub submit_processing_failures: bool,
    #[serde(default = "default_keep_failed_message_duplicate")]
    pub keep_failed_message_duplicate: bool,
    /// Number of batches the bounded queue holds before submitters block.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for FailureHandlingConfig {
    fn default() -> Self {
        Self {
            submit_processing_failures: false,
            keep_failed_message_duplicate: default_keep_failed_message_duplicate(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl FailureHandlingConfig {
    /// Apply every value a later document sets explicitly.
    fn merge_from(&mut self, other: &FailureHandlingOverrides) {
        if let Some(submit) = other.submit_processing_failures {
            self.submit_processing_failures = submit;
        }
        if let Some(keep) = other.keep_failed_message_duplicate {
            self.keep_failed_message_duplicate = keep;
        }
        if let Some(capacity) = other.queue_capacity {
            self.queue_capacity = capacity;
        }
    }
}

impl FailureHandlingConfiguration for FailureHandlingConfig {
    fn submit_processing_failures(&self) -> bool {
        self.submit_processing_failures
    }

    fn keep_failed_message_duplicate(&self) -> bool {
        self.keep_failed_message_duplicate
    }
}

fn default_keep_failed_message_duplicate() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    1000
}

/// Metrics settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder at startup (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

/// One configuration document as written, before defaults apply.
///
/// Only keys present in the document are `Some`, so a later file can
/// restore a default value an earlier file changed.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigOverrides {
    #[serde(default)]
    failure_handling: FailureHandlingOverrides,
    #[serde(default)]
    metrics: MetricsOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FailureHandlingOverrides {
    submit_processing_failures: Option<bool>,
    keep_failed_message_duplicate: Option<bool>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetricsOverrides {
    enabled: Option<bool>,
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub failure_handling: FailureHandlingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Parse and validate a single YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_yaml::from_str(yaml).map_err(|source| ConfigError::YamlParse { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from files and directories, later sources winning.
    pub fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        let mut errors = Vec::new();

        for document in load_documents(paths)? {
            match document.parse::<ConfigOverrides>() {
                Ok(partial) => config.merge_from(&partial),
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            return Err(ConfigError::MultipleErrors { errors });
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(self.failure_handling.queue_capacity > 0, InvalidQueueCapacitySnafu);
        Ok(())
    }

    fn merge_from(&mut self, other: &ConfigOverrides) {
        self.failure_handling.merge_from(&other.failure_handling);
        if let Some(enabled) = other.metrics.enabled {
            self.metrics.enabled = enabled;
        }
    }
}
