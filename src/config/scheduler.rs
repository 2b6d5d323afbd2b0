//! Scheduler configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::SchedulerError;

/// Smallest worker thread stack we accept.
pub const MIN_STACK_SIZE: usize = 64 * 1024;

const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Construction parameters for a [`Scheduler`](crate::core::Scheduler).
///
/// Everything except the worker count has a usable default.
///
/// ```
/// use prometheus_batch_scheduler::config::SchedulerConfig;
///
/// let config = SchedulerConfig::new()
///     .with_worker_count(4)
///     .with_max_batch_size(16)
///     .with_per_item_timeout_ms(500);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker threads, and so the number of batches in flight.
    pub worker_count: usize,
    /// Cap on the pending batch while every worker is busy.
    pub max_batch_size: usize,
    /// Expected number of items, used only for progress display.
    pub total_expected_items: Option<u64>,
    /// Label for progress output.
    pub description: String,
    /// Per-item deadline in milliseconds; 0 disables it.
    pub per_item_timeout_ms: u64,
    /// Extra argument handed to every call.
    pub extra_argument: Option<Value>,
    /// Report progress through the configured sink.
    pub progress_enabled: bool,
    /// Stack size for worker threads in bytes.
    pub thread_stack_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            max_batch_size: 1,
            total_expected_items: None,
            description: String::new(),
            per_item_timeout_ms: 0,
            extra_argument: None,
            progress_enabled: false,
            thread_stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with one worker per CPU and per-item batches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the maximum pending batch size.
    #[must_use]
    pub const fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Set the expected total item count for progress display.
    #[must_use]
    pub const fn with_total_expected_items(mut self, total: u64) -> Self {
        self.total_expected_items = Some(total);
        self
    }

    /// Set the progress description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the per-item deadline in milliseconds (0 disables).
    #[must_use]
    pub const fn with_per_item_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.per_item_timeout_ms = timeout_ms;
        self
    }

    /// Set the per-item deadline.
    #[must_use]
    pub fn with_per_item_timeout(mut self, timeout: Duration) -> Self {
        self.per_item_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the extra argument injected into every call.
    #[must_use]
    pub fn with_extra_argument(mut self, extra: impl Into<Value>) -> Self {
        self.extra_argument = Some(extra.into());
        self
    }

    /// Enable or disable progress reporting.
    #[must_use]
    pub const fn with_progress(mut self, enabled: bool) -> Self {
        self.progress_enabled = enabled;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = size;
        self
    }

    /// The per-item deadline, if one is armed.
    #[must_use]
    pub const fn per_item_timeout(&self) -> Option<Duration> {
        if self.per_item_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.per_item_timeout_ms))
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.max_batch_size == 0 {
            return Err("max_batch_size must be greater than 0".into());
        }
        if self.thread_stack_size < MIN_STACK_SIZE {
            return Err(format!(
                "thread_stack_size must be at least {MIN_STACK_SIZE} bytes"
            ));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate it.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Parse` for malformed JSON, `InvalidConfig` for bad values.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self =
            serde_json::from_str(input).map_err(|e| SchedulerError::Parse(e.to_string()))?;
        cfg.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(cfg)
    }

    /// Build configuration from `SCHEDULER_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// `SchedulerError::EnvVar` when a variable cannot be parsed,
    /// `InvalidConfig` when the result fails validation.
    pub fn from_env() -> Result<Self, SchedulerError> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        if let Some(v) = env_parse("SCHEDULER_WORKER_COUNT")? {
            cfg.worker_count = v;
        }
        if let Some(v) = env_parse("SCHEDULER_MAX_BATCH_SIZE")? {
            cfg.max_batch_size = v;
        }
        if let Some(v) = env_parse("SCHEDULER_ITEM_TIMEOUT_MS")? {
            cfg.per_item_timeout_ms = v;
        }
        if let Some(v) = env_parse("SCHEDULER_TOTAL_ITEMS")? {
            cfg.total_expected_items = Some(v);
        }
        if let Some(v) = env_parse("SCHEDULER_PROGRESS")? {
            cfg.progress_enabled = v;
        }
        if let Ok(description) = env::var("SCHEDULER_DESCRIPTION") {
            cfg.description = description;
        }

        cfg.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(cfg)
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, SchedulerError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SchedulerError::EnvVar {
                name: name.to_string(),
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SchedulerConfig::default();
        assert!(cfg.worker_count > 0);
        assert_eq!(cfg.max_batch_size, 1);
        assert_eq!(cfg.per_item_timeout(), None);
        assert!(!cfg.progress_enabled);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_timeout_conversion() {
        let cfg = SchedulerConfig::new().with_per_item_timeout(Duration::from_secs(2));
        assert_eq!(cfg.per_item_timeout_ms, 2000);
        assert_eq!(cfg.per_item_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_validation_rejects_zero_batch() {
        let cfg = SchedulerConfig::new().with_max_batch_size(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_tiny_stack() {
        let cfg = SchedulerConfig::new().with_thread_stack_size(1024);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_env_parse_missing_is_none() {
        let value: Option<usize> = env_parse("SCHEDULER_TEST_UNSET_VARIABLE_XYZ").unwrap();
        assert!(value.is_none());
    }
}
