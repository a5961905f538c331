//! Scheduler configuration structures.

use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;

fn default_name() -> String {
    "default".into()
}

fn default_concurrency_limit() -> usize {
    num_cpus::get().max(1)
}

/// Scheduler configuration.
///
/// The concurrency limit is fixed for the scheduler's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Name used in logs and stats.
    #[serde(default = "default_name")]
    pub name: String,
    /// Maximum simultaneously running tasks. Must be at least 1.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
}

impl Default for SchedulerConfig {
    /// One slot per logical CPU.
    fn default() -> Self {
        Self {
            name: default_name(),
            concurrency_limit: default_concurrency_limit(),
        }
    }
}

impl SchedulerConfig {
    /// Configuration with the given limit and the default name.
    #[must_use]
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            name: default_name(),
            concurrency_limit,
        }
    }

    /// Strict FIFO, one task at a time.
    #[must_use]
    pub fn sequential() -> Self {
        Self::new(1)
    }

    /// Replace the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Configuration` if the limit is 0 or the name is empty.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.concurrency_limit == 0 {
            return Err(SchedulerError::Configuration(
                "concurrency_limit must be greater than 0".into(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(SchedulerError::Configuration("name must not be empty".into()));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Configuration` for malformed JSON, a negative or
    /// non-integer limit, or any value rejected by [`SchedulerConfig::validate`].
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self = serde_json::from_str(input)
            .map_err(|e| SchedulerError::Configuration(format!("parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
