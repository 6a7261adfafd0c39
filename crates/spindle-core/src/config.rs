//! Engine configuration, loadable from TOML.
//!
//! Every key has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! default_step_timeout_secs = 300
//! default_max_retries = 3
//! default_priority = 5
//! auto_run = false
//!
//! [retry]
//! base_delay_ms = 2000
//! multiplier = 2.0
//! # max_delay_ms = 60000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::RetryPolicy;
use crate::domain::EngineError;
use crate::domain::SpecDefaults;
use crate::domain::step::{DEFAULT_MAX_RETRIES, DEFAULT_STEP_TIMEOUT_SECS};
use crate::domain::task::DEFAULT_PRIORITY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub default_step_timeout_secs: u64,
    pub default_max_retries: u32,
    pub default_priority: u8,

    /// Start unscheduled tasks as soon as they are created.
    pub auto_run: bool,

    pub retry: RetrySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub base_delay_ms: u64,
    pub multiplier: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            default_max_retries: DEFAULT_MAX_RETRIES,
            default_priority: DEFAULT_PRIORITY,
            auto_run: false,
            retry: RetrySettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 2_000,
            multiplier: 2.0,
            max_delay_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| EngineError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            EngineError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(1..=10).contains(&self.default_priority) {
            return Err(EngineError::Config(format!(
                "default_priority must be within 1..=10, got {}",
                self.default_priority
            )));
        }
        if self.default_step_timeout_secs == 0 {
            return Err(EngineError::Config(
                "default_step_timeout_secs must be positive".to_string(),
            ));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(EngineError::Config(format!(
                "retry.multiplier must be a finite number >= 1.0, got {}",
                self.retry.multiplier
            )));
        }
        Ok(())
    }

    pub fn spec_defaults(&self) -> SpecDefaults {
        SpecDefaults {
            step_timeout_secs: self.default_step_timeout_secs,
            max_retries: self.default_max_retries,
            priority: self.default_priority,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            multiplier: self.retry.multiplier,
            max_delay: self.retry.max_delay_ms.map(Duration::from_millis),
        }
    }
}
