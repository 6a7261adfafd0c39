//! TaskStep: one unit of work inside a task.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::StepError;
use super::ids::StepId;
use super::state::TaskStatus;

/// Schema-less key/value map used for step parameters and results.
///
/// The engine never looks inside; handlers parse what they need.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A step and its execution bookkeeping.
///
/// Status, result, error and timing fields are mutated only through the
/// transition methods below, which the Step Executor calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    pub id: StepId,
    pub name: String,
    pub action: String,

    #[serde(default)]
    pub parameters: JsonMap,

    /// Sibling steps that must be `Completed` before this one may run.
    #[serde(default)]
    pub dependencies: Vec<StepId>,

    /// Wall-clock bound for a single attempt.
    pub timeout_secs: u64,

    /// Retries performed so far (the first attempt is not a retry).
    pub retry_count: u32,

    /// Extra attempts allowed beyond the first.
    pub max_retries: u32,

    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl TaskStep {
    pub fn new(
        id: StepId,
        name: impl Into<String>,
        action: impl Into<String>,
        parameters: JsonMap,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            action: action.into(),
            parameters,
            dependencies: Vec::new(),
            timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            start_time: None,
            end_time: None,
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<StepId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Mark as running for a new attempt.
    pub fn begin_attempt(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Running;
        self.start_time = Some(now);
        self.end_time = None;
    }

    pub fn mark_completed(&mut self, result: JsonMap, now: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.end_time = Some(now);
    }

    pub fn mark_failed(&mut self, error: &StepError, now: DateTime<Utc>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.to_string());
        self.end_time = Some(now);
    }

    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Cancelled;
        self.end_time = Some(now);
    }

    pub fn has_retries_left(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Move a failed step back to Pending for its next attempt.
    ///
    /// Returns the new retry count, which drives the backoff delay.
    pub fn reset_for_retry(&mut self) -> u32 {
        self.retry_count += 1;
        self.status = TaskStatus::Pending;
        self.error = None;
        self.start_time = None;
        self.end_time = None;
        self.retry_count
    }
}
