//! Status shared by tasks and steps.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a `Task` or a `TaskStep`.
///
/// Task transitions:
/// - Pending -> Running -> Completed
/// - Pending -> Running -> Failed (a step exhausted its retries)
/// - Pending | Running -> Cancelled
///
/// Step transitions:
/// - Pending -> Running -> Completed
/// - Pending -> Running -> Failed -> Pending (retry, until max_retries) ... -> Failed
/// - Running -> Cancelled (owning task cancelled mid-attempt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
