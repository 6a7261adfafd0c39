//! Errors - engine and step error types.

use thiserror::Error;

use super::ids::{StepId, TaskId};
use super::state::TaskStatus;

/// Errors surfaced by the Task Manager's query/command surface.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("task {id} is not pending (status={status})")]
    AlreadyRunning { id: TaskId, status: TaskStatus },

    #[error("invalid task spec: {0}")]
    InvalidSpec(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Why a single step did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("step '{step}' depends on {dependency}, which is missing or not completed")]
    DependencyUnmet { step: String, dependency: StepId },

    #[error("no handler registered for action '{0}'")]
    UnknownAction(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("{0}")]
    HandlerFailure(String),

    #[error("step timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("step cancelled")]
    Cancelled,
}

impl StepError {
    /// Only handler failures and timeouts go through the retry policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            StepError::HandlerFailure(_) | StepError::Timeout { .. } => true,
            StepError::DependencyUnmet { .. }
            | StepError::UnknownAction(_)
            | StepError::InvalidParameters(_)
            | StepError::Cancelled => false,
        }
    }
}
