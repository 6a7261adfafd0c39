//! ActionHandler - the capability a step's `action` name resolves to.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::{JsonMap, StepError, StepId, Task, TaskId, TaskStep, TaskType};
use crate::ports::CollaboratorError;

/// Error returned by a handler.
///
/// `InvalidParameters` fails the step without retrying, since the same
/// parameters are sent on every attempt. The other variants go through the
/// retry policy.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("{0}")]
    Failed(String),
}

impl From<HandlerError> for StepError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::InvalidParameters(msg) => StepError::InvalidParameters(msg),
            other => StepError::HandlerFailure(other.to_string()),
        }
    }
}

/// Performs one action.
///
/// `params` is the step's parameter map, owned so the attempt can outlive
/// the executor waiting on it (a timed-out attempt keeps running detached
/// and its result is discarded).
///
/// # Example
/// ```ignore
/// struct Echo;
///
/// #[async_trait]
/// impl ActionHandler for Echo {
///     async fn handle(&self, params: JsonMap, _task: TaskRef) -> Result<JsonMap, HandlerError> {
///         Ok(params)
///     }
/// }
/// ```
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, params: JsonMap, task: TaskRef) -> Result<JsonMap, HandlerError>;
}

/// Read-only view of the owning task, handed to a handler per attempt.
///
/// The snapshot is taken when the attempt starts, so sibling steps show the
/// state they had at that point. The token fires when the task is cancelled;
/// long-running handlers may watch it, the engine does not require it.
#[derive(Debug, Clone)]
pub struct TaskRef {
    snapshot: Arc<Task>,
    step_id: StepId,
    cancel: CancellationToken,
}

impl TaskRef {
    pub fn new(snapshot: Task, step_id: StepId, cancel: CancellationToken) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            step_id,
            cancel,
        }
    }

    pub fn id(&self) -> TaskId {
        self.snapshot.id
    }

    pub fn name(&self) -> &str {
        &self.snapshot.name
    }

    pub fn task_type(&self) -> TaskType {
        self.snapshot.task_type
    }

    pub fn tags(&self) -> &[String] {
        &self.snapshot.tags
    }

    pub fn metadata(&self) -> &JsonMap {
        &self.snapshot.metadata
    }

    pub fn steps(&self) -> &[TaskStep] {
        &self.snapshot.steps
    }

    pub fn step(&self, id: StepId) -> Option<&TaskStep> {
        self.snapshot.step(id)
    }

    pub fn step_by_name(&self, name: &str) -> Option<&TaskStep> {
        self.snapshot.step_by_name(name)
    }

    /// Id of the step this attempt belongs to.
    pub fn current_step_id(&self) -> StepId {
        self.step_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Adapter turning an async closure into an `ActionHandler`.
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(JsonMap, TaskRef) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<JsonMap, HandlerError>> + Send + 'static,
{
    async fn handle(&self, params: JsonMap, task: TaskRef) -> Result<JsonMap, HandlerError> {
        (self.f)(params, task).await
    }
}

/// Shorthand for `Arc::new(FnHandler::new(f))`.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ActionHandler>
where
    F: Fn(JsonMap, TaskRef) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<JsonMap, HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler::new(f))
}
