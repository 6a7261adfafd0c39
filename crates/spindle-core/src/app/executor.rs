//! StepExecutor - dependency / dispatch / retry state machine for one step.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::retry::RetryPolicy;
use super::table::{StepStart, TaskTable};
use crate::domain::{JsonMap, StepError, TaskId, TaskStep};
use crate::handlers::{ActionHandler, HandlerRegistry, TaskRef};
use crate::ports::Clock;

/// How a step ended, from the task's point of view.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StepOutcome {
    Completed,
    /// Terminal failure (retries exhausted, or not retryable).
    Failed(StepError),
    /// The task was cancelled; nothing more may be written.
    Stopped,
}

pub(crate) struct StepExecutor {
    registry: Arc<HandlerRegistry>,
    table: TaskTable,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl StepExecutor {
    pub(crate) fn new(
        registry: Arc<HandlerRegistry>,
        table: TaskTable,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            table,
            clock,
            retry,
        }
    }

    /// Run `steps[index]` of a `Running` task until it completes, fails for
    /// good, or the task is cancelled.
    pub(crate) async fn run(
        &self,
        task_id: TaskId,
        index: usize,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        loop {
            if cancel.is_cancelled() {
                return StepOutcome::Stopped;
            }

            let (step, task) = match self
                .table
                .start_step(task_id, index, self.clock.now(), cancel)
                .await
            {
                StepStart::Ready { step, task } => (step, task),
                StepStart::Unmet { step, dependency } => {
                    let err = StepError::DependencyUnmet { step, dependency };
                    return self.fail(task_id, index, err).await;
                }
                StepStart::Stopped => return StepOutcome::Stopped,
            };

            let Some(handler) = self.registry.get(&step.action) else {
                let err = StepError::UnknownAction(step.action.clone());
                return self.fail(task_id, index, err).await;
            };
            debug!(task_id = %task_id, step = %step.name, action = %step.action, attempt = step.retry_count + 1, "step started");

            let err = match Self::invoke(handler, &step, task, cancel).await {
                Ok(result) => {
                    let now = self.clock.now();
                    return match self
                        .table
                        .update_step(task_id, index, |s| s.mark_completed(result, now))
                        .await
                    {
                        Some(()) => {
                            debug!(task_id = %task_id, step = %step.name, "step completed");
                            StepOutcome::Completed
                        }
                        None => StepOutcome::Stopped,
                    };
                }
                Err(StepError::Cancelled) => return StepOutcome::Stopped,
                Err(err) => err,
            };

            let now = self.clock.now();
            let retry = self
                .table
                .update_step(task_id, index, |s| {
                    s.mark_failed(&err, now);
                    (err.is_retryable() && s.has_retries_left()).then(|| s.reset_for_retry())
                })
                .await;

            let retry_count = match retry {
                None => return StepOutcome::Stopped,
                Some(None) if !err.is_retryable() => {
                    warn!(task_id = %task_id, step = %step.name, error = %err, "step failed, not retryable");
                    return StepOutcome::Failed(err);
                }
                Some(None) => {
                    warn!(task_id = %task_id, step = %step.name, attempts = step.retry_count + 1, error = %err, "step failed, retries exhausted");
                    return StepOutcome::Failed(err);
                }
                Some(Some(n)) => n,
            };

            let delay = self.retry.delay_for(retry_count);
            warn!(
                task_id = %task_id,
                step = %step.name,
                attempt = retry_count,
                delay_secs = delay.as_secs_f64(),
                error = %err,
                "step failed, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => return StepOutcome::Stopped,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Record a non-retryable failure.
    async fn fail(&self, task_id: TaskId, index: usize, err: StepError) -> StepOutcome {
        let now = self.clock.now();
        match self
            .table
            .update_step(task_id, index, |s| s.mark_failed(&err, now))
            .await
        {
            Some(()) => {
                warn!(task_id = %task_id, error = %err, "step failed");
                StepOutcome::Failed(err)
            }
            None => StepOutcome::Stopped,
        }
    }

    /// One attempt, bounded by the step timeout.
    ///
    /// The handler runs on its own tokio task. On timeout or cancellation we
    /// stop waiting and the detached attempt's result is dropped.
    async fn invoke(
        handler: Arc<dyn ActionHandler>,
        step: &TaskStep,
        task: TaskRef,
        cancel: &CancellationToken,
    ) -> Result<JsonMap, StepError> {
        let params = step.parameters.clone();
        let attempt = tokio::spawn(async move { handler.handle(params, task).await });

        tokio::select! {
            _ = cancel.cancelled() => Err(StepError::Cancelled),
            joined = tokio::time::timeout(step.timeout(), attempt) => match joined {
                Err(_elapsed) => Err(StepError::Timeout { secs: step.timeout_secs }),
                Ok(Err(join_err)) => Err(StepError::HandlerFailure(format!("handler panicked: {join_err}"))),
                Ok(Ok(result)) => result.map_err(StepError::from),
            },
        }
    }
}
