//! Task table: the engine's only shared mutable state.
//!
//! All tasks plus the in-flight registry (cancellation tokens of running
//! executions) live behind one `tokio::sync::Mutex`. Every write made on
//! behalf of an execution is guarded by "task is still `Running`", so once
//! `cancel` wins the lock, nothing the detached executor does afterwards
//! can change the task.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::domain::{EngineError, StatusCounts, StepId, Task, TaskId, TaskStatus, TaskStep};
use crate::handlers::TaskRef;

#[derive(Default)]
struct TableState {
    tasks: HashMap<TaskId, Task>,
    in_flight: HashMap<TaskId, CancellationToken>,
}

/// What the executor may do with the step at a given index.
#[derive(Debug)]
pub(crate) enum StepStart {
    /// Attempt started; the step is `Running`.
    Ready { step: TaskStep, task: TaskRef },
    /// A dependency is absent or not `Completed`.
    Unmet { step: String, dependency: StepId },
    /// The task left `Running` (cancelled); stop without touching it.
    Stopped,
}

#[derive(Debug)]
pub(crate) enum CancelOutcome {
    NotFound,
    /// Already terminal; left unchanged.
    Finished(TaskStatus),
    /// Marked `Cancelled`. Carries the snapshot to persist.
    Cancelled(Task),
}

#[derive(Clone, Default)]
pub(crate) struct TaskTable {
    state: Arc<Mutex<TableState>>,
}

impl TaskTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn insert(&self, task: Task) {
        let mut state = self.state.lock().await;
        state.tasks.insert(task.id, task);
    }

    pub(crate) async fn get(&self, id: TaskId) -> Option<Task> {
        let state = self.state.lock().await;
        state.tasks.get(&id).cloned()
    }

    /// Newest first (`created_at`, then id, both descending).
    pub(crate) async fn list(&self, filter: Option<TaskStatus>) -> Vec<Task> {
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| filter.is_none_or(|status| t.status == status))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        tasks
    }

    pub(crate) async fn counts(&self) -> StatusCounts {
        let state = self.state.lock().await;
        let mut counts = StatusCounts::default();
        for task in state.tasks.values() {
            counts.record(task.status);
        }
        counts
    }

    pub(crate) async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    /// `Pending -> Running` and register the execution.
    ///
    /// Returns the running snapshot and the token `cancel` will fire.
    pub(crate) async fn begin(
        &self,
        id: TaskId,
        now: DateTime<Utc>,
    ) -> Result<(Task, CancellationToken), EngineError> {
        let mut state = self.state.lock().await;
        let task = state.tasks.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        if task.status != TaskStatus::Pending {
            return Err(EngineError::AlreadyRunning {
                id,
                status: task.status,
            });
        }
        task.mark_running(now);
        let snapshot = task.clone();

        let token = CancellationToken::new();
        state.in_flight.insert(id, token.clone());
        Ok((snapshot, token))
    }

    /// Check dependencies of `steps[index]` and, if met, start an attempt.
    pub(crate) async fn start_step(
        &self,
        id: TaskId,
        index: usize,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> StepStart {
        let mut state = self.state.lock().await;
        let Some(task) = state.tasks.get_mut(&id) else {
            return StepStart::Stopped;
        };
        if task.status != TaskStatus::Running || index >= task.steps.len() {
            return StepStart::Stopped;
        }
        if let Some(dependency) = task.unmet_dependency(index) {
            return StepStart::Unmet {
                step: task.steps[index].name.clone(),
                dependency,
            };
        }

        task.steps[index].begin_attempt(now);
        let step = task.steps[index].clone();
        let task = TaskRef::new(task.clone(), step.id, cancel.clone());
        StepStart::Ready { step, task }
    }

    /// Apply `f` to `steps[index]` if the task is still `Running`.
    ///
    /// Returns what `f` returned, or `None` if the write was dropped.
    pub(crate) async fn update_step<F, R>(&self, id: TaskId, index: usize, f: F) -> Option<R>
    where
        F: FnOnce(&mut TaskStep) -> R,
    {
        let mut state = self.state.lock().await;
        let task = state.tasks.get_mut(&id)?;
        if task.status != TaskStatus::Running {
            return None;
        }
        let step = task.steps.get_mut(index)?;
        Some(f(step))
    }

    /// `Running -> Completed | Failed` and deregister the execution.
    ///
    /// `Err` carries the task-level error. Returns the final snapshot, or
    /// `None` if the task was no longer `Running` (cancelled meanwhile).
    pub(crate) async fn finish(
        &self,
        id: TaskId,
        outcome: Result<(), String>,
        now: DateTime<Utc>,
    ) -> Option<Task> {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&id);
        let task = state.tasks.get_mut(&id)?;
        if task.status != TaskStatus::Running {
            return None;
        }
        match outcome {
            Ok(()) => task.mark_completed(now),
            Err(error) => task.mark_failed(error, now),
        }
        Some(task.clone())
    }

    /// Mark a non-terminal task `Cancelled` and fire its execution token.
    pub(crate) async fn cancel(&self, id: TaskId, now: DateTime<Utc>) -> CancelOutcome {
        let mut state = self.state.lock().await;
        let Some(task) = state.tasks.get_mut(&id) else {
            return CancelOutcome::NotFound;
        };
        if task.status.is_terminal() {
            return CancelOutcome::Finished(task.status);
        }
        task.mark_cancelled(now);
        let snapshot = task.clone();

        if let Some(token) = state.in_flight.remove(&id) {
            token.cancel();
        }
        CancelOutcome::Cancelled(snapshot)
    }
}
