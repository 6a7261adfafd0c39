//! Task record and lifecycle transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{StepId, TaskId};
use super::state::TaskStatus;
use super::step::{JsonMap, TaskStep};
use super::task_type::TaskType;

pub const DEFAULT_PRIORITY: u8 = 5;

/// One workflow instance: an ordered list of steps plus bookkeeping.
///
/// Following the same pattern as `TaskStep`: state changes go through the
/// `mark_*` methods, never through direct field writes in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub task_type: TaskType,

    /// Execution order is list order.
    pub steps: Vec<TaskStep>,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    pub status: TaskStatus,

    /// 1..=10, informational only.
    pub priority: u8,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub metadata: JsonMap,

    /// Step results keyed by step name, set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    pub fn new(id: TaskId, name: impl Into<String>, steps: Vec<TaskStep>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            task_type: TaskType::default(),
            steps,
            created_at: now,
            scheduled_for: None,
            started_at: None,
            completed_at: None,
            status: TaskStatus::Pending,
            priority: DEFAULT_PRIORITY,
            tags: Vec::new(),
            metadata: JsonMap::new(),
            result: None,
            error: None,
        }
    }

    pub fn step(&self, id: StepId) -> Option<&TaskStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_by_name(&self, name: &str) -> Option<&TaskStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// First dependency of `steps[index]` that is absent or not `Completed`.
    pub fn unmet_dependency(&self, index: usize) -> Option<StepId> {
        let step = self.steps.get(index)?;
        step.dependencies.iter().copied().find(|dep| {
            self.step(*dep)
                .is_none_or(|sibling| sibling.status != TaskStatus::Completed)
        })
    }

    /// True if the task should wait for the scheduler rather than run now.
    pub fn is_deferred(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_for.is_some_and(|at| at > now)
    }

    pub fn mark_running(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Running;
        self.started_at = Some(now);
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        let mut result = JsonMap::new();
        for step in &self.steps {
            let value = step
                .result
                .clone()
                .map(serde_json::Value::Object)
                .unwrap_or(serde_json::Value::Null);
            result.insert(step.name.clone(), value);
        }
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(now);
    }

    /// Every failed task carries a non-empty error.
    pub fn mark_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        let mut error = error.into();
        if error.is_empty() {
            error = "task failed".to_string();
        }
        self.status = TaskStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(now);
    }

    /// Mark as cancelled. A step caught mid-attempt is cancelled with it;
    /// completed steps keep their results.
    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) {
        for step in &mut self.steps {
            if step.status == TaskStatus::Running {
                step.mark_cancelled(now);
            }
        }
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(now);
    }
}

/// Number of tasks per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed + self.cancelled
    }
}
