//! Creation input for tasks (what callers submit to `TaskManager::create`).
//!
//! Steps refer to their prerequisites by step *name*, since ids only exist
//! after creation. `TaskSpec::build` validates the spec and resolves those
//! names to generated `StepId`s. Steps run in list order, so a dependency
//! must name a step declared earlier in the list.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::EngineError;
use super::step::{DEFAULT_MAX_RETRIES, DEFAULT_STEP_TIMEOUT_SECS, JsonMap, TaskStep};
use super::task::{DEFAULT_PRIORITY, Task};
use super::task_type::TaskType;
use crate::ports::IdGenerator;

/// Declarative description of a workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(rename = "type", default)]
    pub task_type: TaskType,

    /// Epoch seconds. A future value defers execution to the scheduler.
    #[serde(default)]
    pub scheduled_for: Option<i64>,

    #[serde(default)]
    pub priority: Option<u8>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub metadata: JsonMap,

    pub steps: Vec<StepSpec>,
}

/// Declarative description of one step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,
    pub action: String,

    #[serde(default)]
    pub parameters: JsonMap,

    /// Names of earlier steps that must complete first.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Seconds per attempt.
    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub max_retries: Option<u32>,
}

/// Fallbacks applied when a spec leaves a field out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecDefaults {
    pub step_timeout_secs: u64,
    pub max_retries: u32,
    pub priority: u8,
}

impl Default for SpecDefaults {
    fn default() -> Self {
        Self {
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            priority: DEFAULT_PRIORITY,
        }
    }
}

impl TaskSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at.timestamp());
        self
    }

    /// Check the spec without generating ids.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.check_fields()?;
        self.resolve_dependencies().map(|_| ())
    }

    /// Validate the spec and construct a `Pending` task with fresh ids.
    pub fn build(
        self,
        ids: &dyn IdGenerator,
        now: DateTime<Utc>,
        defaults: &SpecDefaults,
    ) -> Result<Task, EngineError> {
        self.check_fields()?;
        let resolved = self.resolve_dependencies()?;
        let scheduled_for = self.scheduled_for.map(epoch_to_utc).transpose()?;

        let step_ids: Vec<_> = self.steps.iter().map(|_| ids.generate_step_id()).collect();
        let steps = self
            .steps
            .into_iter()
            .zip(resolved)
            .enumerate()
            .map(|(i, (spec, deps))| {
                TaskStep::new(step_ids[i], spec.name, spec.action, spec.parameters)
                    .with_dependencies(deps.into_iter().map(|d| step_ids[d]).collect())
                    .with_timeout_secs(spec.timeout.unwrap_or(defaults.step_timeout_secs))
                    .with_max_retries(spec.max_retries.unwrap_or(defaults.max_retries))
            })
            .collect();

        let mut task = Task::new(ids.generate_task_id(), self.name, steps, now);
        task.description = self.description;
        task.task_type = self.task_type;
        task.scheduled_for = scheduled_for;
        task.priority = self.priority.unwrap_or(defaults.priority);
        task.tags = self.tags;
        task.metadata = self.metadata;
        Ok(task)
    }

    fn check_fields(&self) -> Result<(), EngineError> {
        if self.name.trim().is_empty() {
            return Err(invalid("task name must not be empty"));
        }
        if self.steps.is_empty() {
            return Err(invalid("a task needs at least one step"));
        }
        if let Some(p) = self.priority
            && !(1..=10).contains(&p)
        {
            return Err(invalid(format!("priority must be within 1..=10, got {p}")));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                return Err(invalid(format!("step #{i} has an empty name")));
            }
            if step.action.trim().is_empty() {
                return Err(invalid(format!("step '{}' has an empty action", step.name)));
            }
            if step.timeout == Some(0) {
                return Err(invalid(format!("step '{}' has a zero timeout", step.name)));
            }
        }
        if let Some(secs) = self.scheduled_for {
            epoch_to_utc(secs)?;
        }
        Ok(())
    }

    /// For every step, the indices of the steps it depends on.
    fn resolve_dependencies(&self) -> Result<Vec<Vec<usize>>, EngineError> {
        let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, step) in self.steps.iter().enumerate() {
            by_name.entry(step.name.as_str()).or_default().push(i);
        }

        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                step.dependencies
                    .iter()
                    .map(|dep| {
                        let candidates = by_name.get(dep.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                        match candidates {
                            [] => Err(invalid(format!(
                                "step '{}' depends on unknown step '{dep}'",
                                step.name
                            ))),
                            [idx] if *idx == i => Err(invalid(format!(
                                "step '{}' depends on itself",
                                step.name
                            ))),
                            [idx] if *idx > i => Err(invalid(format!(
                                "step '{}' depends on '{dep}', which is declared after it",
                                step.name
                            ))),
                            [idx] => Ok(*idx),
                            _ => Err(invalid(format!(
                                "step '{}' depends on '{dep}', but that name is not unique",
                                step.name
                            ))),
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

impl StepSpec {
    pub fn new(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn depends_on(mut self, step_name: impl Into<String>) -> Self {
        self.dependencies.push(step_name.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }
}

fn invalid(msg: impl Into<String>) -> EngineError {
    EngineError::InvalidSpec(msg.into())
}

fn epoch_to_utc(secs: i64) -> Result<DateTime<Utc>, EngineError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| invalid(format!("scheduled_for {secs} is out of range")))
}
