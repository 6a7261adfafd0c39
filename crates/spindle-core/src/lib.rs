//! spindle-core
//!
//! An in-process task automation engine: declarative multi-step workflows,
//! executed step by step with dependency gating, retry with exponential
//! backoff, cooperative cancellation and one-shot deferred scheduling.
//!
//! # Modules
//! - **domain**: tasks, steps, ids, status, creation specs, errors
//! - **ports**: seams to the outside (clock, ids, persistence, collaborators)
//! - **handlers**: the action handler contract, registry and built-in actions
//! - **app**: TaskManager, StepExecutor, Scheduler, EngineBuilder
//! - **impls**: bundled port implementations
//! - **config**: TOML-loadable engine configuration
//!
//! # Example
//! ```ignore
//! let manager = EngineBuilder::new()
//!     .collaborators(Collaborators::new().with_notifier(Arc::new(TracingNotifier)))
//!     .build()?;
//!
//! let task = manager
//!     .create(TaskSpec::new("greet").step(
//!         StepSpec::new("say", "send_notification").param("message", json!("hi")),
//!     ))
//!     .await?;
//! let done = manager.execute(task.id).await?;
//! assert_eq!(done.status, TaskStatus::Completed);
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod handlers;
pub mod impls;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{BuildError, EngineBuilder, RetryPolicy, Scheduler, TaskManager};
pub use config::EngineConfig;
pub use domain::{
    EngineError, JsonMap, StatusCounts, StepError, StepId, StepSpec, Task, TaskId, TaskSpec,
    TaskStatus, TaskStep, TaskType,
};
pub use handlers::{ActionHandler, Collaborators, HandlerError, HandlerRegistry, TaskRef};
