//! App - the engine proper.
//!
//! # Components
//! - **TaskManager**: create / execute / cancel / query tasks
//! - **StepExecutor**: per-step dependency check, dispatch, retry
//! - **Scheduler**: one-shot deferred runs
//! - **EngineBuilder**: wiring and fail-fast validation

pub mod builder;
mod executor;
pub mod manager;
pub mod retry;
pub mod scheduler;
mod sink;
mod table;

pub use self::builder::{BuildError, EngineBuilder};
pub use self::manager::TaskManager;
pub use self::retry::RetryPolicy;
pub use self::scheduler::Scheduler;
