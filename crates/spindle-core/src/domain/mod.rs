//! Domain model (ids, status, steps, tasks, creation specs, errors).

pub mod errors;
pub mod ids;
pub mod spec;
pub mod state;
pub mod step;
pub mod task;
pub mod task_type;

pub use errors::{EngineError, StepError};
pub use ids::{StepId, TaskId};
pub use spec::{SpecDefaults, StepSpec, TaskSpec};
pub use state::TaskStatus;
pub use step::{JsonMap, TaskStep};
pub use task::{StatusCounts, Task};
pub use task_type::TaskType;
