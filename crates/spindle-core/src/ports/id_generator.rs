//! IdGenerator port - id generation behind a trait.
//!
//! # Implementations
//! - **UlidGenerator**: ULID ids stamped with the injected `Clock`.

use crate::domain::ids::{StepId, TaskId};
use crate::ports::Clock;
use ulid::Ulid;

pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;

    fn generate_step_id(&self) -> StepId;
}

/// ULID-based generator.
///
/// The timestamp half comes from the clock, the rest is random, so ids from
/// a `FixedClock` still differ while sharing a timestamp.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        TaskId::from(self.next_ulid())
    }

    fn generate_step_id(&self) -> StepId {
        StepId::from(self.next_ulid())
    }
}
