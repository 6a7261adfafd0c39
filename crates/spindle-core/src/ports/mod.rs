//! Ports - seams to everything outside the engine.
//!
//! Each trait hides an external system (clock, id source, persistence,
//! model/file/web/notification services) so the engine can be exercised in
//! isolation with in-memory implementations.

pub mod clock;
pub mod collaborators;
pub mod id_generator;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::collaborators::{
    CollaboratorError, FileProcessor, Generation, ModelOrchestrator, Notification, Notifier,
    WebAutomation,
};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::task_store::{StoreError, TaskStore};
