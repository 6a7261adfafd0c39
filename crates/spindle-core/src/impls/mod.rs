//! Impls - port implementations that ship with the engine.
//!
//! # Included
//! - **NoopTaskStore / InMemoryTaskStore / JsonFileTaskStore**: persistence sinks
//! - **TracingNotifier**: notifications as log events
//! - **LocalFileProcessor**: local filesystem file operations
//!
//! Model and web collaborators are always supplied by the embedding
//! application.

pub mod file_processor;
pub mod notifier;
pub mod task_store;

pub use self::file_processor::LocalFileProcessor;
pub use self::notifier::TracingNotifier;
pub use self::task_store::{InMemoryTaskStore, JsonFileTaskStore, NoopTaskStore};
