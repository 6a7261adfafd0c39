//! TaskStore port - the persistence sink for task records.
//!
//! The engine writes through this port after creation and after every
//! task-level status transition. It never reads back from it: the in-memory
//! table stays authoritative, and a failing store only produces a log line.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Task;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a newly created task.
    async fn store(&self, task: &Task) -> Result<(), StoreError>;

    /// Persist the current state of an existing task.
    async fn update(&self, task: &Task) -> Result<(), StoreError>;
}
