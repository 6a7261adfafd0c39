//! TaskStore implementations.
//!
//! - **NoopTaskStore**: discards everything (default).
//! - **InMemoryTaskStore**: latest snapshot per task plus the write log.
//! - **JsonFileTaskStore**: one `<task_id>.json` file per task.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Task, TaskId};
use crate::ports::{StoreError, TaskStore};

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTaskStore;

#[async_trait]
impl TaskStore for NoopTaskStore {
    async fn store(&self, _task: &Task) -> Result<(), StoreError> {
        Ok(())
    }

    async fn update(&self, _task: &Task) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Default)]
struct InMemoryState {
    latest: HashMap<TaskId, Task>,
    writes: Vec<Task>,
}

#[derive(Default)]
pub struct InMemoryTaskStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every snapshot written, in order.
    pub async fn writes(&self) -> Vec<Task> {
        self.state.lock().await.writes.clone()
    }

    pub async fn latest(&self, id: TaskId) -> Option<Task> {
        self.state.lock().await.latest.get(&id).cloned()
    }

    async fn record(&self, task: &Task) {
        let mut state = self.state.lock().await;
        state.latest.insert(task.id, task.clone());
        state.writes.push(task.clone());
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn store(&self, task: &Task) -> Result<(), StoreError> {
        self.record(task).await;
        Ok(())
    }

    async fn update(&self, task: &Task) -> Result<(), StoreError> {
        self.record(task).await;
        Ok(())
    }
}

/// Writes each task as pretty JSON into `dir`, replacing the file through a
/// rename so readers never see a half-written record.
#[derive(Debug, Clone)]
pub struct JsonFileTaskStore {
    dir: PathBuf,
}

impl JsonFileTaskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: TaskId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub async fn load(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, task: &Task) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec_pretty(task)?;
        let path = self.path_for(task.id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for JsonFileTaskStore {
    async fn store(&self, task: &Task) -> Result<(), StoreError> {
        self.write(task).await
    }

    async fn update(&self, task: &Task) -> Result<(), StoreError> {
        self.write(task).await
    }
}
