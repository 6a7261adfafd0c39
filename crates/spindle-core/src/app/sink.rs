//! SinkWriter - ordered, best-effort writes to the task store.
//!
//! Writes for one task go through a per-task gate and always send the
//! table's current snapshot, so a slow write of an older status can never
//! land after a newer one. The gate also remembers the last status handed
//! to the store, which lets callers wait until a final state is flushed.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::warn;

use super::table::TaskTable;
use crate::domain::{Task, TaskId, TaskStatus};
use crate::ports::TaskStore;

/// Last status handed to the store for one task.
type Gate = Arc<Mutex<Option<TaskStatus>>>;

pub(crate) struct SinkWriter {
    store: Arc<dyn TaskStore>,
    table: TaskTable,
    gates: Mutex<HashMap<TaskId, Gate>>,
    flushed: Notify,
}

impl SinkWriter {
    pub(crate) fn new(store: Arc<dyn TaskStore>, table: TaskTable) -> Self {
        Self {
            store,
            table,
            gates: Mutex::new(HashMap::new()),
            flushed: Notify::new(),
        }
    }

    async fn gate(&self, id: TaskId) -> Gate {
        Arc::clone(self.gates.lock().await.entry(id).or_default())
    }

    /// Add a new task to the table and store it.
    pub(crate) async fn insert(&self, task: Task) {
        let gate = self.gate(task.id).await;
        let mut last = gate.lock().await;
        self.table.insert(task.clone()).await;
        if let Err(e) = self.store.store(&task).await {
            warn!(task_id = %task.id, error = %e, "failed to persist new task");
        }
        *last = Some(task.status);
        drop(last);
        self.flushed.notify_waiters();
    }

    /// Write the task's current snapshot.
    pub(crate) async fn persist(&self, id: TaskId) {
        let gate = self.gate(id).await;
        let mut last = gate.lock().await;
        let Some(task) = self.table.get(id).await else {
            return;
        };
        if let Err(e) = self.store.update(&task).await {
            warn!(task_id = %id, status = %task.status, error = %e, "failed to persist task");
        }
        *last = Some(task.status);
        drop(last);
        self.flushed.notify_waiters();
    }

    /// Wait until the task is terminal and that status has gone to the store.
    /// `None` for an unknown id.
    pub(crate) async fn settled(&self, id: TaskId) -> Option<Task> {
        loop {
            let notified = self.flushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let task = self.table.get(id).await?;
            if task.status.is_terminal() {
                let gate = self.gate(id).await;
                if *gate.lock().await == Some(task.status) {
                    return Some(task);
                }
            }
            notified.await;
        }
    }
}
