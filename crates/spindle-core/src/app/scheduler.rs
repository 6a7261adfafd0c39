//! Scheduler - one-shot deferred runs.
//!
//! Each armed timer is a tokio task sleeping until the target time. Timers
//! are keyed by task id and can be disarmed until they fire.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::domain::TaskId;
use crate::ports::Clock;

#[derive(Clone)]
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    timers: Arc<Mutex<HashMap<TaskId, CancellationToken>>>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            timers: Arc::default(),
        }
    }

    /// Time left until `at`; zero if it already passed.
    pub fn delay_until(&self, at: DateTime<Utc>) -> Duration {
        (at - self.clock.now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Arm a timer that runs `fire` once `at` is reached.
    ///
    /// Re-arming the same id replaces the previous timer. Returns the delay.
    pub async fn schedule<F>(&self, id: TaskId, at: DateTime<Utc>, fire: F) -> Duration
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay_until(at);
        let token = CancellationToken::new();
        if let Some(previous) = self.timers.lock().await.insert(id, token.clone()) {
            previous.cancel();
        }
        info!(task_id = %id, delay_secs = delay.as_secs_f64(), "task scheduled");

        let timers = Arc::clone(&self.timers);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            {
                // Disarm and fire must not interleave: check under the lock.
                let mut timers = timers.lock().await;
                if token.is_cancelled() {
                    return;
                }
                timers.remove(&id);
            }
            info!(task_id = %id, "scheduled run firing");
            fire.await;
        });
        delay
    }

    /// Disarm a pending timer. Returns false if none was armed.
    pub async fn unschedule(&self, id: TaskId) -> bool {
        let mut timers = self.timers.lock().await;
        match timers.remove(&id) {
            Some(token) => {
                token.cancel();
                info!(task_id = %id, "schedule disarmed");
                true
            }
            None => false,
        }
    }

    /// Ids with an armed timer, sorted.
    pub async fn pending(&self) -> Vec<TaskId> {
        let timers = self.timers.lock().await;
        let mut ids: Vec<TaskId> = timers.keys().copied().collect();
        ids.sort();
        ids
    }
}
