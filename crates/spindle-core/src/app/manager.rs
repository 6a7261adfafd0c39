//! TaskManager - the engine's query/command surface.
//!
//! Owns the task table and drives executions: steps of one task run strictly
//! in list order on a single logical worker, while different tasks run
//! concurrently on the tokio runtime. Persistence is best-effort: store
//! failures are logged at `warn` and never change the in-memory outcome.
//! Writes for one task reach the store in transition order.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::executor::{StepExecutor, StepOutcome};
use super::scheduler::Scheduler;
use super::sink::SinkWriter;
use super::table::{CancelOutcome, TaskTable};
use crate::domain::{EngineError, SpecDefaults, StatusCounts, Task, TaskId, TaskSpec, TaskStatus};
use crate::handlers::HandlerRegistry;
use crate::ports::{Clock, IdGenerator, TaskStore};

/// Everything a `TaskManager` is wired from. Assembled by `EngineBuilder`.
pub(crate) struct Parts {
    pub(crate) registry: Arc<HandlerRegistry>,
    pub(crate) store: Arc<dyn TaskStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) defaults: SpecDefaults,
    pub(crate) retry: super::RetryPolicy,
    pub(crate) auto_run: bool,
}

struct Inner {
    table: TaskTable,
    executor: StepExecutor,
    scheduler: Scheduler,
    sink: SinkWriter,
    registry: Arc<HandlerRegistry>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    defaults: SpecDefaults,
    auto_run: bool,
}

/// Cheap to clone; clones share the same engine.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

impl TaskManager {
    pub(crate) fn from_parts(parts: Parts) -> Self {
        let table = TaskTable::new();
        let executor = StepExecutor::new(
            Arc::clone(&parts.registry),
            table.clone(),
            Arc::clone(&parts.clock),
            parts.retry,
        );
        let scheduler = Scheduler::new(Arc::clone(&parts.clock));
        let sink = SinkWriter::new(parts.store, table.clone());
        Self {
            inner: Arc::new(Inner {
                table,
                executor,
                scheduler,
                sink,
                registry: parts.registry,
                clock: parts.clock,
                ids: parts.ids,
                defaults: parts.defaults,
                auto_run: parts.auto_run,
            }),
        }
    }

    /// Build a `Pending` task from `spec` and register it.
    ///
    /// A task with `scheduled_for` is handed to the scheduler (a past time
    /// runs right away). Otherwise it waits for `execute`, unless `auto_run`
    /// is on. Tasks started by the engine itself are observed with `wait`.
    pub async fn create(&self, spec: TaskSpec) -> Result<Task, EngineError> {
        let now = self.inner.clock.now();
        let task = spec.build(self.inner.ids.as_ref(), now, &self.inner.defaults)?;
        self.inner.sink.insert(task.clone()).await;
        info!(task_id = %task.id, name = %task.name, steps = task.steps.len(), "task created");

        if let Some(at) = task.scheduled_for {
            let run = self.clone().execute_detached(task.id, "schedule");
            self.inner.scheduler.schedule(task.id, at, run).await;
        } else if self.inner.auto_run {
            // The caller gets the Pending snapshot.
            tokio::spawn(self.clone().execute_detached(task.id, "auto_run"));
        }
        Ok(task)
    }

    /// `execute` started by the engine; there is no caller to hand an error to.
    async fn execute_detached(self, id: TaskId, trigger: &'static str) {
        if let Err(e) = self.execute(id).await {
            warn!(task_id = %id, trigger, error = %e, "detached execution rejected");
        }
    }

    /// Whether `create` starts unscheduled tasks on its own.
    pub fn auto_run(&self) -> bool {
        self.inner.auto_run
    }

    /// Wait for a task to finish, whoever runs it, and return it once its
    /// final state has been handed to the store.
    pub async fn wait(&self, id: TaskId) -> Result<Task, EngineError> {
        self.inner.sink.settled(id).await.ok_or(EngineError::NotFound(id))
    }

    /// Run a `Pending` task to a terminal state and return it.
    ///
    /// Stops at the first step that fails for good; later steps stay
    /// `Pending`. If the task is cancelled meanwhile, returns the cancelled
    /// snapshot.
    pub async fn execute(&self, id: TaskId) -> Result<Task, EngineError> {
        let (running, token) = self.inner.table.begin(id, self.inner.clock.now()).await?;
        info!(task_id = %id, name = %running.name, "task started");
        self.inner.sink.persist(id).await;

        let outcome = self.run_steps(id, running.steps.len(), &token).await;
        let finished = match outcome {
            Some(result) => {
                self.inner
                    .table
                    .finish(id, result, self.inner.clock.now())
                    .await
            }
            None => None,
        };

        match finished {
            Some(task) => {
                match task.status {
                    TaskStatus::Completed => info!(task_id = %id, "task completed"),
                    _ => warn!(task_id = %id, error = task.error.as_deref().unwrap_or_default(), "task failed"),
                }
                self.inner.sink.persist(id).await;
                Ok(task)
            }
            // Cancelled while running; `cancel` already persisted it.
            None => self.get(id).await.ok_or(EngineError::NotFound(id)),
        }
    }

    /// `None` when cancelled, otherwise the task-level result.
    async fn run_steps(
        &self,
        id: TaskId,
        count: usize,
        token: &CancellationToken,
    ) -> Option<Result<(), String>> {
        for index in 0..count {
            match self.inner.executor.run(id, index, token).await {
                StepOutcome::Completed => {}
                StepOutcome::Failed(err) => return Some(Err(err.to_string())),
                StepOutcome::Stopped => return None,
            }
        }
        Some(Ok(()))
    }

    /// `execute` on its own tokio task.
    pub fn spawn_execute(&self, id: TaskId) -> JoinHandle<Result<Task, EngineError>> {
        let manager = self.clone();
        tokio::spawn(async move { manager.execute(id).await })
    }

    /// Cancel a task. Returns false only for an unknown id.
    ///
    /// A running task is marked `Cancelled` immediately; its in-flight
    /// handler is abandoned, not aborted. An armed schedule is disarmed.
    /// Already terminal tasks are left as they are.
    pub async fn cancel(&self, id: TaskId) -> bool {
        self.inner.scheduler.unschedule(id).await;
        match self.inner.table.cancel(id, self.inner.clock.now()).await {
            CancelOutcome::NotFound => false,
            CancelOutcome::Finished(status) => {
                debug!(task_id = %id, status = %status, "cancel ignored, task already finished");
                true
            }
            CancelOutcome::Cancelled(task) => {
                info!(task_id = %id, name = %task.name, "task cancelled");
                self.inner.sink.persist(id).await;
                true
            }
        }
    }

    pub async fn get(&self, id: TaskId) -> Option<Task> {
        self.inner.table.get(id).await
    }

    /// Tasks newest first, optionally only those with `status`.
    pub async fn list(&self, status: Option<TaskStatus>) -> Vec<Task> {
        self.inner.table.list(status).await
    }

    pub async fn counts(&self) -> StatusCounts {
        self.inner.table.counts().await
    }

    /// Ids of tasks waiting on the scheduler.
    pub async fn scheduled(&self) -> Vec<TaskId> {
        self.inner.scheduler.pending().await
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::EngineBuilder;
    use crate::domain::StepSpec;
    use crate::handlers::{Collaborators, SEND_NOTIFICATION};
    use crate::impls::InMemoryTaskStore;
    use crate::ports::{FixedClock, StoreError, SystemClock};
    use crate::testing::{FlakyHandler, RecordingHandler, RecordingNotifier, StuckHandler};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::Instant;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn recording_engine() -> (TaskManager, Arc<RecordingHandler>) {
        recording_engine_with(EngineBuilder::new())
    }

    /// Wall clock pinned at `t0()`; tokio time still moves.
    fn pinned_engine() -> (TaskManager, Arc<RecordingHandler>) {
        recording_engine_with(EngineBuilder::new().clock(Arc::new(FixedClock::new(t0()))))
    }

    fn recording_engine_with(builder: EngineBuilder) -> (TaskManager, Arc<RecordingHandler>) {
        let recorder = Arc::new(RecordingHandler::default());
        let manager = builder
            .register("record", recorder.clone())
            .unwrap()
            .register("fail", Arc::new(FlakyHandler::always_failing()))
            .unwrap()
            .register("stuck", Arc::new(StuckHandler))
            .unwrap()
            .build()
            .unwrap();
        (manager, recorder)
    }

    #[tokio::test]
    async fn demo_workflow_completes_in_order() {
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = EngineBuilder::new()
            .collaborators(Collaborators::new().with_notifier(notifier.clone()))
            .build()
            .unwrap();

        let spec: TaskSpec = serde_json::from_value(json!({
            "name": "demo",
            "steps": [
                {"name": "a", "action": "send_notification", "parameters": {"message": "hi"}},
                {"name": "b", "action": "send_notification", "parameters": {"message": "bye"},
                 "dependencies": ["a"]}
            ]
        }))
        .unwrap();

        let created = manager.create(spec).await.unwrap();
        assert_eq!(created.status, TaskStatus::Pending);

        let task = manager.execute(created.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.steps.iter().all(|s| s.status == TaskStatus::Completed));
        assert!(task.steps[1].start_time >= task.steps[0].end_time);
        assert!(task.started_at.is_some() && task.completed_at.is_some());

        let result = task.result.unwrap();
        assert_eq!(result["a"]["delivered"], true);
        let messages: Vec<_> = notifier.sent().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["hi", "bye"]);
        assert!(manager.registry().contains(SEND_NOTIFICATION));
    }

    #[tokio::test(start_paused = true)]
    async fn steps_never_overlap() {
        let (manager, recorder) = recording_engine();
        let spec = TaskSpec::new("ordered")
            .step(StepSpec::new("s1", "record").param("n", json!(1)))
            .step(StepSpec::new("s2", "record").param("n", json!(2)))
            .step(StepSpec::new("s3", "record").param("n", json!(3)));
        let created = manager.create(spec).await.unwrap();

        let task = manager.execute(created.id).await.unwrap();

        let order: Vec<_> = recorder.calls().into_iter().map(|c| c.step).collect();
        assert_eq!(order, vec!["s1", "s2", "s3"]);
        for pair in task.steps.windows(2) {
            assert!(pair[1].start_time.unwrap() >= pair[0].end_time.unwrap());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_dependency_halts_the_task() {
        let (manager, recorder) = recording_engine();
        let spec = TaskSpec::new("gated")
            .step(StepSpec::new("s1", "fail").max_retries(0))
            .step(StepSpec::new("s2", "record").depends_on("s1"));
        let created = manager.create(spec).await.unwrap();

        let task = manager.execute(created.id).await.unwrap();

        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("attempt 1 failed"));
        assert_eq!(task.steps[0].status, TaskStatus::Failed);
        assert_eq!(task.steps[1].status, TaskStatus::Pending);
        assert!(task.steps[1].start_time.is_none());
        assert!(recorder.calls().is_empty());
        assert!(task.completed_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn flaky_step_recovers_after_backoff() {
        let flaky = Arc::new(FlakyHandler::failing_times(2));
        let manager = EngineBuilder::new()
            .register("flaky", flaky.clone())
            .unwrap()
            .build()
            .unwrap();
        let created = manager
            .create(TaskSpec::new("retry").step(StepSpec::new("s", "flaky").max_retries(3)))
            .await
            .unwrap();

        let started = Instant::now();
        let task = manager.execute(created.id).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(6));
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.steps[0].retry_count, 2);
        assert_eq!(flaky.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_fail_the_task() {
        let always = Arc::new(FlakyHandler::always_failing());
        let manager = EngineBuilder::new()
            .register("fail", always.clone())
            .unwrap()
            .build()
            .unwrap();
        let created = manager
            .create(TaskSpec::new("doomed").step(StepSpec::new("s", "fail").max_retries(2)))
            .await
            .unwrap();

        let task = manager.execute(created.id).await.unwrap();

        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.steps[0].status, TaskStatus::Failed);
        assert_eq!(task.steps[0].retry_count, 2);
        assert_eq!(always.calls(), 3);
        assert!(!task.error.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn get_is_idempotent() {
        let (manager, _) = recording_engine();
        let created = manager
            .create(TaskSpec::new("q").step(StepSpec::new("s", "record")))
            .await
            .unwrap();
        manager.execute(created.id).await.unwrap();

        let first = serde_json::to_vec(&manager.get(created.id).await.unwrap()).unwrap();
        let second = serde_json::to_vec(&manager.get(created.id).await.unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_a_stuck_task() {
        let (manager, recorder) = recording_engine();
        let created = manager
            .create(
                TaskSpec::new("stuck")
                    .step(StepSpec::new("s1", "stuck"))
                    .step(StepSpec::new("s2", "record")),
            )
            .await
            .unwrap();
        let run = manager.spawn_execute(created.id);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(manager.get(created.id).await.unwrap().status, TaskStatus::Running);
        assert!(manager.cancel(created.id).await);

        let task = manager.get(created.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert_eq!(task.steps[0].status, TaskStatus::Cancelled);
        assert_eq!(task.steps[1].status, TaskStatus::Pending);

        let returned = run.await.unwrap().unwrap();
        assert_eq!(returned.status, TaskStatus::Cancelled);
        assert!(recorder.calls().is_empty());
        assert_eq!(manager.counts().await.cancelled, 1);
    }

    #[tokio::test]
    async fn cancel_unknown_and_finished_tasks() {
        let (manager, _) = recording_engine();
        assert!(!manager.cancel(TaskId::from_ulid(ulid::Ulid::new())).await);

        let created = manager
            .create(TaskSpec::new("done").step(StepSpec::new("s", "record")))
            .await
            .unwrap();
        manager.execute(created.id).await.unwrap();

        assert!(manager.cancel(created.id).await);
        assert_eq!(manager.get(created.id).await.unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn cancel_pending_task_prevents_execution() {
        let (manager, _) = recording_engine();
        let created = manager
            .create(TaskSpec::new("later").step(StepSpec::new("s", "record")))
            .await
            .unwrap();

        assert!(manager.cancel(created.id).await);
        let err = manager.execute(created.id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::AlreadyRunning { status: TaskStatus::Cancelled, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_task_waits_for_its_time() {
        let (manager, recorder) = pinned_engine();
        let spec = TaskSpec::new("deferred")
            .step(StepSpec::new("s", "record"))
            .scheduled_at(t0() + chrono::Duration::seconds(2));
        let started = Instant::now();
        let created = manager.create(spec).await.unwrap();

        assert_eq!(created.status, TaskStatus::Pending);
        assert_eq!(manager.scheduled().await, vec![created.id]);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(manager.get(created.id).await.unwrap().status, TaskStatus::Pending);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(manager.get(created.id).await.unwrap().status, TaskStatus::Completed);
        assert!(recorder.calls()[0].at - started >= Duration::from_secs(2));
        assert!(manager.scheduled().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn past_schedule_runs_immediately() {
        let (manager, _) = recording_engine();
        let spec = TaskSpec::new("overdue")
            .step(StepSpec::new("s", "record"))
            .scheduled_at(Utc::now() - chrono::Duration::seconds(60));
        let created = manager.create(spec).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(manager.get(created.id).await.unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_a_scheduled_task_disarms_it() {
        let (manager, recorder) = recording_engine();
        let spec = TaskSpec::new("deferred")
            .step(StepSpec::new("s", "record"))
            .scheduled_at(Utc::now() + chrono::Duration::seconds(5));
        let created = manager.create(spec).await.unwrap();

        assert!(manager.cancel(created.id).await);
        assert!(manager.scheduled().await.is_empty());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(manager.get(created.id).await.unwrap().status, TaskStatus::Cancelled);
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn execute_rejects_unknown_and_running() {
        let (manager, _) = recording_engine();
        let missing = TaskId::from_ulid(ulid::Ulid::new());
        assert!(matches!(
            manager.execute(missing).await,
            Err(EngineError::NotFound(id)) if id == missing
        ));

        let created = manager
            .create(TaskSpec::new("busy").step(StepSpec::new("s", "stuck")))
            .await
            .unwrap();
        let _run = manager.spawn_execute(created.id);
        tokio::task::yield_now().await;
        while manager.get(created.id).await.unwrap().status == TaskStatus::Pending {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            manager.execute(created.id).await,
            Err(EngineError::AlreadyRunning { status: TaskStatus::Running, .. })
        ));
        manager.cancel(created.id).await;
    }

    #[tokio::test(start_paused = true)]
    async fn auto_run_starts_unscheduled_tasks() {
        let config = crate::config::EngineConfig {
            auto_run: true,
            ..Default::default()
        };
        let recorder = Arc::new(RecordingHandler::default());
        let manager = EngineBuilder::new()
            .config(config)
            .register("record", recorder.clone())
            .unwrap()
            .build()
            .unwrap();

        let created = manager
            .create(TaskSpec::new("auto").step(StepSpec::new("s", "record")))
            .await
            .unwrap();
        assert_eq!(created.status, TaskStatus::Pending);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(manager.get(created.id).await.unwrap().status, TaskStatus::Completed);
    }

    fn auto_run_engine() -> (TaskManager, Arc<RecordingHandler>) {
        let config = crate::config::EngineConfig {
            auto_run: true,
            ..Default::default()
        };
        recording_engine_with(EngineBuilder::new().config(config))
    }

    #[tokio::test(start_paused = true)]
    async fn auto_run_task_is_awaited_not_executed_twice() {
        let (manager, recorder) = auto_run_engine();
        assert!(manager.auto_run());

        let created = manager
            .create(TaskSpec::new("auto").step(StepSpec::new("s", "record")))
            .await
            .unwrap();
        let task = manager.wait(created.id).await.unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(recorder.calls().len(), 1);
        assert!(matches!(
            manager.execute(created.id).await,
            Err(EngineError::AlreadyRunning { status: TaskStatus::Completed, .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wait_sees_auto_run_finish_under_contention() {
        let (manager, _) = auto_run_engine();
        let created = manager
            .create(TaskSpec::new("auto").step(StepSpec::new("s", "record")))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let task = tokio::time::timeout(Duration::from_secs(5), manager.wait(created.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_run_of_a_cancelled_task_is_rejected_quietly() {
        let (manager, recorder) = auto_run_engine();
        let created = manager
            .create(TaskSpec::new("auto").step(StepSpec::new("s", "record")))
            .await
            .unwrap();
        // The detached run has not been polled yet on this runtime.
        assert!(manager.cancel(created.id).await);

        let task = manager.wait(created.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn wait_on_unknown_task_is_not_found() {
        let (manager, _) = recording_engine();
        let id = TaskId::from_ulid(ulid::Ulid::new());
        assert!(matches!(manager.wait(id).await, Err(EngineError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_returns_a_task_finished_by_execute() {
        let (manager, _) = recording_engine();
        let created = manager
            .create(TaskSpec::new("t").step(StepSpec::new("s", "fail").max_retries(1)))
            .await
            .unwrap();
        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.wait(created.id).await })
        };

        manager.execute(created.id).await.unwrap();
        assert_eq!(waiter.await.unwrap().unwrap().status, TaskStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_tasks_run_concurrently() {
        let (manager, _) = recording_engine();
        let slow = manager
            .create(TaskSpec::new("slow").step(StepSpec::new("s", "fail").max_retries(3)))
            .await
            .unwrap();
        let fast = manager
            .create(TaskSpec::new("fast").step(StepSpec::new("s", "record")))
            .await
            .unwrap();

        let slow_run = manager.spawn_execute(slow.id);
        let started = Instant::now();
        let fast_task = manager.execute(fast.id).await.unwrap();

        assert_eq!(fast_task.status, TaskStatus::Completed);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(slow_run.await.unwrap().unwrap().status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn list_filters_and_orders_newest_first() {
        // Equal created_at everywhere, so order falls back to id.
        let (manager, _) = pinned_engine();
        let mut ids = Vec::new();
        for name in ["one", "two", "three"] {
            let task = manager
                .create(TaskSpec::new(name).step(StepSpec::new("s", "record")))
                .await
                .unwrap();
            ids.push(task.id);
        }
        manager.execute(ids[1]).await.unwrap();

        let listed: Vec<_> = manager.list(None).await.into_iter().map(|t| t.id).collect();
        let mut expected = ids.clone();
        expected.sort_by(|a, b| b.cmp(a));
        assert_eq!(listed, expected);

        let completed = manager.list(Some(TaskStatus::Completed)).await;
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, ids[1]);

        let counts = manager.counts().await;
        assert_eq!((counts.pending, counts.completed, counts.total()), (2, 1, 3));
    }

    #[tokio::test]
    async fn persists_creation_and_transitions() {
        let store = Arc::new(InMemoryTaskStore::new());
        let recorder = Arc::new(RecordingHandler::default());
        let manager = EngineBuilder::new()
            .store(store.clone())
            .register("record", recorder)
            .unwrap()
            .build()
            .unwrap();

        let created = manager
            .create(TaskSpec::new("saved").step(StepSpec::new("s", "record")))
            .await
            .unwrap();
        manager.execute(created.id).await.unwrap();

        let statuses: Vec<_> = store.writes().await.into_iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::Pending, TaskStatus::Running, TaskStatus::Completed]
        );
        assert_eq!(store.latest(created.id).await.unwrap().status, TaskStatus::Completed);
    }

    struct BrokenStore;

    #[async_trait]
    impl TaskStore for BrokenStore {
        async fn store(&self, _task: &Task) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("database down".into()))
        }

        async fn update(&self, _task: &Task) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("database down".into()))
        }
    }

    /// Holds `Running` snapshots back so a later transition can overtake them.
    #[derive(Default)]
    struct SlowRunningStore {
        inner: InMemoryTaskStore,
    }

    #[async_trait]
    impl TaskStore for SlowRunningStore {
        async fn store(&self, task: &Task) -> Result<(), StoreError> {
            self.inner.store(task).await
        }

        async fn update(&self, task: &Task) -> Result<(), StoreError> {
            if task.status == TaskStatus::Running {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            self.inner.update(task).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_a_slow_write_still_persists_cancelled() {
        let store = Arc::new(SlowRunningStore::default());
        let (manager, _) = recording_engine_with(EngineBuilder::new().store(store.clone()));
        let created = manager
            .create(TaskSpec::new("stuck").step(StepSpec::new("s", "stuck")))
            .await
            .unwrap();

        let run = manager.spawn_execute(created.id);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(manager.cancel(created.id).await);
        assert_eq!(run.await.unwrap().unwrap().status, TaskStatus::Cancelled);

        let settled = manager.wait(created.id).await.unwrap();
        assert_eq!(settled.status, TaskStatus::Cancelled);
        let persisted = store.inner.latest(created.id).await.unwrap();
        assert_eq!(persisted.status, TaskStatus::Cancelled);
        let last = store.inner.writes().await.pop().unwrap();
        assert_eq!(last.status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn store_failures_do_not_affect_execution() {
        let manager = EngineBuilder::new()
            .store(Arc::new(BrokenStore))
            .clock(Arc::new(SystemClock))
            .register("record", Arc::new(RecordingHandler::default()))
            .unwrap()
            .build()
            .unwrap();

        let created = manager
            .create(TaskSpec::new("unsaved").step(StepSpec::new("s", "record")))
            .await
            .unwrap();
        let task = manager.execute(created.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn invalid_spec_is_rejected_at_creation() {
        let (manager, _) = recording_engine();
        let spec = TaskSpec::new("bad")
            .step(StepSpec::new("a", "record").depends_on("b"))
            .step(StepSpec::new("b", "record"));

        assert!(matches!(
            manager.create(spec).await,
            Err(EngineError::InvalidSpec(_))
        ));
        assert!(manager.list(None).await.is_empty());
    }
}
