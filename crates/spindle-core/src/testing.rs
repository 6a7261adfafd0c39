//! Scripted handlers and fake collaborators shared by the unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

use crate::domain::{JsonMap, StepId, Task, TaskId, TaskStep};
use crate::handlers::{ActionHandler, HandlerError, TaskRef};
use crate::ports::{
    CollaboratorError, Generation, ModelOrchestrator, Notification, Notifier, WebAutomation,
};

pub(crate) fn json_map(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// A one-step task view for calling handlers directly.
pub(crate) fn task_ref() -> TaskRef {
    let step = TaskStep::new(StepId::from_ulid(Ulid::new()), "only", "test", JsonMap::new());
    let step_id = step.id;
    let task = Task::new(TaskId::from_ulid(Ulid::new()), "test", vec![step], Utc::now());
    TaskRef::new(task, step_id, CancellationToken::new())
}

/// Fails its first `fail_first` invocations, then succeeds.
pub(crate) struct FlakyHandler {
    fail_first: u32,
    calls: AtomicU32,
}

impl FlakyHandler {
    pub(crate) fn failing_times(n: u32) -> Self {
        Self {
            fail_first: n,
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn always_failing() -> Self {
        Self::failing_times(u32::MAX)
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionHandler for FlakyHandler {
    async fn handle(&self, _params: JsonMap, _task: TaskRef) -> Result<JsonMap, HandlerError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_first {
            return Err(HandlerError::Failed(format!("attempt {attempt} failed")));
        }
        Ok(json_map(json!({ "attempt": attempt })))
    }
}

/// Never completes.
pub(crate) struct StuckHandler;

#[async_trait]
impl ActionHandler for StuckHandler {
    async fn handle(&self, _params: JsonMap, _task: TaskRef) -> Result<JsonMap, HandlerError> {
        std::future::pending::<Result<JsonMap, HandlerError>>().await
    }
}

/// Sleeps, then echoes its parameters.
pub(crate) struct SlowHandler {
    pub(crate) delay: Duration,
}

#[async_trait]
impl ActionHandler for SlowHandler {
    async fn handle(&self, params: JsonMap, _task: TaskRef) -> Result<JsonMap, HandlerError> {
        tokio::time::sleep(self.delay).await;
        Ok(params)
    }
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub(crate) step: String,
    pub(crate) params: JsonMap,
    pub(crate) at: Instant,
}

/// Records every invocation and echoes its parameters.
#[derive(Default)]
pub(crate) struct RecordingHandler {
    calls: Mutex<Vec<Call>>,
}

impl RecordingHandler {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionHandler for RecordingHandler {
    async fn handle(&self, params: JsonMap, task: TaskRef) -> Result<JsonMap, HandlerError> {
        let step = task
            .step(task.current_step_id())
            .map(|s| s.name.clone())
            .unwrap_or_default();
        self.calls.lock().unwrap().push(Call {
            step,
            params: params.clone(),
            at: Instant::now(),
        });
        Ok(params)
    }
}

/// Model that echoes the prompt, or gives a fixed answer.
#[derive(Default)]
pub(crate) struct EchoModel {
    answer: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl EchoModel {
    pub(crate) fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            prompts: Mutex::default(),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelOrchestrator for EchoModel {
    async fn generate(
        &self,
        prompt: &str,
        model_hint: Option<&str>,
        _use_tools: bool,
    ) -> Result<Generation, CollaboratorError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(Generation {
            content: self
                .answer
                .clone()
                .unwrap_or_else(|| format!("echo: {prompt}")),
            model_used: model_hint.unwrap_or("echo-model").to_string(),
        })
    }
}

/// Web collaborator with canned answers.
pub(crate) struct StaticWeb;

#[async_trait]
impl WebAutomation for StaticWeb {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Value>, CollaboratorError> {
        Ok((1..=max_results)
            .map(|i| json!({ "title": format!("{query} #{i}") }))
            .collect())
    }

    async fn request(
        &self,
        method: &str,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, CollaboratorError> {
        Ok(json!({ "method": method, "url": url, "body": body }))
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), CollaboratorError> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}
