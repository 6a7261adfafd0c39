//! Built-in actions used by default workflows.
//!
//! Each handler validates its own parameters and makes exactly one call into
//! an external collaborator. A handler is only registered when the
//! collaborator it needs was supplied; a step naming a missing one fails
//! with `UnknownAction`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::codec::{decode_params, encode_output};
use super::handler::{ActionHandler, HandlerError, TaskRef};
use super::registry::{HandlerRegistry, RegistryError};
use crate::domain::JsonMap;
use crate::ports::{FileProcessor, ModelOrchestrator, Notification, Notifier, WebAutomation};

pub const SEND_MESSAGE: &str = "send_message";
pub const PROCESS_FILE: &str = "process_file";
pub const WEB_SEARCH: &str = "web_search";
pub const DATA_ANALYSIS: &str = "data_analysis";
pub const FILE_OPERATION: &str = "file_operation";
pub const SCHEDULE_REMINDER: &str = "schedule_reminder";
pub const SEND_NOTIFICATION: &str = "send_notification";
pub const CODE_EXECUTION: &str = "code_execution";
pub const API_CALL: &str = "api_call";
pub const DATA_EXTRACTION: &str = "data_extraction";
pub const CONTENT_GENERATION: &str = "content_generation";
pub const SYSTEM_COMMAND: &str = "system_command";

pub const BUILTIN_ACTIONS: [&str; 12] = [
    SEND_MESSAGE,
    PROCESS_FILE,
    WEB_SEARCH,
    DATA_ANALYSIS,
    FILE_OPERATION,
    SCHEDULE_REMINDER,
    SEND_NOTIFICATION,
    CODE_EXECUTION,
    API_CALL,
    DATA_EXTRACTION,
    CONTENT_GENERATION,
    SYSTEM_COMMAND,
];

/// External services available to the built-in actions.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub model: Option<Arc<dyn ModelOrchestrator>>,
    pub files: Option<Arc<dyn FileProcessor>>,
    pub web: Option<Arc<dyn WebAutomation>>,
    pub notifier: Option<Arc<dyn Notifier>>,

    /// `system_command` spawns local processes; off unless asked for.
    pub allow_system_commands: bool,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: Arc<dyn ModelOrchestrator>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_files(mut self, files: Arc<dyn FileProcessor>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn with_web(mut self, web: Arc<dyn WebAutomation>) -> Self {
        self.web = Some(web);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_system_commands(mut self, allow: bool) -> Self {
        self.allow_system_commands = allow;
        self
    }
}

/// Register every built-in action whose collaborator is present.
pub fn register_builtins(
    registry: &mut HandlerRegistry,
    collaborators: &Collaborators,
) -> Result<(), RegistryError> {
    if let Some(model) = &collaborators.model {
        registry.register(SEND_MESSAGE, Arc::new(SendMessage { model: model.clone() }))?;
        registry.register(DATA_ANALYSIS, Arc::new(DataAnalysis { model: model.clone() }))?;
        registry.register(CODE_EXECUTION, Arc::new(CodeExecution { model: model.clone() }))?;
        registry.register(DATA_EXTRACTION, Arc::new(DataExtraction { model: model.clone() }))?;
        registry.register(
            CONTENT_GENERATION,
            Arc::new(ContentGeneration { model: model.clone() }),
        )?;
    }
    if let Some(files) = &collaborators.files {
        registry.register(PROCESS_FILE, Arc::new(ProcessFile { files: files.clone() }))?;
        registry.register(FILE_OPERATION, Arc::new(FileOperation { files: files.clone() }))?;
    }
    if let Some(web) = &collaborators.web {
        registry.register(WEB_SEARCH, Arc::new(WebSearch { web: web.clone() }))?;
        registry.register(API_CALL, Arc::new(ApiCall { web: web.clone() }))?;
    }
    if let Some(notifier) = &collaborators.notifier {
        registry.register(
            SEND_NOTIFICATION,
            Arc::new(SendNotification { notifier: notifier.clone() }),
        )?;
        registry.register(
            SCHEDULE_REMINDER,
            Arc::new(ScheduleReminder { notifier: notifier.clone() }),
        )?;
    }
    if collaborators.allow_system_commands {
        registry.register(SYSTEM_COMMAND, Arc::new(SystemCommand))?;
    }
    Ok(())
}

// ========================================
// Model orchestrator shims
// ========================================

#[derive(Debug, Deserialize)]
struct MessageParams {
    #[serde(alias = "prompt")]
    message: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    use_tools: bool,
}

pub struct SendMessage {
    model: Arc<dyn ModelOrchestrator>,
}

#[async_trait]
impl ActionHandler for SendMessage {
    async fn handle(&self, params: JsonMap, _task: TaskRef) -> Result<JsonMap, HandlerError> {
        let p: MessageParams = decode_params(params)?;
        let generation = self
            .model
            .generate(&p.message, p.model.as_deref(), p.use_tools)
            .await?;
        encode_output(&generation)
    }
}

#[derive(Debug, Deserialize)]
struct AnalysisParams {
    data: serde_json::Value,
    #[serde(default = "default_analysis_type")]
    analysis_type: String,
    #[serde(default)]
    model: Option<String>,
}

fn default_analysis_type() -> String {
    "general".to_string()
}

pub struct DataAnalysis {
    model: Arc<dyn ModelOrchestrator>,
}

#[async_trait]
impl ActionHandler for DataAnalysis {
    async fn handle(&self, params: JsonMap, _task: TaskRef) -> Result<JsonMap, HandlerError> {
        let p: AnalysisParams = decode_params(params)?;
        let data = serde_json::to_string_pretty(&p.data)
            .map_err(|e| HandlerError::InvalidParameters(e.to_string()))?;
        let prompt = format!(
            "Perform a {} analysis of the following data and summarize the findings:\n{data}",
            p.analysis_type
        );
        let generation = self.model.generate(&prompt, p.model.as_deref(), false).await?;
        encode_output(&json!({
            "analysis": generation.content,
            "analysis_type": p.analysis_type,
            "model_used": generation.model_used,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct CodeParams {
    code: String,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    model: Option<String>,
}

fn default_language() -> String {
    "python".to_string()
}

pub struct CodeExecution {
    model: Arc<dyn ModelOrchestrator>,
}

#[async_trait]
impl ActionHandler for CodeExecution {
    async fn handle(&self, params: JsonMap, _task: TaskRef) -> Result<JsonMap, HandlerError> {
        let p: CodeParams = decode_params(params)?;
        let prompt = format!(
            "Execute the following {lang} code and report its output:\n```{lang}\n{code}\n```",
            lang = p.language,
            code = p.code
        );
        let generation = self.model.generate(&prompt, p.model.as_deref(), true).await?;
        encode_output(&json!({
            "output": generation.content,
            "language": p.language,
            "model_used": generation.model_used,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ExtractionParams {
    #[serde(alias = "content")]
    text: String,
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    model: Option<String>,
}

pub struct DataExtraction {
    model: Arc<dyn ModelOrchestrator>,
}

#[async_trait]
impl ActionHandler for DataExtraction {
    async fn handle(&self, params: JsonMap, _task: TaskRef) -> Result<JsonMap, HandlerError> {
        let p: ExtractionParams = decode_params(params)?;
        let wanted = if p.fields.is_empty() {
            "the key facts".to_string()
        } else {
            format!("the fields {}", p.fields.join(", "))
        };
        let prompt = format!("Extract {wanted} from the text below as a JSON object.\n\n{}", p.text);
        let generation = self.model.generate(&prompt, p.model.as_deref(), false).await?;

        // Structured when the model answered with JSON, raw text otherwise.
        let extracted = serde_json::from_str::<serde_json::Value>(generation.content.trim())
            .unwrap_or(serde_json::Value::String(generation.content));
        encode_output(&json!({
            "extracted": extracted,
            "model_used": generation.model_used,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ContentParams {
    prompt: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

pub struct ContentGeneration {
    model: Arc<dyn ModelOrchestrator>,
}

#[async_trait]
impl ActionHandler for ContentGeneration {
    async fn handle(&self, params: JsonMap, _task: TaskRef) -> Result<JsonMap, HandlerError> {
        let p: ContentParams = decode_params(params)?;
        let prompt = match &p.content_type {
            Some(kind) => format!("Write {kind} content for the following request.\n\n{}", p.prompt),
            None => p.prompt.clone(),
        };
        let generation = self.model.generate(&prompt, p.model.as_deref(), false).await?;
        let mut out = encode_output(&generation)?;
        if let Some(kind) = p.content_type {
            out.insert("content_type".to_string(), json!(kind));
        }
        Ok(out)
    }
}

// ========================================
// File processor shims
// ========================================

#[derive(Debug, Deserialize)]
struct ProcessFileParams {
    #[serde(alias = "file_path")]
    path: String,
    #[serde(default = "default_file_operation")]
    operation: String,
    #[serde(default)]
    options: JsonMap,
}

fn default_file_operation() -> String {
    "analyze".to_string()
}

pub struct ProcessFile {
    files: Arc<dyn FileProcessor>,
}

#[async_trait]
impl ActionHandler for ProcessFile {
    async fn handle(&self, params: JsonMap, _task: TaskRef) -> Result<JsonMap, HandlerError> {
        let p: ProcessFileParams = decode_params(params)?;
        Ok(self.files.process(&p.path, &p.operation, &p.options).await?)
    }
}

#[derive(Debug, Deserialize)]
struct FileOperationParams {
    path: String,
    operation: String,
}

pub struct FileOperation {
    files: Arc<dyn FileProcessor>,
}

#[async_trait]
impl ActionHandler for FileOperation {
    async fn handle(&self, params: JsonMap, _task: TaskRef) -> Result<JsonMap, HandlerError> {
        let p: FileOperationParams = decode_params(params.clone())?;
        Ok(self.files.process(&p.path, &p.operation, &params).await?)
    }
}

// ========================================
// Web automation shims
// ========================================

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

fn default_max_results() -> usize {
    5
}

pub struct WebSearch {
    web: Arc<dyn WebAutomation>,
}

#[async_trait]
impl ActionHandler for WebSearch {
    async fn handle(&self, params: JsonMap, _task: TaskRef) -> Result<JsonMap, HandlerError> {
        let p: SearchParams = decode_params(params)?;
        let results = self.web.search(&p.query, p.max_results).await?;
        encode_output(&json!({
            "query": p.query,
            "count": results.len(),
            "results": results,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ApiCallParams {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    body: Option<serde_json::Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

pub struct ApiCall {
    web: Arc<dyn WebAutomation>,
}

#[async_trait]
impl ActionHandler for ApiCall {
    async fn handle(&self, params: JsonMap, _task: TaskRef) -> Result<JsonMap, HandlerError> {
        let p: ApiCallParams = decode_params(params)?;
        let method = p.method.to_ascii_uppercase();
        let response = self.web.request(&method, &p.url, p.body.as_ref()).await?;
        encode_output(&json!({
            "method": method,
            "url": p.url,
            "response": response,
        }))
    }
}

// ========================================
// Notification shims
// ========================================

#[derive(Debug, Deserialize)]
struct NotificationParams {
    message: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    channel: Option<String>,
}

pub struct SendNotification {
    notifier: Arc<dyn Notifier>,
}

#[async_trait]
impl ActionHandler for SendNotification {
    async fn handle(&self, params: JsonMap, task: TaskRef) -> Result<JsonMap, HandlerError> {
        let p: NotificationParams = decode_params(params)?;
        let channel = p.channel.clone();
        self.notifier
            .notify(Notification {
                task_id: task.id(),
                title: p.title,
                message: p.message,
                channel: p.channel,
                deliver_at: None,
            })
            .await?;
        encode_output(&json!({ "delivered": true, "channel": channel }))
    }
}

#[derive(Debug, Deserialize)]
struct ReminderParams {
    message: String,
    #[serde(default)]
    title: Option<String>,
    /// Epoch seconds.
    #[serde(default)]
    remind_at: Option<i64>,
    #[serde(default)]
    delay_secs: Option<u64>,
}

pub struct ScheduleReminder {
    notifier: Arc<dyn Notifier>,
}

impl ScheduleReminder {
    fn deliver_at(p: &ReminderParams) -> Result<DateTime<Utc>, HandlerError> {
        match (p.remind_at, p.delay_secs) {
            (Some(secs), _) => DateTime::from_timestamp(secs, 0).ok_or_else(|| {
                HandlerError::InvalidParameters(format!("remind_at {secs} is out of range"))
            }),
            (None, Some(delay)) => {
                let delay = chrono::Duration::try_seconds(delay as i64).ok_or_else(|| {
                    HandlerError::InvalidParameters(format!("delay_secs {delay} is out of range"))
                })?;
                Ok(Utc::now() + delay)
            }
            (None, None) => Err(HandlerError::InvalidParameters(
                "either remind_at or delay_secs is required".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ActionHandler for ScheduleReminder {
    async fn handle(&self, params: JsonMap, task: TaskRef) -> Result<JsonMap, HandlerError> {
        let p: ReminderParams = decode_params(params)?;
        let deliver_at = Self::deliver_at(&p)?;
        self.notifier
            .notify(Notification {
                task_id: task.id(),
                title: p.title,
                message: p.message,
                channel: None,
                deliver_at: Some(deliver_at),
            })
            .await?;
        encode_output(&json!({ "scheduled_for": deliver_at.to_rfc3339() }))
    }
}

// ========================================
// Local process
// ========================================

#[derive(Debug, Deserialize)]
struct CommandParams {
    program: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    cwd: Option<String>,
}

/// Runs a program directly (no shell) and captures its output.
pub struct SystemCommand;

#[async_trait]
impl ActionHandler for SystemCommand {
    async fn handle(&self, params: JsonMap, _task: TaskRef) -> Result<JsonMap, HandlerError> {
        let p: CommandParams = decode_params(params)?;
        let mut command = tokio::process::Command::new(&p.program);
        command.args(&p.args);
        if let Some(cwd) = &p.cwd {
            command.current_dir(cwd);
        }

        let output = command
            .output()
            .await
            .map_err(|e| HandlerError::Failed(format!("failed to spawn '{}': {e}", p.program)))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(HandlerError::Failed(format!(
                "'{}' exited with {}: {}",
                p.program,
                output.status,
                stderr.trim()
            )));
        }
        encode_output(&json!({
            "exit_code": output.status.code(),
            "stdout": stdout,
            "stderr": stderr,
        }))
    }
}
