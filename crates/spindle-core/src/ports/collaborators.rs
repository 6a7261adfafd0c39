//! Collaborator ports - external services that built-in actions wrap.
//!
//! The engine does not implement any of these; each built-in handler makes
//! exactly one call through one of them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{JsonMap, TaskId};

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {message}")]
    Unavailable { service: String, message: String },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Text produced by the model orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub content: String,
    pub model_used: String,
}

/// Language-model request/response service.
#[async_trait]
pub trait ModelOrchestrator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        model_hint: Option<&str>,
        use_tools: bool,
    ) -> Result<Generation, CollaboratorError>;
}

/// Extracts or analyzes file content.
#[async_trait]
pub trait FileProcessor: Send + Sync {
    async fn process(
        &self,
        path: &str,
        operation: &str,
        params: &JsonMap,
    ) -> Result<JsonMap, CollaboratorError>;
}

/// Web search and outbound HTTP.
#[async_trait]
pub trait WebAutomation: Send + Sync {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<serde_json::Value>, CollaboratorError>;

    async fn request(
        &self,
        method: &str,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, CollaboratorError>;
}

/// A message for the notification sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub task_id: TaskId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Deliver later instead of now (reminders).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliver_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), CollaboratorError>;
}
