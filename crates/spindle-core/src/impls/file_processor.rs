//! LocalFileProcessor - file operations on the local filesystem.
//!
//! Operations: `read`, `stat`, `analyze`, `write`, `delete`. With a root
//! directory, paths are resolved relative to it and may not escape it.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::domain::JsonMap;
use crate::ports::{CollaboratorError, FileProcessor};

#[derive(Debug, Clone, Default)]
pub struct LocalFileProcessor {
    root: Option<PathBuf>,
}

impl LocalFileProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Confine every path to `root`.
    pub fn within(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, CollaboratorError> {
        let requested = Path::new(path);
        let Some(root) = &self.root else {
            return Ok(requested.to_path_buf());
        };
        let escapes = requested
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(CollaboratorError::Rejected(format!(
                "path '{path}' is outside {}",
                root.display()
            )));
        }
        Ok(root.join(requested))
    }
}

fn output(value: serde_json::Value) -> JsonMap {
    match value {
        serde_json::Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

#[async_trait]
impl FileProcessor for LocalFileProcessor {
    async fn process(
        &self,
        path: &str,
        operation: &str,
        params: &JsonMap,
    ) -> Result<JsonMap, CollaboratorError> {
        let resolved = self.resolve(path)?;
        match operation {
            "read" => {
                let content = tokio::fs::read_to_string(&resolved).await?;
                Ok(output(json!({
                    "path": path,
                    "size": content.len(),
                    "content": content,
                })))
            }
            "stat" => {
                let meta = tokio::fs::metadata(&resolved).await?;
                let modified = meta.modified().ok().map(|t| DateTime::<Utc>::from(t).to_rfc3339());
                Ok(output(json!({
                    "path": path,
                    "size": meta.len(),
                    "is_file": meta.is_file(),
                    "is_dir": meta.is_dir(),
                    "modified": modified,
                })))
            }
            "analyze" => {
                let content = tokio::fs::read_to_string(&resolved).await?;
                let extension = resolved.extension().and_then(|e| e.to_str()).map(str::to_string);
                Ok(output(json!({
                    "path": path,
                    "extension": extension,
                    "size": content.len(),
                    "lines": content.lines().count(),
                    "words": content.split_whitespace().count(),
                    "chars": content.chars().count(),
                })))
            }
            "write" => {
                let content = params
                    .get("content")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CollaboratorError::Rejected("write needs a 'content' string".into()))?;
                let append = params.get("append").and_then(|v| v.as_bool()).unwrap_or(false);
                if let Some(parent) = resolved.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                if append {
                    use tokio::io::AsyncWriteExt;
                    let mut file = tokio::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&resolved)
                        .await?;
                    file.write_all(content.as_bytes()).await?;
                    file.flush().await?;
                } else {
                    tokio::fs::write(&resolved, content).await?;
                }
                Ok(output(json!({
                    "path": path,
                    "bytes_written": content.len(),
                    "appended": append,
                })))
            }
            "delete" => {
                tokio::fs::remove_file(&resolved).await?;
                Ok(output(json!({ "path": path, "deleted": true })))
            }
            other => Err(CollaboratorError::Rejected(format!(
                "unsupported file operation '{other}'"
            ))),
        }
    }
}
