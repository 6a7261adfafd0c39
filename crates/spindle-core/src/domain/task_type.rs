//! TaskType - workflow intent tag.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Informational tag describing what a workflow is for.
///
/// The engine never branches on it; it is carried through to handlers,
/// persistence and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    Workflow,
    Scheduled,
    Triggered,
    FileProcessing,
    WebAction,
    DataAnalysis,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskType::Workflow => "workflow",
            TaskType::Scheduled => "scheduled",
            TaskType::Triggered => "triggered",
            TaskType::FileProcessing => "file_processing",
            TaskType::WebAction => "web_action",
            TaskType::DataAnalysis => "data_analysis",
        };
        f.write_str(s)
    }
}
