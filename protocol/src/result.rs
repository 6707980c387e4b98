//! Structured outcomes returned by an orchestration run.

use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

use crate::activity::ActivityRecord;
use crate::stage::StageOutput;
use crate::stage::StageReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// The run finished but the configured report artifact was never written.
    CompletedNoReport,
}

/// A file found in the workspace after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    /// Path relative to the workspace root, `/`-separated.
    pub path: String,
    /// Final path component.
    pub name: String,
    pub size_bytes: u64,
}

/// Result of a single-invocation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub task: String,
    pub workspace_root: String,
    pub output_files: Vec<OutputFile>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_timeline: Option<Vec<ActivityRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_calls: Option<usize>,
}

/// Result of a staged run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub status: RunStatus,
    pub workspace_root: String,
    pub stage_outputs: Vec<StageOutput>,
    pub stage_reports: Vec<StageReport>,
    pub output_files: Vec<OutputFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_timeline: Option<Vec<ActivityRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_calls: Option<usize>,
}

impl PipelineResult {
    /// Captured text for `stage`, if it ran.
    pub fn output_of(&self, stage: &str) -> Option<&str> {
        self.stage_outputs
            .iter()
            .find(|output| output.stage == stage)
            .map(|output| output.text.as_str())
    }
}
