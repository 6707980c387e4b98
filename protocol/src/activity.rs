use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// One tool call, attributed to the worker logically responsible for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Coordinator label or a synthesized per-spawn label.
    pub agent: String,
    pub tool_name: String,
    pub call_id: String,
    pub timestamp: DateTime<Utc>,
    pub input: Value,
    /// Set once, when the matching call ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// `None` means the call was issued directly by the coordinator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_call_id: Option<String>,
}

impl ActivityRecord {
    pub fn is_open(&self) -> bool {
        self.output.is_none()
    }

    pub fn is_root(&self) -> bool {
        self.parent_call_id.is_none()
    }
}
