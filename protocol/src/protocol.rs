//! Events exchanged with an execution engine.
//!
//! An engine invocation produces a flat stream of [`EngineEvent`]s. Tool
//! calls are identified only by an opaque `call_id` and, when a call was
//! issued from inside a spawned sub-worker, by the `parent_call_id` of the
//! spawn call that owns it.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use strum_macros::Display;

/// How the engine should treat side-effecting calls. Passed through to the
/// engine verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ExecutionPolicy {
    /// Decompose and present a plan before any side-effecting call fires.
    #[default]
    Plan,
    /// Execute immediately.
    #[serde(alias = "acceptEdits")]
    AutoApply,
    /// Whatever the engine does by default.
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A tool call is about to run.
    ToolCallBegin(ToolCallBeginEvent),

    /// A tool call finished.
    ToolCallEnd(ToolCallEndEvent),

    /// A block of assistant text.
    AgentMessage(AgentMessageEvent),

    /// The engine reported a failure. No further events follow.
    Error(ErrorEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallBeginEvent {
    pub tool_name: String,
    pub call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_call_id: Option<String>,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallEndEvent {
    pub tool_name: String,
    pub call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_call_id: Option<String>,
    #[serde(default)]
    pub output: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessageEvent {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
}
