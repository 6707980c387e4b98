//! Scripted execution engine for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;

use async_trait::async_trait;
use baton_orchestrator::EngineOptions;
use baton_orchestrator::EventStream;
use baton_orchestrator::ExecutionEngine;
use baton_protocol::EngineEvent;
use baton_protocol::protocol::AgentMessageEvent;
use baton_protocol::protocol::ErrorEvent;
use baton_protocol::protocol::ToolCallBeginEvent;
use baton_protocol::protocol::ToolCallEndEvent;
use futures::StreamExt;
use futures::stream;
use serde_json::Value;
use serde_json::json;

/// One thing the engine does while handling an invocation.
pub enum Step {
    /// Writes a file into the working directory when the invocation starts.
    Write { path: String, contents: String },
    Event(EngineEvent),
    /// Breaks the stream with an error item.
    Break(String),
}

/// Behaviour for one invocation.
pub enum Script {
    Steps(Vec<Step>),
    /// `invoke` itself fails.
    Reject(String),
}

/// An invocation the engine received.
#[derive(Debug, Clone)]
pub struct Call {
    pub prompt: String,
    pub options: EngineOptions,
}

/// Replays one script per invocation, in order. Invocations past the end of
/// the script list produce an empty stream.
#[derive(Default)]
pub struct ScriptedEngine {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedEngine {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ExecutionEngine for ScriptedEngine {
    async fn invoke(&self, prompt: String, options: EngineOptions) -> anyhow::Result<EventStream> {
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let working_dir = options.working_dir.clone();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Call { prompt, options });

        let steps = match script {
            Some(Script::Steps(steps)) => steps,
            Some(Script::Reject(message)) => anyhow::bail!(message),
            None => Vec::new(),
        };

        let mut items = Vec::new();
        for step in steps {
            match step {
                Step::Write { path, contents } => {
                    let target = working_dir.join(&path);
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(target, contents)?;
                }
                Step::Event(event) => items.push(Ok(event)),
                Step::Break(message) => items.push(Err(anyhow::anyhow!(message))),
            }
        }
        Ok(stream::iter(items).boxed())
    }
}

pub fn write(path: &str, contents: &str) -> Step {
    Step::Write {
        path: path.to_string(),
        contents: contents.to_string(),
    }
}

pub fn begin(tool: &str, call_id: &str, parent: Option<&str>, input: Value) -> Step {
    Step::Event(EngineEvent::ToolCallBegin(ToolCallBeginEvent {
        tool_name: tool.to_string(),
        call_id: call_id.to_string(),
        parent_call_id: parent.map(str::to_string),
        input,
    }))
}

pub fn end(tool: &str, call_id: &str, parent: Option<&str>) -> Step {
    Step::Event(EngineEvent::ToolCallEnd(ToolCallEndEvent {
        tool_name: tool.to_string(),
        call_id: call_id.to_string(),
        parent_call_id: parent.map(str::to_string),
        output: json!("ok"),
    }))
}

pub fn message(text: &str) -> Step {
    Step::Event(EngineEvent::AgentMessage(AgentMessageEvent {
        text: text.to_string(),
    }))
}

pub fn engine_error(text: &str) -> Step {
    Step::Event(EngineEvent::Error(ErrorEvent {
        message: text.to_string(),
    }))
}

/// A spawn call for a sub-worker of type `kind`.
pub fn spawn(call_id: &str, kind: &str) -> Step {
    begin(
        "Task",
        call_id,
        None,
        json!({"subagent_type": kind, "prompt": format!("act as {kind}")}),
    )
}
