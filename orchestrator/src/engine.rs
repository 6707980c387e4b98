//! Boundary to the external execution engine.

use std::path::PathBuf;

use async_trait::async_trait;
use baton_protocol::EngineEvent;
use baton_protocol::ExecutionPolicy;
use futures::stream::BoxStream;

/// Events of one invocation. An `Err` item means the stream broke.
pub type EventStream = BoxStream<'static, anyhow::Result<EngineEvent>>;

/// Options for a single engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Directory the engine treats as its working directory; this is the
    /// artifact workspace root.
    pub working_dir: PathBuf,
    /// The only tools the engine may call during this invocation.
    pub permitted_tools: Vec<String>,
    pub policy: ExecutionPolicy,
    pub system_prompt: String,
}

/// Runs a prompt and reports what happened as a stream of events.
///
/// Implementations perform their own side effects (writing artifacts into
/// `working_dir`); the orchestrator only observes the stream.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn invoke(&self, prompt: String, options: EngineOptions) -> anyhow::Result<EventStream>;
}
