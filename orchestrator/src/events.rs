//! Consumption of an engine's event stream.

use baton_protocol::EngineEvent;
use baton_protocol::protocol::ToolCallBeginEvent;
use baton_protocol::protocol::ToolCallEndEvent;
use futures::StreamExt;

use crate::engine::EventStream;
use crate::error::OrchestratorError;
use crate::error::Result;

/// Receives the enter/exit hooks of every tool call in an invocation.
pub trait CallObserver: Send {
    fn on_enter(&mut self, event: &ToolCallBeginEvent);
    fn on_exit(&mut self, event: &ToolCallEndEvent);
}

/// What the consumer loop collected from one engine invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Assistant text blocks in arrival order.
    pub messages: Vec<String>,
    pub tool_calls: usize,
}

impl Transcript {
    /// Text blocks joined with newlines.
    pub fn text(&self) -> String {
        self.messages.join("\n")
    }
}

/// Drives `stream` to completion, forwarding tool-call hooks to `observer`.
///
/// An engine-reported error, or an error item from the stream itself, ends
/// the invocation with [`OrchestratorError::StageExecution`] naming
/// `invocation`.
pub async fn drain(
    invocation: &str,
    mut stream: EventStream,
    mut observer: Option<&mut dyn CallObserver>,
) -> Result<Transcript> {
    let mut transcript = Transcript::default();

    while let Some(item) = stream.next().await {
        let event = item.map_err(|err| {
            OrchestratorError::stage_execution(
                invocation,
                format!("event stream terminated abnormally: {err:#}"),
            )
        })?;

        match event {
            EngineEvent::ToolCallBegin(begin) => {
                transcript.tool_calls += 1;
                tracing::trace!(
                    invocation,
                    tool = %begin.tool_name,
                    call_id = %begin.call_id,
                    "Tool call begin"
                );
                if let Some(observer) = observer.as_deref_mut() {
                    observer.on_enter(&begin);
                }
            }
            EngineEvent::ToolCallEnd(end) => {
                if let Some(observer) = observer.as_deref_mut() {
                    observer.on_exit(&end);
                }
            }
            EngineEvent::AgentMessage(message) => {
                tracing::debug!(invocation, chars = message.text.len(), "Agent message");
                transcript.messages.push(message.text);
            }
            EngineEvent::Error(error) => {
                return Err(OrchestratorError::stage_execution(
                    invocation,
                    format!("engine reported an error: {}", error.message),
                ));
            }
        }
    }

    Ok(transcript)
}
