//! Worker and subtask specification models for the orchestrator.

use std::collections::BTreeMap;

use baton_protocol::StageStatus;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A named unit of capability the execution engine can run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerSpec {
    /// Unique key within a registry.
    pub name: String,
    pub description: String,
    /// Tools the engine may use while running this worker, in order.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Capability tags used for lookup.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Opaque instructions handed to the engine as its system prompt.
    #[serde(alias = "prompt")]
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl WorkerSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tools: Vec::new(),
            capabilities: Vec::new(),
            system_prompt: system_prompt.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Sets the permitted tools. Repeated names keep their first position.
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = dedup(tools.into_iter().map(Into::into));
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = dedup(capabilities.into_iter().map(Into::into));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|capability| capability == tag)
    }

    /// Normalizes list fields after deserialization so tools and capabilities
    /// behave as ordered sets.
    pub(crate) fn normalized(mut self) -> Self {
        self.tools = dedup(std::mem::take(&mut self.tools));
        self.capabilities = dedup(std::mem::take(&mut self.capabilities));
        self
    }
}

fn dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// One unit of decomposed work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    /// Unique within one decomposition.
    pub id: String,
    /// Instructions for the assigned worker.
    pub description: String,
    /// Name (or capability tag) of the worker that runs this stage. Checked
    /// against the registry when the stage executes.
    pub worker: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Artifact names the stage is expected to write.
    #[serde(default)]
    pub expected_outputs: Vec<String>,
    #[serde(default)]
    pub status: StageStatus,
}

impl SubTask {
    pub fn new(
        id: impl Into<String>,
        worker: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            worker: worker.into(),
            dependencies: Vec::new(),
            expected_outputs: Vec::new(),
            status: StageStatus::Pending,
        }
    }

    /// Creates a subtask with a generated id.
    pub fn anonymous(worker: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), worker, description)
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(dependencies.into_iter().map(Into::into));
        self
    }

    pub fn expects<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_outputs
            .extend(outputs.into_iter().map(Into::into));
        self
    }
}
