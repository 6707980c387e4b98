//! Orchestrator settings and bulk worker loading.

use std::path::Path;
use std::path::PathBuf;

use baton_protocol::ExecutionPolicy;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::OrchestratorError;
use crate::error::Result;
use crate::registry::WorkerRegistry;
use crate::spec::WorkerSpec;

pub const DEFAULT_WORKSPACE_DIR: &str = "./orchestrator_workspace";

/// Tool name the engine uses to spawn a sub-worker.
pub const DEFAULT_SPAWN_CAPABILITY: &str = "Task";

const DEFAULT_COORDINATOR_SYSTEM_PROMPT: &str =
    "You are a flexible orchestrator that coordinates any registered agents.";

/// Settings for one [`crate::Orchestrator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Root of the shared artifact workspace. Created if absent.
    pub workspace_dir: PathBuf,
    /// Attach an activity attributor to every engine invocation.
    pub enable_tracking: bool,
    /// Tools permitted to the coordinator in single-invocation mode.
    pub coordinator_tools: Vec<String>,
    pub coordinator_system_prompt: String,
    /// Policy for single-invocation runs started with [`crate::Orchestrator::execute`].
    pub default_policy: ExecutionPolicy,
    /// Policy for each stage of a staged run.
    pub stage_policy: ExecutionPolicy,
    /// Artifact whose absence downgrades a run to `completed_no_report`.
    pub report_artifact: Option<String>,
    pub spawn_capability: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from(DEFAULT_WORKSPACE_DIR),
            enable_tracking: true,
            coordinator_tools: [
                "Read", "Write", "Task", "WebSearch", "WebFetch", "Bash", "Glob",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            coordinator_system_prompt: DEFAULT_COORDINATOR_SYSTEM_PROMPT.to_string(),
            default_policy: ExecutionPolicy::Plan,
            stage_policy: ExecutionPolicy::AutoApply,
            report_artifact: None,
            spawn_capability: DEFAULT_SPAWN_CAPABILITY.to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_tracking(mut self, enabled: bool) -> Self {
        self.enable_tracking = enabled;
        self
    }

    pub fn with_report_artifact(mut self, name: impl Into<String>) -> Self {
        self.report_artifact = Some(name.into());
        self
    }

    /// Reads settings from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents, &path.display().to_string())
    }

    pub fn from_toml_str(contents: &str, source_name: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|err| OrchestratorError::config_format(source_name, err))
    }
}

impl WorkerRegistry {
    /// Builds a registry from a `.json` or `.toml` worker file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut registry = Self::new();
        registry.register_from_file(path)?;
        Ok(registry)
    }

    /// Registers every worker described in `path`.
    ///
    /// JSON files hold either one worker object or a list of them. TOML files
    /// hold either a `[[workers]]` array of tables or a single worker table.
    pub fn register_from_file(&mut self, path: &Path) -> Result<usize> {
        let source_name = path.display().to_string();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let document = match extension.as_deref() {
            Some("json") => {
                let contents = std::fs::read_to_string(path)?;
                serde_json::from_str::<Value>(&contents)
                    .map_err(|err| OrchestratorError::config_format(&source_name, err))?
            }
            Some("toml") => {
                let contents = std::fs::read_to_string(path)?;
                toml_document(&contents, &source_name)?
            }
            other => {
                return Err(OrchestratorError::config_format(
                    &source_name,
                    format!(
                        "unsupported config file format: {}",
                        other.map(|ext| format!(".{ext}")).unwrap_or_else(|| "<none>".to_string())
                    ),
                ));
            }
        };

        let specs = worker_specs_from_value(document, &source_name)?;
        let count = specs.len();
        self.extend(specs);
        tracing::info!(source = %source_name, count, "Loaded workers from file");
        Ok(count)
    }
}

fn toml_document(contents: &str, source_name: &str) -> Result<Value> {
    let table: toml::Table =
        toml::from_str(contents).map_err(|err| OrchestratorError::config_format(source_name, err))?;
    let value = serde_json::to_value(table)
        .map_err(|err| OrchestratorError::config_format(source_name, err))?;

    // `[[workers]]` is the list form; anything else must be one worker table.
    match value {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("workers") => {
            Ok(map.remove("workers").unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

/// Accepts a single worker object or a list of worker objects.
pub fn worker_specs_from_value(document: Value, source_name: &str) -> Result<Vec<WorkerSpec>> {
    let entries = match document {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(OrchestratorError::config_format(
                source_name,
                format!(
                    "expected a worker object or a list of worker objects, found {}",
                    json_kind(&other)
                ),
            ));
        }
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            if !entry.is_object() {
                return Err(OrchestratorError::config_format(
                    source_name,
                    format!("entry {index} is {}, not a worker object", json_kind(&entry)),
                ));
            }
            serde_json::from_value::<WorkerSpec>(entry)
                .map(WorkerSpec::normalized)
                .map_err(|err| {
                    OrchestratorError::config_format(source_name, format!("entry {index}: {err}"))
                })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
