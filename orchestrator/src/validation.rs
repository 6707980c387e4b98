//! Expected-output validation and result aggregation.

use std::path::Path;

use baton_protocol::StageReport;

use crate::spec::SubTask;
use crate::workspace::ArtifactWorkspace;

/// Result of checking a stage's expected artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub all_present: bool,
    pub valid_count: usize,
    pub total_count: usize,
    pub missing: Vec<String>,
    pub malformed: Vec<String>,
}

impl ValidationResult {
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            return 1.0;
        }
        self.valid_count as f64 / self.total_count as f64
    }

    pub fn is_valid(&self) -> bool {
        self.all_present && self.malformed.is_empty()
    }
}

/// Checks that every expected output of `stage` exists in `workspace` and is
/// well formed for its extension: `.json` and `.toml` must parse, text
/// formats must be non-blank, anything else must be non-empty.
pub fn validate_outputs(stage: &SubTask, workspace: &ArtifactWorkspace) -> ValidationResult {
    let mut missing = Vec::new();
    let mut malformed = Vec::new();

    for name in &stage.expected_outputs {
        if !workspace.exists(name) {
            missing.push(name.clone());
            continue;
        }
        match check_artifact(workspace, name) {
            Ok(true) => {}
            Ok(false) => malformed.push(name.clone()),
            Err(err) => {
                tracing::debug!(artifact = %name, error = %err, "Unreadable artifact");
                malformed.push(name.clone());
            }
        }
    }

    let total_count = stage.expected_outputs.len();
    ValidationResult {
        all_present: missing.is_empty(),
        valid_count: total_count - missing.len() - malformed.len(),
        total_count,
        missing,
        malformed,
    }
}

/// Extensions checked as UTF-8 text. Anything else not parsed as a
/// structured format is treated as opaque bytes.
const TEXT_EXTENSIONS: &[&str] = &[
    "md", "markdown", "txt", "csv", "tsv", "html", "htm", "xml", "yaml", "yml", "log",
];

fn check_artifact(workspace: &ArtifactWorkspace, name: &str) -> std::io::Result<bool> {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let well_formed = match extension.as_deref() {
        Some("json") => {
            serde_json::from_str::<serde_json::Value>(&workspace.read_text(name)?).is_ok()
        }
        Some("toml") => toml::from_str::<toml::Table>(&workspace.read_text(name)?).is_ok(),
        Some(ext) if TEXT_EXTENSIONS.contains(&ext) => {
            !workspace.read_text(name)?.trim().is_empty()
        }
        _ => workspace.stat(name)? > 0,
    };
    Ok(well_formed)
}

/// Collects per-stage validation for one run.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Vec<(String, ValidationResult)>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, stage: String, result: ValidationResult) {
        self.results.push((stage, result));
    }

    pub fn results(&self) -> &[(String, ValidationResult)] {
        &self.results
    }

    pub fn summary(&self) -> AggregateSummary {
        let total_stages = self.results.len();
        let valid_stages = self.results.iter().filter(|(_, r)| r.is_valid()).count();

        let total_outputs: usize = self.results.iter().map(|(_, r)| r.total_count).sum();
        let valid_outputs: usize = self.results.iter().map(|(_, r)| r.valid_count).sum();

        AggregateSummary {
            total_stages,
            valid_stages,
            total_outputs,
            valid_outputs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSummary {
    pub total_stages: usize,
    pub valid_stages: usize,
    pub total_outputs: usize,
    pub valid_outputs: usize,
}

impl AggregateSummary {
    pub fn output_success_rate(&self) -> f64 {
        if self.total_outputs == 0 {
            return 1.0;
        }
        self.valid_outputs as f64 / self.total_outputs as f64
    }

    pub fn stage_success_rate(&self) -> f64 {
        if self.total_stages == 0 {
            return 1.0;
        }
        self.valid_stages as f64 / self.total_stages as f64
    }
}

/// Builds the report for a finished stage.
pub fn stage_report(stage: &SubTask, worker: &str, validation: &ValidationResult) -> StageReport {
    StageReport {
        stage: stage.id.clone(),
        worker: worker.to_string(),
        status: stage.status,
        expected_outputs: stage.expected_outputs.clone(),
        missing_outputs: validation.missing.clone(),
        malformed_outputs: validation.malformed.clone(),
    }
}
