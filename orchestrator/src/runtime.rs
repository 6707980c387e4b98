//! Core orchestrator runtime.

use std::sync::Arc;

use baton_protocol::ExecutionPolicy;
use baton_protocol::OrchestrationResult;
use baton_protocol::OutputFile;
use baton_protocol::PipelineResult;
use baton_protocol::RunStatus;
use baton_protocol::StageOutput;
use tracing::Instrument;
use uuid::Uuid;

use crate::attributor::ActivityAttributor;
use crate::config::OrchestratorConfig;
use crate::engine::EngineOptions;
use crate::engine::ExecutionEngine;
use crate::error::OrchestratorError;
use crate::error::Result;
use crate::events::CallObserver;
use crate::events::Transcript;
use crate::events::drain;
use crate::graph::StageGraph;
use crate::prompts::DEFAULT_REPORT_ARTIFACT;
use crate::prompts::coordinator_prompt;
use crate::prompts::stage_prompt;
use crate::registry::WorkerRegistry;
use crate::selector::WorkerSelector;
use crate::spec::SubTask;
use crate::validation::ResultAggregator;
use crate::validation::stage_report;
use crate::validation::validate_outputs;
use crate::workspace::ArtifactWorkspace;

/// Invocation name used in errors raised by a single-invocation run.
pub const COORDINATOR_INVOCATION: &str = "coordinator";

/// Drives the execution engine over registered workers.
pub struct Orchestrator {
    /// Workers available to every run
    registry: WorkerRegistry,

    /// Engine that runs prompts
    engine: Arc<dyn ExecutionEngine>,

    /// Shared artifact namespace
    workspace: ArtifactWorkspace,

    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Creates an orchestrator, creating the workspace directory if absent.
    pub fn new(
        registry: WorkerRegistry,
        engine: Arc<dyn ExecutionEngine>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let workspace = ArtifactWorkspace::create(&config.workspace_dir)?;
        tracing::info!(
            workspace = %workspace.root().display(),
            workers = registry.len(),
            "Orchestrator ready"
        );
        Ok(Self {
            registry,
            engine,
            workspace,
            config,
        })
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Mutable access for registering workers between runs.
    pub fn registry_mut(&mut self) -> &mut WorkerRegistry {
        &mut self.registry
    }

    pub fn workspace(&self) -> &ArtifactWorkspace {
        &self.workspace
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs `task` through one coordinator invocation using the configured
    /// default policy.
    pub async fn execute(&self, task: &str) -> Result<OrchestrationResult> {
        self.execute_with_policy(task, self.config.default_policy)
            .await
    }

    /// Runs `task` through one coordinator invocation. The coordinator
    /// decomposes the task and spawns workers itself; this method observes
    /// the resulting event stream and collects the artifacts.
    pub async fn execute_with_policy(
        &self,
        task: &str,
        policy: ExecutionPolicy,
    ) -> Result<OrchestrationResult> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("orchestration", run_id = %run_id, %policy);
        self.run_single(task, policy).instrument(span).await
    }

    async fn run_single(&self, task: &str, policy: ExecutionPolicy) -> Result<OrchestrationResult> {
        let mut attributor = ActivityAttributor::new(&self.config.spawn_capability);
        let report_artifact = self
            .config
            .report_artifact
            .as_deref()
            .unwrap_or(DEFAULT_REPORT_ARTIFACT);

        let prompt = coordinator_prompt(
            &self.registry,
            task,
            &self.config.spawn_capability,
            report_artifact,
        );
        let options = EngineOptions {
            working_dir: self.workspace.root().to_path_buf(),
            permitted_tools: self.config.coordinator_tools.clone(),
            policy,
            system_prompt: self.config.coordinator_system_prompt.clone(),
        };

        tracing::info!(workers = self.registry.len(), "Starting orchestration");
        let transcript = self
            .invoke(
                COORDINATOR_INVOCATION,
                prompt,
                options,
                observer(&mut attributor, self.config.enable_tracking),
            )
            .await?;

        let output_files = self.scan(ArtifactWorkspace::list_files).await?;
        let status = match &self.config.report_artifact {
            Some(name) if !self.workspace.exists(name) => {
                tracing::warn!(report = %name, "Run finished without writing its report");
                RunStatus::CompletedNoReport
            }
            _ => RunStatus::Completed,
        };

        tracing::info!(
            status = %status,
            files = output_files.len(),
            tool_calls = transcript.tool_calls,
            "Orchestration finished"
        );
        if self.config.enable_tracking {
            tracing::debug!("{}", attributor.summary());
        }

        let (activity_timeline, total_calls) = self.timeline(attributor);
        Ok(OrchestrationResult {
            task: task.to_string(),
            workspace_root: self.workspace.root().display().to_string(),
            output_files,
            status,
            activity_timeline,
            total_calls,
        })
    }

    /// Runs `stages` in dependency order, one engine invocation per stage.
    ///
    /// The whole graph is checked (duplicates, cycles, unknown
    /// dependencies) before the engine is called. A failing stage aborts the
    /// run; artifacts written so far stay in the workspace.
    pub async fn execute_pipeline(&self, stages: Vec<SubTask>) -> Result<PipelineResult> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline", run_id = %run_id, stages = stages.len());
        self.run_pipeline(stages).instrument(span).await
    }

    async fn run_pipeline(&self, stages: Vec<SubTask>) -> Result<PipelineResult> {
        let mut graph = StageGraph::from_stages(stages)?;
        let levels = graph.resolve_order()?;

        let selector = WorkerSelector::new(&self.registry);
        let mut attributor = ActivityAttributor::new(&self.config.spawn_capability);
        let mut aggregator = ResultAggregator::new();
        let mut stage_outputs = Vec::with_capacity(graph.len());
        let mut stage_reports = Vec::with_capacity(graph.len());

        for (depth, level) in levels.iter().enumerate() {
            tracing::debug!(level = depth, stages = ?level, "Entering level");
            for stage_id in level {
                graph.start(stage_id)?;
                let stage = graph
                    .get(stage_id)
                    .ok_or_else(|| OrchestratorError::UnknownStage(stage_id.clone()))?;
                let dependency_outputs = graph.dependency_outputs(stage_id)?;
                let prompt = stage_prompt(&stage.description, &dependency_outputs);
                let (worker, selection) = selector.select(&stage.worker);

                tracing::info!(
                    stage = %stage_id,
                    worker = %worker.name,
                    selection = ?selection,
                    injected = dependency_outputs.len(),
                    "Starting stage"
                );

                let options = EngineOptions {
                    working_dir: self.workspace.root().to_path_buf(),
                    permitted_tools: worker.tools.clone(),
                    policy: self.config.stage_policy,
                    system_prompt: worker.system_prompt.clone(),
                };
                let outcome = self
                    .invoke(
                        stage_id,
                        prompt,
                        options,
                        observer(&mut attributor, self.config.enable_tracking),
                    )
                    .await;

                let transcript = match outcome {
                    Ok(transcript) => transcript,
                    Err(err) => {
                        graph.fail(stage_id)?;
                        tracing::error!(stage = %stage_id, error = %err, "Stage failed");
                        return Err(err);
                    }
                };

                let text = transcript.text();
                graph.complete(stage_id, text.clone())?;
                tracing::info!(
                    stage = %stage_id,
                    tool_calls = transcript.tool_calls,
                    "Stage completed"
                );

                let finished = graph
                    .get(stage_id)
                    .ok_or_else(|| OrchestratorError::UnknownStage(stage_id.clone()))?;
                let validation = validate_outputs(finished, &self.workspace);
                if !validation.is_valid() {
                    tracing::warn!(
                        stage = %stage_id,
                        missing = ?validation.missing,
                        malformed = ?validation.malformed,
                        "Stage outputs incomplete"
                    );
                }
                stage_reports.push(stage_report(finished, &worker.name, &validation));
                aggregator.add_result(stage_id.clone(), validation);
                stage_outputs.push(StageOutput {
                    stage: stage_id.clone(),
                    text,
                });
            }
        }

        let summary = aggregator.summary();
        let output_files = self.scan(ArtifactWorkspace::list_files).await?;
        tracing::info!(
            stages = summary.total_stages,
            valid_stages = summary.valid_stages,
            valid_outputs = summary.valid_outputs,
            expected_outputs = summary.total_outputs,
            files = output_files.len(),
            "Pipeline finished"
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            let chain = self.scan(ArtifactWorkspace::artifact_chain).await?;
            let chain: Vec<&str> = chain.iter().map(|file| file.path.as_str()).collect();
            tracing::debug!(chain = %chain.join(" -> "), "Artifact chain");
        }

        let (activity_timeline, total_calls) = self.timeline(attributor);
        Ok(PipelineResult {
            status: RunStatus::Completed,
            workspace_root: self.workspace.root().display().to_string(),
            stage_outputs,
            stage_reports,
            output_files,
            activity_timeline,
            total_calls,
        })
    }

    async fn invoke(
        &self,
        invocation: &str,
        prompt: String,
        options: EngineOptions,
        observer: Option<&mut dyn CallObserver>,
    ) -> Result<Transcript> {
        let stream = self.engine.invoke(prompt, options).await.map_err(|err| {
            OrchestratorError::stage_execution(invocation, format!("engine invocation failed: {err:#}"))
        })?;
        drain(invocation, stream, observer).await
    }

    /// Runs a workspace listing off the async executor.
    async fn scan<F>(&self, scan: F) -> Result<Vec<OutputFile>>
    where
        F: FnOnce(&ArtifactWorkspace) -> std::io::Result<Vec<OutputFile>> + Send + 'static,
    {
        let workspace = self.workspace.clone();
        let files = tokio::task::spawn_blocking(move || scan(&workspace))
            .await
            .map_err(std::io::Error::other)??;
        Ok(files)
    }

    fn timeline(
        &self,
        attributor: ActivityAttributor,
    ) -> (Option<Vec<baton_protocol::ActivityRecord>>, Option<usize>) {
        if !self.config.enable_tracking {
            return (None, None);
        }
        let total_calls = attributor.total_calls();
        (Some(attributor.into_timeline()), Some(total_calls))
    }
}

fn observer(attributor: &mut ActivityAttributor, enabled: bool) -> Option<&mut dyn CallObserver> {
    if enabled {
        Some(attributor as &mut dyn CallObserver)
    } else {
        None
    }
}
