//! Integration tests for the orchestrator.

mod common;

use std::sync::Arc;

use baton_orchestrator::Orchestrator;
use baton_orchestrator::OrchestratorConfig;
use baton_orchestrator::OrchestratorError;
use baton_orchestrator::SubTask;
use baton_orchestrator::WorkerRegistry;
use baton_orchestrator::WorkerSpec;
use baton_orchestrator::attributor::COORDINATOR_LABEL;
use baton_protocol::ExecutionPolicy;
use baton_protocol::OutputFile;
use baton_protocol::RunStatus;
use baton_protocol::StageStatus;
use common::Script;
use common::ScriptedEngine;
use common::begin;
use common::end;
use common::engine_error;
use common::message;
use common::spawn;
use common::write;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use tracing_test::traced_test;

fn echo_registry() -> WorkerRegistry {
    let mut registry = WorkerRegistry::new();
    registry.register(
        WorkerSpec::new("echo", "Echoes its input", "Repeat what you read.")
            .with_tools(["Read", "Write"])
            .with_capabilities(["io"]),
    );
    registry.register(
        WorkerSpec::new("writer", "Writes reports", "Write clearly.")
            .with_tools(["Read", "Write", "Edit"])
            .with_capabilities(["writing"]),
    );
    registry
}

fn orchestrator(
    dir: &TempDir,
    registry: WorkerRegistry,
    scripts: Vec<Script>,
    config: impl FnOnce(OrchestratorConfig) -> OrchestratorConfig,
) -> anyhow::Result<(Orchestrator, Arc<ScriptedEngine>)> {
    let engine = Arc::new(ScriptedEngine::new(scripts));
    let config = config(OrchestratorConfig::new(dir.path().join("workspace")));
    let orchestrator = Orchestrator::new(registry, engine.clone(), config)?;
    Ok((orchestrator, engine))
}

fn file(path: &str, size_bytes: u64) -> OutputFile {
    OutputFile {
        path: path.to_string(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        size_bytes,
    }
}

#[tokio::test]
async fn test_single_invocation_collects_written_files() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let scripts = vec![Script::Steps(vec![
        write("report.md", "# Report\n"),
        write("data.json", r#"{"ok":true}"#),
        begin("Write", "c1", None, json!({"file_path": "report.md"})),
        end("Write", "c1", None),
        begin("Write", "c2", None, json!({"file_path": "data.json"})),
        end("Write", "c2", None),
        message("Saved both files."),
    ])];
    let (orchestrator, engine) = orchestrator(&dir, echo_registry(), scripts, |c| c)?;

    let result = orchestrator.execute("Summarize the quarter").await?;

    assert_eq!(result.task, "Summarize the quarter");
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(
        result.output_files,
        vec![file("data.json", 11), file("report.md", 9)]
    );
    assert_eq!(result.total_calls, Some(2));
    let timeline = result.activity_timeline.unwrap_or_default();
    assert!(timeline.iter().all(|r| r.agent == COORDINATOR_LABEL));
    assert!(timeline.iter().all(|r| r.output == Some(json!("ok"))));

    let calls = engine.calls();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert!(call.prompt.contains("Summarize the quarter"));
    assert!(call.prompt.contains(&orchestrator.registry().render_context()));
    assert_eq!(call.options.policy, ExecutionPolicy::Plan);
    assert_eq!(call.options.permitted_tools, orchestrator.config().coordinator_tools);
    assert_eq!(call.options.working_dir, orchestrator.workspace().root());
    Ok(())
}

#[tokio::test]
async fn test_interleaved_sub_workers_are_attributed_by_call_id() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let scripts = vec![Script::Steps(vec![
        spawn("t1", "web-researcher"),
        spawn("t2", "data-analyst"),
        begin("WebSearch", "s1", Some("t1"), json!({"query": "ai trends"})),
        begin("Write", "w1", Some("t2"), json!({"file_path": "analysis.json"})),
        end("Write", "w1", Some("t2")),
        end("WebSearch", "s1", Some("t1")),
        end("Task", "t2", None),
        end("Task", "t1", None),
    ])];
    let (orchestrator, _engine) = orchestrator(&dir, echo_registry(), scripts, |c| c)?;

    let result = orchestrator
        .execute_with_policy("Research and analyze", ExecutionPolicy::AutoApply)
        .await?;

    let timeline = result.activity_timeline.unwrap_or_default();
    let agents: Vec<(&str, &str)> = timeline
        .iter()
        .map(|r| (r.call_id.as_str(), r.agent.as_str()))
        .collect();
    assert_eq!(
        agents,
        vec![
            ("t1", COORDINATOR_LABEL),
            ("t2", COORDINATOR_LABEL),
            ("s1", "WEB-RESEARCHER-1"),
            ("w1", "DATA-ANALYST-2"),
        ]
    );
    assert_eq!(timeline.iter().filter(|r| r.is_root()).count(), 2);
    assert!(timeline.iter().all(|r| !r.is_open()));
    Ok(())
}

#[tokio::test]
async fn test_policy_is_passed_through() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let (orchestrator, engine) = orchestrator(&dir, echo_registry(), Vec::new(), |c| c)?;

    orchestrator
        .execute_with_policy("anything", ExecutionPolicy::Default)
        .await?;

    assert_eq!(engine.calls()[0].options.policy, ExecutionPolicy::Default);
    Ok(())
}

#[tokio::test]
async fn test_missing_report_is_flagged() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let scripts = vec![Script::Steps(vec![write("notes.md", "draft")])];
    let (orchestrator, engine) = orchestrator(&dir, echo_registry(), scripts, |c| {
        c.with_report_artifact("report.md")
    })?;

    let result = orchestrator.execute("Write a report").await?;

    assert_eq!(result.status, RunStatus::CompletedNoReport);
    assert_eq!(result.output_files, vec![file("notes.md", 5)]);
    assert!(engine.calls()[0].prompt.contains("report.md"));
    Ok(())
}

#[tokio::test]
async fn test_tracking_disabled_omits_timeline() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let scripts = vec![Script::Steps(vec![
        begin("Read", "r1", None, json!({"path": "x"})),
        end("Read", "r1", None),
    ])];
    let (orchestrator, _engine) =
        orchestrator(&dir, echo_registry(), scripts, |c| c.with_tracking(false))?;

    let result = orchestrator.execute("Read x").await?;

    assert_eq!(result.activity_timeline, None);
    assert_eq!(result.total_calls, None);
    Ok(())
}

#[tokio::test]
async fn test_engine_error_event_fails_the_run() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let scripts = vec![Script::Steps(vec![
        write("partial.md", "half"),
        engine_error("rate limited"),
    ])];
    let (orchestrator, _engine) = orchestrator(&dir, echo_registry(), scripts, |c| c)?;

    let err = orchestrator.execute("Do it").await.err();

    assert!(matches!(
        err,
        Some(OrchestratorError::StageExecution { ref stage, ref message })
            if stage == "coordinator" && message.contains("rate limited")
    ));
    assert!(orchestrator.workspace().exists("partial.md"));
    Ok(())
}

#[tokio::test]
async fn test_rejected_invocation_is_a_stage_execution_error() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let scripts = vec![Script::Reject("engine unavailable".to_string())];
    let (orchestrator, _engine) = orchestrator(&dir, echo_registry(), scripts, |c| c)?;

    let err = orchestrator.execute("Do it").await.err();

    assert!(matches!(
        err,
        Some(OrchestratorError::StageExecution { ref message, .. })
            if message.contains("engine unavailable")
    ));
    Ok(())
}

#[tokio::test]
async fn test_pipeline_injects_outputs_and_restricts_tools() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let scripts = vec![
        Script::Steps(vec![write("companies.md", "# Acme\n"), message("X")]),
        Script::Steps(vec![
            write("analysis.json", r#"{"count":1}"#),
            message("Y"),
            message("Z"),
        ]),
        Script::Steps(vec![write("report.md", "done"), message("final")]),
    ];
    let (orchestrator, engine) = orchestrator(&dir, echo_registry(), scripts, |c| c)?;

    let stages = vec![
        SubTask::new("report", "writing", "Write the report.")
            .depends_on(["analyze"])
            .expects(["report.md"]),
        SubTask::new("collect", "echo", "Collect companies.").expects(["companies.md"]),
        SubTask::new("analyze", "echo", "Analyze.")
            .depends_on(["collect"])
            .expects(["analysis.json"]),
    ];
    let result = orchestrator.execute_pipeline(stages).await?;

    let calls = engine.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].prompt, "Collect companies.");
    assert_eq!(
        calls[1].prompt,
        "Analyze.\n\nPREVIOUS STAGE OUTPUTS:\n\n[collect]:\nX\n"
    );
    assert_eq!(
        calls[2].prompt,
        "Write the report.\n\nPREVIOUS STAGE OUTPUTS:\n\n[analyze]:\nY\nZ\n"
    );
    assert_eq!(calls[0].options.permitted_tools, vec!["Read", "Write"]);
    assert_eq!(calls[2].options.permitted_tools, vec!["Read", "Write", "Edit"]);
    assert_eq!(calls[2].options.system_prompt, "Write clearly.");
    assert!(
        calls
            .iter()
            .all(|call| call.options.policy == ExecutionPolicy::AutoApply)
    );

    assert_eq!(result.status, RunStatus::Completed);
    let order: Vec<&str> = result.stage_outputs.iter().map(|o| o.stage.as_str()).collect();
    assert_eq!(order, vec!["collect", "analyze", "report"]);
    assert_eq!(result.output_of("analyze"), Some("Y\nZ"));
    assert!(result.stage_reports.iter().all(|r| r.status == StageStatus::Completed));
    assert!(result.stage_reports.iter().all(|r| r.missing_outputs.is_empty()));
    assert_eq!(result.stage_reports[2].worker, "writer");
    assert_eq!(
        result.output_files,
        vec![
            file("analysis.json", 11),
            file("companies.md", 7),
            file("report.md", 4),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_pipeline_labels_each_dependency_output() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let scripts = vec![
        Script::Steps(vec![message("AI adoption is rising")]),
        Script::Steps(vec![message("Acme, Globex")]),
        Script::Steps(vec![message("merged")]),
    ];
    let (orchestrator, engine) = orchestrator(&dir, echo_registry(), scripts, |c| c)?;

    let stages = vec![
        SubTask::new("trends", "echo", "Find trends."),
        SubTask::new("companies", "echo", "Find companies."),
        SubTask::new("merge", "writer", "Merge both.").depends_on(["trends", "companies"]),
    ];
    orchestrator.execute_pipeline(stages).await?;

    assert_eq!(
        engine.calls()[2].prompt,
        "Merge both.\n\nPREVIOUS STAGE OUTPUTS:\n\n\
         [trends]:\nAI adoption is rising\n\n\
         [companies]:\nAcme, Globex\n"
    );
    Ok(())
}

#[tokio::test]
async fn test_pipeline_accepts_binary_outputs() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let scripts = vec![Script::Steps(vec![message("plotted")])];
    let (orchestrator, _engine) = orchestrator(&dir, echo_registry(), scripts, |c| c)?;
    std::fs::write(
        orchestrator.workspace().path_of("chart.png"),
        [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0xff],
    )?;

    let stages = vec![SubTask::new("plot", "echo", "Plot.").expects(["chart.png"])];
    let result = orchestrator.execute_pipeline(stages).await?;

    assert!(result.stage_reports[0].malformed_outputs.is_empty());
    assert!(result.stage_reports[0].missing_outputs.is_empty());
    Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_pipeline_logs_artifact_chain_in_write_order() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let scripts = vec![
        Script::Steps(vec![write("z_trends.md", "trends"), message("T")]),
        Script::Steps(vec![write("a_summary.md", "summary"), message("S")]),
    ];
    let (orchestrator, _engine) = orchestrator(&dir, echo_registry(), scripts, |c| c)?;
    let base = std::time::SystemTime::now();

    let stages = vec![
        SubTask::new("trends", "echo", "Trends."),
        SubTask::new("summary", "echo", "Summarize.").depends_on(["trends"]),
    ];
    orchestrator.execute_pipeline(stages).await?;
    for (offset, name) in [(0, "z_trends.md"), (60, "a_summary.md")] {
        std::fs::File::options()
            .write(true)
            .open(orchestrator.workspace().path_of(name))?
            .set_modified(base + std::time::Duration::from_secs(offset))?;
    }

    let chain: Vec<String> = orchestrator
        .workspace()
        .artifact_chain()?
        .into_iter()
        .map(|file| file.path)
        .collect();
    assert_eq!(chain, vec!["z_trends.md", "a_summary.md"]);
    assert!(logs_contain("Artifact chain"));
    Ok(())
}

#[tokio::test]
async fn test_pipeline_reports_missing_outputs_without_failing() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let scripts = vec![Script::Steps(vec![write("out.json", "{broken"), message("done")])];
    let (orchestrator, _engine) = orchestrator(&dir, echo_registry(), scripts, |c| c)?;

    let stages = vec![SubTask::new("only", "echo", "Produce.").expects(["out.json", "extra.md"])];
    let result = orchestrator.execute_pipeline(stages).await?;

    let report = &result.stage_reports[0];
    assert_eq!(report.missing_outputs, vec!["extra.md"]);
    assert_eq!(report.malformed_outputs, vec!["out.json"]);
    assert_eq!(result.status, RunStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_pipeline_unknown_worker_uses_generic_fallback() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let (orchestrator, engine) = orchestrator(&dir, echo_registry(), Vec::new(), |c| c)?;

    orchestrator
        .execute_pipeline(vec![SubTask::new("t", "translator", "Translate.")])
        .await?;

    let calls = engine.calls();
    assert_eq!(calls[0].options.permitted_tools, vec!["Read", "Write"]);
    assert_eq!(
        calls[0].options.system_prompt,
        "You are a specialized translator agent."
    );
    Ok(())
}

#[tokio::test]
async fn test_failing_stage_stops_pipeline_and_keeps_artifacts() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let scripts = vec![
        Script::Steps(vec![write("a.md", "alpha"), message("A")]),
        Script::Steps(vec![message("starting"), common::Step::Break("socket closed".to_string())]),
        Script::Steps(vec![message("C")]),
    ];
    let (orchestrator, engine) = orchestrator(&dir, echo_registry(), scripts, |c| c)?;

    let stages = vec![
        SubTask::new("a", "echo", "A."),
        SubTask::new("b", "echo", "B.").depends_on(["a"]),
        SubTask::new("c", "echo", "C.").depends_on(["b"]),
    ];
    let err = orchestrator.execute_pipeline(stages).await.err();

    assert!(matches!(
        err,
        Some(OrchestratorError::StageExecution { ref stage, ref message })
            if stage == "b" && message.contains("socket closed")
    ));
    assert_eq!(engine.calls().len(), 2);
    assert_eq!(orchestrator.workspace().read_text("a.md")?, "alpha");
    Ok(())
}

#[tokio::test]
async fn test_cycle_is_rejected_before_any_engine_call() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let (orchestrator, engine) = orchestrator(&dir, echo_registry(), Vec::new(), |c| c)?;

    let stages = vec![
        SubTask::new("a", "echo", "A.").depends_on(["c"]),
        SubTask::new("b", "echo", "B.").depends_on(["a"]),
        SubTask::new("c", "echo", "C.").depends_on(["b"]),
    ];
    let err = orchestrator.execute_pipeline(stages).await.err();

    assert!(matches!(err, Some(OrchestratorError::Cycle { ref stage, .. }) if stage == "c"));
    assert!(engine.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unknown_dependency_is_rejected_before_any_engine_call() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let (orchestrator, engine) = orchestrator(&dir, echo_registry(), Vec::new(), |c| c)?;

    let stages = vec![
        SubTask::new("a", "echo", "A."),
        SubTask::new("b", "echo", "B.").depends_on(["ghost"]),
    ];
    let err = orchestrator.execute_pipeline(stages).await.err();

    assert!(matches!(
        err,
        Some(OrchestratorError::UnsatisfiableDependency { ref stage, ref dependency })
            if stage == "b" && dependency == "ghost"
    ));
    assert!(engine.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_workspace_root_is_created() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let (orchestrator, _engine) = orchestrator(&dir, WorkerRegistry::new(), Vec::new(), |c| c)?;

    assert!(orchestrator.workspace().root().is_dir());
    assert!(orchestrator.registry().is_empty());
    Ok(())
}
