//! Instruction text sent to the execution engine.

use std::fmt::Write as _;

use crate::attributor::SPAWN_TYPE_FIELD;
use crate::registry::WorkerRegistry;

/// Artifact the coordinator is told to write when no report name is configured.
pub const DEFAULT_REPORT_ARTIFACT: &str = "final_result.md";

/// Heading that introduces spliced dependency outputs in a stage prompt.
pub const PREVIOUS_OUTPUTS_HEADING: &str = "PREVIOUS STAGE OUTPUTS:";

/// Builds the single prompt that drives a coordinator invocation.
pub fn coordinator_prompt(
    registry: &WorkerRegistry,
    task: &str,
    spawn_capability: &str,
    report_artifact: &str,
) -> String {
    let agents = registry.render_context();
    format!(
        r#"You are the LEAD ORCHESTRATOR. You coordinate the registered agents below; you do not do their work yourself.

{agents}

TASK:
{task}

WORKFLOW:
1. Decompose the task into subtasks and pick the best registered agent for each one.
2. Write down the plan: for every subtask name the agent, the action, the files it reads, the file it writes, and the subtasks it depends on.
3. Spawn each agent with the {spawn_capability} tool. Subtasks without dependencies on each other may run in the background at the same time.
4. When every agent has finished, read their files and synthesize the final deliverable into {report_artifact}.

OUTPUT PASSING:
Agents share nothing but files in the working directory. Every {spawn_capability} call must say:
- READ: which files produced by earlier agents to use as input
- WRITE: which file to save the result to, for later agents

Example {spawn_capability} call:
{spawn_capability}({{
    "{SPAWN_TYPE_FIELD}": "data-analyst",
    "prompt": "Read trends.md and companies.md written by the researchers. Analyze them and save the results to analysis.json",
    "run_in_background": false
}})

RULES:
- Only spawn agents listed above.
- State the plan before executing it.
- Do not start a subtask before the files it reads exist.

Begin by decomposing the task."#
    )
}

/// Appends dependency outputs to a stage instruction, each under a
/// `[<stage>]:` label naming the stage that produced it. Nothing is
/// appended when there are no outputs.
pub fn stage_prompt(instruction: &str, dependency_outputs: &[(&str, &str)]) -> String {
    if dependency_outputs.is_empty() {
        return instruction.to_string();
    }
    let mut prompt = format!("{instruction}\n\n{PREVIOUS_OUTPUTS_HEADING}\n");
    for (dependency, output) in dependency_outputs {
        let _ = write!(prompt, "\n[{dependency}]:\n{output}\n");
    }
    prompt
}
