//! Dependency graph over the stages of one decomposition.
//!
//! Stages may name dependencies that have not been added yet; those edges
//! are checked when the graph is resolved. Cycles among the edges that are
//! known are rejected as soon as the stage closing them is added, so a graph
//! that accepted every stage is always acyclic.

use std::collections::HashMap;
use std::collections::HashSet;

use baton_protocol::StageStatus;
use indexmap::IndexMap;

use crate::error::OrchestratorError;
use crate::error::Result;
use crate::spec::SubTask;

/// Separator between dependency outputs in [`StageGraph::inject_dependency_outputs`].
const OUTPUT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Default)]
pub struct StageGraph {
    stages: IndexMap<String, SubTask>,
    outputs: HashMap<String, String>,
}

impl StageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph by adding every stage in order.
    pub fn from_stages(stages: impl IntoIterator<Item = SubTask>) -> Result<Self> {
        let mut graph = Self::new();
        for stage in stages {
            graph.add_stage(stage)?;
        }
        Ok(graph)
    }

    /// Appends a stage. Rejects duplicate ids and any stage that would close
    /// a dependency cycle; a rejected stage leaves the graph unchanged.
    pub fn add_stage(&mut self, stage: SubTask) -> Result<()> {
        if self.stages.contains_key(&stage.id) {
            return Err(OrchestratorError::DuplicateStage(stage.id));
        }

        if let Some(path) = self.cycle_through(&stage) {
            return Err(OrchestratorError::Cycle {
                stage: stage.id,
                path,
            });
        }

        tracing::debug!(
            stage = %stage.id,
            worker = %stage.worker,
            dependencies = ?stage.dependencies,
            "Added stage"
        );
        self.stages.insert(stage.id.clone(), stage);
        Ok(())
    }

    /// Walks the known dependencies of `candidate` looking for a path back to
    /// it. Returns that path, starting and ending at the candidate.
    fn cycle_through(&self, candidate: &SubTask) -> Option<Vec<String>> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut path = vec![candidate.id.clone()];
        for dependency in &candidate.dependencies {
            if self.reaches(dependency, &candidate.id, &mut visited, &mut path) {
                return Some(path);
            }
        }
        None
    }

    fn reaches<'a>(
        &'a self,
        current: &'a str,
        target: &str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<String>,
    ) -> bool {
        path.push(current.to_string());
        if current == target {
            return true;
        }
        if visited.insert(current) {
            let dependencies = self
                .stages
                .get(current)
                .map(|stage| stage.dependencies.as_slice())
                .unwrap_or_default();
            for dependency in dependencies {
                if self.reaches(dependency, target, visited, path) {
                    return true;
                }
            }
        }
        path.pop();
        false
    }

    pub fn get(&self, id: &str) -> Option<&SubTask> {
        self.stages.get(id)
    }

    pub fn stages(&self) -> impl Iterator<Item = &SubTask> {
        self.stages.values()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Groups stages into execution levels. Every dependency of a stage in
    /// level `k` sits in a level below `k`; stages sharing a level may run
    /// concurrently. Within a level, stages keep insertion order.
    pub fn resolve_order(&self) -> Result<Vec<Vec<String>>> {
        for stage in self.stages.values() {
            if let Some(missing) = stage
                .dependencies
                .iter()
                .find(|dependency| !self.stages.contains_key(dependency.as_str()))
            {
                return Err(OrchestratorError::UnsatisfiableDependency {
                    stage: stage.id.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let mut remaining: HashMap<&str, usize> = self
            .stages
            .values()
            .map(|stage| {
                let unique: HashSet<&str> =
                    stage.dependencies.iter().map(String::as_str).collect();
                (stage.id.as_str(), unique.len())
            })
            .collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for stage in self.stages.values() {
            let unique: HashSet<&str> = stage.dependencies.iter().map(String::as_str).collect();
            for dependency in unique {
                dependents.entry(dependency).or_default().push(stage.id.as_str());
            }
        }

        let mut levels: Vec<Vec<String>> = Vec::new();
        let mut placed = 0usize;
        let mut frontier: Vec<&str> = self
            .stages
            .keys()
            .map(String::as_str)
            .filter(|id| remaining.get(id).copied() == Some(0))
            .collect();

        while !frontier.is_empty() {
            placed += frontier.len();
            let mut released: HashSet<&str> = HashSet::new();
            for id in &frontier {
                for dependent in dependents.get(id).into_iter().flatten() {
                    if let Some(count) = remaining.get_mut(dependent) {
                        *count -= 1;
                        if *count == 0 {
                            released.insert(*dependent);
                        }
                    }
                }
            }
            levels.push(frontier.iter().map(|id| (*id).to_string()).collect());
            frontier = self
                .stages
                .keys()
                .map(String::as_str)
                .filter(|id| released.contains(id))
                .collect();
        }

        if placed != self.stages.len() {
            // Unreachable through `add_stage`, kept so a corrupted graph never
            // yields a partial order.
            let stuck = self
                .stages
                .keys()
                .find(|id| remaining.get(id.as_str()).copied().unwrap_or(0) > 0)
                .cloned()
                .unwrap_or_default();
            return Err(OrchestratorError::Cycle {
                path: vec![stuck.clone()],
                stage: stuck,
            });
        }

        Ok(levels)
    }

    /// Records the captured text of a stage for later injection.
    pub fn record_output(&mut self, stage_id: &str, text: impl Into<String>) -> Result<()> {
        if !self.stages.contains_key(stage_id) {
            return Err(OrchestratorError::UnknownStage(stage_id.to_string()));
        }
        self.outputs.insert(stage_id.to_string(), text.into());
        Ok(())
    }

    pub fn output(&self, stage_id: &str) -> Option<&str> {
        self.outputs.get(stage_id).map(String::as_str)
    }

    /// The recorded outputs of `stage_id`'s dependencies, in declaration
    /// order. Dependencies without captured text contribute nothing.
    pub fn inject_dependency_outputs(&self, stage_id: &str) -> Result<String> {
        let parts: Vec<&str> = self
            .dependency_outputs(stage_id)?
            .into_iter()
            .map(|(_, text)| text)
            .collect();
        Ok(parts.join(OUTPUT_SEPARATOR))
    }

    /// `(dependency id, captured text)` for every dependency of `stage_id`
    /// that produced text, in declaration order.
    pub fn dependency_outputs(&self, stage_id: &str) -> Result<Vec<(&str, &str)>> {
        let stage = self
            .stages
            .get(stage_id)
            .ok_or_else(|| OrchestratorError::UnknownStage(stage_id.to_string()))?;

        Ok(stage
            .dependencies
            .iter()
            .filter_map(|dependency| {
                self.output(dependency)
                    .filter(|text| !text.is_empty())
                    .map(|text| (dependency.as_str(), text))
            })
            .collect())
    }

    /// Moves a stage to `running`. Fails if any dependency has not completed.
    pub fn start(&mut self, stage_id: &str) -> Result<()> {
        let stage = self
            .stages
            .get(stage_id)
            .ok_or_else(|| OrchestratorError::UnknownStage(stage_id.to_string()))?;

        for dependency in &stage.dependencies {
            let status = self
                .stages
                .get(dependency)
                .map(|dep| dep.status)
                .ok_or_else(|| OrchestratorError::UnsatisfiableDependency {
                    stage: stage_id.to_string(),
                    dependency: dependency.clone(),
                })?;
            if status != StageStatus::Completed {
                return Err(OrchestratorError::DependencyNotSatisfied {
                    stage: stage_id.to_string(),
                    dependency: dependency.clone(),
                    status,
                });
            }
        }

        self.transition(stage_id, StageStatus::Running)
    }

    /// Marks a running stage completed and stores its output.
    pub fn complete(&mut self, stage_id: &str, output: impl Into<String>) -> Result<()> {
        self.transition(stage_id, StageStatus::Completed)?;
        self.record_output(stage_id, output)
    }

    pub fn fail(&mut self, stage_id: &str) -> Result<()> {
        self.transition(stage_id, StageStatus::Failed)
    }

    fn transition(&mut self, stage_id: &str, to: StageStatus) -> Result<()> {
        let stage = self
            .stages
            .get_mut(stage_id)
            .ok_or_else(|| OrchestratorError::UnknownStage(stage_id.to_string()))?;
        if !stage.status.can_transition_to(to) {
            return Err(OrchestratorError::InvalidTransition {
                stage: stage_id.to_string(),
                from: stage.status,
                to,
            });
        }
        stage.status = to;
        Ok(())
    }
}
