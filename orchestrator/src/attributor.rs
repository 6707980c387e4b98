//! Reconstructs who-did-what from a flat stream of tool-call events.
//!
//! The engine only reports a call id and, for calls made inside a spawned
//! sub-worker, the id of the spawn call that owns it. Each spawn call gets a
//! synthesized label (`RESEARCHER-1`, `RESEARCHER-2`, ...) keyed by its own
//! call id; every call whose parent id is such a key is attributed to that
//! label. Everything else belongs to the coordinator.
//!
//! Exits are matched to their record by call id, so sub-workers running
//! concurrently may interleave freely.

use std::collections::HashMap;
use std::fmt;

use baton_protocol::ActivityRecord;
use baton_protocol::protocol::ToolCallBeginEvent;
use baton_protocol::protocol::ToolCallEndEvent;
use chrono::Utc;
use serde_json::Value;

use crate::config::DEFAULT_SPAWN_CAPABILITY;
use crate::events::CallObserver;

/// Label for calls issued directly by the coordinator.
pub const COORDINATOR_LABEL: &str = "LEAD-ORCHESTRATOR";

/// Input field of a spawn call naming the requested sub-worker.
pub const SPAWN_TYPE_FIELD: &str = "subagent_type";

const UNNAMED_SUBAGENT: &str = "SUBAGENT";

#[derive(Debug, Clone)]
pub struct ActivityAttributor {
    spawn_capability: String,
    records: Vec<ActivityRecord>,
    /// Spawn call id -> synthesized worker label.
    spawn_map: HashMap<String, String>,
    /// Call id -> index into `records`.
    by_call_id: HashMap<String, usize>,
    spawn_count: usize,
}

impl Default for ActivityAttributor {
    fn default() -> Self {
        Self::new(DEFAULT_SPAWN_CAPABILITY)
    }
}

impl ActivityAttributor {
    pub fn new(spawn_capability: impl Into<String>) -> Self {
        Self {
            spawn_capability: spawn_capability.into(),
            records: Vec::new(),
            spawn_map: HashMap::new(),
            by_call_id: HashMap::new(),
            spawn_count: 0,
        }
    }

    /// Handles a call-begin event.
    pub fn enter(&mut self, event: &ToolCallBeginEvent) {
        if self.by_call_id.contains_key(&event.call_id) {
            tracing::warn!(
                call_id = %event.call_id,
                tool = %event.tool_name,
                "Ignoring repeated begin event for call"
            );
            return;
        }

        if event.tool_name == self.spawn_capability {
            self.spawn_count += 1;
            let label = spawn_label(&event.input, self.spawn_count);
            tracing::info!(call_id = %event.call_id, agent = %label, "Sub-worker spawned");
            self.spawn_map.insert(event.call_id.clone(), label);
        }

        let agent = self.label_for_parent(event.parent_call_id.as_deref());
        tracing::debug!(
            agent = %agent,
            tool = %event.tool_name,
            call_id = %event.call_id,
            "Tool call started"
        );

        self.by_call_id
            .insert(event.call_id.clone(), self.records.len());
        self.records.push(ActivityRecord {
            agent,
            tool_name: event.tool_name.clone(),
            call_id: event.call_id.clone(),
            timestamp: Utc::now(),
            input: event.input.clone(),
            output: None,
            parent_call_id: event.parent_call_id.clone(),
        });
    }

    /// Handles a call-end event.
    ///
    /// Only the record entered under the same call id receives the output.
    /// An exit for a call that was never entered is dropped.
    pub fn exit(&mut self, event: &ToolCallEndEvent) {
        let Some(&index) = self.by_call_id.get(&event.call_id) else {
            tracing::warn!(
                call_id = %event.call_id,
                tool = %event.tool_name,
                "Dropping end event for unknown call"
            );
            return;
        };

        let record = &mut self.records[index];
        if record.output.is_some() {
            tracing::debug!(call_id = %record.call_id, "Ignoring repeated end event for call");
            return;
        }
        record.output = Some(event.output.clone());
    }

    fn label_for_parent(&self, parent_call_id: Option<&str>) -> String {
        parent_call_id
            .and_then(|parent| self.spawn_map.get(parent))
            .cloned()
            .unwrap_or_else(|| COORDINATOR_LABEL.to_string())
    }

    pub fn records(&self) -> &[ActivityRecord] {
        &self.records
    }

    /// Owned copy of every record in arrival order.
    pub fn timeline(&self) -> Vec<ActivityRecord> {
        self.records.clone()
    }

    pub fn into_timeline(self) -> Vec<ActivityRecord> {
        self.records
    }

    pub fn total_calls(&self) -> usize {
        self.records.len()
    }

    /// Label synthesized for the spawn call `call_id`, if it was one.
    pub fn spawn_label_for(&self, call_id: &str) -> Option<&str> {
        self.spawn_map.get(call_id).map(String::as_str)
    }

    pub fn records_for<'a>(&'a self, agent: &'a str) -> impl Iterator<Item = &'a ActivityRecord> {
        self.records.iter().filter(move |record| record.agent == agent)
    }

    /// Calls issued directly by the coordinator.
    pub fn root_records(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.records.iter().filter(|record| record.is_root())
    }

    pub fn children_of<'a>(
        &'a self,
        call_id: &'a str,
    ) -> impl Iterator<Item = &'a ActivityRecord> {
        self.records
            .iter()
            .filter(move |record| record.parent_call_id.as_deref() == Some(call_id))
    }

    /// Records grouped by agent, in first-seen agent order.
    pub fn summary(&self) -> ActivitySummary<'_> {
        let mut groups: Vec<AgentActivity<'_>> = Vec::new();
        for record in &self.records {
            match groups.iter_mut().find(|group| group.agent == record.agent) {
                Some(group) => group.calls.push(record),
                None => groups.push(AgentActivity {
                    agent: &record.agent,
                    calls: vec![record],
                }),
            }
        }
        ActivitySummary { groups }
    }
}

impl CallObserver for ActivityAttributor {
    fn on_enter(&mut self, event: &ToolCallBeginEvent) {
        self.enter(event);
    }

    fn on_exit(&mut self, event: &ToolCallEndEvent) {
        self.exit(event);
    }
}

fn spawn_label(input: &Value, ordinal: usize) -> String {
    let kind = input
        .get(SPAWN_TYPE_FIELD)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|kind| !kind.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| UNNAMED_SUBAGENT.to_string());
    format!("{kind}-{ordinal}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentActivity<'a> {
    pub agent: &'a str,
    pub calls: Vec<&'a ActivityRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySummary<'a> {
    pub groups: Vec<AgentActivity<'a>>,
}

impl ActivitySummary<'_> {
    pub fn agents(&self) -> Vec<&str> {
        self.groups.iter().map(|group| group.agent).collect()
    }
}

impl fmt::Display for ActivitySummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for group in &self.groups {
            writeln!(f, "[{}] - {} tool calls", group.agent, group.calls.len())?;
            for call in &group.calls {
                writeln!(f, "  -> {}", call.tool_name)?;
                let detail = call
                    .input
                    .get("query")
                    .or_else(|| call.input.get("path"))
                    .or_else(|| call.input.get("file_path"))
                    .and_then(Value::as_str);
                if let Some(detail) = detail {
                    let preview: String = detail.chars().take(80).collect();
                    writeln!(f, "     {preview}")?;
                }
            }
        }
        Ok(())
    }
}
