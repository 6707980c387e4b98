//! Worker selection for stages.

use std::borrow::Cow;

use crate::registry::WorkerRegistry;
use crate::spec::WorkerSpec;

/// Tools given to a worker that is not in the registry.
pub const FALLBACK_TOOLS: [&str; 2] = ["Read", "Write"];

/// How a requested worker name was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// A registered worker with the requested name.
    Exact,
    /// The first registered worker carrying the requested name as a capability.
    Capability,
    /// Nothing matched; a generic worker was synthesized.
    Fallback,
}

/// Resolves stage worker names against a registry.
pub struct WorkerSelector<'a> {
    registry: &'a WorkerRegistry,
}

impl<'a> WorkerSelector<'a> {
    pub fn new(registry: &'a WorkerRegistry) -> Self {
        Self { registry }
    }

    /// Selects a worker for `requested`. An exact name wins, then the first
    /// worker with a matching capability tag, otherwise a generic worker.
    pub fn select(&self, requested: &str) -> (Cow<'a, WorkerSpec>, Selection) {
        if let Some(spec) = self.registry.get(requested) {
            return (Cow::Borrowed(spec), Selection::Exact);
        }

        if let Some(spec) = self.registry.find_by_capability(requested).into_iter().next() {
            tracing::debug!(
                requested = %requested,
                worker = %spec.name,
                "Resolved worker by capability"
            );
            return (Cow::Borrowed(spec), Selection::Capability);
        }

        tracing::warn!(
            requested = %requested,
            "Unknown worker; using generic fallback"
        );
        (Cow::Owned(fallback_worker(requested)), Selection::Fallback)
    }

    pub fn registry(&self) -> &WorkerRegistry {
        self.registry
    }
}

/// A minimal worker for a name nothing in the registry answers to.
pub fn fallback_worker(name: &str) -> WorkerSpec {
    WorkerSpec::new(
        name,
        format!("Generic worker for `{name}`"),
        format!("You are a specialized {name} agent."),
    )
    .with_tools(FALLBACK_TOOLS)
}
