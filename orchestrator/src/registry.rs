//! Registry of the workers available to an orchestration run.

use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::spec::WorkerSpec;

/// Text returned by [`WorkerRegistry::render_context`] when nothing is registered.
pub const EMPTY_REGISTRY_CONTEXT: &str = "No agents registered.";

/// Workers keyed by name, in registration order.
///
/// Not synchronized: populate it before a run starts and treat it as
/// read-only while the run is in flight.
#[derive(Debug, Clone, Default)]
pub struct WorkerRegistry {
    workers: IndexMap<String, WorkerSpec>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with general purpose research, analysis,
    /// writing and coding workers.
    pub fn with_default_workers() -> Self {
        let mut registry = Self::new();
        for spec in default_workers() {
            registry.register(spec);
        }
        registry
    }

    /// Inserts `spec`, replacing any worker with the same name. A replaced
    /// worker keeps its original position.
    pub fn register(&mut self, spec: WorkerSpec) {
        let name = spec.name.clone();
        if self.workers.insert(name.clone(), spec).is_some() {
            tracing::debug!(worker = %name, "Replaced registered worker");
        } else {
            tracing::info!(worker = %name, "Registered worker");
        }
    }

    pub fn get(&self, name: &str) -> Option<&WorkerSpec> {
        self.workers.get(name)
    }

    /// Every worker carrying the `tag` capability, in registration order.
    pub fn find_by_capability(&self, tag: &str) -> Vec<&WorkerSpec> {
        self.workers
            .values()
            .filter(|spec| spec.has_capability(tag))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.workers.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerSpec> {
        self.workers.values()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Describes every worker for embedding into a coordination prompt.
    pub fn render_context(&self) -> String {
        if self.workers.is_empty() {
            return EMPTY_REGISTRY_CONTEXT.to_string();
        }

        let mut context = String::from("AVAILABLE AGENTS:\n\n");
        for spec in self.workers.values() {
            // Writing into a String cannot fail.
            let _ = writeln!(context, "- {}", spec.name);
            let _ = writeln!(context, "  Description: {}", spec.description);
            let _ = writeln!(context, "  Capabilities: {}", spec.capabilities.join(", "));
            let _ = writeln!(context, "  Tools: {}", spec.tools.join(", "));
            context.push('\n');
        }
        context
    }
}

impl Extend<WorkerSpec> for WorkerRegistry {
    fn extend<T: IntoIterator<Item = WorkerSpec>>(&mut self, iter: T) {
        for spec in iter {
            self.register(spec);
        }
    }
}

impl FromIterator<WorkerSpec> for WorkerRegistry {
    fn from_iter<T: IntoIterator<Item = WorkerSpec>>(iter: T) -> Self {
        let mut registry = Self::new();
        registry.extend(iter);
        registry
    }
}

fn default_workers() -> Vec<WorkerSpec> {
    vec![
        WorkerSpec::new(
            "web-researcher",
            "Searches the web and gathers information from online sources",
            "You are a web research specialist.\n\
             Search the web, find relevant information, and compile findings.\n\
             Always cite your sources and save your research to markdown files.",
        )
        .with_tools(["WebSearch", "WebFetch", "Write", "Read"])
        .with_capabilities(["web-search", "information-gathering", "research"]),
        WorkerSpec::new(
            "data-analyst",
            "Analyzes data, creates visualizations, and generates insights",
            "You are a data analysis specialist.\n\
             Analyze data, create visualizations, and generate actionable insights.\n\
             Use scripts when the analysis needs them.",
        )
        .with_tools(["Read", "Write", "Bash"])
        .with_capabilities(["data-analysis", "visualization", "statistics"]),
        WorkerSpec::new(
            "technical-writer",
            "Creates documentation, reports, and technical content",
            "You are a technical writing specialist.\n\
             Create clear, well-structured documentation and reports.\n\
             Use markdown and organize content logically.",
        )
        .with_tools(["Read", "Write"])
        .with_capabilities(["documentation", "writing", "content-creation"]),
        WorkerSpec::new(
            "code-generator",
            "Writes code in various programming languages",
            "You are a software development specialist.\n\
             Write clean, documented code with error handling.",
        )
        .with_tools(["Write", "Read", "Bash"])
        .with_capabilities(["coding", "programming", "software-development"]),
    ]
}
