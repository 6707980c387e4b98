//! Orchestration of registered workers over an external execution engine.
//!
//! Workers communicate only through files in a shared workspace. The
//! [`Orchestrator`] either hands a whole task to a coordinating invocation
//! that spawns workers itself, or runs a caller-supplied stage graph one
//! invocation per stage, splicing each stage's dependency outputs into its
//! prompt. In both modes an [`ActivityAttributor`] rebuilds which worker made
//! which tool call from the engine's flat event stream.

pub mod attributor;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod prompts;
pub mod registry;
pub mod runtime;
pub mod selector;
pub mod spec;
pub mod validation;
pub mod workspace;

pub use attributor::ActivityAttributor;
pub use config::OrchestratorConfig;
pub use engine::EngineOptions;
pub use engine::EventStream;
pub use engine::ExecutionEngine;
pub use error::OrchestratorError;
pub use error::Result;
pub use events::CallObserver;
pub use graph::StageGraph;
pub use registry::WorkerRegistry;
pub use runtime::Orchestrator;
pub use spec::SubTask;
pub use spec::WorkerSpec;
pub use workspace::ArtifactWorkspace;
