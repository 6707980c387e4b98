//! Wire types shared between the baton orchestrator and execution engines.

pub mod activity;
pub mod protocol;
pub mod result;
pub mod stage;

pub use activity::ActivityRecord;
pub use protocol::EngineEvent;
pub use protocol::ExecutionPolicy;
pub use result::OrchestrationResult;
pub use result::OutputFile;
pub use result::PipelineResult;
pub use result::RunStatus;
pub use stage::StageOutput;
pub use stage::StageReport;
pub use stage::StageStatus;
