use baton_protocol::StageStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Adding a stage would make the dependency relation cyclic.
    #[error("dependency cycle through stage `{stage}`: {}", .path.join(" -> "))]
    Cycle { stage: String, path: Vec<String> },

    #[error("stage `{stage}` depends on `{dependency}`, which is not a known stage")]
    UnsatisfiableDependency { stage: String, dependency: String },

    #[error("stage `{stage}` cannot start: dependency `{dependency}` is {status}")]
    DependencyNotSatisfied {
        stage: String,
        dependency: String,
        status: StageStatus,
    },

    #[error("stage `{stage}` failed: {message}")]
    StageExecution { stage: String, message: String },

    #[error("invalid worker configuration in {source_name}: {message}")]
    ConfigFormat {
        source_name: String,
        message: String,
    },

    #[error("stage id `{0}` is already defined")]
    DuplicateStage(String),

    #[error("unknown stage `{0}`")]
    UnknownStage(String),

    #[error("stage `{stage}` cannot move from {from} to {to}")]
    InvalidTransition {
        stage: String,
        from: StageStatus,
        to: StageStatus,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    pub(crate) fn config_format(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::ConfigFormat {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn stage_execution(stage: impl Into<String>, message: impl ToString) -> Self {
        Self::StageExecution {
            stage: stage.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
