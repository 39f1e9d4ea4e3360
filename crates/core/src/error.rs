use crate::types::{ParameterType, StageId};

/// Result type for pipeline construction
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Something an input binding points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Output slot of another stage
    Artifact { producer: StageId, slot: String },
    /// Pipeline-level parameter
    Parameter(String),
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Artifact { producer, slot } => write!(f, "artifact {}.{}", producer, slot),
            Self::Parameter(name) => write!(f, "parameter '{}'", name),
        }
    }
}

/// Errors raised while declaring, building or compiling a pipeline
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("stage '{stage}' input '{input}' references unresolved {reference}")]
    UnresolvedReference {
        stage: StageId,
        input: String,
        reference: Reference,
    },

    #[error("binding stage '{stage}' to an output of '{producer}' closes a cycle")]
    Cycle { stage: StageId, producer: StageId },

    #[error("output '{stage}/{slot}' is declared more than once")]
    DuplicateOutput { stage: StageId, slot: String },

    #[error("stage '{0}' is declared more than once")]
    DuplicateStage(StageId),

    #[error("stage '{stage}' declares no output '{slot}'")]
    UnknownOutput { stage: StageId, slot: String },

    #[error("stage '{stage}' input '{input}' is never bound")]
    UnboundInput { stage: StageId, input: String },

    #[error("stage '{stage}' declares input '{input}' more than once")]
    DuplicateInput { stage: StageId, input: String },

    #[error("stage '{stage}' has no input named '{input}'")]
    UnknownInput { stage: StageId, input: String },

    #[error("stage '{stage}' input '{input}' expects {expected}, got {found}")]
    TypeMismatch {
        stage: StageId,
        input: String,
        expected: String,
        found: String,
    },

    #[error("node '{0}' not found in pipeline graph")]
    NodeNotFound(StageId),

    #[error("invalid secret binding: {0}")]
    InvalidSecretBinding(String),

    #[error("parameter '{0}' is declared more than once")]
    DuplicateParameter(String),

    #[error("required parameter '{0}' not provided and has no default")]
    MissingParameter(String),

    #[error("parameter '{0}' is not declared by the pipeline")]
    UnknownParameter(String),

    #[error("parameter '{name}' must be {expected}, got {found}")]
    ParameterType {
        name: String,
        expected: ParameterType,
        found: String,
    },

    #[error("invalid run options: {0}")]
    InvalidRunOptions(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
