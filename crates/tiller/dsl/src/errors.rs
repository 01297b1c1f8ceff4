//! Error types for the declaration surface

use tiller_types::TillerError;

/// Errors raised while declaring or building a workflow
#[derive(Debug, thiserror::Error)]
pub enum DslError {
    #[error("unit '{0}' declared twice")]
    DuplicateUnit(String),

    #[error("unit '{unit}' references undeclared parent '{parent}'")]
    UnknownParent { unit: String, parent: String },

    #[error("unit '{0}' cannot depend on itself")]
    SelfParent(String),

    #[error("workflow must declare at least one unit")]
    EmptyWorkflow,

    #[error(transparent)]
    Engine(#[from] TillerError),
}

/// Result type alias for declaration operations
pub type DslResult<T> = Result<T, DslError>;
