//! Error types for the decision engine
//!
//! Structural errors are fatal at graph construction, replay errors are
//! fatal for the cycle that hit them. The engine never retries internally;
//! replay must stay deterministic, so every fault surfaces to the caller.

use crate::EventId;

/// Errors that can occur while building a unit graph or replaying a log
#[derive(Debug, thiserror::Error)]
pub enum TillerError {
    #[error("identity component '{component}' contains the reserved separator")]
    ReservedSeparator { component: String },

    #[error("malformed correlation token '{0}'")]
    MalformedToken(String),

    #[error("malformed control payload: {0}")]
    MalformedControl(#[from] serde_json::Error),

    #[error("history records must be ordered newest-first; record {0} is out of order")]
    OutOfOrderHistory(EventId),

    #[error("invalid replay window: previous started id {previous} is past latest {latest}")]
    InvalidWindow { previous: EventId, latest: EventId },

    #[error(
        "incomplete event graph: record {event} references scheduling record {reference} \
         which is missing or of the wrong kind"
    )]
    IncompleteEventGraph { event: EventId, reference: EventId },

    #[error("record {0} is not actionable in a decision cycle")]
    NonActionableEvent(EventId),

    #[error("no declared unit matches token {token} (record {event})")]
    UnknownToken { token: String, event: EventId },

    #[error("unit declared twice: {0}")]
    DuplicateUnit(String),

    #[error("unit '{unit}' names undeclared parent '{parent}'")]
    UnknownParent { unit: String, parent: String },

    #[error("unit '{0}' cannot be its own parent")]
    SelfParent(String),

    #[error("dependency cycle through unit '{0}'")]
    DependencyCycle(String),

    #[error("jump target '{target}' is outside the branches of '{from}'")]
    JumpOutOfBranch { from: String, target: String },

    #[error("action targets undeclared unit '{0}'")]
    UnknownUnit(String),

    #[error("action '{action}' is not valid for {context}")]
    UnsupportedAction { action: String, context: String },

    #[error("producer for unit '{unit}' failed")]
    Handler {
        unit: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("workflow must declare at least one unit")]
    EmptyWorkflow,
}

/// Result type alias for decision-engine operations
pub type TillerResult<T> = Result<T, TillerError>;
