//! Orchestration decisions
//!
//! Decisions are the final output of a cycle: an ordered batch of records
//! the hosting layer submits back to the orchestration service. Closing
//! decisions end the workflow; a closing decision marked as a proposal is
//! a soft close that yields to any other work produced in the same cycle.

use serde::{Deserialize, Serialize};

/// One orchestration decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    ScheduleTask {
        token: String,
        name: String,
        version: String,
        input: String,
        control: String,
        priority: Option<i32>,
        timeout_secs: Option<u64>,
    },
    CancelTask {
        token: String,
    },
    StartTimer {
        token: String,
        duration_secs: u64,
        control: String,
    },
    CancelTimer {
        token: String,
    },
    ScheduleChildWorkflow {
        token: String,
        name: String,
        version: String,
        input: String,
        control: String,
    },
    RequestCancelExternal {
        workflow_id: String,
        run_id: String,
    },
    SignalExternal {
        workflow_id: String,
        run_id: String,
        name: String,
        input: String,
    },
    RecordMarker {
        name: String,
        detail: String,
    },
    CompleteWorkflow {
        result: String,
        proposal: bool,
    },
    FailWorkflow {
        reason: String,
        detail: String,
    },
    CancelWorkflow {
        detail: String,
    },
    ContinueAsNew {
        input: String,
    },
}

/// Rank used to arbitrate between conflicting closing decisions produced
/// in the same cycle. Higher wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClosurePriority {
    Complete,
    ContinueAsNew,
    Cancel,
    Fail,
}

impl Decision {
    /// True when this decision ends the workflow execution.
    pub fn is_closing(&self) -> bool {
        matches!(
            self,
            Self::CompleteWorkflow { .. }
                | Self::FailWorkflow { .. }
                | Self::CancelWorkflow { .. }
                | Self::ContinueAsNew { .. }
        )
    }

    /// True for a soft close that yields to other work in the batch.
    pub fn is_proposal(&self) -> bool {
        matches!(self, Self::CompleteWorkflow { proposal: true, .. })
    }

    /// Arbitration rank; `None` for non-closing decisions.
    pub fn closing_priority(&self) -> Option<ClosurePriority> {
        match self {
            Self::FailWorkflow { .. } => Some(ClosurePriority::Fail),
            Self::CancelWorkflow { .. } => Some(ClosurePriority::Cancel),
            Self::ContinueAsNew { .. } => Some(ClosurePriority::ContinueAsNew),
            Self::CompleteWorkflow { .. } => Some(ClosurePriority::Complete),
            _ => None,
        }
    }

    /// Stable name of the decision kind, for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ScheduleTask { .. } => "schedule-task",
            Self::CancelTask { .. } => "cancel-task",
            Self::StartTimer { .. } => "start-timer",
            Self::CancelTimer { .. } => "cancel-timer",
            Self::ScheduleChildWorkflow { .. } => "schedule-child-workflow",
            Self::RequestCancelExternal { .. } => "request-cancel-external",
            Self::SignalExternal { .. } => "signal-external",
            Self::RecordMarker { .. } => "record-marker",
            Self::CompleteWorkflow { .. } => "complete-workflow",
            Self::FailWorkflow { .. } => "fail-workflow",
            Self::CancelWorkflow { .. } => "cancel-workflow",
            Self::ContinueAsNew { .. } => "continue-as-new",
        }
    }
}
