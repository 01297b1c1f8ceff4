//! The raw history log
//!
//! The orchestration service persists one append-only event log per
//! workflow execution and hands the decision engine the whole of it (or a
//! page of it) newest-first, together with two event-id bounds marking the
//! window of records that arrived since the previous decision cycle.
//! Records are facts; interpretation lives in [`crate::UnitEvent`].

use crate::{TillerError, TillerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Event Id ─────────────────────────────────────────────────────────

/// Monotone identifier the service assigns to every history record.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EventId(pub u64);

impl EventId {
    /// Sentinel for "no previous cycle": the whole log is new.
    pub const NONE: EventId = EventId(0);
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── History Record ───────────────────────────────────────────────────

/// One record of the raw event log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub attributes: HistoryAttributes,
}

impl HistoryRecord {
    pub fn new(id: u64, attributes: HistoryAttributes) -> Self {
        Self {
            id: EventId(id),
            timestamp: Utc::now(),
            attributes,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Kind-specific attributes of a history record.
///
/// Reference ids (`scheduled_id`, `started_id`, `initiated_id`) point at
/// the earlier record that defined the operation; the defining record is
/// where the unit's token and control blob live. Kinds the service does
/// not link by reference carry the token directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum HistoryAttributes {
    // Remote task lifecycle
    TaskScheduled {
        name: String,
        version: String,
        token: String,
        control: String,
        input: String,
    },
    TaskStarted {
        scheduled_id: EventId,
    },
    TaskCompleted {
        scheduled_id: EventId,
        started_id: EventId,
        result: String,
    },
    TaskFailed {
        scheduled_id: EventId,
        started_id: EventId,
        reason: String,
        detail: String,
    },
    TaskTimedOut {
        scheduled_id: EventId,
        started_id: EventId,
        timeout_kind: String,
        detail: String,
    },
    TaskCancelled {
        scheduled_id: EventId,
        started_id: EventId,
        detail: String,
    },
    TaskCancelRequested {
        token: String,
    },
    TaskCancelRequestFailed {
        token: String,
        cause: String,
    },
    TaskSchedulingFailed {
        token: String,
        cause: String,
    },

    // Timer lifecycle
    TimerStarted {
        token: String,
        duration_secs: u64,
        control: String,
    },
    TimerFired {
        token: String,
        started_id: EventId,
    },
    TimerCancelled {
        token: String,
        started_id: EventId,
    },
    TimerStartFailed {
        token: String,
        cause: String,
    },
    TimerCancellationFailed {
        token: String,
        cause: String,
    },

    // Nested workflow lifecycle
    ChildInitiated {
        name: String,
        version: String,
        token: String,
        control: String,
        input: String,
    },
    ChildStarted {
        initiated_id: EventId,
    },
    ChildCompleted {
        initiated_id: EventId,
        result: String,
    },
    ChildFailed {
        initiated_id: EventId,
        reason: String,
        detail: String,
    },
    ChildTimedOut {
        initiated_id: EventId,
    },
    ChildCancelled {
        initiated_id: EventId,
        detail: String,
    },
    ChildTerminated {
        initiated_id: EventId,
    },
    ChildStartFailed {
        initiated_id: EventId,
        cause: String,
    },

    // Workflow scope
    WorkflowStarted {
        input: String,
    },
    WorkflowSignaled {
        name: String,
        input: String,
    },
    WorkflowCancelRequested {
        cause: String,
    },
}

impl HistoryAttributes {
    /// Stable name of the record kind, for logging and errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::TaskScheduled { .. } => "task-scheduled",
            Self::TaskStarted { .. } => "task-started",
            Self::TaskCompleted { .. } => "task-completed",
            Self::TaskFailed { .. } => "task-failed",
            Self::TaskTimedOut { .. } => "task-timed-out",
            Self::TaskCancelled { .. } => "task-cancelled",
            Self::TaskCancelRequested { .. } => "task-cancel-requested",
            Self::TaskCancelRequestFailed { .. } => "task-cancel-request-failed",
            Self::TaskSchedulingFailed { .. } => "task-scheduling-failed",
            Self::TimerStarted { .. } => "timer-started",
            Self::TimerFired { .. } => "timer-fired",
            Self::TimerCancelled { .. } => "timer-cancelled",
            Self::TimerStartFailed { .. } => "timer-start-failed",
            Self::TimerCancellationFailed { .. } => "timer-cancellation-failed",
            Self::ChildInitiated { .. } => "child-initiated",
            Self::ChildStarted { .. } => "child-started",
            Self::ChildCompleted { .. } => "child-completed",
            Self::ChildFailed { .. } => "child-failed",
            Self::ChildTimedOut { .. } => "child-timed-out",
            Self::ChildCancelled { .. } => "child-cancelled",
            Self::ChildTerminated { .. } => "child-terminated",
            Self::ChildStartFailed { .. } => "child-start-failed",
            Self::WorkflowStarted { .. } => "workflow-started",
            Self::WorkflowSignaled { .. } => "workflow-signaled",
            Self::WorkflowCancelRequested { .. } => "workflow-cancel-requested",
        }
    }
}

// ── Event Log ────────────────────────────────────────────────────────

/// The immutable event log for one execution, newest-first, plus the
/// `(previous_started, latest_started]` window of records that arrived
/// since the previous decision cycle.
#[derive(Clone, Debug)]
pub struct EventLog {
    records: Vec<HistoryRecord>,
    previous_started: EventId,
    latest_started: EventId,
}

impl EventLog {
    /// Build a log from newest-first records and the replay window bounds.
    pub fn new(
        records: Vec<HistoryRecord>,
        previous_started: EventId,
        latest_started: EventId,
    ) -> TillerResult<Self> {
        if previous_started > latest_started {
            return Err(TillerError::InvalidWindow {
                previous: previous_started,
                latest: latest_started,
            });
        }
        for pair in records.windows(2) {
            if pair[0].id <= pair[1].id {
                return Err(TillerError::OutOfOrderHistory(pair[1].id));
            }
        }
        Ok(Self {
            records,
            previous_started,
            latest_started,
        })
    }

    /// Build a log whose window spans every record (first decision cycle).
    pub fn fresh(records: Vec<HistoryRecord>) -> TillerResult<Self> {
        let latest = records.first().map(|r| r.id).unwrap_or(EventId::NONE);
        Self::new(records, EventId::NONE, latest)
    }

    /// All records, newest-first.
    pub fn records(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter()
    }

    /// The new-since-last-cycle window, oldest-first: this is replay order.
    pub fn new_records(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records
            .iter()
            .filter(|r| r.id > self.previous_started && r.id <= self.latest_started)
            .rev()
    }

    /// Locate a record by id.
    pub fn find(&self, id: EventId) -> Option<&HistoryRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
