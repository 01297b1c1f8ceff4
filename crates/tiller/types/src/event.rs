//! Typed replay events
//!
//! Raw history records become typed events once per cycle. A unit event
//! knows three things the raw record does not say directly: which unit it
//! belongs to (its correlation token, recovered from the defining
//! scheduling record where necessary), whether the operation it represents
//! is still outstanding, and which logical attempt it belongs to — the
//! chain used to deduplicate a replayed log.

use crate::{
    ControlPayload, CorrelationToken, EventId, EventLog, HistoryAttributes, HistoryRecord,
    TillerError, TillerResult,
};

// ── Chain Reference ──────────────────────────────────────────────────

/// Anchor tying an event to the logical attempt it belongs to.
///
/// Most kinds reference the record that scheduled the attempt. Kinds the
/// service leaves unlinked (cancel-request lifecycle, scheduling and timer
/// failures) can only be tied to their unit, so they chain with any event
/// of the same token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainRef {
    Scheduling(EventId),
    TokenOnly,
}

// ── Unit Event ───────────────────────────────────────────────────────

/// A typed event scoped to one schedulable unit.
#[derive(Clone, Debug)]
pub struct UnitEvent {
    pub record_id: EventId,
    pub token: CorrelationToken,
    pub chain: ChainRef,
    pub detail: UnitEventDetail,
}

/// Closed set of unit-scoped event kinds.
#[derive(Clone, Debug)]
pub enum UnitEventDetail {
    TaskScheduled {
        name: String,
        version: String,
        input: String,
    },
    TaskStarted,
    TaskCompleted {
        result: String,
    },
    TaskFailed {
        reason: String,
        detail: String,
    },
    TaskTimedOut {
        timeout_kind: String,
        detail: String,
    },
    TaskCancelled {
        detail: String,
    },
    TaskCancelRequested,
    TaskCancelRequestFailed {
        cause: String,
    },
    TaskSchedulingFailed {
        cause: String,
    },
    TimerStarted {
        is_reschedule: bool,
    },
    TimerFired {
        is_reschedule: bool,
    },
    TimerCancelled {
        is_reschedule: bool,
    },
    TimerStartFailed {
        cause: String,
    },
    TimerCancellationFailed {
        cause: String,
    },
    ChildInitiated {
        name: String,
        version: String,
        input: String,
    },
    ChildStarted,
    ChildCompleted {
        result: String,
    },
    ChildFailed {
        reason: String,
        detail: String,
    },
    ChildTimedOut,
    ChildCancelled {
        detail: String,
    },
    ChildTerminated,
    ChildStartFailed {
        cause: String,
    },
}

impl UnitEvent {
    /// Build the typed event for a record, or `None` when the record is
    /// workflow-scoped rather than unit-scoped.
    ///
    /// Kinds that carry only a reference id resolve their defining record
    /// from the log to recover the unit's token (and, for timers, the
    /// control blob that says whether the timer is a reschedule timer).
    /// A missing or wrong-kind defining record is a malformed replay.
    pub fn from_record(record: &HistoryRecord, log: &EventLog) -> TillerResult<Option<Self>> {
        use HistoryAttributes as H;
        use UnitEventDetail as D;

        let event = match &record.attributes {
            H::TaskScheduled {
                name,
                version,
                token,
                input,
                ..
            } => Self {
                record_id: record.id,
                token: CorrelationToken::parse(token.clone())?,
                chain: ChainRef::Scheduling(record.id),
                detail: D::TaskScheduled {
                    name: name.clone(),
                    version: version.clone(),
                    input: input.clone(),
                },
            },
            H::TaskStarted { scheduled_id } => {
                let token = defining_task(record.id, *scheduled_id, log)?;
                Self {
                    record_id: record.id,
                    token,
                    chain: ChainRef::Scheduling(*scheduled_id),
                    detail: D::TaskStarted,
                }
            }
            H::TaskCompleted {
                scheduled_id,
                result,
                ..
            } => {
                let token = defining_task(record.id, *scheduled_id, log)?;
                Self {
                    record_id: record.id,
                    token,
                    chain: ChainRef::Scheduling(*scheduled_id),
                    detail: D::TaskCompleted {
                        result: result.clone(),
                    },
                }
            }
            H::TaskFailed {
                scheduled_id,
                reason,
                detail,
                ..
            } => {
                let token = defining_task(record.id, *scheduled_id, log)?;
                Self {
                    record_id: record.id,
                    token,
                    chain: ChainRef::Scheduling(*scheduled_id),
                    detail: D::TaskFailed {
                        reason: reason.clone(),
                        detail: detail.clone(),
                    },
                }
            }
            H::TaskTimedOut {
                scheduled_id,
                timeout_kind,
                detail,
                ..
            } => {
                let token = defining_task(record.id, *scheduled_id, log)?;
                Self {
                    record_id: record.id,
                    token,
                    chain: ChainRef::Scheduling(*scheduled_id),
                    detail: D::TaskTimedOut {
                        timeout_kind: timeout_kind.clone(),
                        detail: detail.clone(),
                    },
                }
            }
            H::TaskCancelled {
                scheduled_id,
                detail,
                ..
            } => {
                let token = defining_task(record.id, *scheduled_id, log)?;
                Self {
                    record_id: record.id,
                    token,
                    chain: ChainRef::Scheduling(*scheduled_id),
                    detail: D::TaskCancelled {
                        detail: detail.clone(),
                    },
                }
            }
            H::TaskCancelRequested { token } => Self {
                record_id: record.id,
                token: CorrelationToken::parse(token.clone())?,
                chain: ChainRef::TokenOnly,
                detail: D::TaskCancelRequested,
            },
            H::TaskCancelRequestFailed { token, cause } => Self {
                record_id: record.id,
                token: CorrelationToken::parse(token.clone())?,
                chain: ChainRef::TokenOnly,
                detail: D::TaskCancelRequestFailed {
                    cause: cause.clone(),
                },
            },
            H::TaskSchedulingFailed { token, cause } => Self {
                record_id: record.id,
                token: CorrelationToken::parse(token.clone())?,
                chain: ChainRef::TokenOnly,
                detail: D::TaskSchedulingFailed {
                    cause: cause.clone(),
                },
            },
            H::TimerStarted { token, control, .. } => Self {
                record_id: record.id,
                token: CorrelationToken::parse(token.clone())?,
                chain: ChainRef::Scheduling(record.id),
                detail: D::TimerStarted {
                    is_reschedule: ControlPayload::decode(control)?.is_reschedule,
                },
            },
            H::TimerFired { token, started_id } => Self {
                record_id: record.id,
                token: CorrelationToken::parse(token.clone())?,
                chain: ChainRef::Scheduling(*started_id),
                detail: D::TimerFired {
                    is_reschedule: defining_timer(record.id, *started_id, log)?,
                },
            },
            H::TimerCancelled { token, started_id } => Self {
                record_id: record.id,
                token: CorrelationToken::parse(token.clone())?,
                chain: ChainRef::Scheduling(*started_id),
                detail: D::TimerCancelled {
                    is_reschedule: defining_timer(record.id, *started_id, log)?,
                },
            },
            H::TimerStartFailed { token, cause } => Self {
                record_id: record.id,
                token: CorrelationToken::parse(token.clone())?,
                chain: ChainRef::TokenOnly,
                detail: D::TimerStartFailed {
                    cause: cause.clone(),
                },
            },
            H::TimerCancellationFailed { token, cause } => Self {
                record_id: record.id,
                token: CorrelationToken::parse(token.clone())?,
                chain: ChainRef::TokenOnly,
                detail: D::TimerCancellationFailed {
                    cause: cause.clone(),
                },
            },
            H::ChildInitiated {
                name,
                version,
                token,
                input,
                ..
            } => Self {
                record_id: record.id,
                token: CorrelationToken::parse(token.clone())?,
                chain: ChainRef::Scheduling(record.id),
                detail: D::ChildInitiated {
                    name: name.clone(),
                    version: version.clone(),
                    input: input.clone(),
                },
            },
            H::ChildStarted { initiated_id } => Self {
                record_id: record.id,
                token: defining_child(record.id, *initiated_id, log)?,
                chain: ChainRef::Scheduling(*initiated_id),
                detail: D::ChildStarted,
            },
            H::ChildCompleted {
                initiated_id,
                result,
            } => Self {
                record_id: record.id,
                token: defining_child(record.id, *initiated_id, log)?,
                chain: ChainRef::Scheduling(*initiated_id),
                detail: D::ChildCompleted {
                    result: result.clone(),
                },
            },
            H::ChildFailed {
                initiated_id,
                reason,
                detail,
            } => Self {
                record_id: record.id,
                token: defining_child(record.id, *initiated_id, log)?,
                chain: ChainRef::Scheduling(*initiated_id),
                detail: D::ChildFailed {
                    reason: reason.clone(),
                    detail: detail.clone(),
                },
            },
            H::ChildTimedOut { initiated_id } => Self {
                record_id: record.id,
                token: defining_child(record.id, *initiated_id, log)?,
                chain: ChainRef::Scheduling(*initiated_id),
                detail: D::ChildTimedOut,
            },
            H::ChildCancelled {
                initiated_id,
                detail,
            } => Self {
                record_id: record.id,
                token: defining_child(record.id, *initiated_id, log)?,
                chain: ChainRef::Scheduling(*initiated_id),
                detail: D::ChildCancelled {
                    detail: detail.clone(),
                },
            },
            H::ChildTerminated { initiated_id } => Self {
                record_id: record.id,
                token: defining_child(record.id, *initiated_id, log)?,
                chain: ChainRef::Scheduling(*initiated_id),
                detail: D::ChildTerminated,
            },
            H::ChildStartFailed { initiated_id, cause } => Self {
                record_id: record.id,
                token: defining_child(record.id, *initiated_id, log)?,
                chain: ChainRef::Scheduling(*initiated_id),
                detail: D::ChildStartFailed {
                    cause: cause.clone(),
                },
            },
            H::WorkflowStarted { .. }
            | H::WorkflowSignaled { .. }
            | H::WorkflowCancelRequested { .. } => return Ok(None),
        };
        Ok(Some(event))
    }

    /// True while the operation this event represents is still outstanding.
    pub fn is_active(&self) -> bool {
        use UnitEventDetail as D;
        matches!(
            self.detail,
            D::TaskScheduled { .. }
                | D::TaskStarted
                | D::TaskCancelRequested
                | D::TimerStarted { .. }
                | D::ChildInitiated { .. }
                | D::ChildStarted
        )
    }

    /// True when this kind drives a decision during replay. Purely
    /// historical kinds never reach interpretation.
    pub fn is_trigger(&self) -> bool {
        use UnitEventDetail as D;
        matches!(
            self.detail,
            D::TaskCompleted { .. }
                | D::TaskFailed { .. }
                | D::TaskTimedOut { .. }
                | D::TaskCancelled { .. }
                | D::TaskCancelRequestFailed { .. }
                | D::TaskSchedulingFailed { .. }
                | D::TimerFired { .. }
                | D::TimerStartFailed { .. }
                | D::TimerCancellationFailed { .. }
                | D::ChildCompleted { .. }
                | D::ChildFailed { .. }
                | D::ChildTimedOut
                | D::ChildCancelled { .. }
                | D::ChildTerminated
                | D::ChildStartFailed { .. }
        )
    }

    /// Whether this event continues the same logical attempt as `other`.
    ///
    /// Two events chain when they belong to the same unit and either share
    /// a defining scheduling record, or at least one of them is a kind the
    /// service does not link by id.
    pub fn in_chain_of(&self, other: &UnitEvent) -> bool {
        if self.token != other.token {
            return false;
        }
        match (self.chain, other.chain) {
            (ChainRef::Scheduling(a), ChainRef::Scheduling(b)) => a == b,
            _ => true,
        }
    }

    /// The result payload, for kinds that carry one.
    pub fn result(&self) -> Option<&str> {
        match &self.detail {
            UnitEventDetail::TaskCompleted { result }
            | UnitEventDetail::ChildCompleted { result } => Some(result),
            _ => None,
        }
    }

    /// True for events of a reschedule timer riding on this unit's token.
    pub fn is_reschedule_timer(&self) -> bool {
        use UnitEventDetail as D;
        matches!(
            self.detail,
            D::TimerStarted {
                is_reschedule: true
            } | D::TimerFired {
                is_reschedule: true
            } | D::TimerCancelled {
                is_reschedule: true
            }
        )
    }

    /// Whether this representative counts as one attempt of the unit when
    /// enforcing a reschedule limit. Reschedule-timer events and unlinked
    /// failure kinds are bookkeeping, not attempts.
    pub fn counts_as_attempt(&self) -> bool {
        matches!(self.chain, ChainRef::Scheduling(_)) && !self.is_reschedule_timer()
    }
}

fn defining_task(
    event: EventId,
    reference: EventId,
    log: &EventLog,
) -> TillerResult<CorrelationToken> {
    match log.find(reference).map(|r| &r.attributes) {
        Some(HistoryAttributes::TaskScheduled { token, .. }) => {
            CorrelationToken::parse(token.clone())
        }
        _ => Err(TillerError::IncompleteEventGraph { event, reference }),
    }
}

fn defining_timer(event: EventId, reference: EventId, log: &EventLog) -> TillerResult<bool> {
    match log.find(reference).map(|r| &r.attributes) {
        Some(HistoryAttributes::TimerStarted { control, .. }) => {
            Ok(ControlPayload::decode(control)?.is_reschedule)
        }
        _ => Err(TillerError::IncompleteEventGraph { event, reference }),
    }
}

fn defining_child(
    event: EventId,
    reference: EventId,
    log: &EventLog,
) -> TillerResult<CorrelationToken> {
    match log.find(reference).map(|r| &r.attributes) {
        Some(HistoryAttributes::ChildInitiated { token, .. }) => {
            CorrelationToken::parse(token.clone())
        }
        _ => Err(TillerError::IncompleteEventGraph { event, reference }),
    }
}

// ── Workflow-Scope Events ────────────────────────────────────────────

/// A typed workflow-scope event.
#[derive(Clone, Debug)]
pub struct FlowEvent {
    pub record_id: EventId,
    pub kind: FlowEventKind,
}

#[derive(Clone, Debug)]
pub enum FlowEventKind {
    Started { input: String },
    Signaled { name: String, input: String },
    CancelRequested { cause: String },
}

/// Union of the two event scopes, in replay order.
#[derive(Clone, Debug)]
pub enum ReplayEvent {
    Unit(UnitEvent),
    Flow(FlowEvent),
}

impl ReplayEvent {
    /// Build the typed event for any record.
    pub fn from_record(record: &HistoryRecord, log: &EventLog) -> TillerResult<Self> {
        use HistoryAttributes as H;
        if let Some(unit) = UnitEvent::from_record(record, log)? {
            return Ok(Self::Unit(unit));
        }
        let kind = match &record.attributes {
            H::WorkflowStarted { input } => FlowEventKind::Started {
                input: input.clone(),
            },
            H::WorkflowSignaled { name, input } => FlowEventKind::Signaled {
                name: name.clone(),
                input: input.clone(),
            },
            H::WorkflowCancelRequested { cause } => FlowEventKind::CancelRequested {
                cause: cause.clone(),
            },
            _ => return Err(TillerError::NonActionableEvent(record.id)),
        };
        Ok(Self::Flow(FlowEvent {
            record_id: record.id,
            kind,
        }))
    }

    pub fn record_id(&self) -> EventId {
        match self {
            Self::Unit(e) => e.record_id,
            Self::Flow(e) => e.record_id,
        }
    }

    /// Workflow-scope events always drive a decision; unit events only
    /// when their kind is a trigger.
    pub fn is_trigger(&self) -> bool {
        match self {
            Self::Unit(e) => e.is_trigger(),
            Self::Flow(_) => true,
        }
    }
}
