//! Per-cycle history projection
//!
//! A read-only view over the raw log, scoped to one decision cycle. For a
//! given unit it yields the chain-deduplicated event sequence (newest
//! first) so that repeated retries or reschedules of the same logical
//! attempt are never double-counted. Results are memoized because branch
//! evaluation queries the same unit from several branches; the memo dies
//! with the cycle, so nothing mutable outlives or crosses cycles.

use crate::graph::{UnitGraph, UnitIndex, UnitKind};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use tiller_types::{
    EventLog, HistoryAttributes, TillerError, TillerResult, UnitEvent, UnitEventDetail,
    UnitIdentity,
};

pub struct HistoryProjection<'a> {
    graph: &'a UnitGraph,
    log: &'a EventLog,
    memo: RefCell<HashMap<UnitIndex, Arc<Vec<UnitEvent>>>>,
}

impl<'a> HistoryProjection<'a> {
    pub fn new(graph: &'a UnitGraph, log: &'a EventLog) -> Self {
        Self {
            graph,
            log,
            memo: RefCell::new(HashMap::new()),
        }
    }

    pub fn log(&self) -> &EventLog {
        self.log
    }

    /// The unit's deduplicated event history, newest first: exactly one
    /// representative per logical attempt.
    pub fn all_events_for(&self, unit: UnitIndex) -> TillerResult<Arc<Vec<UnitEvent>>> {
        if let Some(events) = self.memo.borrow().get(&unit) {
            return Ok(Arc::clone(events));
        }

        let node = self.graph.unit(unit);
        let mut accepted: Vec<UnitEvent> = Vec::new();
        for record in self.log.records() {
            let Some(event) = UnitEvent::from_record(record, self.log)? else {
                continue;
            };
            if event.token != *node.token() {
                continue;
            }
            if !kind_accepts(node.kind(), &event) {
                continue;
            }
            if accepted.iter().any(|earlier| event.in_chain_of(earlier)) {
                continue;
            }
            accepted.push(event);
        }

        let events = Arc::new(accepted);
        self.memo.borrow_mut().insert(unit, Arc::clone(&events));
        Ok(events)
    }

    /// The unit's most recent relevant event, or `None` when the unit has
    /// not been touched yet.
    pub fn latest_event_for(&self, unit: UnitIndex) -> TillerResult<Option<UnitEvent>> {
        Ok(self.all_events_for(unit)?.first().cloned())
    }

    /// True iff any unit anywhere in the log has an outstanding,
    /// non-chained operation. Gates soft completion proposals.
    pub fn has_active_event(&self) -> TillerResult<bool> {
        for index in self.graph.indices() {
            if self.all_events_for(index)?.iter().any(UnitEvent::is_active) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// How many attempts of the unit the log records, reschedule-timer
    /// bookkeeping excluded.
    pub fn attempts(&self, unit: UnitIndex) -> TillerResult<u32> {
        Ok(self
            .all_events_for(unit)?
            .iter()
            .filter(|e| e.counts_as_attempt())
            .count() as u32)
    }

    /// The workflow's own start input, empty if the log has no start
    /// record (a malformed but tolerable page).
    pub fn workflow_input(&self) -> String {
        self.log
            .records()
            .find_map(|record| match &record.attributes {
                HistoryAttributes::WorkflowStarted { input } => Some(input.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Whether an event class is relevant to a unit of the given kind.
/// Reschedule-timer events ride the owning unit's token and count for
/// every schedulable kind; unlinked timer failures can only be matched by
/// token.
fn kind_accepts(kind: &UnitKind, event: &UnitEvent) -> bool {
    use UnitEventDetail as D;
    let timer_event = matches!(
        event.detail,
        D::TimerStarted { .. }
            | D::TimerFired { .. }
            | D::TimerCancelled { .. }
            | D::TimerStartFailed { .. }
            | D::TimerCancellationFailed { .. }
    );
    match kind {
        UnitKind::Task => {
            matches!(
                event.detail,
                D::TaskScheduled { .. }
                    | D::TaskStarted
                    | D::TaskCompleted { .. }
                    | D::TaskFailed { .. }
                    | D::TaskTimedOut { .. }
                    | D::TaskCancelled { .. }
                    | D::TaskCancelRequested
                    | D::TaskCancelRequestFailed { .. }
                    | D::TaskSchedulingFailed { .. }
            ) || timer_event
        }
        UnitKind::Timer { .. } => timer_event,
        UnitKind::ChildWorkflow => {
            matches!(
                event.detail,
                D::ChildInitiated { .. }
                    | D::ChildStarted
                    | D::ChildCompleted { .. }
                    | D::ChildFailed { .. }
                    | D::ChildTimedOut
                    | D::ChildCancelled { .. }
                    | D::ChildTerminated
                    | D::ChildStartFailed { .. }
            ) || timer_event
        }
        UnitKind::Custom => false,
    }
}

// ── Schedule Context ─────────────────────────────────────────────────

/// What user-supplied producers and gates see when a unit is about to be
/// scheduled: the unit itself plus read access to the projected history.
pub struct ScheduleContext<'a> {
    graph: &'a UnitGraph,
    projection: &'a HistoryProjection<'a>,
    unit: UnitIndex,
}

impl<'a> ScheduleContext<'a> {
    pub(crate) fn new(
        graph: &'a UnitGraph,
        projection: &'a HistoryProjection<'a>,
        unit: UnitIndex,
    ) -> Self {
        Self {
            graph,
            projection,
            unit,
        }
    }

    /// Identity of the unit being scheduled.
    pub fn identity(&self) -> &UnitIdentity {
        self.graph.unit(self.unit).identity()
    }

    /// The workflow's start input.
    pub fn workflow_input(&self) -> String {
        self.projection.workflow_input()
    }

    /// The unit's own latest event, if any.
    pub fn latest_event(&self) -> TillerResult<Option<UnitEvent>> {
        self.projection.latest_event_for(self.unit)
    }

    /// The latest result of any declared unit, typically a parent whose
    /// output feeds this unit's input.
    pub fn result_of(&self, identity: &UnitIdentity) -> TillerResult<Option<String>> {
        let index = self
            .graph
            .index_of(identity)
            .ok_or_else(|| TillerError::UnknownUnit(identity.to_string()))?;
        Ok(self
            .projection
            .latest_event_for(index)?
            .and_then(|event| event.result().map(str::to_string)))
    }

    /// Shorthand for [`Self::result_of`] on a task identity.
    pub fn parent_result(&self, name: &str, version: &str) -> TillerResult<Option<String>> {
        self.result_of(&UnitIdentity::task(name, version)?)
    }
}
