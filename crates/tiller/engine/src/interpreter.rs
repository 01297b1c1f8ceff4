//! Event interpretation
//!
//! Each trigger event resolves to an action: the unit's registered
//! handler for that outcome when the author attached one, else the kind's
//! default from the closed dispatch table below. Reschedule-timer events
//! are internal machinery and never reach user handlers.

use crate::graph::{EventHandler, UnitNode};
use tiller_types::{Action, UnitEvent, UnitEventDetail};

/// Built-in action for an event kind when no handler is registered.
pub(crate) fn default_action(event: &UnitEvent) -> Action {
    use UnitEventDetail as D;
    match &event.detail {
        D::TaskCompleted { .. } | D::ChildCompleted { .. } => Action::Continue,
        D::TimerFired { is_reschedule } => {
            if *is_reschedule {
                // the delayed retry is due; run the owning unit again
                Action::reschedule()
            } else {
                Action::Continue
            }
        }
        D::TaskFailed { reason, detail } | D::ChildFailed { reason, detail } => {
            Action::fail(reason.clone(), detail.clone())
        }
        D::TaskTimedOut {
            timeout_kind,
            detail,
        } => Action::fail(timeout_kind.clone(), detail.clone()),
        D::ChildTimedOut => Action::fail("CHILD_WORKFLOW_TIMED_OUT", ""),
        D::TaskCancelled { detail } | D::ChildCancelled { detail } => {
            Action::cancel_workflow(detail.clone())
        }
        D::TaskSchedulingFailed { cause } => Action::fail("SCHEDULING_FAILED", cause.clone()),
        D::TaskCancelRequestFailed { cause } => {
            Action::fail("CANCEL_REQUEST_FAILED", cause.clone())
        }
        D::TimerStartFailed { cause } => Action::fail("TIMER_START_FAILED", cause.clone()),
        D::TimerCancellationFailed { cause } => {
            Action::fail("TIMER_CANCELLATION_FAILED", cause.clone())
        }
        D::ChildTerminated => Action::fail("CHILD_WORKFLOW_TERMINATED", ""),
        D::ChildStartFailed { cause } => {
            Action::fail("CHILD_WORKFLOW_START_FAILED", cause.clone())
        }
        // historical kinds resolve to nothing; branch evaluation is the
        // only caller that can reach them here
        D::TaskScheduled { .. }
        | D::TaskStarted
        | D::TaskCancelRequested
        | D::TimerStarted { .. }
        | D::TimerCancelled { .. }
        | D::ChildInitiated { .. }
        | D::ChildStarted => Action::ignore(),
    }
}

/// The handler registered for this event's outcome, if any.
pub(crate) fn handler_for<'n>(node: &'n UnitNode, event: &UnitEvent) -> Option<&'n EventHandler> {
    use UnitEventDetail as D;
    if event.is_reschedule_timer() {
        return None;
    }
    let config = node.config();
    match &event.detail {
        D::TaskCompleted { .. } | D::ChildCompleted { .. } => config.on_completion.as_ref(),
        D::TaskFailed { .. } | D::ChildFailed { .. } | D::ChildTerminated => {
            config.on_failure.as_ref()
        }
        D::TaskTimedOut { .. } | D::ChildTimedOut => config.on_timeout.as_ref(),
        D::TaskCancelled { .. } | D::ChildCancelled { .. } => config.on_cancelled.as_ref(),
        D::TaskSchedulingFailed { .. }
        | D::ChildStartFailed { .. }
        | D::TimerStartFailed { .. } => config.on_scheduling_failed.as_ref(),
        D::TaskCancelRequestFailed { .. } | D::TimerCancellationFailed { .. } => {
            config.on_cancel_request_failed.as_ref()
        }
        D::TimerFired { .. } => config.on_fired.as_ref(),
        _ => None,
    }
}

/// Resolve an event against its unit: handler if registered, default
/// otherwise. Used both during replay and by branch evaluation.
pub(crate) fn resolution_action(event: &UnitEvent, node: &UnitNode) -> Action {
    match handler_for(node, event) {
        Some(handler) => handler(event),
        None => default_action(event),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{UnitConfig, UnitGraph, UnitSpec};
    use std::sync::Arc;
    use tiller_types::{ChainRef, CorrelationToken, EventId, UnitIdentity};

    fn event(detail: UnitEventDetail) -> UnitEvent {
        UnitEvent {
            record_id: EventId(1),
            token: CorrelationToken::derive("a", "1.0", ""),
            chain: ChainRef::Scheduling(EventId(1)),
            detail,
        }
    }

    fn node(config: UnitConfig) -> UnitGraph {
        UnitGraph::build(vec![
            UnitSpec::task(UnitIdentity::task("a", "1.0").unwrap()).with_config(config),
        ])
        .unwrap()
    }

    #[test]
    fn test_default_failure_fails_the_workflow() {
        let action = default_action(&event(UnitEventDetail::TaskFailed {
            reason: "R".into(),
            detail: "D".into(),
        }));
        assert!(matches!(action, Action::Fail { .. }));
    }

    #[test]
    fn test_default_completion_continues() {
        let action = default_action(&event(UnitEventDetail::TaskCompleted {
            result: "ok".into(),
        }));
        assert!(matches!(action, Action::Continue));
    }

    #[test]
    fn test_reschedule_timer_fire_reschedules() {
        let action = default_action(&event(UnitEventDetail::TimerFired {
            is_reschedule: true,
        }));
        assert!(matches!(action, Action::Reschedule { .. }));
    }

    #[test]
    fn test_handler_overrides_default() {
        let config = UnitConfig {
            on_failure: Some(Arc::new(|_: &UnitEvent| Action::ignore())),
            ..UnitConfig::default()
        };
        let graph = node(config);
        let failed = event(UnitEventDetail::TaskFailed {
            reason: "R".into(),
            detail: "D".into(),
        });
        let unit = graph.unit(graph.indices().next().unwrap());
        assert!(matches!(
            resolution_action(&failed, unit),
            Action::Ignore { .. }
        ));
    }

    #[test]
    fn test_reschedule_timer_bypasses_handlers() {
        let config = UnitConfig {
            on_fired: Some(Arc::new(|_: &UnitEvent| Action::complete("early"))),
            ..UnitConfig::default()
        };
        let graph = node(config);
        let fired = event(UnitEventDetail::TimerFired {
            is_reschedule: true,
        });
        let unit = graph.unit(graph.indices().next().unwrap());
        assert!(matches!(
            resolution_action(&fired, unit),
            Action::Reschedule { .. }
        ));
    }
}
