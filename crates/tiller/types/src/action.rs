//! The action algebra
//!
//! Interpreting an event yields an action: a description of what should
//! happen next, still abstract over the graph. The engine expands actions
//! into decisions. Actions compose with [`Action::and`]; composition is an
//! associative union of the two sides' decisions.
//!
//! Two predicates derived from an action drive branch evaluation. An
//! action that is "ready to schedule children" lets the resolved unit's
//! descendants proceed; an action that "keeps the branch active" holds the
//! branch open even though the unit itself has resolved (repeat-forever
//! and conditional-gating patterns rely on this distinction).

use crate::{Decision, UnitIdentity};

/// What an interpreted event asks the engine to do next.
#[derive(Clone, Debug)]
pub enum Action {
    /// Schedule every child whose incoming branches have all quiesced.
    Continue,

    /// Schedule the source unit again, immediately or after a delay,
    /// degrading to the triggering event's default action once the
    /// attempt limit is exhausted.
    Reschedule {
        after_secs: Option<u64>,
        limit: Option<u32>,
    },

    /// Cancel the targeted units, whatever their latest operation is.
    Cancel { targets: Vec<UnitIdentity> },

    /// Produce nothing. `keep_branch_active` decides whether the source
    /// unit still holds its branch open for join gating.
    Ignore { keep_branch_active: bool },

    /// Schedule a unit on one of the source's branches directly, bypassing
    /// its `when` gate. A delay routes through the target's reschedule
    /// timer.
    Jump {
        target: UnitIdentity,
        after_secs: Option<u64>,
    },

    /// Schedule the first join point past the source unit if its other
    /// branches have quiesced.
    TriggerJoin,

    /// Close the workflow successfully.
    Complete { result: String },

    /// Close the workflow as failed.
    Fail { reason: String, detail: String },

    /// Close the workflow as cancelled.
    CancelWorkflow { detail: String },

    /// Close this run and continue the workflow as a new run.
    Restart { input: String },

    /// Emit pre-built decisions verbatim (markers, signals, external
    /// cancels).
    Emit { decisions: Vec<Decision> },

    /// Union of two actions.
    Composite { left: Box<Action>, right: Box<Action> },
}

impl Action {
    // ── Constructors ─────────────────────────────────────────────────

    pub fn ignore() -> Self {
        Self::Ignore {
            keep_branch_active: false,
        }
    }

    /// Ignore the event but keep the source unit's branch open, so joins
    /// downstream stay gated.
    pub fn ignore_keeping_branch() -> Self {
        Self::Ignore {
            keep_branch_active: true,
        }
    }

    pub fn reschedule() -> Self {
        Self::Reschedule {
            after_secs: None,
            limit: None,
        }
    }

    pub fn jump_to(target: UnitIdentity) -> Self {
        Self::Jump {
            target,
            after_secs: None,
        }
    }

    pub fn cancel(target: UnitIdentity) -> Self {
        Self::Cancel {
            targets: vec![target],
        }
    }

    pub fn cancel_all(targets: Vec<UnitIdentity>) -> Self {
        Self::Cancel { targets }
    }

    pub fn complete(result: impl Into<String>) -> Self {
        Self::Complete {
            result: result.into(),
        }
    }

    pub fn fail(reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Fail {
            reason: reason.into(),
            detail: detail.into(),
        }
    }

    pub fn cancel_workflow(detail: impl Into<String>) -> Self {
        Self::CancelWorkflow {
            detail: detail.into(),
        }
    }

    pub fn restart(input: impl Into<String>) -> Self {
        Self::Restart {
            input: input.into(),
        }
    }

    pub fn record_marker(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Emit {
            decisions: vec![Decision::RecordMarker {
                name: name.into(),
                detail: detail.into(),
            }],
        }
    }

    pub fn signal(
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
        name: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self::Emit {
            decisions: vec![Decision::SignalExternal {
                workflow_id: workflow_id.into(),
                run_id: run_id.into(),
                name: name.into(),
                input: input.into(),
            }],
        }
    }

    // ── Fluent refinement ────────────────────────────────────────────

    /// Delay a reschedule or jump by `secs`. No-op on other variants.
    pub fn after_secs(self, secs: u64) -> Self {
        match self {
            Self::Reschedule { limit, .. } => Self::Reschedule {
                after_secs: Some(secs),
                limit,
            },
            Self::Jump { target, .. } => Self::Jump {
                target,
                after_secs: Some(secs),
            },
            other => other,
        }
    }

    /// Cap a reschedule at `limit` attempts. No-op on other variants.
    pub fn up_to(self, limit: u32) -> Self {
        match self {
            Self::Reschedule { after_secs, .. } => Self::Reschedule {
                after_secs,
                limit: Some(limit),
            },
            other => other,
        }
    }

    /// Compose two actions; the union of both sides' decisions.
    pub fn and(self, other: Action) -> Self {
        Self::Composite {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    // ── Branch predicates ────────────────────────────────────────────

    /// Whether the resolved unit's descendants may proceed.
    pub fn ready_to_schedule_children(&self) -> bool {
        match self {
            Self::Continue => true,
            Self::Composite { left, right } => {
                left.ready_to_schedule_children() || right.ready_to_schedule_children()
            }
            _ => false,
        }
    }

    /// Whether the resolved unit still holds its branch open, judged
    /// against the units on the candidate branches under evaluation.
    pub fn keeps_branch_active(&self, branch_units: &[UnitIdentity]) -> bool {
        match self {
            Self::Ignore { keep_branch_active } => *keep_branch_active,
            Self::Reschedule { .. } => true,
            Self::Jump { target, .. } => branch_units.contains(target),
            Self::Composite { left, right } => {
                left.keeps_branch_active(branch_units) || right.keeps_branch_active(branch_units)
            }
            _ => false,
        }
    }

    /// True when the action closes the workflow on at least one side.
    pub fn is_closing(&self) -> bool {
        match self {
            Self::Complete { .. }
            | Self::Fail { .. }
            | Self::CancelWorkflow { .. }
            | Self::Restart { .. } => true,
            Self::Composite { left, right } => left.is_closing() || right.is_closing(),
            _ => false,
        }
    }
}
