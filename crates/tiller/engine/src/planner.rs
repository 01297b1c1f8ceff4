//! Action planning
//!
//! Expands an interpreted action into zero or more decisions against the
//! graph and the projected history. Planning is where branch gating, the
//! `when` gate, reschedule limits and jump validation all land.

use crate::branch::BranchEvaluator;
use crate::graph::{UnitGraph, UnitIndex, UnitKind, WhenFalse};
use crate::interpreter::default_action;
use crate::projection::{HistoryProjection, ScheduleContext};
use tiller_types::{
    Action, ControlPayload, Decision, TillerError, TillerResult, UnitEvent, UnitEventDetail,
    UnitIdentity,
};

/// Where an action came from: a unit's event, or a workflow-scope event.
#[derive(Clone, Copy)]
pub(crate) enum ActionSource {
    Workflow,
    Unit(UnitIndex),
}

pub(crate) struct Planner<'a> {
    graph: &'a UnitGraph,
    projection: &'a HistoryProjection<'a>,
    evaluator: BranchEvaluator<'a>,
}

impl<'a> Planner<'a> {
    pub fn new(graph: &'a UnitGraph, projection: &'a HistoryProjection<'a>) -> Self {
        Self {
            graph,
            projection,
            evaluator: BranchEvaluator::new(graph, projection),
        }
    }

    pub fn plan(
        &self,
        action: &Action,
        source: ActionSource,
        trigger: Option<&UnitEvent>,
    ) -> TillerResult<Vec<Decision>> {
        match action {
            Action::Continue => self.plan_continue(source, trigger),
            Action::Reschedule { after_secs, limit } => {
                self.plan_reschedule(source, trigger, *after_secs, *limit)
            }
            Action::Cancel { targets } => self.plan_cancel(targets),
            Action::Ignore { .. } => Ok(Vec::new()),
            Action::Jump { target, after_secs } => self.plan_jump(source, target, *after_secs),
            Action::TriggerJoin => self.plan_trigger_join(source),
            Action::Complete { result } => Ok(vec![Decision::CompleteWorkflow {
                result: result.clone(),
                proposal: false,
            }]),
            Action::Fail { reason, detail } => Ok(vec![Decision::FailWorkflow {
                reason: reason.clone(),
                detail: detail.clone(),
            }]),
            Action::CancelWorkflow { detail } => Ok(vec![Decision::CancelWorkflow {
                detail: detail.clone(),
            }]),
            Action::Restart { input } => Ok(vec![Decision::ContinueAsNew {
                input: input.clone(),
            }]),
            Action::Emit { decisions } => Ok(decisions.clone()),
            Action::Composite { left, right } => {
                let mut decisions = self.plan(left, source, trigger)?;
                decisions.extend(self.plan(right, source, trigger)?);
                Ok(decisions)
            }
        }
    }

    /// Schedule every child whose other branches have quiesced; from the
    /// workflow scope, schedule the roots. A leaf unit continuing with no
    /// children proposes completion instead.
    fn plan_continue(
        &self,
        source: ActionSource,
        trigger: Option<&UnitEvent>,
    ) -> TillerResult<Vec<Decision>> {
        match source {
            ActionSource::Workflow => {
                let mut decisions = Vec::new();
                for &root in self.graph.roots() {
                    if self.is_in_flight(root)? {
                        continue;
                    }
                    decisions.extend(self.schedule_unit(root, false)?);
                }
                Ok(decisions)
            }
            ActionSource::Unit(unit) => {
                let children = self.graph.children(unit);
                if children.is_empty() {
                    let result = trigger
                        .and_then(UnitEvent::result)
                        .unwrap_or("Workflow is completed.")
                        .to_string();
                    return Ok(vec![Decision::CompleteWorkflow {
                        result,
                        proposal: true,
                    }]);
                }
                let mut decisions = Vec::new();
                for &child in children {
                    if self.is_in_flight(child)? {
                        continue;
                    }
                    if self.evaluator.can_schedule(child, Some(unit))? {
                        decisions.extend(self.schedule_unit(child, false)?);
                    }
                }
                Ok(decisions)
            }
        }
    }

    fn plan_reschedule(
        &self,
        source: ActionSource,
        trigger: Option<&UnitEvent>,
        after_secs: Option<u64>,
        limit: Option<u32>,
    ) -> TillerResult<Vec<Decision>> {
        let unit = self.require_unit(source, "reschedule")?;
        if let (Some(limit), Some(event)) = (limit, trigger) {
            if self.projection.attempts(unit)? > limit {
                // limit exhausted; degrade to the event's built-in action
                return self.plan(&default_action(event), source, trigger);
            }
        }
        match after_secs {
            None | Some(0) => self.schedule_unit(unit, false),
            Some(secs) => Ok(vec![Decision::StartTimer {
                token: self.graph.unit(unit).token().as_str().to_string(),
                duration_secs: secs,
                control: ControlPayload::reschedule().encode()?,
            }]),
        }
    }

    /// Cancel each target according to its latest operation. Targets with
    /// nothing outstanding yield nothing.
    fn plan_cancel(&self, targets: &[UnitIdentity]) -> TillerResult<Vec<Decision>> {
        let mut decisions = Vec::new();
        for identity in targets {
            let index = self
                .graph
                .index_of(identity)
                .ok_or_else(|| TillerError::UnknownUnit(identity.to_string()))?;
            let Some(latest) = self.projection.latest_event_for(index)? else {
                continue;
            };
            if !latest.is_active() {
                continue;
            }
            let token = self.graph.unit(index).token().as_str().to_string();
            let decision = match &latest.detail {
                UnitEventDetail::TimerStarted { .. } => Decision::CancelTimer { token },
                UnitEventDetail::ChildInitiated { .. } | UnitEventDetail::ChildStarted => {
                    Decision::RequestCancelExternal {
                        workflow_id: token,
                        run_id: String::new(),
                    }
                }
                _ => Decision::CancelTask { token },
            };
            decisions.push(decision);
        }
        Ok(decisions)
    }

    fn plan_jump(
        &self,
        source: ActionSource,
        target: &UnitIdentity,
        after_secs: Option<u64>,
    ) -> TillerResult<Vec<Decision>> {
        let from = self.require_unit(source, "jump")?;
        let target_index = self
            .graph
            .index_of(target)
            .ok_or_else(|| TillerError::UnknownUnit(target.to_string()))?;
        if target_index != from && !self.evaluator.within_branches(from, target_index) {
            return Err(TillerError::JumpOutOfBranch {
                from: self.graph.unit(from).identity().to_string(),
                target: target.to_string(),
            });
        }
        match after_secs {
            None | Some(0) => self.schedule_unit(target_index, true),
            Some(secs) => Ok(vec![Decision::StartTimer {
                token: self.graph.unit(target_index).token().as_str().to_string(),
                duration_secs: secs,
                control: ControlPayload::reschedule().encode()?,
            }]),
        }
    }

    fn plan_trigger_join(&self, source: ActionSource) -> TillerResult<Vec<Decision>> {
        let from = self.require_unit(source, "trigger-join")?;
        match self.evaluator.first_join_point(from) {
            Some(join)
                if !self.is_in_flight(join)?
                    && self.evaluator.can_schedule(join, Some(from))? =>
            {
                self.schedule_unit(join, false)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// A unit whose latest operation is still outstanding must not be
    /// scheduled on top of itself.
    fn is_in_flight(&self, unit: UnitIndex) -> TillerResult<bool> {
        Ok(self
            .projection
            .latest_event_for(unit)?
            .map_or(false, |event| event.is_active()))
    }

    /// The unit's own schedule decisions. `bypass_when` is set by jumps,
    /// which override the declared gating.
    pub(crate) fn schedule_unit(
        &self,
        unit: UnitIndex,
        bypass_when: bool,
    ) -> TillerResult<Vec<Decision>> {
        let node = self.graph.unit(unit);
        let ctx = ScheduleContext::new(self.graph, self.projection, unit);

        if !bypass_when {
            if let Some(gate) = &node.config().when {
                if !(gate.predicate)(&ctx) {
                    return match gate.on_false {
                        WhenFalse::KeepBranch => Ok(Vec::new()),
                        WhenFalse::TriggerJoin => {
                            self.plan_trigger_join(ActionSource::Unit(unit))
                        }
                    };
                }
            }
        }

        match node.kind() {
            UnitKind::Task => Ok(vec![Decision::ScheduleTask {
                token: node.token().as_str().to_string(),
                name: node.identity().name().to_string(),
                version: node.identity().version().to_string(),
                input: self.produce_input(&ctx, unit)?,
                control: ControlPayload::for_unit(node.identity().positional()).encode()?,
                priority: node.config().priority,
                timeout_secs: node.config().timeout_secs,
            }]),
            UnitKind::Timer { duration_secs } => Ok(vec![Decision::StartTimer {
                token: node.token().as_str().to_string(),
                duration_secs: *duration_secs,
                control: ControlPayload::for_timer(node.identity().name()).encode()?,
            }]),
            UnitKind::ChildWorkflow => Ok(vec![Decision::ScheduleChildWorkflow {
                token: node.token().as_str().to_string(),
                name: node.identity().name().to_string(),
                version: node.identity().version().to_string(),
                input: self.produce_input(&ctx, unit)?,
                control: ControlPayload::for_unit(node.identity().positional()).encode()?,
            }]),
            UnitKind::Custom => match &node.config().custom_action {
                Some(producer) => {
                    let action = producer(&ctx);
                    self.plan(&action, ActionSource::Unit(unit), None)
                }
                None => Ok(Vec::new()),
            },
        }
    }

    fn produce_input(&self, ctx: &ScheduleContext<'_>, unit: UnitIndex) -> TillerResult<String> {
        let node = self.graph.unit(unit);
        match &node.config().input {
            Some(producer) => producer(ctx).map_err(|source| TillerError::Handler {
                unit: node.identity().to_string(),
                source,
            }),
            // a unit without its own input producer inherits the workflow
            // input
            None => Ok(self.projection.workflow_input()),
        }
    }

    fn require_unit(&self, source: ActionSource, action: &str) -> TillerResult<UnitIndex> {
        match source {
            ActionSource::Unit(unit) => Ok(unit),
            ActionSource::Workflow => Err(TillerError::UnsupportedAction {
                action: action.to_string(),
                context: "workflow-scope events".to_string(),
            }),
        }
    }
}
