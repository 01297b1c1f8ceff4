//! The decision orchestrator
//!
//! Binds the unit graph, the per-cycle projection and the author's
//! handlers together. [`DecisionOrchestrator::decide`] is the engine's
//! whole surface: a synchronous, pure function from `(graph, log)` to a
//! decision batch. It performs no I/O, never retries, and holds no state
//! between cycles, so one orchestrator may serve concurrent executions.

use crate::graph::{ClosingHook, FlowHandler, UnitGraph};
use crate::interpreter::resolution_action;
use crate::planner::{ActionSource, Planner};
use crate::projection::HistoryProjection;
use crate::reconciler::{dedup, reconcile};
use tiller_types::{
    Action, Decision, EventLog, FlowEvent, FlowEventKind, ReplayEvent, TillerError, TillerResult,
    UnitEvent,
};

pub struct DecisionOrchestrator {
    name: String,
    version: String,
    graph: UnitGraph,
    on_start: Option<FlowHandler>,
    on_signal: Option<FlowHandler>,
    on_cancel_request: Option<FlowHandler>,
    on_close: Option<ClosingHook>,
}

impl DecisionOrchestrator {
    pub fn new(name: impl Into<String>, version: impl Into<String>, graph: UnitGraph) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            graph,
            on_start: None,
            on_signal: None,
            on_cancel_request: None,
            on_close: None,
        }
    }

    /// Handler for the workflow-started event. Default: schedule the
    /// graph's roots.
    pub fn on_workflow_start<F>(mut self, handler: F) -> Self
    where
        F: Fn(&FlowEvent) -> Action + Send + Sync + 'static,
    {
        self.on_start = Some(std::sync::Arc::new(handler));
        self
    }

    /// Handler for signals. Default: ignore without holding any branch.
    pub fn on_signal<F>(mut self, handler: F) -> Self
    where
        F: Fn(&FlowEvent) -> Action + Send + Sync + 'static,
    {
        self.on_signal = Some(std::sync::Arc::new(handler));
        self
    }

    /// Handler for a cancellation request. Default: cancel the workflow.
    pub fn on_cancel_request<F>(mut self, handler: F) -> Self
    where
        F: Fn(&FlowEvent) -> Action + Send + Sync + 'static,
    {
        self.on_cancel_request = Some(std::sync::Arc::new(handler));
        self
    }

    /// Hook invoked with the winning closing decision of a cycle; may
    /// replace it or veto it with `None`.
    pub fn on_close<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Decision) -> Option<Decision> + Send + Sync + 'static,
    {
        self.on_close = Some(std::sync::Arc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn graph(&self) -> &UnitGraph {
        &self.graph
    }

    /// Run one decision cycle: replay the log's new-events window in
    /// order, interpret each trigger into an action, expand actions into
    /// decisions and reconcile the batch.
    pub fn decide(&self, log: &EventLog) -> TillerResult<Vec<Decision>> {
        let projection = HistoryProjection::new(&self.graph, log);
        let planner = Planner::new(&self.graph, &projection);

        let mut batch: Vec<Decision> = Vec::new();
        for record in log.new_records() {
            let event = ReplayEvent::from_record(record, log)?;
            if !event.is_trigger() {
                continue;
            }
            let decisions = match &event {
                ReplayEvent::Unit(unit_event) => self.interpret_unit(unit_event, &planner)?,
                ReplayEvent::Flow(flow_event) => self.interpret_flow(flow_event, &planner)?,
            };
            tracing::debug!(
                record = record.id.0,
                kind = record.attributes.kind_name(),
                decisions = decisions.len(),
                "interpreted event"
            );
            batch.extend(decisions);
        }

        let reconciled = reconcile(
            dedup(batch),
            projection.has_active_event()?,
            self.on_close.as_ref(),
        );
        tracing::info!(
            workflow = %self.name,
            version = %self.version,
            decisions = reconciled.len(),
            "decision cycle complete"
        );
        Ok(reconciled)
    }

    fn interpret_unit(
        &self,
        event: &UnitEvent,
        planner: &Planner<'_>,
    ) -> TillerResult<Vec<Decision>> {
        let index = self.graph.index_of_token(&event.token).ok_or_else(|| {
            TillerError::UnknownToken {
                token: event.token.to_string(),
                event: event.record_id,
            }
        })?;
        if !event.is_trigger() {
            return Err(TillerError::NonActionableEvent(event.record_id));
        }
        let action = resolution_action(event, self.graph.unit(index));
        planner.plan(&action, ActionSource::Unit(index), Some(event))
    }

    fn interpret_flow(
        &self,
        event: &FlowEvent,
        planner: &Planner<'_>,
    ) -> TillerResult<Vec<Decision>> {
        let action = match &event.kind {
            FlowEventKind::Started { .. } => match &self.on_start {
                Some(handler) => handler(event),
                None => Action::Continue,
            },
            FlowEventKind::Signaled { .. } => match &self.on_signal {
                Some(handler) => handler(event),
                None => Action::ignore(),
            },
            FlowEventKind::CancelRequested { cause } => match &self.on_cancel_request {
                Some(handler) => handler(event),
                None => Action::cancel_workflow(cause.clone()),
            },
        };
        planner.plan(&action, ActionSource::Workflow, None)
    }
}
