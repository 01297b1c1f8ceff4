//! The fluent workflow builder
//!
//! Declaration drafts collect the author's units, parent links, gates and
//! handlers; [`WorkflowBuilder::build`] validates the drafts, resolves
//! them into the engine's unit specs and hands back a ready
//! [`DecisionOrchestrator`]. All configuration is fixed here, before the
//! first event is ever interpreted.

use crate::errors::{DslError, DslResult};
use crate::validator;
use std::sync::Arc;
use tiller_engine::{
    DecisionOrchestrator, ProducerError, ScheduleContext, UnitConfig, UnitGraph, UnitSpec,
    WhenFalse, WhenGate,
};
use tiller_types::{Action, Decision, FlowEvent, TillerResult, UnitEvent, UnitIdentity};

// ── Parent references ────────────────────────────────────────────────

/// A parent named before the graph exists: by task/child-workflow triple
/// or by timer name.
#[derive(Clone, Debug)]
pub enum ParentRef {
    Task {
        name: String,
        version: String,
        positional: String,
    },
    Timer {
        name: String,
    },
}

impl ParentRef {
    pub fn task(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::Task {
            name: name.into(),
            version: version.into(),
            positional: String::new(),
        }
    }

    pub fn task_at(
        name: impl Into<String>,
        version: impl Into<String>,
        positional: impl Into<String>,
    ) -> Self {
        Self::Task {
            name: name.into(),
            version: version.into(),
            positional: positional.into(),
        }
    }

    pub fn timer(name: impl Into<String>) -> Self {
        Self::Timer { name: name.into() }
    }

    pub(crate) fn resolve(&self) -> TillerResult<UnitIdentity> {
        match self {
            Self::Task {
                name,
                version,
                positional,
            } => UnitIdentity::new(name.clone(), version.clone(), positional.clone()),
            Self::Timer { name } => UnitIdentity::timer(name.clone()),
        }
    }

    pub(crate) fn key(&self) -> (String, String, String) {
        match self {
            Self::Task {
                name,
                version,
                positional,
            } => (
                name.to_lowercase(),
                version.to_lowercase(),
                positional.to_lowercase(),
            ),
            Self::Timer { name } => (name.to_lowercase(), String::new(), String::new()),
        }
    }

    pub(crate) fn display(&self) -> String {
        match self {
            Self::Task {
                name,
                version,
                positional,
            } if positional.is_empty() => format!("{name}/{version}"),
            Self::Task {
                name,
                version,
                positional,
            } => format!("{name}/{version}#{positional}"),
            Self::Timer { name } => name.clone(),
        }
    }
}

// ── Unit drafts ──────────────────────────────────────────────────────

/// Draft of a remote-task unit.
pub struct TaskUnit {
    name: String,
    version: String,
    positional: String,
    parents: Vec<ParentRef>,
    config: UnitConfig,
}

impl TaskUnit {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            positional: String::new(),
            parents: Vec::new(),
            config: UnitConfig::default(),
        }
    }

    /// Distinguish this declaration from other declarations of the same
    /// task elsewhere in the graph.
    pub fn at(mut self, positional: impl Into<String>) -> Self {
        self.positional = positional.into();
        self
    }

    pub fn after_task(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.parents.push(ParentRef::task(name, version));
        self
    }

    pub fn after_timer(mut self, name: impl Into<String>) -> Self {
        self.parents.push(ParentRef::timer(name));
        self
    }

    pub fn after(mut self, parent: ParentRef) -> Self {
        self.parents.push(parent);
        self
    }

    /// Input producer; without one the unit inherits the workflow input.
    pub fn with_input<F>(mut self, producer: F) -> Self
    where
        F: Fn(&ScheduleContext<'_>) -> Result<String, ProducerError> + Send + Sync + 'static,
    {
        self.config.input = Some(Arc::new(producer));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.config.priority = Some(priority);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = Some(secs);
        self
    }

    /// Gate scheduling on a predicate; a false gate triggers the first
    /// join point downstream so forks with a dead branch do not deadlock.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ScheduleContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.config.when = Some(WhenGate {
            predicate: Arc::new(predicate),
            on_false: WhenFalse::TriggerJoin,
        });
        self
    }

    /// Like [`Self::when`], but a false gate produces nothing and leaves
    /// the branch as it stands.
    pub fn when_keeping_branch<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ScheduleContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.config.when = Some(WhenGate {
            predicate: Arc::new(predicate),
            on_false: WhenFalse::KeepBranch,
        });
        self
    }

    pub fn on_completion<F>(mut self, handler: F) -> Self
    where
        F: Fn(&UnitEvent) -> Action + Send + Sync + 'static,
    {
        self.config.on_completion = Some(Arc::new(handler));
        self
    }

    pub fn on_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(&UnitEvent) -> Action + Send + Sync + 'static,
    {
        self.config.on_failure = Some(Arc::new(handler));
        self
    }

    pub fn on_timeout<F>(mut self, handler: F) -> Self
    where
        F: Fn(&UnitEvent) -> Action + Send + Sync + 'static,
    {
        self.config.on_timeout = Some(Arc::new(handler));
        self
    }

    pub fn on_cancelled<F>(mut self, handler: F) -> Self
    where
        F: Fn(&UnitEvent) -> Action + Send + Sync + 'static,
    {
        self.config.on_cancelled = Some(Arc::new(handler));
        self
    }

    pub fn on_scheduling_failed<F>(mut self, handler: F) -> Self
    where
        F: Fn(&UnitEvent) -> Action + Send + Sync + 'static,
    {
        self.config.on_scheduling_failed = Some(Arc::new(handler));
        self
    }

    pub fn on_cancel_request_failed<F>(mut self, handler: F) -> Self
    where
        F: Fn(&UnitEvent) -> Action + Send + Sync + 'static,
    {
        self.config.on_cancel_request_failed = Some(Arc::new(handler));
        self
    }

    fn into_spec(self) -> DslResult<UnitSpec> {
        let identity = UnitIdentity::new(self.name, self.version, self.positional)?;
        let mut spec = UnitSpec::task(identity).with_config(self.config);
        for parent in &self.parents {
            spec = spec.with_parent(parent.resolve()?);
        }
        Ok(spec)
    }
}

/// Draft of a durable-timer unit.
pub struct TimerUnit {
    name: String,
    duration_secs: u64,
    parents: Vec<ParentRef>,
    config: UnitConfig,
}

impl TimerUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration_secs: 0,
            parents: Vec::new(),
            config: UnitConfig::default(),
        }
    }

    pub fn fire_after_secs(mut self, secs: u64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn after_task(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.parents.push(ParentRef::task(name, version));
        self
    }

    pub fn after_timer(mut self, name: impl Into<String>) -> Self {
        self.parents.push(ParentRef::timer(name));
        self
    }

    pub fn after(mut self, parent: ParentRef) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ScheduleContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.config.when = Some(WhenGate {
            predicate: Arc::new(predicate),
            on_false: WhenFalse::TriggerJoin,
        });
        self
    }

    pub fn on_fired<F>(mut self, handler: F) -> Self
    where
        F: Fn(&UnitEvent) -> Action + Send + Sync + 'static,
    {
        self.config.on_fired = Some(Arc::new(handler));
        self
    }

    pub fn on_cancel_request_failed<F>(mut self, handler: F) -> Self
    where
        F: Fn(&UnitEvent) -> Action + Send + Sync + 'static,
    {
        self.config.on_cancel_request_failed = Some(Arc::new(handler));
        self
    }

    fn into_spec(self) -> DslResult<UnitSpec> {
        let identity = UnitIdentity::timer(self.name)?;
        let mut spec = UnitSpec::timer(identity, self.duration_secs).with_config(self.config);
        for parent in &self.parents {
            spec = spec.with_parent(parent.resolve()?);
        }
        Ok(spec)
    }
}

/// Draft of a nested-workflow unit.
pub struct ChildWorkflowUnit {
    name: String,
    version: String,
    positional: String,
    parents: Vec<ParentRef>,
    config: UnitConfig,
}

impl ChildWorkflowUnit {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            positional: String::new(),
            parents: Vec::new(),
            config: UnitConfig::default(),
        }
    }

    pub fn at(mut self, positional: impl Into<String>) -> Self {
        self.positional = positional.into();
        self
    }

    pub fn after_task(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.parents.push(ParentRef::task(name, version));
        self
    }

    pub fn after_timer(mut self, name: impl Into<String>) -> Self {
        self.parents.push(ParentRef::timer(name));
        self
    }

    pub fn after(mut self, parent: ParentRef) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn with_input<F>(mut self, producer: F) -> Self
    where
        F: Fn(&ScheduleContext<'_>) -> Result<String, ProducerError> + Send + Sync + 'static,
    {
        self.config.input = Some(Arc::new(producer));
        self
    }

    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ScheduleContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.config.when = Some(WhenGate {
            predicate: Arc::new(predicate),
            on_false: WhenFalse::TriggerJoin,
        });
        self
    }

    pub fn on_completion<F>(mut self, handler: F) -> Self
    where
        F: Fn(&UnitEvent) -> Action + Send + Sync + 'static,
    {
        self.config.on_completion = Some(Arc::new(handler));
        self
    }

    pub fn on_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(&UnitEvent) -> Action + Send + Sync + 'static,
    {
        self.config.on_failure = Some(Arc::new(handler));
        self
    }

    pub fn on_timeout<F>(mut self, handler: F) -> Self
    where
        F: Fn(&UnitEvent) -> Action + Send + Sync + 'static,
    {
        self.config.on_timeout = Some(Arc::new(handler));
        self
    }

    pub fn on_cancelled<F>(mut self, handler: F) -> Self
    where
        F: Fn(&UnitEvent) -> Action + Send + Sync + 'static,
    {
        self.config.on_cancelled = Some(Arc::new(handler));
        self
    }

    fn into_spec(self) -> DslResult<UnitSpec> {
        let identity = UnitIdentity::new(self.name, self.version, self.positional)?;
        let mut spec = UnitSpec::child_workflow(identity).with_config(self.config);
        for parent in &self.parents {
            spec = spec.with_parent(parent.resolve()?);
        }
        Ok(spec)
    }
}

/// Draft of a parentless pseudo-unit wrapping an arbitrary action,
/// evaluated when the unit is scheduled.
pub struct CustomUnit {
    identity: UnitIdentity,
    config: UnitConfig,
}

impl CustomUnit {
    pub fn new<F>(name: impl Into<String>, action: F) -> DslResult<Self>
    where
        F: Fn(&ScheduleContext<'_>) -> Action + Send + Sync + 'static,
    {
        Ok(Self {
            identity: UnitIdentity::custom(name)?,
            config: UnitConfig {
                custom_action: Some(Arc::new(action)),
                ..UnitConfig::default()
            },
        })
    }

    pub fn anonymous<F>(action: F) -> Self
    where
        F: Fn(&ScheduleContext<'_>) -> Action + Send + Sync + 'static,
    {
        Self {
            identity: UnitIdentity::anonymous(),
            config: UnitConfig {
                custom_action: Some(Arc::new(action)),
                ..UnitConfig::default()
            },
        }
    }

    fn into_spec(self) -> DslResult<UnitSpec> {
        Ok(UnitSpec::custom(self.identity).with_config(self.config))
    }
}

pub(crate) enum UnitDraft {
    Task(TaskUnit),
    Timer(TimerUnit),
    Child(ChildWorkflowUnit),
    Custom(CustomUnit),
}

impl UnitDraft {
    pub(crate) fn key(&self) -> (String, String, String) {
        match self {
            Self::Task(t) => (
                t.name.to_lowercase(),
                t.version.to_lowercase(),
                t.positional.to_lowercase(),
            ),
            Self::Timer(t) => (t.name.to_lowercase(), String::new(), String::new()),
            Self::Child(c) => (
                c.name.to_lowercase(),
                c.version.to_lowercase(),
                c.positional.to_lowercase(),
            ),
            Self::Custom(c) => (
                c.identity.name().to_lowercase(),
                String::new(),
                String::new(),
            ),
        }
    }

    pub(crate) fn display(&self) -> String {
        match self {
            Self::Task(t) if t.positional.is_empty() => format!("{}/{}", t.name, t.version),
            Self::Task(t) => format!("{}/{}#{}", t.name, t.version, t.positional),
            Self::Timer(t) => t.name.clone(),
            Self::Child(c) if c.positional.is_empty() => format!("{}/{}", c.name, c.version),
            Self::Child(c) => format!("{}/{}#{}", c.name, c.version, c.positional),
            Self::Custom(c) => c.identity.name().to_string(),
        }
    }

    pub(crate) fn parents(&self) -> &[ParentRef] {
        match self {
            Self::Task(t) => &t.parents,
            Self::Timer(t) => &t.parents,
            Self::Child(c) => &c.parents,
            Self::Custom(_) => &[],
        }
    }

    fn into_spec(self) -> DslResult<UnitSpec> {
        match self {
            Self::Task(t) => t.into_spec(),
            Self::Timer(t) => t.into_spec(),
            Self::Child(c) => c.into_spec(),
            Self::Custom(c) => c.into_spec(),
        }
    }
}

// ── Workflow builder ─────────────────────────────────────────────────

/// Collects unit drafts and workflow-scope handlers, then builds the
/// orchestrator.
pub struct WorkflowBuilder {
    name: String,
    version: String,
    drafts: Vec<UnitDraft>,
    on_start: Option<Arc<dyn Fn(&FlowEvent) -> Action + Send + Sync>>,
    on_signal: Option<Arc<dyn Fn(&FlowEvent) -> Action + Send + Sync>>,
    on_cancel_request: Option<Arc<dyn Fn(&FlowEvent) -> Action + Send + Sync>>,
    on_close: Option<Arc<dyn Fn(&Decision) -> Option<Decision> + Send + Sync>>,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            drafts: Vec::new(),
            on_start: None,
            on_signal: None,
            on_cancel_request: None,
            on_close: None,
        }
    }

    pub fn with_task(mut self, task: TaskUnit) -> Self {
        self.drafts.push(UnitDraft::Task(task));
        self
    }

    pub fn with_timer(mut self, timer: TimerUnit) -> Self {
        self.drafts.push(UnitDraft::Timer(timer));
        self
    }

    pub fn with_child_workflow(mut self, child: ChildWorkflowUnit) -> Self {
        self.drafts.push(UnitDraft::Child(child));
        self
    }

    pub fn with_custom(mut self, custom: CustomUnit) -> Self {
        self.drafts.push(UnitDraft::Custom(custom));
        self
    }

    pub fn on_workflow_start<F>(mut self, handler: F) -> Self
    where
        F: Fn(&FlowEvent) -> Action + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(handler));
        self
    }

    pub fn on_signal<F>(mut self, handler: F) -> Self
    where
        F: Fn(&FlowEvent) -> Action + Send + Sync + 'static,
    {
        self.on_signal = Some(Arc::new(handler));
        self
    }

    pub fn on_cancel_request<F>(mut self, handler: F) -> Self
    where
        F: Fn(&FlowEvent) -> Action + Send + Sync + 'static,
    {
        self.on_cancel_request = Some(Arc::new(handler));
        self
    }

    pub fn on_close<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Decision) -> Option<Decision> + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(hook));
        self
    }

    /// Validate the drafts, build the graph and bind the handlers.
    pub fn build(self) -> DslResult<DecisionOrchestrator> {
        validator::validate(&self.drafts)?;

        let mut specs = Vec::with_capacity(self.drafts.len());
        for draft in self.drafts {
            specs.push(draft.into_spec()?);
        }
        let graph = UnitGraph::build(specs)?;

        let mut orchestrator = DecisionOrchestrator::new(self.name, self.version, graph);
        if let Some(handler) = self.on_start {
            orchestrator = orchestrator.on_workflow_start(move |event| handler(event));
        }
        if let Some(handler) = self.on_signal {
            orchestrator = orchestrator.on_signal(move |event| handler(event));
        }
        if let Some(handler) = self.on_cancel_request {
            orchestrator = orchestrator.on_cancel_request(move |event| handler(event));
        }
        if let Some(hook) = self.on_close {
            orchestrator = orchestrator.on_close(move |decision| hook(decision));
        }
        Ok(orchestrator)
    }
}
