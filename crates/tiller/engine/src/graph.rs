//! The unit graph
//!
//! The graph is built once per orchestrator and never mutated afterwards.
//! Nodes own their declared parents; children and roots are derived at
//! build time. Everything user-supplied (handlers, producers, gates) is an
//! `Arc<dyn Fn .. + Send + Sync>` so one graph can serve many concurrent
//! executions while each decision cycle stays single-threaded.

use crate::projection::ScheduleContext;
use std::collections::HashMap;
use std::sync::Arc;
use tiller_types::{
    Action, CorrelationToken, Decision, FlowEvent, TillerError, TillerResult, UnitEvent,
    UnitIdentity,
};

// ── Callable aliases ─────────────────────────────────────────────────

/// Error type user-supplied producers may fail with.
pub type ProducerError = Box<dyn std::error::Error + Send + Sync>;

/// Produces the input payload for a unit about to be scheduled.
pub type InputProducer =
    Arc<dyn Fn(&ScheduleContext<'_>) -> Result<String, ProducerError> + Send + Sync>;

/// Per-outcome handler attached to a unit.
pub type EventHandler = Arc<dyn Fn(&UnitEvent) -> Action + Send + Sync>;

/// Handler for workflow-scope events.
pub type FlowHandler = Arc<dyn Fn(&FlowEvent) -> Action + Send + Sync>;

/// Gating predicate evaluated when a unit is about to be scheduled.
pub type GatePredicate = Arc<dyn Fn(&ScheduleContext<'_>) -> bool + Send + Sync>;

/// Produces the wrapped action of a custom unit.
pub type ActionProducer = Arc<dyn Fn(&ScheduleContext<'_>) -> Action + Send + Sync>;

/// Lets user code override or veto a closing decision. `None` vetoes.
pub type ClosingHook = Arc<dyn Fn(&Decision) -> Option<Decision> + Send + Sync>;

// ── Units ────────────────────────────────────────────────────────────

/// Handle to a node in the graph arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UnitIndex(usize);

impl UnitIndex {
    pub(crate) fn get(self) -> usize {
        self.0
    }
}

/// What kind of work a unit stands for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnitKind {
    /// A remote task executed by a worker.
    Task,
    /// A durable timer.
    Timer { duration_secs: u64 },
    /// A nested workflow execution.
    ChildWorkflow,
    /// A parentless pseudo-unit wrapping an arbitrary action.
    Custom,
}

/// What happens when a unit's `when` gate evaluates false.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WhenFalse {
    /// Schedule the first join point past the unit so forks with a dead
    /// branch do not deadlock. The default.
    TriggerJoin,
    /// Produce nothing and leave the branch as it stands.
    KeepBranch,
}

/// A scheduling gate: the unit is only scheduled while the predicate
/// holds.
#[derive(Clone)]
pub struct WhenGate {
    pub predicate: GatePredicate,
    pub on_false: WhenFalse,
}

/// Per-unit configuration, fixed before the first event is interpreted.
#[derive(Clone, Default)]
pub struct UnitConfig {
    pub input: Option<InputProducer>,
    pub priority: Option<i32>,
    pub timeout_secs: Option<u64>,
    pub when: Option<WhenGate>,
    pub on_completion: Option<EventHandler>,
    pub on_failure: Option<EventHandler>,
    pub on_timeout: Option<EventHandler>,
    pub on_cancelled: Option<EventHandler>,
    pub on_scheduling_failed: Option<EventHandler>,
    pub on_cancel_request_failed: Option<EventHandler>,
    pub on_fired: Option<EventHandler>,
    pub custom_action: Option<ActionProducer>,
}

/// Declaration of one unit, consumed by [`UnitGraph::build`].
pub struct UnitSpec {
    pub identity: UnitIdentity,
    pub kind: UnitKind,
    pub parents: Vec<UnitIdentity>,
    pub config: UnitConfig,
}

impl UnitSpec {
    pub fn task(identity: UnitIdentity) -> Self {
        Self::new(identity, UnitKind::Task)
    }

    pub fn timer(identity: UnitIdentity, duration_secs: u64) -> Self {
        Self::new(identity, UnitKind::Timer { duration_secs })
    }

    pub fn child_workflow(identity: UnitIdentity) -> Self {
        Self::new(identity, UnitKind::ChildWorkflow)
    }

    pub fn custom(identity: UnitIdentity) -> Self {
        Self::new(identity, UnitKind::Custom)
    }

    fn new(identity: UnitIdentity, kind: UnitKind) -> Self {
        Self {
            identity,
            kind,
            parents: Vec::new(),
            config: UnitConfig::default(),
        }
    }

    pub fn with_parent(mut self, parent: UnitIdentity) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn with_config(mut self, config: UnitConfig) -> Self {
        self.config = config;
        self
    }
}

/// A node of the built graph.
pub struct UnitNode {
    identity: UnitIdentity,
    token: CorrelationToken,
    kind: UnitKind,
    parents: Vec<UnitIndex>,
    config: UnitConfig,
}

impl UnitNode {
    pub fn identity(&self) -> &UnitIdentity {
        &self.identity
    }

    pub fn token(&self) -> &CorrelationToken {
        &self.token
    }

    pub fn kind(&self) -> &UnitKind {
        &self.kind
    }

    pub fn parents(&self) -> &[UnitIndex] {
        &self.parents
    }

    pub fn config(&self) -> &UnitConfig {
        &self.config
    }
}

// ── Graph ────────────────────────────────────────────────────────────

/// The immutable schedulable-unit graph for one workflow type.
pub struct UnitGraph {
    units: Vec<UnitNode>,
    children: Vec<Vec<UnitIndex>>,
    by_token: HashMap<CorrelationToken, UnitIndex>,
    roots: Vec<UnitIndex>,
}

impl UnitGraph {
    /// Build and validate the graph. Fails fast on a duplicate unit, an
    /// undeclared or self parent, and any dependency cycle.
    pub fn build(specs: Vec<UnitSpec>) -> TillerResult<Self> {
        if specs.is_empty() {
            return Err(TillerError::EmptyWorkflow);
        }

        let mut by_token = HashMap::new();
        for (position, spec) in specs.iter().enumerate() {
            let token = spec.identity.token();
            if by_token.insert(token, UnitIndex(position)).is_some() {
                return Err(TillerError::DuplicateUnit(spec.identity.to_string()));
            }
        }

        let mut units = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut parents = Vec::with_capacity(spec.parents.len());
            for parent in &spec.parents {
                if *parent == spec.identity {
                    return Err(TillerError::SelfParent(spec.identity.to_string()));
                }
                let index = by_token.get(&parent.token()).copied().ok_or_else(|| {
                    TillerError::UnknownParent {
                        unit: spec.identity.to_string(),
                        parent: parent.to_string(),
                    }
                })?;
                parents.push(index);
            }
            units.push(UnitNode {
                token: spec.identity.token(),
                identity: spec.identity,
                kind: spec.kind,
                parents,
                config: spec.config,
            });
        }

        let mut children = vec![Vec::new(); units.len()];
        for (position, unit) in units.iter().enumerate() {
            for parent in &unit.parents {
                children[parent.get()].push(UnitIndex(position));
            }
        }

        let roots = units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.parents.is_empty())
            .map(|(position, _)| UnitIndex(position))
            .collect();

        let graph = Self {
            units,
            children,
            by_token,
            roots,
        };
        graph.reject_cycles()?;
        Ok(graph)
    }

    /// Walk the whole parent relation; a unit reachable from itself is a
    /// cycle, however many hops it takes.
    fn reject_cycles(&self) -> TillerResult<()> {
        const UNSEEN: u8 = 0;
        const ON_PATH: u8 = 1;
        const DONE: u8 = 2;

        fn visit(graph: &UnitGraph, unit: UnitIndex, state: &mut [u8]) -> TillerResult<()> {
            match state[unit.get()] {
                ON_PATH => {
                    return Err(TillerError::DependencyCycle(
                        graph.unit(unit).identity().to_string(),
                    ))
                }
                DONE => return Ok(()),
                _ => {}
            }
            state[unit.get()] = ON_PATH;
            for &parent in graph.unit(unit).parents() {
                visit(graph, parent, state)?;
            }
            state[unit.get()] = DONE;
            Ok(())
        }

        let mut state = vec![UNSEEN; self.units.len()];
        for index in self.indices() {
            visit(self, index, &mut state)?;
        }
        Ok(())
    }

    pub fn unit(&self, index: UnitIndex) -> &UnitNode {
        &self.units[index.get()]
    }

    pub fn index_of(&self, identity: &UnitIdentity) -> Option<UnitIndex> {
        self.by_token.get(&identity.token()).copied()
    }

    pub fn index_of_token(&self, token: &CorrelationToken) -> Option<UnitIndex> {
        self.by_token.get(token).copied()
    }

    pub fn children(&self, index: UnitIndex) -> &[UnitIndex] {
        &self.children[index.get()]
    }

    /// Units with no declared parents, in declaration order.
    pub fn roots(&self) -> &[UnitIndex] {
        &self.roots
    }

    pub fn indices(&self) -> impl Iterator<Item = UnitIndex> {
        (0..self.units.len()).map(UnitIndex)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str) -> UnitIdentity {
        UnitIdentity::task(name, "1.0").unwrap()
    }

    #[test]
    fn test_build_links_children_and_roots() {
        let graph = UnitGraph::build(vec![
            UnitSpec::task(task("a")),
            UnitSpec::task(task("b")).with_parent(task("a")),
            UnitSpec::task(task("c")).with_parent(task("a")),
        ])
        .unwrap();

        let a = graph.index_of(&task("a")).unwrap();
        assert_eq!(graph.roots(), &[a]);
        assert_eq!(graph.children(a).len(), 2);
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_empty_graph_rejected() {
        assert!(matches!(
            UnitGraph::build(Vec::new()),
            Err(TillerError::EmptyWorkflow)
        ));
    }

    #[test]
    fn test_duplicate_unit_rejected() {
        let result = UnitGraph::build(vec![
            UnitSpec::task(task("a")),
            UnitSpec::task(task("A")),
        ]);
        assert!(matches!(result, Err(TillerError::DuplicateUnit(_))));
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let result =
            UnitGraph::build(vec![UnitSpec::task(task("a")).with_parent(task("ghost"))]);
        assert!(matches!(result, Err(TillerError::UnknownParent { .. })));
    }

    #[test]
    fn test_self_parent_rejected() {
        let result = UnitGraph::build(vec![UnitSpec::task(task("a")).with_parent(task("a"))]);
        assert!(matches!(result, Err(TillerError::SelfParent(_))));
    }

    #[test]
    fn test_long_cycle_rejected() {
        // a -> b -> c -> a only closes after three hops
        let result = UnitGraph::build(vec![
            UnitSpec::task(task("a")).with_parent(task("c")),
            UnitSpec::task(task("b")).with_parent(task("a")),
            UnitSpec::task(task("c")).with_parent(task("b")),
        ]);
        assert!(matches!(result, Err(TillerError::DependencyCycle(_))));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let graph = UnitGraph::build(vec![
            UnitSpec::task(task("a")),
            UnitSpec::task(task("b")).with_parent(task("a")),
            UnitSpec::task(task("c")).with_parent(task("a")),
            UnitSpec::task(task("d"))
                .with_parent(task("b"))
                .with_parent(task("c")),
        ]);
        assert!(graph.is_ok());
    }

    #[test]
    fn test_lookup_by_token() {
        let graph = UnitGraph::build(vec![UnitSpec::task(task("a"))]).unwrap();
        let token = task("a").token();
        assert!(graph.index_of_token(&token).is_some());
    }
}
