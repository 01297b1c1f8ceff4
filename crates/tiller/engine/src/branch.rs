//! Branch reachability
//!
//! A branch is an ephemeral path from a candidate unit up through its
//! parent chain to a root. A child may only be scheduled when every branch
//! feeding it has quiesced. Quiescence is a dual predicate: the branch's
//! immediate node being ready to schedule children unlocks the branch
//! outright, while any node on the path still "keeping the branch active"
//! holds it — a resolved node can hold its branch open (repeat patterns,
//! `when` gating) without being ready to advance children, which is why
//! the two predicates never collapse into one.

use crate::graph::{UnitGraph, UnitIndex};
use crate::interpreter::resolution_action;
use crate::projection::HistoryProjection;
use std::collections::{HashSet, VecDeque};
use tiller_types::{TillerResult, UnitIdentity};

/// A root-ward path of units: immediate parent first, root last.
#[derive(Clone, Debug)]
pub struct Branch {
    path: Vec<UnitIndex>,
}

impl Branch {
    pub fn path(&self) -> &[UnitIndex] {
        &self.path
    }

    pub fn contains(&self, unit: UnitIndex) -> bool {
        self.path.contains(&unit)
    }
}

/// Every root-to-unit path through the parent graph, one branch per
/// distinct path. The graph is validated acyclic, so recursion terminates.
pub fn parent_branches(graph: &UnitGraph, unit: UnitIndex) -> Vec<Branch> {
    let mut branches = Vec::new();
    for &parent in graph.unit(unit).parents() {
        let ancestor_branches = parent_branches(graph, parent);
        if ancestor_branches.is_empty() {
            branches.push(Branch { path: vec![parent] });
        } else {
            for ancestor in ancestor_branches {
                let mut path = vec![parent];
                path.extend(ancestor.path);
                branches.push(Branch { path });
            }
        }
    }
    branches
}

/// Evaluates branch activity against the projected history.
pub struct BranchEvaluator<'a> {
    graph: &'a UnitGraph,
    projection: &'a HistoryProjection<'a>,
}

impl<'a> BranchEvaluator<'a> {
    pub fn new(graph: &'a UnitGraph, projection: &'a HistoryProjection<'a>) -> Self {
        Self { graph, projection }
    }

    /// A unit is ready to schedule children once its latest event has
    /// fully resolved and that resolution's action lets descendants
    /// proceed.
    fn ready_to_schedule_children(&self, unit: UnitIndex) -> TillerResult<bool> {
        match self.projection.latest_event_for(unit)? {
            None => Ok(false),
            Some(event) if event.is_active() => Ok(false),
            Some(event) => Ok(resolution_action(&event, self.graph.unit(unit))
                .ready_to_schedule_children()),
        }
    }

    /// Whether a unit is keeping its branch active: untouched units are
    /// not, in-flight operations are, and resolved units defer to their
    /// interpreted action.
    fn keeps_branch_active(
        &self,
        unit: UnitIndex,
        candidates: &[UnitIdentity],
    ) -> TillerResult<bool> {
        match self.projection.latest_event_for(unit)? {
            None => Ok(false),
            Some(event) if event.is_active() => Ok(true),
            Some(event) => Ok(resolution_action(&event, self.graph.unit(unit))
                .keeps_branch_active(candidates)),
        }
    }

    /// The gating test of the engine: inactive iff the immediate node is
    /// ready to schedule children, or no node on the path keeps the
    /// branch active.
    pub fn branch_is_active(
        &self,
        branch: &Branch,
        candidates: &[UnitIdentity],
    ) -> TillerResult<bool> {
        let Some(&immediate) = branch.path().first() else {
            return Ok(false);
        };
        if self.ready_to_schedule_children(immediate)? {
            return Ok(false);
        }
        for &unit in branch.path() {
            if self.keeps_branch_active(unit, candidates)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether `child` may be scheduled now: every parent branch not
    /// passing through `excluding` (the unit whose event triggered this
    /// evaluation) must be inactive.
    pub fn can_schedule(
        &self,
        child: UnitIndex,
        excluding: Option<UnitIndex>,
    ) -> TillerResult<bool> {
        let branches: Vec<Branch> = parent_branches(self.graph, child)
            .into_iter()
            .filter(|branch| excluding.map_or(true, |unit| !branch.contains(unit)))
            .collect();

        let mut candidates: Vec<UnitIdentity> = Vec::new();
        for branch in &branches {
            for &unit in branch.path() {
                let identity = self.graph.unit(unit).identity().clone();
                if !candidates.contains(&identity) {
                    candidates.push(identity);
                }
            }
        }

        for branch in &branches {
            if self.branch_is_active(branch, &candidates)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Nearest descendant of `from` with more than one parent, breadth
    /// first in declaration order.
    pub fn first_join_point(&self, from: UnitIndex) -> Option<UnitIndex> {
        let mut queue: VecDeque<UnitIndex> = self.graph.children(from).iter().copied().collect();
        let mut visited: HashSet<UnitIndex> = HashSet::new();
        while let Some(unit) = queue.pop_front() {
            if !visited.insert(unit) {
                continue;
            }
            if self.graph.unit(unit).parents().len() > 1 {
                return Some(unit);
            }
            queue.extend(self.graph.children(unit).iter().copied());
        }
        None
    }

    /// Whether `target` lies on a parent or child branch of `from`; jump
    /// targets outside those branches are structural errors.
    pub fn within_branches(&self, from: UnitIndex, target: UnitIndex) -> bool {
        self.reaches(from, target, Direction::Up) || self.reaches(from, target, Direction::Down)
    }

    fn reaches(&self, from: UnitIndex, target: UnitIndex, direction: Direction) -> bool {
        let mut queue = vec![from];
        let mut visited: HashSet<UnitIndex> = HashSet::new();
        while let Some(unit) = queue.pop() {
            if unit == target {
                return true;
            }
            if !visited.insert(unit) {
                continue;
            }
            match direction {
                Direction::Up => queue.extend(self.graph.unit(unit).parents().iter().copied()),
                Direction::Down => queue.extend(self.graph.children(unit).iter().copied()),
            }
        }
        false
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Up,
    Down,
}
