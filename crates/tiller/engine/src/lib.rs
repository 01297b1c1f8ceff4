//! Tiller Decision Engine
//!
//! A client-side decision engine for a durable, event-sourced workflow
//! orchestration service. Given the ordered event history of one
//! execution and the declarative graph of schedulable units its author
//! supplied, the engine deterministically recomputes which units are due
//! and emits the matching orchestration decisions. The service that
//! persists the log, delivers decision batches and executes the scheduled
//! work is an external collaborator; the engine itself is a pure,
//! synchronous function re-invoked whenever new events arrive.
//!
//! # Architecture
//!
//! The [`DecisionOrchestrator`] composes specialized components:
//!
//! - [`UnitGraph`] — The immutable schedulable-unit graph, validated at
//!   build time (duplicates, unknown parents, cycles).
//! - [`HistoryProjection`] — The per-cycle, chain-deduplicated view over
//!   the raw log.
//! - [`BranchEvaluator`] — Decides whether every branch feeding a
//!   candidate unit has quiesced.
//! - The planner and reconciler — Expand interpreted actions into
//!   decisions, then arbitrate conflicting and closing decisions.
//!
//! # Key Principle
//!
//! **The engine recomputes, it never remembers.** All state is rebuilt
//! from the log each cycle; the same graph and the same log always yield
//! the same batch.

#![deny(unsafe_code)]

pub mod branch;
pub mod graph;
mod interpreter;
pub mod orchestrator;
mod planner;
pub mod projection;
mod reconciler;

pub use branch::{parent_branches, Branch, BranchEvaluator};
pub use graph::{
    ActionProducer, ClosingHook, EventHandler, FlowHandler, GatePredicate, InputProducer,
    ProducerError, UnitConfig, UnitGraph, UnitIndex, UnitKind, UnitNode, UnitSpec, WhenFalse,
    WhenGate,
};
pub use orchestrator::DecisionOrchestrator;
pub use projection::{HistoryProjection, ScheduleContext};
