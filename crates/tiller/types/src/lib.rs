//! Decision-Engine Domain Types for Tiller
//!
//! Tiller recomputes, from the ordered event history of one workflow
//! execution, the set of orchestration decisions that are due next. This
//! crate holds the vocabulary of that computation:
//!
//! - **UnitIdentity / CorrelationToken**: who a schedulable unit is, and the
//!   length-bounded token the orchestration service echoes back on events.
//! - **HistoryRecord / EventLog**: the raw, append-only event log plus the
//!   "new since last cycle" window.
//! - **UnitEvent / FlowEvent**: typed views over raw records. Each unit
//!   event knows which unit it belongs to, whether its operation is still
//!   outstanding, and whether it continues an attempt already counted.
//! - **Action**: what an interpreted event asks the engine to do next.
//!   Actions compose and expand into decisions.
//! - **Decision**: the final output unit, with closing/proposal flags and a
//!   priority used to arbitrate conflicting closes.
//!
//! # Design Principles
//!
//! 1. Everything here is a value. Events are rebuilt fresh each cycle from
//!    the log; nothing holds state between cycles.
//! 2. Event kinds form a closed sum type. There is no open hierarchy to
//!    extend; new kinds are new variants.
//! 3. Malformed history is an error, never a guess. A record that
//!    references a scheduling record the log does not contain fails the
//!    cycle with [`TillerError::IncompleteEventGraph`].

#![deny(unsafe_code)]

mod action;
mod control;
mod decision;
mod errors;
mod event;
mod history;
mod identity;

pub use action::*;
pub use control::*;
pub use decision::*;
pub use errors::*;
pub use event::*;
pub use history::*;
pub use identity::*;
