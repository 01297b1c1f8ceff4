//! Fluent Declaration Surface for Tiller Workflows
//!
//! Workflow authors declare their schedulable units here: tasks, timers,
//! nested workflows and ad-hoc actions, each with its parents, gates,
//! producers and per-outcome handlers. The builder's output is the
//! immutable graph the decision engine consumes; nothing in this crate
//! runs at decision time.
//!
//! # Example
//!
//! ```rust
//! use tiller_dsl::{TaskUnit, WorkflowBuilder};
//! use tiller_types::{Action, EventLog, HistoryAttributes, HistoryRecord};
//!
//! let orchestrator = WorkflowBuilder::new("media", "1.0")
//!     .with_task(TaskUnit::new("download", "1.0"))
//!     .with_task(
//!         TaskUnit::new("transcode", "1.0")
//!             .after_task("download", "1.0")
//!             .on_failure(|_| Action::reschedule().after_secs(60).up_to(2)),
//!     )
//!     .build()
//!     .unwrap();
//!
//! // the service delivered the first history page: the workflow started
//! let log = EventLog::fresh(vec![HistoryRecord::new(
//!     1,
//!     HistoryAttributes::WorkflowStarted { input: "job-7".into() },
//! )])
//! .unwrap();
//!
//! let decisions = orchestrator.decide(&log).unwrap();
//! assert_eq!(decisions.len(), 1); // schedule "download"
//! ```

#![deny(unsafe_code)]

mod builder;
mod errors;
mod validator;

pub use builder::{
    ChildWorkflowUnit, CustomUnit, ParentRef, TaskUnit, TimerUnit, WorkflowBuilder,
};
pub use errors::{DslError, DslResult};
