//! Control payload attached to scheduling and timer-start decisions
//!
//! The orchestration service treats the control field as an opaque blob
//! and echoes it back on the matching events. Tiller rides its own
//! correlation data in it: the positional discriminator of the scheduled
//! unit, and for timers the timer name plus whether the timer is a
//! reschedule timer standing in for a delayed retry.

use crate::{TillerError, TillerResult};
use serde::{Deserialize, Serialize};

/// Application-defined correlation data carried in the opaque control blob.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPayload {
    /// Positional discriminator of the scheduled unit, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub positional: String,

    /// True when the timer this rode on is a reschedule timer owned by a
    /// task, child-workflow or timer unit implementing a delayed retry.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_reschedule: bool,

    /// Declared name of the timer unit, when the blob rode on a plain
    /// timer start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_name: Option<String>,
}

impl ControlPayload {
    /// Control for scheduling a task or child-workflow unit.
    pub fn for_unit(positional: impl Into<String>) -> Self {
        Self {
            positional: positional.into(),
            ..Self::default()
        }
    }

    /// Control for starting a declared timer unit.
    pub fn for_timer(name: impl Into<String>) -> Self {
        Self {
            timer_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Control for a reschedule timer standing in for a delayed retry.
    pub fn reschedule() -> Self {
        Self {
            is_reschedule: true,
            ..Self::default()
        }
    }

    /// Serialize for the wire. The blob is opaque to the service.
    pub fn encode(&self) -> TillerResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a blob echoed back on an event. An empty blob decodes to the
    /// default payload.
    pub fn decode(raw: &str) -> TillerResult<Self> {
        if raw.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw).map_err(TillerError::from)
    }
}
