//! Monitor lifecycle state and its transition table.
//!
//! `MonitorState` is only ever changed through [`StateCell::apply`], which
//! consults [`next_state`]. Events that make no sense in the current state
//! are rejected rather than silently overwriting it, so a late check result
//! can never knock the monitor out of `Recording`.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::recovery::RecoveryStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    #[default]
    Idle,
    Checking,
    Recording,
    RecoveringNav,
    RecoveringAuth,
}

impl MonitorState {
    pub fn is_recovering(self) -> bool {
        matches!(self, MonitorState::RecoveringNav | MonitorState::RecoveringAuth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    CheckStarted,
    CheckFinished,
    RecordingStarted,
    RecordingStopped,
    RecoveryStarted(RecoveryStep),
    RecoveryRestored,
}

pub fn next_state(current: MonitorState, event: StateEvent) -> Option<MonitorState> {
    use MonitorState::*;

    match (current, event) {
        (Idle, StateEvent::CheckStarted) => Some(Checking),
        (Checking, StateEvent::CheckFinished) => Some(Idle),
        (Idle | Checking, StateEvent::RecordingStarted) => Some(Recording),
        (Recording, StateEvent::RecordingStopped) => Some(Idle),
        (Recording, StateEvent::RecoveryStarted(_)) => None,
        (_, StateEvent::RecoveryStarted(RecoveryStep::Renavigate)) => Some(RecoveringNav),
        (_, StateEvent::RecoveryStarted(RecoveryStep::Reauthenticate)) => Some(RecoveringAuth),
        (RecoveringNav | RecoveringAuth, StateEvent::RecoveryRestored) => Some(Idle),
        _ => None,
    }
}

/// Returned when an event is not valid for the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectedTransition {
    pub current: MonitorState,
    pub event: StateEvent,
}

#[derive(Debug, Default)]
pub struct StateCell {
    inner: Mutex<MonitorState>,
}

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> MonitorState {
        *self.guard()
    }

    /// Applies `event`, returning the new state or the rejection.
    pub fn apply(&self, event: StateEvent) -> Result<MonitorState, RejectedTransition> {
        let mut state = self.guard();
        let current = *state;
        match next_state(current, event) {
            Some(next) => {
                *state = next;
                if next != current {
                    tracing::debug!(
                        from = ?current,
                        to = ?next,
                        event = ?event,
                        "Monitor state transition"
                    );
                }
                Ok(next)
            }
            None => {
                tracing::debug!(state = ?current, event = ?event, "Ignoring state event");
                Err(RejectedTransition { current, event })
            }
        }
    }

    fn guard(&self) -> MutexGuard<'_, MonitorState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
