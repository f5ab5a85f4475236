//! Layered recovery for signal source failures.
//!
//! The chain is an ordered list of steps, each producing a typed outcome:
//!
//! 1. `Renavigate` - load the target again with the current session
//! 2. `Reauthenticate` - open a fresh session, then load the target
//!
//! The first step that restores the observed context ends the chain. An
//! exhausted chain leaves the monitor in a recovering state; the next live
//! tick starts over from step 1.

use serde::Serialize;
use std::fmt;

use crate::adapter::{RecorderControl, SignalSource};
use crate::error::{AuthError, NavError, QueryError};
use crate::monitor::Monitor;
use crate::state::StateEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStep {
    Renavigate,
    Reauthenticate,
}

/// Steps in the order they are attempted.
pub const RECOVERY_CHAIN: [RecoveryStep; 2] =
    [RecoveryStep::Renavigate, RecoveryStep::Reauthenticate];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Restored,
    /// The step had nothing to work with (e.g. no session to re-navigate).
    Unavailable,
    Failed(RecoveryFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryFailure {
    Navigation(NavError),
    Authentication(AuthError),
}

impl RecoveryFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            RecoveryFailure::Navigation(err) => err.kind(),
            RecoveryFailure::Authentication(err) => err.kind(),
        }
    }
}

impl fmt::Display for RecoveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryFailure::Navigation(err) => err.fmt(f),
            RecoveryFailure::Authentication(err) => err.fmt(f),
        }
    }
}

/// What sent the monitor into recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryCause {
    Query(QueryError),
    Navigation(NavError),
    SessionMissing,
    /// A previous chain was exhausted and the live tick is retrying it.
    Retry,
}

impl RecoveryCause {
    pub fn kind(&self) -> &'static str {
        match self {
            RecoveryCause::Query(err) => err.kind(),
            RecoveryCause::Navigation(err) => err.kind(),
            RecoveryCause::SessionMissing => "session_missing",
            RecoveryCause::Retry => "retry",
        }
    }
}

impl fmt::Display for RecoveryCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryCause::Query(err) => write!(f, "live query failed: {}", err),
            RecoveryCause::Navigation(err) => write!(f, "refresh failed: {}", err),
            RecoveryCause::SessionMissing => f.write_str("no active session"),
            RecoveryCause::Retry => f.write_str("previous recovery was exhausted"),
        }
    }
}

/// Steps attempted by one chain invocation, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    pub cause: RecoveryCause,
    pub attempts: Vec<(RecoveryStep, StepOutcome)>,
}

impl RecoveryReport {
    pub fn restored(&self) -> bool {
        self.restored_by().is_some()
    }

    pub fn restored_by(&self) -> Option<RecoveryStep> {
        self.attempts
            .iter()
            .find(|(_, outcome)| *outcome == StepOutcome::Restored)
            .map(|(step, _)| *step)
    }

    pub fn steps(&self) -> Vec<RecoveryStep> {
        self.attempts.iter().map(|(step, _)| *step).collect()
    }
}

pub struct RecoveryChain<'a, S: SignalSource, R: RecorderControl> {
    monitor: &'a Monitor<S, R>,
}

impl<'a, S: SignalSource, R: RecorderControl> RecoveryChain<'a, S, R> {
    pub(crate) fn new(monitor: &'a Monitor<S, R>) -> Self {
        Self { monitor }
    }

    pub async fn run(&self, cause: RecoveryCause) -> RecoveryReport {
        self.monitor.record_recovery_invocation();
        tracing::warn!(cause = %cause, kind = cause.kind(), "Starting recovery chain");

        let mut attempts = Vec::with_capacity(RECOVERY_CHAIN.len());
        for step in RECOVERY_CHAIN {
            let _ = self.monitor.state.apply(StateEvent::RecoveryStarted(step));

            let outcome = match step {
                RecoveryStep::Renavigate => self.renavigate().await,
                RecoveryStep::Reauthenticate => self.reauthenticate().await,
            };

            match &outcome {
                StepOutcome::Restored => {
                    tracing::info!(step = ?step, "Recovery step restored the session");
                }
                StepOutcome::Unavailable => {
                    tracing::debug!(step = ?step, "Recovery step unavailable");
                }
                StepOutcome::Failed(failure) => {
                    tracing::warn!(
                        step = ?step,
                        error = %failure,
                        kind = failure.kind(),
                        "Recovery step failed"
                    );
                }
            }

            let restored = outcome == StepOutcome::Restored;
            attempts.push((step, outcome));
            if restored {
                let _ = self.monitor.state.apply(StateEvent::RecoveryRestored);
                return RecoveryReport { cause, attempts };
            }
        }

        tracing::warn!(
            state = ?self.monitor.state(),
            "Recovery chain exhausted; retrying on next live tick"
        );
        RecoveryReport { cause, attempts }
    }

    async fn renavigate(&self) -> StepOutcome {
        let Some(session) = self.monitor.current_session() else {
            return StepOutcome::Unavailable;
        };

        match self.monitor.source.navigate_to_target(&session).await {
            Ok(()) => StepOutcome::Restored,
            Err(err) => {
                self.monitor.invalidate_session();
                StepOutcome::Failed(RecoveryFailure::Navigation(err))
            }
        }
    }

    async fn reauthenticate(&self) -> StepOutcome {
        let session = match self.monitor.source.authenticate().await {
            Ok(session) => session,
            Err(err) => return StepOutcome::Failed(RecoveryFailure::Authentication(err)),
        };

        match self.monitor.source.navigate_to_target(&session).await {
            Ok(()) => {
                self.monitor.replace_session(session);
                StepOutcome::Restored
            }
            Err(err) => StepOutcome::Failed(RecoveryFailure::Navigation(err)),
        }
    }
}
