//! Periodic "is the target live?" check.

use crate::adapter::{RecorderControl, SignalSource};
use crate::controller::BeginOutcome;
use crate::monitor::Monitor;
use crate::recovery::RecoveryCause;
use crate::state::{MonitorState, StateEvent};

/// What a single live tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveTick {
    /// A previous check still holds the poll lock.
    Busy,
    /// The live cadence is paused or closed.
    Suspended,
    Offline,
    RecordingStarted,
    /// The target was live but the recording did not start.
    BeginAborted,
    /// The result arrived but the monitor is no longer in a position to act.
    Ignored,
    /// The check failed and the recovery chain restored the session.
    Recovered,
    RecoveryExhausted,
}

pub struct LivePoller<'a, S: SignalSource, R: RecorderControl> {
    monitor: &'a Monitor<S, R>,
}

impl<'a, S: SignalSource, R: RecorderControl> LivePoller<'a, S, R> {
    pub(crate) fn new(monitor: &'a Monitor<S, R>) -> Self {
        Self { monitor }
    }

    pub async fn tick(&self) -> LiveTick {
        let monitor = self.monitor;
        if !monitor.live_cadence.is_running() {
            return LiveTick::Suspended;
        }

        let Some(permit) = monitor.live_lock.try_acquire() else {
            tracing::debug!("Live check still in flight; skipping tick");
            return LiveTick::Busy;
        };

        if monitor.state().is_recovering() {
            let report = monitor.recovery().run(RecoveryCause::Retry).await;
            if !report.restored() {
                return LiveTick::RecoveryExhausted;
            }
        }

        if monitor.state.apply(StateEvent::CheckStarted).is_err() {
            return LiveTick::Ignored;
        }
        monitor.record_live_check();

        let result = self.check().await;
        let _ = monitor.state.apply(StateEvent::CheckFinished);
        drop(permit);

        match result {
            Ok(false) => {
                tracing::debug!("Target is not live");
                LiveTick::Offline
            }
            Ok(true) => {
                // Suspension or shutdown may have landed while the query was in flight.
                if !monitor.live_cadence.is_running()
                    || monitor.state() == MonitorState::Recording
                    || monitor.is_recording()
                {
                    tracing::debug!("Discarding live result; monitor no longer polling");
                    return LiveTick::Ignored;
                }

                tracing::info!("Live indicator detected");
                match monitor.controller().begin().await {
                    BeginOutcome::Started => LiveTick::RecordingStarted,
                    BeginOutcome::RecorderFailed => LiveTick::BeginAborted,
                    BeginOutcome::AlreadyRecording
                    | BeginOutcome::Recovering
                    | BeginOutcome::ShuttingDown => LiveTick::Ignored,
                }
            }
            Err(cause) => {
                tracing::warn!(cause = %cause, kind = cause.kind(), "Live check failed");
                let report = monitor.recovery().run(cause).await;
                if report.restored() {
                    LiveTick::Recovered
                } else {
                    LiveTick::RecoveryExhausted
                }
            }
        }
    }

    /// Pauses the live cadence and waits for any in-flight check to finish.
    pub async fn suspend(&self) {
        self.monitor.live_cadence.pause();
        self.monitor.live_lock.wait_idle().await;
    }

    pub fn resume(&self) {
        self.monitor.live_cadence.resume();
    }

    pub fn is_suspended(&self) -> bool {
        !self.monitor.live_cadence.is_running()
    }

    async fn check(&self) -> Result<bool, RecoveryCause> {
        let monitor = self.monitor;
        let Some(session) = monitor.current_session() else {
            return Err(RecoveryCause::SessionMissing);
        };

        if let Err(err) = monitor.source.reload(&session).await {
            if err.invalidates_session() {
                monitor.invalidate_session();
            }
            return Err(RecoveryCause::Navigation(err));
        }

        monitor
            .source
            .is_live_indicator_present()
            .await
            .map_err(RecoveryCause::Query)
    }
}
