//! Recording session control.
//!
//! `begin` and `end` run under the monitor's transition gate, so overlapping
//! calls collapse into one recorder command. Recorder failures never block a
//! transition: a failed start returns to live polling, a failed stop is
//! logged and the session is closed out anyway.

use std::sync::atomic::Ordering;

use crate::adapter::{RecorderControl, SignalSource};
use crate::monitor::Monitor;
use crate::recovery::RecoveryCause;
use crate::state::{MonitorState, StateEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    Started,
    AlreadyRecording,
    /// The session is being restored; no recorder command was sent.
    Recovering,
    RecorderFailed,
    ShuttingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    Stopped { stop_failed: bool },
    NotRecording,
}

pub struct Controller<'a, S: SignalSource, R: RecorderControl> {
    monitor: &'a Monitor<S, R>,
}

impl<'a, S: SignalSource, R: RecorderControl> Controller<'a, S, R> {
    pub(crate) fn new(monitor: &'a Monitor<S, R>) -> Self {
        Self { monitor }
    }

    pub async fn begin(&self) -> BeginOutcome {
        let monitor = self.monitor;
        let _gate = monitor.transition_gate.lock().await;

        if monitor.live_cadence.is_closed() {
            return BeginOutcome::ShuttingDown;
        }
        if monitor.is_recording() || monitor.state() == MonitorState::Recording {
            tracing::debug!("Recording already active; ignoring begin");
            return BeginOutcome::AlreadyRecording;
        }

        monitor.live_poller().suspend().await;

        // Checked after the suspend so a check that just entered recovery is seen.
        let state = monitor.state();
        if state.is_recovering() {
            tracing::warn!(state = ?state, "Session is recovering; not starting a recording");
            monitor.live_poller().resume();
            return BeginOutcome::Recovering;
        }

        let mut live_view_opened = false;
        if let Some(session) = monitor.current_session() {
            match monitor.source.open_live_view(&session).await {
                Ok(()) => live_view_opened = true,
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        kind = err.kind(),
                        "Could not open live view; recording anyway"
                    );
                }
            }
        }

        if let Err(err) = monitor.recorder.start_recording().await {
            tracing::warn!(
                error = %err,
                kind = err.kind(),
                "Recorder did not start; resuming live polling"
            );
            if live_view_opened {
                self.return_to_target().await;
            }
            monitor.live_poller().resume();
            return BeginOutcome::RecorderFailed;
        }

        monitor.recording.store(true, Ordering::SeqCst);
        if let Err(rejected) = monitor.state.apply(StateEvent::RecordingStarted) {
            tracing::warn!(
                state = ?rejected.current,
                "Recording started outside a recordable state"
            );
        }
        monitor.record_recording_started();
        monitor.end_cadence.resume();
        tracing::info!(
            end_check_interval_secs = monitor.settings.end_check_interval.as_secs(),
            "Recording started"
        );
        BeginOutcome::Started
    }

    pub async fn end(&self) -> EndOutcome {
        let monitor = self.monitor;
        let _gate = monitor.transition_gate.lock().await;

        monitor.end_cadence.pause();
        if !monitor.is_recording() {
            return EndOutcome::NotRecording;
        }

        let stop_failed = match monitor.recorder.stop_recording().await {
            Ok(()) => {
                tracing::info!("Recording stopped");
                false
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    kind = err.kind(),
                    "Recorder did not confirm stop; closing session anyway"
                );
                true
            }
        };

        monitor.recording.store(false, Ordering::SeqCst);
        if let Err(rejected) = monitor.state.apply(StateEvent::RecordingStopped) {
            tracing::warn!(
                state = ?rejected.current,
                "Recording stopped outside the recording state"
            );
        }
        monitor.record_recording_finished();

        self.return_to_target().await;
        monitor.live_poller().resume();
        EndOutcome::Stopped { stop_failed }
    }

    /// Loads the target page again, handing failures to the recovery chain.
    async fn return_to_target(&self) {
        let monitor = self.monitor;
        let result = match monitor.current_session() {
            Some(session) => monitor
                .source
                .navigate_to_target(&session)
                .await
                .map_err(|err| {
                    if err.invalidates_session() {
                        monitor.invalidate_session();
                    }
                    RecoveryCause::Navigation(err)
                }),
            None => Err(RecoveryCause::SessionMissing),
        };

        if let Err(cause) = result {
            tracing::warn!(cause = %cause, "Could not return to target");
            monitor.recovery().run(cause).await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndTick {
    /// The end cadence is paused or nothing is being recorded.
    Inactive,
    Busy,
    Continuing,
    Ended(EndOutcome),
    QueryFailed,
}

/// Periodic "has the session ended?" check. Runs only while recording.
pub struct EndPoller<'a, S: SignalSource, R: RecorderControl> {
    monitor: &'a Monitor<S, R>,
}

impl<'a, S: SignalSource, R: RecorderControl> EndPoller<'a, S, R> {
    pub(crate) fn new(monitor: &'a Monitor<S, R>) -> Self {
        Self { monitor }
    }

    pub async fn tick(&self) -> EndTick {
        let monitor = self.monitor;
        if !monitor.end_cadence.is_running() || !monitor.is_recording() {
            return EndTick::Inactive;
        }

        let Some(permit) = monitor.end_lock.try_acquire() else {
            tracing::debug!("End check still in flight; skipping tick");
            return EndTick::Busy;
        };
        let result = monitor.source.is_end_indicator_present().await;
        drop(permit);

        match result {
            Ok(true) => {
                tracing::info!("End indicator detected");
                EndTick::Ended(monitor.controller().end().await)
            }
            Ok(false) => EndTick::Continuing,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    kind = err.kind(),
                    "End check failed; retrying next interval"
                );
                EndTick::QueryFailed
            }
        }
    }
}
