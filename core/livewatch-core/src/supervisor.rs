//! Process-level lifecycle: startup, the drive loop, and ordered teardown.

use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::adapter::{RecorderControl, SignalSource};
use crate::cadence::Ticker;
use crate::config::RecorderEndpoint;
use crate::controller::{EndOutcome, EndTick};
use crate::error::{MonitorError, StartupError};
use crate::live_poller::LiveTick;
use crate::monitor::Monitor;
use crate::state::StateEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal,
    Fatal,
    /// One-shot mode finished its first recording session.
    SessionComplete,
}

impl ShutdownReason {
    pub fn exit_code(self) -> i32 {
        match self {
            ShutdownReason::Signal | ShutdownReason::SessionComplete => 0,
            ShutdownReason::Fatal => 1,
        }
    }
}

pub struct Supervisor<S: SignalSource, R: RecorderControl> {
    monitor: Monitor<S, R>,
    endpoint: RecorderEndpoint,
    cancel: CancellationToken,
    shutdown_started: AtomicBool,
    reason: Mutex<Option<ShutdownReason>>,
}

impl<S: SignalSource, R: RecorderControl> Supervisor<S, R> {
    pub fn new(monitor: Monitor<S, R>, endpoint: RecorderEndpoint) -> Self {
        Self {
            monitor,
            endpoint,
            cancel: CancellationToken::new(),
            shutdown_started: AtomicBool::new(false),
            reason: Mutex::new(None),
        }
    }

    pub fn monitor(&self) -> &Monitor<S, R> {
        &self.monitor
    }

    pub fn shutdown_reason(&self) -> Option<ShutdownReason> {
        *self.reason_guard()
    }

    /// Connects the recorder, opens a session on the target and runs the
    /// first live check. Any failure here is fatal; nothing is scheduled.
    pub async fn start(&self) -> Result<LiveTick, StartupError> {
        tracing::info!(address = %self.endpoint.address, "Connecting to recorder");
        self.monitor
            .recorder
            .connect(&self.endpoint.address, self.endpoint.credential.as_deref())
            .await?;

        self.monitor.open_session().await?;

        self.monitor.live_poller().resume();
        tracing::info!(
            live_check_interval_secs = self.monitor.settings.live_check_interval.as_secs(),
            "Monitor started; running initial live check"
        );
        Ok(self.monitor.live_poller().tick().await)
    }

    /// Drives both cadences until `stop` resolves, shutdown is requested,
    /// or one-shot mode completes. A panic inside the loop is returned as
    /// [`MonitorError::Panicked`].
    pub async fn run<F>(&self, stop: F) -> Result<ShutdownReason, MonitorError>
    where
        F: Future<Output = ShutdownReason>,
    {
        match AssertUnwindSafe(self.drive(stop)).catch_unwind().await {
            Ok(reason) => Ok(reason),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(panic = %message, "Monitor loop panicked");
                Err(MonitorError::Panicked(message))
            }
        }
    }

    async fn drive<F>(&self, stop: F) -> ShutdownReason
    where
        F: Future<Output = ShutdownReason>,
    {
        tokio::pin!(stop);
        let monitor = &self.monitor;
        let mut live_ticker = Ticker::new(&monitor.live_cadence);
        let mut end_ticker = Ticker::new(&monitor.end_cadence);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    return self.shutdown_reason().unwrap_or(ShutdownReason::Signal);
                }
                reason = &mut stop => {
                    tracing::info!(reason = ?reason, "Stop requested");
                    return reason;
                }
                _ = live_ticker.tick(&monitor.live_cadence), if monitor.live_cadence.is_running() => {
                    let outcome = monitor.live_poller().tick().await;
                    tracing::debug!(
                        outcome = ?outcome,
                        status = ?monitor.status(),
                        "Live tick finished"
                    );
                }
                _ = end_ticker.tick(&monitor.end_cadence), if monitor.end_cadence.is_running() => {
                    let outcome = monitor.end_poller().tick().await;
                    tracing::debug!(
                        outcome = ?outcome,
                        status = ?monitor.status(),
                        "End tick finished"
                    );
                    if monitor.settings.stop_after_first_session
                        && matches!(outcome, EndTick::Ended(EndOutcome::Stopped { .. }))
                    {
                        tracing::info!("First session recorded; stopping");
                        return ShutdownReason::SessionComplete;
                    }
                }
            }
        }
    }

    /// Stops polling and releases every adapter resource. Only the first
    /// call does anything; it returns false for later calls.
    pub async fn shutdown(&self, reason: ShutdownReason) -> bool {
        if self.shutdown_started.swap(true, Ordering::SeqCst) {
            tracing::debug!(reason = ?reason, "Shutdown already in progress");
            return false;
        }
        *self.reason_guard() = Some(reason);
        tracing::info!(reason = ?reason, "Shutting down monitor");

        let monitor = &self.monitor;
        self.cancel.cancel();
        monitor.live_cadence.close();
        monitor.end_cadence.close();
        monitor.live_lock.close();
        monitor.end_lock.close();

        let _gate = monitor.transition_gate.lock().await;
        if monitor.recording.swap(false, Ordering::SeqCst) {
            match monitor.recorder.stop_recording().await {
                Ok(()) => tracing::info!("Recording stopped during shutdown"),
                Err(err) => tracing::warn!(
                    error = %err,
                    kind = err.kind(),
                    "Failed to stop recording during shutdown"
                ),
            }
            let _ = monitor.state.apply(StateEvent::RecordingStopped);
            monitor.record_recording_finished();
        }

        monitor.source.close().await;
        monitor.invalidate_session();
        monitor.recorder.disconnect().await;

        tracing::info!(status = ?monitor.status(), "Monitor stopped");
        true
    }

    fn reason_guard(&self) -> MutexGuard<'_, Option<ShutdownReason>> {
        self.reason.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
