//! The owned monitor context.
//!
//! Everything the pollers, the controller and the recovery chain share lives
//! here: lifecycle state, the recording flag, the current session, both
//! cadences and both poll locks. Components borrow the context; nothing is
//! global.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::adapter::{RecorderControl, SignalSource};
use crate::cadence::Cadence;
use crate::config::MonitorSettings;
use crate::controller::{Controller, EndPoller};
use crate::error::StartupError;
use crate::live_poller::LivePoller;
use crate::lock::PollLock;
use crate::recovery::RecoveryChain;
use crate::state::{MonitorState, StateCell};

#[derive(Debug, Default)]
struct MonitorStats {
    sessions_recorded: u64,
    recovery_invocations: u64,
    last_live_check_at: Option<DateTime<Utc>>,
    recording_started_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of the monitor, suitable for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub recording: bool,
    pub live_polling: bool,
    pub end_polling: bool,
    pub sessions_recorded: u64,
    pub recovery_invocations: u64,
    pub last_live_check_at: Option<DateTime<Utc>>,
    pub recording_started_at: Option<DateTime<Utc>>,
}

pub struct Monitor<S: SignalSource, R: RecorderControl> {
    pub(crate) source: S,
    pub(crate) recorder: R,
    pub(crate) settings: MonitorSettings,
    pub(crate) state: StateCell,
    pub(crate) recording: AtomicBool,
    session: Mutex<Option<S::Session>>,
    pub(crate) live_cadence: Cadence,
    pub(crate) end_cadence: Cadence,
    pub(crate) live_lock: PollLock,
    pub(crate) end_lock: PollLock,
    /// Serializes `begin` and `end`, and shutdown's forced stop.
    pub(crate) transition_gate: tokio::sync::Mutex<()>,
    stats: Mutex<MonitorStats>,
}

impl<S: SignalSource, R: RecorderControl> Monitor<S, R> {
    pub fn new(source: S, recorder: R, settings: MonitorSettings) -> Self {
        Self {
            live_cadence: Cadence::new("live", settings.live_check_interval),
            end_cadence: Cadence::new("end", settings.end_check_interval),
            source,
            recorder,
            settings,
            state: StateCell::new(),
            recording: AtomicBool::new(false),
            session: Mutex::new(None),
            live_lock: PollLock::new("live"),
            end_lock: PollLock::new("end"),
            transition_gate: tokio::sync::Mutex::new(()),
            stats: Mutex::new(MonitorStats::default()),
        }
    }

    pub fn live_poller(&self) -> LivePoller<'_, S, R> {
        LivePoller::new(self)
    }

    pub fn end_poller(&self) -> EndPoller<'_, S, R> {
        EndPoller::new(self)
    }

    pub fn controller(&self) -> Controller<'_, S, R> {
        Controller::new(self)
    }

    pub fn recovery(&self) -> RecoveryChain<'_, S, R> {
        RecoveryChain::new(self)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn state(&self) -> MonitorState {
        self.state.get()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn live_cadence(&self) -> &Cadence {
        &self.live_cadence
    }

    pub fn end_cadence(&self) -> &Cadence {
        &self.end_cadence
    }

    /// Authenticates and loads the target, storing the new session.
    pub async fn open_session(&self) -> Result<(), StartupError> {
        let session = self.source.authenticate().await?;
        self.source.navigate_to_target(&session).await?;
        self.replace_session(session);
        tracing::info!("Session established on target");
        Ok(())
    }

    pub fn current_session(&self) -> Option<S::Session> {
        self.session_guard().clone()
    }

    pub(crate) fn replace_session(&self, session: S::Session) {
        *self.session_guard() = Some(session);
    }

    pub(crate) fn invalidate_session(&self) {
        if self.session_guard().take().is_some() {
            tracing::debug!("Session invalidated");
        }
    }

    pub fn status(&self) -> MonitorStatus {
        let stats = self.stats_guard();
        MonitorStatus {
            state: self.state(),
            recording: self.is_recording(),
            live_polling: self.live_cadence.is_running(),
            end_polling: self.end_cadence.is_running(),
            sessions_recorded: stats.sessions_recorded,
            recovery_invocations: stats.recovery_invocations,
            last_live_check_at: stats.last_live_check_at,
            recording_started_at: stats.recording_started_at,
        }
    }

    pub(crate) fn record_live_check(&self) {
        self.stats_guard().last_live_check_at = Some(Utc::now());
    }

    pub(crate) fn record_recovery_invocation(&self) {
        self.stats_guard().recovery_invocations += 1;
    }

    pub(crate) fn record_recording_started(&self) {
        self.stats_guard().recording_started_at = Some(Utc::now());
    }

    pub(crate) fn record_recording_finished(&self) {
        let mut stats = self.stats_guard();
        stats.sessions_recorded += 1;
        if let Some(started_at) = stats.recording_started_at.take() {
            let duration_secs = (Utc::now() - started_at).num_seconds();
            tracing::info!(duration_secs, "Recording session finished");
        }
    }

    fn session_guard(&self) -> MutexGuard<'_, Option<S::Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats_guard(&self) -> MutexGuard<'_, MonitorStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::testing::{ScriptedRecorder, ScriptedSource};

    fn monitor() -> Monitor<ScriptedSource, ScriptedRecorder> {
        Monitor::new(
            ScriptedSource::new(),
            ScriptedRecorder::new(),
            MonitorSettings::default(),
        )
    }

    #[test]
    fn new_monitor_is_idle_and_paused() {
        let monitor = monitor();
        let status = monitor.status();
        assert_eq!(status.state, MonitorState::Idle);
        assert!(!status.recording);
        assert!(!status.live_polling);
        assert!(!status.end_polling);
        assert_eq!(status.sessions_recorded, 0);
        assert!(monitor.current_session().is_none());
    }

    #[tokio::test]
    async fn open_session_stores_session() {
        let monitor = monitor();
        monitor.open_session().await.expect("open session");
        assert_eq!(monitor.current_session().map(|s| s.0), Some(1));
    }

    #[tokio::test]
    async fn failed_open_session_leaves_no_session() {
        let monitor = monitor();
        monitor
            .source()
            .push_auth(Err(AuthError::Rejected("bad password".to_string())));

        let err = monitor.open_session().await.unwrap_err();
        assert_eq!(err.kind(), "auth_rejected");
        assert!(monitor.current_session().is_none());
    }

    #[test]
    fn status_serializes_state_in_snake_case() {
        let monitor = monitor();
        monitor.state.apply(crate::state::StateEvent::CheckStarted).unwrap();
        let json = serde_json::to_value(monitor.status()).expect("serialize status");
        assert_eq!(json["state"], "checking");
        assert_eq!(json["recording"], false);
    }
}
