//! Scripted adapter doubles.
//!
//! Each double pops its next result from a per-operation queue and records
//! every call. An empty queue yields the happy-path result (`Ok`, or
//! `Ok(false)` for indicator queries).

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::adapter::{RecorderControl, SignalSource};
use crate::error::{AuthError, ConnError, NavError, QueryError, RecorderError};

/// Session handle issued by [`ScriptedSource`]; numbered from 1 per successful
/// authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TestSession(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    Authenticate,
    Navigate(u32),
    Reload(u32),
    OpenLiveView(u32),
    LiveQuery,
    EndQuery,
    Close,
}

#[derive(Debug, Default)]
struct SourceScript {
    auth: VecDeque<Result<(), AuthError>>,
    navigate: VecDeque<Result<(), NavError>>,
    reload: VecDeque<Result<(), NavError>>,
    live_view: VecDeque<Result<(), NavError>>,
    live: VecDeque<Result<bool, QueryError>>,
    end: VecDeque<Result<bool, QueryError>>,
    live_delay: Option<Duration>,
    sessions_issued: u32,
    calls: Vec<SourceCall>,
    live_in_flight: usize,
    max_live_in_flight: usize,
}

#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: Mutex<SourceScript>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every live query take `delay` before answering.
    pub fn with_live_delay(self, delay: Duration) -> Self {
        self.with_script(|script| script.live_delay = Some(delay));
        self
    }

    pub fn push_auth(&self, result: Result<(), AuthError>) {
        self.with_script(|script| script.auth.push_back(result));
    }

    pub fn push_navigate(&self, result: Result<(), NavError>) {
        self.with_script(|script| script.navigate.push_back(result));
    }

    pub fn push_reload(&self, result: Result<(), NavError>) {
        self.with_script(|script| script.reload.push_back(result));
    }

    pub fn push_live_view(&self, result: Result<(), NavError>) {
        self.with_script(|script| script.live_view.push_back(result));
    }

    pub fn push_live(&self, result: Result<bool, QueryError>) {
        self.with_script(|script| script.live.push_back(result));
    }

    pub fn push_end(&self, result: Result<bool, QueryError>) {
        self.with_script(|script| script.end.push_back(result));
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.with_script(|script| script.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with_script(|script| script.calls.clear());
    }

    pub fn count(&self, call: &SourceCall) -> usize {
        self.with_script(|script| script.calls.iter().filter(|c| *c == call).count())
    }

    pub fn authentications(&self) -> usize {
        self.count(&SourceCall::Authenticate)
    }

    pub fn live_queries(&self) -> usize {
        self.count(&SourceCall::LiveQuery)
    }

    pub fn end_queries(&self) -> usize {
        self.count(&SourceCall::EndQuery)
    }

    pub fn closes(&self) -> usize {
        self.count(&SourceCall::Close)
    }

    /// Highest number of live queries observed running at once.
    pub fn max_concurrent_live_queries(&self) -> usize {
        self.with_script(|script| script.max_live_in_flight)
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut SourceScript) -> T) -> T {
        f(&mut self.guard())
    }

    fn guard(&self) -> MutexGuard<'_, SourceScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SignalSource for ScriptedSource {
    type Session = TestSession;

    async fn authenticate(&self) -> Result<TestSession, AuthError> {
        self.with_script(|script| {
            script.calls.push(SourceCall::Authenticate);
            script.auth.pop_front().unwrap_or(Ok(())).map(|()| {
                script.sessions_issued += 1;
                TestSession(script.sessions_issued)
            })
        })
    }

    async fn navigate_to_target(&self, session: &TestSession) -> Result<(), NavError> {
        self.with_script(|script| {
            script.calls.push(SourceCall::Navigate(session.0));
            script.navigate.pop_front().unwrap_or(Ok(()))
        })
    }

    async fn reload(&self, session: &TestSession) -> Result<(), NavError> {
        self.with_script(|script| {
            script.calls.push(SourceCall::Reload(session.0));
            script.reload.pop_front().unwrap_or(Ok(()))
        })
    }

    async fn open_live_view(&self, session: &TestSession) -> Result<(), NavError> {
        self.with_script(|script| {
            script.calls.push(SourceCall::OpenLiveView(session.0));
            script.live_view.pop_front().unwrap_or(Ok(()))
        })
    }

    async fn is_live_indicator_present(&self) -> Result<bool, QueryError> {
        let delay = self.with_script(|script| {
            script.calls.push(SourceCall::LiveQuery);
            script.live_in_flight += 1;
            script.max_live_in_flight = script.max_live_in_flight.max(script.live_in_flight);
            script.live_delay
        });

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.with_script(|script| {
            script.live_in_flight -= 1;
            script.live.pop_front().unwrap_or(Ok(false))
        })
    }

    async fn is_end_indicator_present(&self) -> Result<bool, QueryError> {
        self.with_script(|script| {
            script.calls.push(SourceCall::EndQuery);
            script.end.pop_front().unwrap_or(Ok(false))
        })
    }

    async fn close(&self) {
        self.with_script(|script| script.calls.push(SourceCall::Close));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderCall {
    Connect {
        address: String,
        credential: Option<String>,
    },
    Start,
    Stop,
    Disconnect,
}

#[derive(Debug, Default)]
struct RecorderScript {
    connect: VecDeque<Result<(), ConnError>>,
    start: VecDeque<Result<(), RecorderError>>,
    stop: VecDeque<Result<(), RecorderError>>,
    command_delay: Option<Duration>,
    calls: Vec<RecorderCall>,
}

#[derive(Debug, Default)]
pub struct ScriptedRecorder {
    script: Mutex<RecorderScript>,
}

impl ScriptedRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes start and stop commands take `delay` before answering.
    pub fn with_command_delay(self, delay: Duration) -> Self {
        self.with_script(|script| script.command_delay = Some(delay));
        self
    }

    pub fn push_connect(&self, result: Result<(), ConnError>) {
        self.with_script(|script| script.connect.push_back(result));
    }

    pub fn push_start(&self, result: Result<(), RecorderError>) {
        self.with_script(|script| script.start.push_back(result));
    }

    pub fn push_stop(&self, result: Result<(), RecorderError>) {
        self.with_script(|script| script.stop.push_back(result));
    }

    pub fn calls(&self) -> Vec<RecorderCall> {
        self.with_script(|script| script.calls.clone())
    }

    pub fn starts(&self) -> usize {
        self.with_script(|script| {
            script
                .calls
                .iter()
                .filter(|call| **call == RecorderCall::Start)
                .count()
        })
    }

    pub fn stops(&self) -> usize {
        self.with_script(|script| {
            script
                .calls
                .iter()
                .filter(|call| **call == RecorderCall::Stop)
                .count()
        })
    }

    pub fn disconnects(&self) -> usize {
        self.with_script(|script| {
            script
                .calls
                .iter()
                .filter(|call| **call == RecorderCall::Disconnect)
                .count()
        })
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut RecorderScript) -> T) -> T {
        f(&mut self.guard())
    }

    fn guard(&self) -> MutexGuard<'_, RecorderScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn command(&self, call: RecorderCall) -> Result<(), RecorderError> {
        let is_stop = call == RecorderCall::Stop;
        let delay = self.with_script(|script| {
            script.calls.push(call);
            script.command_delay
        });

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.with_script(|script| {
            let queue = if is_stop {
                &mut script.stop
            } else {
                &mut script.start
            };
            queue.pop_front().unwrap_or(Ok(()))
        })
    }
}

impl RecorderControl for ScriptedRecorder {
    async fn connect(&self, address: &str, credential: Option<&str>) -> Result<(), ConnError> {
        self.with_script(|script| {
            script.calls.push(RecorderCall::Connect {
                address: address.to_string(),
                credential: credential.map(str::to_string),
            });
            script.connect.pop_front().unwrap_or(Ok(()))
        })
    }

    async fn start_recording(&self) -> Result<(), RecorderError> {
        self.command(RecorderCall::Start).await
    }

    async fn stop_recording(&self) -> Result<(), RecorderError> {
        self.command(RecorderCall::Stop).await
    }

    async fn disconnect(&self) {
        self.with_script(|script| script.calls.push(RecorderCall::Disconnect));
    }
}
