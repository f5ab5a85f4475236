//! Capabilities the monitor consumes.
//!
//! The monitor never knows how pages are fetched or how the recorder is
//! reached; it only sees these two traits. Implementations report failures
//! through the typed errors in [`crate::error`] and own their own timeouts.

use std::future::Future;

use crate::error::{AuthError, ConnError, NavError, QueryError, RecorderError};

/// Observation channel for the watched target.
pub trait SignalSource: Send + Sync {
    /// Opaque handle to an authenticated context.
    type Session: Clone + Send + Sync + 'static;

    fn authenticate(&self) -> impl Future<Output = Result<Self::Session, AuthError>> + Send;

    /// Loads the target's page using `session`.
    fn navigate_to_target(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<(), NavError>> + Send;

    /// Re-fetches whatever page is currently loaded.
    fn reload(&self, session: &Self::Session) -> impl Future<Output = Result<(), NavError>> + Send;

    /// Switches to the target's live view ahead of recording.
    fn open_live_view(
        &self,
        _session: &Self::Session,
    ) -> impl Future<Output = Result<(), NavError>> + Send {
        async { Ok(()) }
    }

    fn is_live_indicator_present(&self) -> impl Future<Output = Result<bool, QueryError>> + Send;

    fn is_end_indicator_present(&self) -> impl Future<Output = Result<bool, QueryError>> + Send;

    /// Releases the current session. Must tolerate being called repeatedly.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Control channel for the recording backend.
pub trait RecorderControl: Send + Sync {
    fn connect(
        &self,
        address: &str,
        credential: Option<&str>,
    ) -> impl Future<Output = Result<(), ConnError>> + Send;

    fn start_recording(&self) -> impl Future<Output = Result<(), RecorderError>> + Send;

    fn stop_recording(&self) -> impl Future<Output = Result<(), RecorderError>> + Send;

    /// Must tolerate being called while already disconnected.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;
}
