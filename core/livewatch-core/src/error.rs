//! Error types for livewatch-core.
//!
//! Adapter failures are split by the collaborator that raises them so the
//! monitor can route each one to its own policy: query failures during live
//! checks go to the recovery chain, recorder failures never block a state
//! transition, and anything raised during startup is fatal.

use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// Signal Source Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Credential submission or login failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("credentials rejected: {0}")]
    Rejected(String),

    #[error("authentication transport failure: {0}")]
    Transport(String),

    #[error("authentication timed out")]
    Timeout,
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Rejected(_) => "auth_rejected",
            AuthError::Transport(_) => "auth_transport",
            AuthError::Timeout => "auth_timeout",
        }
    }
}

/// The target page could not be reached with the given session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavError {
    #[error("target unreachable: {target}: {details}")]
    Unreachable { target: String, details: String },

    #[error("session expired or no longer authorized")]
    SessionExpired,

    #[error("navigation transport failure: {0}")]
    Transport(String),

    #[error("navigation timed out")]
    Timeout,
}

impl NavError {
    pub fn kind(&self) -> &'static str {
        match self {
            NavError::Unreachable { .. } => "nav_unreachable",
            NavError::SessionExpired => "nav_session_expired",
            NavError::Transport(_) => "nav_transport",
            NavError::Timeout => "nav_timeout",
        }
    }

    /// Auth-class navigation failures invalidate the current session.
    pub fn invalidates_session(&self) -> bool {
        matches!(self, NavError::SessionExpired)
    }
}

/// An indicator could not be read from the observed context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("no page loaded to inspect")]
    NoPage,

    #[error("indicator read failed: {0}")]
    Transport(String),

    #[error("page could not be rendered: {0}")]
    Render(String),

    #[error("indicator read timed out")]
    Timeout,
}

impl QueryError {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::NoPage => "query_no_page",
            QueryError::Transport(_) => "query_transport",
            QueryError::Render(_) => "query_render",
            QueryError::Timeout => "query_timeout",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Recorder Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// A recorder command was rejected or could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecorderError {
    #[error("recorder is not connected")]
    NotConnected,

    #[error("recorder rejected command (code {code}): {comment}")]
    Rejected { code: u16, comment: String },

    #[error("recorder transport failure: {0}")]
    Transport(String),

    #[error("recorder protocol error: {0}")]
    Protocol(String),

    #[error("recorder did not answer in time")]
    Timeout,
}

impl RecorderError {
    pub fn kind(&self) -> &'static str {
        match self {
            RecorderError::NotConnected => "recorder_not_connected",
            RecorderError::Rejected { .. } => "recorder_rejected",
            RecorderError::Transport(_) => "recorder_transport",
            RecorderError::Protocol(_) => "recorder_protocol",
            RecorderError::Timeout => "recorder_timeout",
        }
    }
}

/// The recording backend could not be reached or refused the handshake.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnError {
    #[error("recorder unreachable at {address}: {details}")]
    Unreachable { address: String, details: String },

    #[error("recorder authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("recorder handshake failed: {0}")]
    Handshake(String),
}

impl ConnError {
    pub fn kind(&self) -> &'static str {
        match self {
            ConnError::Unreachable { .. } => "conn_unreachable",
            ConnError::AuthenticationFailed(_) => "conn_auth_failed",
            ConnError::Handshake(_) => "conn_handshake",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration and Lifecycle Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Home directory not found; pass --config explicitly")]
    NoConfigPath,

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file malformed: {path}: {details}")]
    Malformed { path: PathBuf, details: String },

    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failures during `Supervisor::start`. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("recorder connection failed: {0}")]
    Connect(#[from] ConnError),

    #[error("initial authentication failed: {0}")]
    Authenticate(#[from] AuthError),

    #[error("initial navigation failed: {0}")]
    Navigate(#[from] NavError),
}

impl StartupError {
    pub fn kind(&self) -> &'static str {
        match self {
            StartupError::Connect(err) => err.kind(),
            StartupError::Authenticate(err) => err.kind(),
            StartupError::Navigate(err) => err.kind(),
        }
    }
}

/// Failure of the running monitor loop.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("monitor loop panicked: {0}")]
    Panicked(String),
}
