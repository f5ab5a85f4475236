//! # livewatch-core
//!
//! Session monitoring and recording control for a single watched target.
//!
//! The crate decides *when* to record; it never fetches pages or talks to a
//! recorder itself. Both collaborators come in through the traits in
//! [`adapter`], and the daemon supplies the real implementations.
//!
//! ## Design Principles
//!
//! - **One owned context**: state, recording flag, session, cadences and poll
//!   locks live in [`Monitor`]; pollers and the controller borrow it.
//! - **Single-threaded**: everything runs on one cooperative task. Adapter
//!   calls are the only suspension points.
//! - **Transitions, not assignments**: [`MonitorState`] only changes through
//!   the table in [`state::next_state`].
//! - **Failures are routed, not raised**: once running, only a panic stops
//!   the loop. Everything else is logged and handed to its policy.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use livewatch_core::{Monitor, MonitorSettings, RecorderEndpoint, ShutdownReason, Supervisor};
//!
//! let monitor = Monitor::new(source, recorder, MonitorSettings::from_config(&config));
//! let supervisor = Supervisor::new(monitor, RecorderEndpoint::from_config(&config));
//! supervisor.start().await?;
//! let reason = supervisor.run(shutdown_signal()).await?;
//! supervisor.shutdown(reason).await;
//! ```

pub mod adapter;
pub mod cadence;
pub mod config;
pub mod controller;
pub mod error;
pub mod live_poller;
pub mod lock;
pub mod monitor;
pub mod recovery;
pub mod state;
pub mod supervisor;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use adapter::{RecorderControl, SignalSource};
pub use cadence::{Cadence, Ticker};
pub use config::{
    load_config, parse_config, resolve_config_path, LivewatchConfig, MonitorSettings,
    RecorderEndpoint, Viewport,
};
pub use controller::{BeginOutcome, Controller, EndOutcome, EndPoller, EndTick};
pub use error::{
    AuthError, ConfigError, ConnError, MonitorError, NavError, QueryError, RecorderError,
    StartupError,
};
pub use live_poller::{LivePoller, LiveTick};
pub use lock::{PollLock, PollPermit};
pub use monitor::{Monitor, MonitorStatus};
pub use recovery::{
    RecoveryCause, RecoveryChain, RecoveryFailure, RecoveryReport, RecoveryStep, StepOutcome,
    RECOVERY_CHAIN,
};
pub use state::{MonitorState, StateEvent};
pub use supervisor::{ShutdownReason, Supervisor};
