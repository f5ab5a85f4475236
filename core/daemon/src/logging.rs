//! Logging setup for the livewatch daemon.
//!
//! Output always goes to stderr. When a log directory is configured, a
//! daily-rolling plain-text file is written alongside it through a
//! non-blocking writer.
//!
//! `RUST_LOG` controls the filter (default `info`); setting
//! `LIVEWATCH_DEBUG_LOG=1` forces `debug`.

use fs_err as fs;
use std::env;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const DEBUG_LOG_ENV: &str = "LIVEWATCH_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "livewatch.log";

/// Keeps the file writer alive. Dropping it flushes pending lines.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

pub fn init_logging(log_dir: Option<&Path>) -> LoggingGuard {
    let filter = if debug_enabled(env::var(DEBUG_LOG_ENV).ok().as_deref()) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let mut dir_error = None;
    let (file_layer, file_guard) = match log_dir {
        Some(dir) => match fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false);
                (Some(layer), Some(guard))
            }
            Err(err) => {
                dir_error = Some(err);
                (None, None)
            }
        },
        None => (None, None),
    };

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(err) = dir_error {
        tracing::warn!(error = %err, "Failed to create log directory; logging to stderr only");
    } else if let Some(dir) = log_dir {
        tracing::debug!(path = %dir.display(), "File logging enabled");
    }

    LoggingGuard {
        _file_guard: file_guard,
    }
}

fn debug_enabled(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "TRUE" | "yes" | "YES"))
}
