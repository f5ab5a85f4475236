//! livewatch: records a profile's live broadcasts through OBS.
//!
//! ## Subcommands
//!
//! - `run`: Monitor the configured target until interrupted (or, with
//!   `--once`, until the first recorded session ends)
//! - `check-config`: Validate the configuration and print a redacted summary

mod logging;
mod obs;
mod page;
mod signals;
mod web;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use livewatch_core::config::CONFIG_ENV;
use livewatch_core::{
    load_config, resolve_config_path, LivewatchConfig, Monitor, MonitorSettings, RecorderEndpoint,
    ShutdownReason, Supervisor,
};

use obs::ObsRecorder;
use web::WebSignalSource;

#[derive(Parser)]
#[command(name = "livewatch")]
#[command(about = "Records a profile's live broadcasts through OBS")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor the target and record each live session
    Run {
        /// Path to config.toml (default: ~/.livewatch/config.toml)
        #[arg(long, env = CONFIG_ENV)]
        config: Option<PathBuf>,

        /// Exit after the first recorded session ends
        #[arg(long)]
        once: bool,
    },

    /// Validate the configuration and print a summary without secrets
    CheckConfig {
        /// Path to config.toml (default: ~/.livewatch/config.toml)
        #[arg(long, env = CONFIG_ENV)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Run { config, once } => run(config, once),
        Commands::CheckConfig { config } => check_config(config),
    };
    std::process::exit(code);
}

fn run(config_path: Option<PathBuf>, once: bool) -> i32 {
    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("livewatch: {err}");
            return 1;
        }
    };
    if once {
        config.polling.stop_after_first_session = true;
    }

    let log_dir = config.logging.resolved_directory();
    let _logging_guard = logging::init_logging(log_dir.as_deref());

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "Failed to build async runtime");
            return 1;
        }
    };

    runtime.block_on(run_monitor(&config))
}

async fn run_monitor(config: &LivewatchConfig) -> i32 {
    let source = match WebSignalSource::from_config(config) {
        Ok(source) => source,
        Err(err) => {
            error!(error = %err, "Invalid page region configuration");
            return 1;
        }
    };
    let settings = MonitorSettings::from_config(config);
    info!(
        target = %config.target.identity,
        live_check_secs = settings.live_check_interval.as_secs(),
        end_check_secs = settings.end_check_interval.as_secs(),
        once = settings.stop_after_first_session,
        "livewatch starting"
    );

    let monitor = Monitor::new(source, ObsRecorder::default(), settings);
    let supervisor = Supervisor::new(monitor, RecorderEndpoint::from_config(config));

    match supervisor.start().await {
        Ok(outcome) => info!(outcome = ?outcome, "Initial live check finished"),
        Err(err) => {
            error!(error = %err, kind = err.kind(), "Startup failed");
            supervisor.shutdown(ShutdownReason::Fatal).await;
            return ShutdownReason::Fatal.exit_code();
        }
    }

    let reason = match supervisor.run(signals::shutdown_signal()).await {
        Ok(reason) => reason,
        Err(err) => {
            error!(error = %err, "Monitor stopped unexpectedly");
            ShutdownReason::Fatal
        }
    };
    supervisor.shutdown(reason).await;

    match serde_json::to_string(&supervisor.monitor().status()) {
        Ok(status) => info!(reason = ?reason, status = %status, "livewatch stopped"),
        Err(_) => info!(reason = ?reason, "livewatch stopped"),
    }
    reason.exit_code()
}

fn check_config(config_path: Option<PathBuf>) -> i32 {
    let path = match resolve_config_path(config_path) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("livewatch: {err}");
            return 1;
        }
    };
    let config = match load_config(Some(path.clone())) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("livewatch: {err}");
            return 1;
        }
    };

    let endpoint = RecorderEndpoint::from_config(&config);
    let log_dir = config
        .logging
        .resolved_directory()
        .map(|dir| dir.display().to_string())
        .unwrap_or_else(|| "disabled".to_string());

    println!("Configuration OK: {}", path.display());
    println!("  target:          {}", config.target.identity);
    println!("  live keyword:    {}", config.target.live_keyword);
    println!("  end keyword:     {}", config.target.end_keyword);
    println!("  account:         {}", config.credentials.id);
    println!(
        "  recorder:        {} (credential {})",
        endpoint.address,
        if endpoint.credential.is_some() { "set" } else { "not set" }
    );
    println!(
        "  polling:         live every {}s, end every {}s{}",
        config.polling.live_check_interval_secs,
        config.polling.end_check_interval_secs,
        if config.polling.stop_after_first_session {
            ", stop after first session"
        } else {
            ""
        }
    );
    println!(
        "  viewport:        {}x{}",
        config.viewport.width, config.viewport.height
    );
    println!("  source:          {}", config.source.base_url);
    println!("  log directory:   {log_dir}");
    0
}
