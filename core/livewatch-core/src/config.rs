//! Configuration loading and validation.
//!
//! The configuration is a TOML file read once at startup:
//! - `--config` / `LIVEWATCH_CONFIG` select the file, otherwise
//!   `~/.livewatch/config.toml` is used
//! - `LIVEWATCH_SECRET` and `LIVEWATCH_RECORDER_CREDENTIAL` override the
//!   secrets so they can stay out of the file
//!
//! Everything except the target identity and account credentials has a
//! default matching the recorder's stock setup.

use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "LIVEWATCH_CONFIG";
pub const SECRET_ENV: &str = "LIVEWATCH_SECRET";
pub const RECORDER_CREDENTIAL_ENV: &str = "LIVEWATCH_RECORDER_CREDENTIAL";

pub const DEFAULT_LIVE_KEYWORD: &str = "直播";
pub const DEFAULT_END_KEYWORD: &str = "直播視訊已結束";
pub const DEFAULT_RECORDER_ADDRESS: &str = "ws://127.0.0.1:4455";
pub const DEFAULT_LIVE_CHECK_INTERVAL_SECS: u64 = 10 * 60;
pub const DEFAULT_END_CHECK_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_BASE_URL: &str = "https://www.instagram.com";
pub const DEFAULT_LOGIN_PATH: &str = "/accounts/login/";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".livewatch/config.toml";
const DEFAULT_LOG_RELATIVE_DIR: &str = ".livewatch/logs";

#[derive(Debug, Clone, Deserialize)]
pub struct LivewatchConfig {
    pub target: TargetConfig,
    pub credentials: Credentials,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub identity: String,
    #[serde(default = "default_live_keyword")]
    pub live_keyword: String,
    #[serde(default = "default_end_keyword")]
    pub end_keyword: String,
}

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub id: String,
    #[serde(default)]
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("secret", &redacted(&self.secret))
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct RecorderConfig {
    #[serde(default = "default_recorder_address")]
    pub address: String,
    #[serde(default)]
    pub credential: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            address: default_recorder_address(),
            credential: String::new(),
        }
    }
}

impl fmt::Debug for RecorderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderConfig")
            .field("address", &self.address)
            .field("credential", &redacted(&self.credential))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_live_check_interval_secs")]
    pub live_check_interval_secs: u64,
    #[serde(default = "default_end_check_interval_secs")]
    pub end_check_interval_secs: u64,
    #[serde(default)]
    pub stop_after_first_session: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            live_check_interval_secs: DEFAULT_LIVE_CHECK_INTERVAL_SECS,
            end_check_interval_secs: DEFAULT_END_CHECK_INTERVAL_SECS,
            stop_after_first_session: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1400,
            height: 812,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_live_region")]
    pub live_region: String,
    #[serde(default = "default_end_region")]
    pub end_region: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_path: default_login_path(),
            live_region: default_live_region(),
            end_region: default_end_region(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file: true,
        }
    }
}

impl LoggingConfig {
    /// Log directory with a leading `~/` expanded. `None` when file logging
    /// is off or no home directory exists.
    pub fn resolved_directory(&self) -> Option<PathBuf> {
        if !self.file {
            return None;
        }
        match &self.directory {
            Some(dir) => expand_home(dir),
            None => dirs::home_dir().map(|home| home.join(DEFAULT_LOG_RELATIVE_DIR)),
        }
    }
}

/// Poller cadence and lifecycle settings derived from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub live_check_interval: Duration,
    pub end_check_interval: Duration,
    pub stop_after_first_session: bool,
}

impl MonitorSettings {
    pub fn from_config(config: &LivewatchConfig) -> Self {
        Self {
            live_check_interval: Duration::from_secs(config.polling.live_check_interval_secs),
            end_check_interval: Duration::from_secs(config.polling.end_check_interval_secs),
            stop_after_first_session: config.polling.stop_after_first_session,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            live_check_interval: Duration::from_secs(DEFAULT_LIVE_CHECK_INTERVAL_SECS),
            end_check_interval: Duration::from_secs(DEFAULT_END_CHECK_INTERVAL_SECS),
            stop_after_first_session: false,
        }
    }
}

/// Where and how to reach the recorder.
#[derive(Clone, PartialEq, Eq)]
pub struct RecorderEndpoint {
    pub address: String,
    pub credential: Option<String>,
}

impl RecorderEndpoint {
    pub fn from_config(config: &LivewatchConfig) -> Self {
        let credential = Some(config.recorder.credential.clone()).filter(|value| !value.is_empty());
        Self {
            address: config.recorder.address.clone(),
            credential,
        }
    }
}

impl fmt::Debug for RecorderEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderEndpoint")
            .field("address", &self.address)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Resolves the config path: explicit argument, then `LIVEWATCH_CONFIG`,
/// then `~/.livewatch/config.toml`.
pub fn resolve_config_path(path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path);
    }
    if let Some(path) = env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_CONFIG_RELATIVE_PATH))
        .ok_or(ConfigError::NoConfigPath)
}

/// Loads, applies environment overrides to, and validates the configuration.
pub fn load_config(path: Option<PathBuf>) -> Result<LivewatchConfig, ConfigError> {
    let config_path = resolve_config_path(path)?;
    if !config_path.exists() {
        return Err(ConfigError::NotFound(config_path));
    }

    let content = fs_err::read_to_string(&config_path).map_err(|source| ConfigError::Read {
        path: config_path.clone(),
        source,
    })?;
    let mut config = parse_config(&content, &config_path)?;
    config.apply_overrides(
        env::var(SECRET_ENV).ok(),
        env::var(RECORDER_CREDENTIAL_ENV).ok(),
    );
    config.validate()?;
    Ok(config)
}

/// Parses TOML content without validating it.
pub fn parse_config(content: &str, path: &Path) -> Result<LivewatchConfig, ConfigError> {
    toml::from_str::<LivewatchConfig>(content).map_err(|err| ConfigError::Malformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

impl LivewatchConfig {
    /// Replaces secrets with non-empty override values.
    pub fn apply_overrides(&mut self, secret: Option<String>, recorder_credential: Option<String>) {
        if let Some(secret) = secret.filter(|value| !value.is_empty()) {
            self.credentials.secret = secret;
        }
        if let Some(credential) = recorder_credential.filter(|value| !value.is_empty()) {
            self.recorder.credential = credential;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("target.identity", &self.target.identity)?;
        if self.target.identity.contains('/') {
            return Err(invalid("target.identity", "must not contain '/'"));
        }
        require_non_empty("target.live_keyword", &self.target.live_keyword)?;
        require_non_empty("target.end_keyword", &self.target.end_keyword)?;
        require_non_empty("credentials.id", &self.credentials.id)?;
        if self.credentials.secret.is_empty() {
            return Err(invalid(
                "credentials.secret",
                format!("must be set in the file or via {}", SECRET_ENV),
            ));
        }

        let address = self.recorder.address.trim();
        if !(address.starts_with("ws://") || address.starts_with("wss://")) {
            return Err(invalid("recorder.address", "must start with ws:// or wss://"));
        }

        if self.polling.live_check_interval_secs == 0 {
            return Err(invalid("polling.live_check_interval_secs", "must be greater than 0"));
        }
        if self.polling.end_check_interval_secs == 0 {
            return Err(invalid("polling.end_check_interval_secs", "must be greater than 0"));
        }

        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(invalid("viewport", "width and height must be greater than 0"));
        }

        let base_url = self.source.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid("source.base_url", "must start with http:// or https://"));
        }
        if !self.source.login_path.starts_with('/') {
            return Err(invalid("source.login_path", "must start with '/'"));
        }
        require_element_name("source.live_region", &self.source.live_region)?;
        require_element_name("source.end_region", &self.source.end_region)?;
        if self.source.request_timeout_secs == 0 {
            return Err(invalid("source.request_timeout_secs", "must be greater than 0"));
        }

        Ok(())
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    Ok(())
}

fn require_element_name(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let mut chars = value.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid {
        return Err(invalid(field, "must be a plain element name such as \"header\""));
    }
    Ok(())
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn expand_home(path: &Path) -> Option<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map(|home| home.join(rest)),
        Err(_) => Some(path.to_path_buf()),
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

fn default_live_keyword() -> String {
    DEFAULT_LIVE_KEYWORD.to_string()
}

fn default_end_keyword() -> String {
    DEFAULT_END_KEYWORD.to_string()
}

fn default_recorder_address() -> String {
    DEFAULT_RECORDER_ADDRESS.to_string()
}

fn default_live_check_interval_secs() -> u64 {
    DEFAULT_LIVE_CHECK_INTERVAL_SECS
}

fn default_end_check_interval_secs() -> u64 {
    DEFAULT_END_CHECK_INTERVAL_SECS
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_live_region() -> String {
    "header".to_string()
}

fn default_end_region() -> String {
    "footer".to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}
