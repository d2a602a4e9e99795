use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tickq_types::{IntervalUnit, ScheduleSpec};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Scheduler and runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Create the default heartbeat schedule at startup.
    #[serde(default)]
    pub auto_create: bool,
    /// Name of the default schedule.
    #[serde(default = "default_schedule_name")]
    pub default_name: String,
    /// Handler key the default schedule invokes.
    #[serde(default = "default_schedule_target")]
    pub default_target: String,
    /// Default schedule cadence, in seconds.
    #[serde(default = "default_interval_secs")]
    pub default_interval_secs: i64,
    /// Runner poll interval, in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_schedule_name() -> String {
    "heartbeat_5s".to_string()
}

fn default_schedule_target() -> String {
    "heartbeat".to_string()
}

fn default_interval_secs() -> i64 {
    5
}

fn default_tick_ms() -> u64 {
    1000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            auto_create: false,
            default_name: default_schedule_name(),
            default_target: default_schedule_target(),
            default_interval_secs: default_interval_secs(),
            tick_ms: default_tick_ms(),
        }
    }
}

impl SchedulerConfig {
    /// The desired definition of the default schedule.
    pub fn default_schedule(&self) -> ScheduleSpec {
        ScheduleSpec {
            name: self.default_name.clone(),
            target: self.default_target.clone(),
            interval_unit: IntervalUnit::Seconds,
            interval_value: self.default_interval_secs,
            repeats: -1,
        }
    }
}

/// Top-level tickq configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickqConfig {
    /// Gateway server config.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Scheduler config.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Database path override. Defaults to <config dir>/tickq.db.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

impl TickqConfig {
    /// Resolve the SQLite database path, creating the config directory
    /// when falling back to the default location.
    pub fn resolve_db_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(ensure_config_dir()?.join("tickq.db")),
        }
    }
}

/// Resolve the tickq config directory (~/.tickq/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".tickq"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.tickq/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path, falling back to defaults.
pub fn load_config() -> Result<TickqConfig, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path, falling back to defaults if not found.
pub fn load_config_from(path: &Path) -> Result<TickqConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(TickqConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TickqConfig = json5::from_str(&content)?;
    Ok(config)
}

/// Ensure the config directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = config_dir()?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Save configuration to the default path.
pub fn save_config(config: &TickqConfig) -> Result<(), ConfigError> {
    let dir = ensure_config_dir()?;
    let path = dir.join("config.json5");
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Io(std::io::Error::other(e)))?;
    std::fs::write(path, content)?;
    Ok(())
}
