//! Application-level configuration loading: phase timings and stream tuning.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PITCHLIVE_BACK_CONFIG_PATH";

const DEFAULT_WARNING_DELAY_MS: u64 = 5_000;
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
const DEFAULT_STREAM_BUFFER: usize = 32;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Time spent in `warning` before rating opens on its own.
    pub warning_delay: Duration,
    /// Interval between keep-alive events on every stream.
    pub heartbeat_interval: Duration,
    /// Events buffered per connection before it counts as dead.
    pub stream_buffer: usize,
    /// Resume the persisted phase when storage first becomes available.
    pub restore_on_start: bool,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|err| {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to parse config; falling back to defaults"
                );
                Self::default()
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; missing keys take their default value.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        let raw = serde_json::from_str::<RawConfig>(contents)?;
        let config: Self = raw.into();
        info!(
            warning_delay_ms = config.warning_delay.as_millis() as u64,
            heartbeat_interval_secs = config.heartbeat_interval.as_secs(),
            stream_buffer = config.stream_buffer,
            restore_on_start = config.restore_on_start,
            "loaded configuration"
        );
        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    warning_delay_ms: u64,
    heartbeat_interval_secs: u64,
    stream_buffer: usize,
    restore_on_start: bool,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            warning_delay_ms: DEFAULT_WARNING_DELAY_MS,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            stream_buffer: DEFAULT_STREAM_BUFFER,
            restore_on_start: true,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            warning_delay: Duration::from_millis(value.warning_delay_ms),
            // A zero period would make the heartbeat ticker panic.
            heartbeat_interval: Duration::from_secs(value.heartbeat_interval_secs.max(1)),
            stream_buffer: value.stream_buffer.max(1),
            restore_on_start: value.restore_on_start,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
