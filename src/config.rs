//! Application-level configuration loading, including the draw cadence.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::draw_scheduler::MIN_INTERVAL;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SPIN_DRAW_CONFIG_PATH";

const DEFAULT_DRAW_INTERVAL_MS: u64 = 60_000;
const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
const DEFAULT_HISTORY_LIMIT: usize = 10;
const DEFAULT_HISTORY_MAX_LIMIT: usize = 50;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    draw_interval: Duration,
    tick_interval: Duration,
    history_default_limit: usize,
    history_max_limit: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        draw_interval_ms = app_config.draw_interval.as_millis() as u64,
                        "loaded draw configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
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

    /// Build a configuration with an explicit draw interval and default everything else.
    pub fn with_draw_interval(draw_interval: Duration) -> Self {
        Self {
            draw_interval: draw_interval.max(MIN_INTERVAL),
            ..Self::default()
        }
    }

    /// Fixed duration between two draws.
    pub fn draw_interval(&self) -> Duration {
        self.draw_interval
    }

    /// Cadence of the background ticker.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Clamp a requested history size into `1..=history_max_limit`.
    ///
    /// `None` yields the configured default.
    pub fn history_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.history_default_limit)
            .clamp(1, self.history_max_limit)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            draw_interval: Duration::from_millis(DEFAULT_DRAW_INTERVAL_MS),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            history_default_limit: DEFAULT_HISTORY_LIMIT,
            history_max_limit: DEFAULT_HISTORY_MAX_LIMIT,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    draw_interval_ms: Option<u64>,
    #[serde(default)]
    tick_interval_ms: Option<u64>,
    #[serde(default)]
    history_default_limit: Option<usize>,
    #[serde(default)]
    history_max_limit: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        let history_max_limit = value
            .history_max_limit
            .unwrap_or(defaults.history_max_limit)
            .max(1);
        Self {
            draw_interval: value
                .draw_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.draw_interval)
                .max(MIN_INTERVAL),
            tick_interval: value
                .tick_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval)
                .max(Duration::from_millis(100)),
            history_default_limit: value
                .history_default_limit
                .unwrap_or(defaults.history_default_limit)
                .clamp(1, history_max_limit),
            history_max_limit,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let raw: RawConfig = serde_json::from_str(r#"{"draw_interval_ms": 64000}"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.draw_interval(), Duration::from_secs(64));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.history_limit(None), 10);
    }

    #[test]
    fn tiny_intervals_are_raised() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"draw_interval_ms": 0, "tick_interval_ms": 1}"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.draw_interval(), MIN_INTERVAL);
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
    }

    #[test]
    fn history_limit_is_clamped() {
        let config = AppConfig::default();
        assert_eq!(config.history_limit(Some(0)), 1);
        assert_eq!(config.history_limit(Some(25)), 25);
        assert_eq!(config.history_limit(Some(1_000)), 50);
    }
}
