//! Configuration for the ingress watcher
//!
//! Values come from defaults, optionally overridden by environment variables.

use crate::error::WatcherError;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Quiescence window before a burst of changes triggers a rebuild (default: 1000ms)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Interval of forced full rebuilds that heal missed events (default: 60s)
    #[serde(default = "default_resync_secs")]
    pub resync_secs: u64,

    /// Server-side watch timeout in seconds (default: 25s)
    ///
    /// Must stay below the client read timeout (30s) so idle watches are
    /// closed by the API server first.
    #[serde(default = "default_watch_timeout_secs")]
    pub watch_timeout_secs: u32,

    /// Namespace to watch; all namespaces when unset
    #[serde(default)]
    pub namespace: Option<String>,
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_resync_secs() -> u64 {
    60
}

fn default_watch_timeout_secs() -> u32 {
    25
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            resync_secs: default_resync_secs(),
            watch_timeout_secs: default_watch_timeout_secs(),
            namespace: None,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from `INGRESS_WATCHER_*` environment variables
    pub fn from_env() -> Result<Self, WatcherError> {
        let mut config = Self::default();

        if let Some(val) = parse_env("INGRESS_WATCHER_DEBOUNCE_MS")? {
            config.debounce_ms = val;
        }

        if let Some(val) = parse_env("INGRESS_WATCHER_RESYNC_SECS")? {
            config.resync_secs = val;
        }

        if let Some(val) = parse_env("INGRESS_WATCHER_WATCH_TIMEOUT_SECS")? {
            config.watch_timeout_secs = val;
        }

        if let Ok(val) = env::var("INGRESS_WATCHER_NAMESPACE") {
            if !val.is_empty() {
                config.namespace = Some(val);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the watcher spin or never fire
    pub fn validate(&self) -> Result<(), WatcherError> {
        if self.debounce_ms == 0 {
            return Err(WatcherError::Config(
                "debounce window must be greater than zero".to_string(),
            ));
        }
        if self.resync_secs == 0 {
            return Err(WatcherError::Config(
                "resync period must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }
}

fn parse_env<T>(key: &str) -> Result<Option<T>, WatcherError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| WatcherError::Config(format!("invalid {}='{}': {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}
