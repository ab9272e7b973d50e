//! Configuration for the basic peer health monitor.
//!
//! The monitor itself lives with the cluster runtime; only its
//! configuration surface is defined here, persisted as JSON alongside the
//! proxy's own section.

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Json};
use figment::Figment;
use serde::Deserialize;

use crate::config::deserialize_duration;
use crate::error::ProxyError;

/// Default interval between peer checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// Basic monitor configuration: `{"check_interval": "15s"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// How often peers are checked.
    #[serde(
        default = "default_check_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub check_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
        }
    }
}

const fn default_check_interval() -> Duration {
    DEFAULT_CHECK_INTERVAL
}

impl MonitorConfig {
    /// Loads the monitor section from a JSON file, with `PINWHEEL_MONITOR_`
    /// environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ProxyError> {
        let config: Self = Figment::new()
            .merge(Json::file(path.as_ref()))
            .merge(Env::prefixed("PINWHEEL_MONITOR_"))
            .extract()
            .map_err(|e| ProxyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses the monitor section from a JSON string.
    pub fn parse(content: &str) -> Result<Self, ProxyError> {
        let config: Self = Figment::new()
            .merge(Json::string(content))
            .extract()
            .map_err(|e| ProxyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects non-positive intervals.
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.check_interval.is_zero() {
            return Err(ProxyError::Config("check_interval too low".to_owned()));
        }
        Ok(())
    }
}
