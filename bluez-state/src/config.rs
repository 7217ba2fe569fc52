//! Configuration for the tracker

use serde::{Deserialize, Serialize};

use bluez_api::{AgentCapability, ObjectPath};

use crate::error::{Result, TrackerError};

/// Local object path under which profiles and agents are registered
pub const DEFAULT_OBJECT_PATH: &str = "/org/node/bluez";

/// Environment variable naming the deployment mode
pub const DEPLOYMENT_ENV: &str = "BLUEZ_DEPLOYMENT";

/// Configuration for the [`Tracker`](crate::Tracker)
///
/// Deserializes from a partial document; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Path of the local profile/agent object
    /// Default: `/org/node/bluez`
    pub object_path: ObjectPath,

    /// Dump every raw signal (path, interfaces, payload) at debug level
    /// Default: true
    pub log_raw_signals: bool,

    /// Capability used by `register_default_agent`
    /// Default: KeyboardDisplay
    pub default_agent_capability: AgentCapability,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            object_path: ObjectPath::new(DEFAULT_OBJECT_PATH),
            log_raw_signals: true,
            default_agent_capability: AgentCapability::KeyboardDisplay,
        }
    }
}

impl TrackerConfig {
    /// Defaults, with raw signal dumps disabled when `BLUEZ_DEPLOYMENT=production`
    pub fn from_env() -> Self {
        let production = matches!(std::env::var(DEPLOYMENT_ENV).as_deref(), Ok("production"));
        Self::default().with_raw_signal_logging(!production)
    }

    /// Preset for production deployments
    pub fn production() -> Self {
        Self::default().with_raw_signal_logging(false)
    }

    pub fn with_object_path(mut self, path: impl Into<ObjectPath>) -> Self {
        self.object_path = path.into();
        self
    }

    pub fn with_raw_signal_logging(mut self, enabled: bool) -> Self {
        self.log_raw_signals = enabled;
        self
    }

    pub fn with_default_agent_capability(mut self, capability: AgentCapability) -> Self {
        self.default_agent_capability = capability;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let path = self.object_path.as_str();

        if !path.starts_with('/') {
            return Err(TrackerError::Config(format!(
                "Object path must be absolute: '{}'",
                path
            )));
        }

        if path.len() > 1 && path.ends_with('/') {
            return Err(TrackerError::Config(format!(
                "Object path must not end with '/': '{}'",
                path
            )));
        }

        Ok(())
    }
}
