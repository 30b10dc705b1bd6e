//! Runtime node parameters.
//!
//! # Example
//!
//! ```
//! use wisafe_rs_esp32::config::NodeConfig;
//!
//! let config = NodeConfig::from_json(r#"{"scramble": true}"#).unwrap();
//! assert!(config.scramble);
//! assert_eq!(config.tick_period_ms, 2900);
//! ```

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default port for the status server.
pub const DEFAULT_STATUS_PORT: u16 = 8080;

/// Largest host queue the bridge will allocate.
const MAX_QUEUE_DEPTH: usize = 64;

/// Parameters that are not part of the persisted mesh record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Delay between main-loop passes.
    pub tick_period_ms: u64,
    /// Longest wait for the release timer before a pass runs anyway.
    pub release_timeout_ms: u64,
    /// Depth of each host queue (items are 16 bytes).
    pub host_queue_depth: usize,
    /// Scramble frame bytes 8..=20 with mesh key 1 once joined.
    pub scramble: bool,
    /// Gateway ID used until one is persisted.
    pub gateway_id: [u8; 3],
    pub status_port: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 2900,
            release_timeout_ms: 5000,
            host_queue_depth: 4,
            scramble: false,
            gateway_id: [1, 2, 3],
            status_port: DEFAULT_STATUS_PORT,
        }
    }
}

impl NodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period_ms == 0 {
            return Err(ConfigError::InvalidConfig("tick_period_ms must be non-zero"));
        }
        if self.release_timeout_ms <= self.tick_period_ms {
            return Err(ConfigError::InvalidConfig(
                "release_timeout_ms must exceed tick_period_ms",
            ));
        }
        if self.host_queue_depth == 0 || self.host_queue_depth > MAX_QUEUE_DEPTH {
            return Err(ConfigError::InvalidConfig("host_queue_depth must be 1..=64"));
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn release_timeout(&self) -> Duration {
        Duration::from_millis(self.release_timeout_ms)
    }

    /// Parse and validate. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> String {
        // Plain struct of numbers and bools; serialization cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
