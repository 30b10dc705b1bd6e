//! Node configuration and the persisted mesh record.
//!
//! # Components
//!
//! - [`NodeConfig`] - runtime parameters (tick period, queue depth, scrambling)
//! - [`RmConfig`] - the 26-byte record deployed gateways keep in flash
//! - [`ConfigStore`] - byte-level backing store for the record
//! - [`RmStore`] - read-modify-write operations on a store

mod node;
mod record;
mod store;

use std::fmt;
use std::io;

pub use node::{NodeConfig, DEFAULT_STATUS_PORT};
pub use record::{MeshInfo, RmConfig, RECORD_LEN};
pub use store::{ConfigStore, MemoryStore, RmStore};

/// Configuration and persistence errors.
#[derive(Debug)]
pub enum ConfigError {
    /// A configuration value is out of range.
    InvalidConfig(&'static str),
    /// The backing store failed.
    Io(io::Error),
    /// Read-back after a write did not match.
    Corrupt,
    /// Configuration file could not be parsed.
    Json(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(what) => write!(f, "invalid configuration: {}", what),
            Self::Io(e) => write!(f, "storage error: {}", e),
            Self::Corrupt => write!(f, "stored record failed verification"),
            Self::Json(e) => write!(f, "configuration parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
