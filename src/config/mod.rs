//! Configuration
//!
//! Layered with the `config` crate: built-in defaults, then the global file
//! `$XDG_CONFIG_HOME/ssc-state/config.toml`, then an explicit `--config`
//! file, then `SSC_STATE_*` environment variables (`__` separates nested
//! keys, e.g. `SSC_STATE_TRANSPORT__TIMEOUT_MS=500`).

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
pub mod storage;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use storage::{StorageConfig, StoragePaths};

use crate::logging::LoggingConfig;
use crate::protocol::ProtocolConfig;
use crate::transport::tcp::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SscConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request reply timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Link-scope qualifier applied to devices that do not carry their own
    #[serde(default)]
    pub interface: Option<String>,

    /// Run per-device sequences on separate threads
    #[serde(default)]
    pub parallel: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout_ms() -> u64 {
    1000
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            interface: None,
            parallel: false,
        }
    }
}
