//! Built-in defaults every merge starts from.

use crate::transport::tcp::DEFAULT_PORT;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("transport.port", i64::from(DEFAULT_PORT))?
        .set_default("transport.timeout_ms", 1000)?
        .set_default("transport.parallel", false)
}
