//! Environment variable source: SSC_STATE_ prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// `SSC_STATE_TRANSPORT__PORT=4545` sets `transport.port`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix("SSC_STATE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    ))
}
