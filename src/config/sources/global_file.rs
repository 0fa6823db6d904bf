//! Global file source: $XDG_CONFIG_HOME/ssc-state/config.toml, optional.

use crate::config::xdg;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use tracing::debug;

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match xdg::global_config_path() {
        Ok(path) => {
            debug!(path = %path.display(), "Global config source");
            Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(false)))
        }
        Err(_) => Ok(builder),
    }
}
