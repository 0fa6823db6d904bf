//! XDG Base Directory locations for configuration and persisted documents.

use crate::error::ApiError;
use std::path::PathBuf;

const APP_DIR: &str = "ssc-state";

/// `$XDG_DATA_HOME`, else `$HOME/.local/share`
pub fn data_home() -> Option<PathBuf> {
    if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        if !xdg_data_home.is_empty() {
            return Some(PathBuf::from(xdg_data_home));
        }
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local").join("share"))
}

/// `$XDG_CONFIG_HOME`, else `$HOME/.config`
pub fn config_home() -> Result<PathBuf, ApiError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Ok(PathBuf::from(xdg_config_home));
        }
    }

    let home = std::env::var("HOME").map_err(|_| {
        ApiError::ConfigError(
            "Could not determine XDG config home directory (HOME not set)".to_string(),
        )
    })?;

    Ok(PathBuf::from(home).join(".config"))
}

/// `$XDG_DATA_HOME/ssc-state/`
pub fn app_data_dir() -> Result<PathBuf, ApiError> {
    data_home().map(|d| d.join(APP_DIR)).ok_or_else(|| {
        ApiError::ConfigError("Could not determine XDG data home directory (HOME not set)".to_string())
    })
}

/// `$XDG_CONFIG_HOME/ssc-state/config.toml`
pub fn global_config_path() -> Result<PathBuf, ApiError> {
    Ok(config_home()?.join(APP_DIR).join("config.toml"))
}
