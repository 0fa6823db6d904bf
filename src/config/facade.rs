//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::SscConfig;
use config::ConfigError;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the standard sources, plus `explicit` when given.
    pub fn load(explicit: Option<&Path>) -> Result<SscConfig, ConfigError> {
        MergeService::load(explicit)
    }

    /// Load from one file with the environment overlay, skipping the global file.
    pub fn load_from_file(path: &Path) -> Result<SscConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    pub fn default() -> SscConfig {
        SscConfig::default()
    }
}
