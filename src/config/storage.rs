//! StorageConfig and resolved document locations.

use crate::config::xdg;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Paths of the persisted documents. Unset entries resolve under
/// `$XDG_DATA_HOME/ssc-state/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub schema_cache: Option<PathBuf>,
    #[serde(default)]
    pub setup_file: Option<PathBuf>,
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoragePaths {
    pub schema_cache: PathBuf,
    pub setup_file: PathBuf,
    pub backup_dir: PathBuf,
}

impl StorageConfig {
    pub fn resolve_paths(&self) -> Result<StoragePaths, ApiError> {
        if let (Some(schema_cache), Some(setup_file), Some(backup_dir)) =
            (&self.schema_cache, &self.setup_file, &self.backup_dir)
        {
            return Ok(StoragePaths {
                schema_cache: schema_cache.clone(),
                setup_file: setup_file.clone(),
                backup_dir: backup_dir.clone(),
            });
        }
        Ok(self.resolve_under(&xdg::app_data_dir()?))
    }

    /// Resolve unset entries under `base`.
    pub fn resolve_under(&self, base: &Path) -> StoragePaths {
        StoragePaths {
            schema_cache: self
                .schema_cache
                .clone()
                .unwrap_or_else(|| base.join("schema_cache.json")),
            setup_file: self
                .setup_file
                .clone()
                .unwrap_or_else(|| base.join("devices.json")),
            backup_dir: self
                .backup_dir
                .clone()
                .unwrap_or_else(|| base.join("backups")),
        }
    }
}

impl StoragePaths {
    /// Default file name for a new backup taken at `timestamp`.
    pub fn backup_file(&self, timestamp: i64) -> PathBuf {
        self.backup_dir.join(format!("backup-{}.json", timestamp))
    }
}
