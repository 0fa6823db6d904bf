//! Persistent documents
//!
//! Schema cache, backup records and the device setup file. Each file is read
//! wholesale and replaced wholesale (write to a sibling temp file, then
//! rename), never patched in place.

pub mod backup;
pub mod schema_cache;
pub mod setup;

pub use backup::{BackupRecord, DeviceBackup, StoredCommands};
pub use schema_cache::{FileSchemaCache, SchemaCacheStore};
pub use setup::DeviceSetup;

use crate::error::ApiError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Read and deserialize a JSON file. `Ok(None)` if it does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ApiError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ApiError::StorageError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    serde_json::from_str(&content).map(Some).map_err(|e| {
        ApiError::StorageError(format!("Failed to parse {}: {}", path.display(), e))
    })
}

/// Serialize to pretty JSON and replace `path` atomically.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ApiError::StorageError(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    let content = serde_json::to_string_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    std::fs::write(&tmp, content).map_err(|e| {
        ApiError::StorageError(format!("Failed to write {}: {}", tmp.display(), e))
    })?;
    std::fs::rename(&tmp, path).map_err(|e| {
        ApiError::StorageError(format!(
            "Failed to replace {}: {}",
            path.display(),
            e
        ))
    })
}
