//! Backup records: one file per snapshot run, covering one or more devices.

use super::{read_json, write_json};
use crate::device::Fingerprint;
use crate::error::ApiError;
use crate::tree::flatten::{flatten, flatten_value_document, split_value_document};
use crate::tree::ParameterTree;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Stored parameter values of one device.
///
/// Written as the flattened list. A nested value document is accepted on
/// read as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredCommands {
    Documents(Vec<Value>),
    Tree(Value),
}

impl StoredCommands {
    /// Single-leaf documents in replay order.
    pub fn documents(&self) -> Vec<Value> {
        match self {
            StoredCommands::Documents(docs) => docs.clone(),
            StoredCommands::Tree(tree) => flatten_value_document(tree),
        }
    }

    /// Single-leaf documents, splitting a nested value document at the
    /// leaves of `schema` so object values stay whole.
    pub fn documents_for(&self, schema: &ParameterTree) -> Vec<Value> {
        match self {
            StoredCommands::Documents(docs) => docs.clone(),
            StoredCommands::Tree(tree) => split_value_document(schema, tree),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceBackup {
    pub commands: StoredCommands,
    #[serde(flatten)]
    pub fingerprint: Fingerprint,
}

impl DeviceBackup {
    pub fn from_tree(fingerprint: Fingerprint, tree: &ParameterTree) -> Self {
        Self {
            commands: StoredCommands::Documents(flatten(tree)),
            fingerprint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub devices: BTreeMap<String, DeviceBackup>,
    /// Capture time, epoch seconds
    pub timestamp: i64,
    pub timelocal: String,
    /// Version of the tool that wrote the record
    pub version: String,
    #[serde(default)]
    pub comment: String,
}

impl BackupRecord {
    pub fn new(devices: BTreeMap<String, DeviceBackup>, comment: Option<String>) -> Self {
        Self::captured_at(devices, comment, Utc::now())
    }

    pub fn captured_at(
        devices: BTreeMap<String, DeviceBackup>,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            devices,
            timestamp: at.timestamp(),
            timelocal: at.with_timezone(&Local).format("%a %b %e %H:%M:%S %Y").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            comment: comment.unwrap_or_default(),
        }
    }

    pub fn device(&self, identity: &str) -> Option<&DeviceBackup> {
        self.devices.get(identity)
    }

    pub fn load(path: &Path) -> Result<Self, ApiError> {
        read_json(path)?.ok_or_else(|| {
            ApiError::StorageError(format!("Backup file not found: {}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ApiError> {
        write_json(path, self)
    }
}
