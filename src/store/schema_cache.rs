//! Schema cache keyed by device network identity.
//!
//! File layout: one JSON object, top-level keys are device identities, each
//! value a schema-only tree whose leaves are `[limits]`.

use super::{read_json, write_json};
use crate::error::ApiError;
use crate::tree::ParameterTree;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Storage port for discovered schemas.
pub trait SchemaCacheStore: Send + Sync {
    fn load(&self, identity: &str) -> Result<Option<ParameterTree>, ApiError>;
    fn store(&self, identity: &str, tree: &ParameterTree) -> Result<(), ApiError>;
    fn identities(&self) -> Result<Vec<String>, ApiError>;
}

/// Whole-file JSON cache. Stores from concurrent device workers are
/// serialized so no entry is lost in the read-then-overwrite.
pub struct FileSchemaCache {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSchemaCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, ApiError> {
        match read_json::<Value>(&self.path)? {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(ApiError::StorageError(format!(
                "Schema cache {} is not a JSON object",
                self.path.display()
            ))),
        }
    }
}

impl SchemaCacheStore for FileSchemaCache {
    fn load(&self, identity: &str) -> Result<Option<ParameterTree>, ApiError> {
        let entries = self.read_all()?;
        match entries.get(identity) {
            Some(schema) => {
                debug!(identity, path = %self.path.display(), "Schema cache hit");
                ParameterTree::from_schema_json(schema).map(Some)
            }
            None => Ok(None),
        }
    }

    fn store(&self, identity: &str, tree: &ParameterTree) -> Result<(), ApiError> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_all()?;
        entries.insert(identity.to_string(), tree.schema_only().to_schema_json());
        write_json(&self.path, &Value::Object(entries))?;
        info!(identity, path = %self.path.display(), "Schema cached");
        Ok(())
    }

    fn identities(&self) -> Result<Vec<String>, ApiError> {
        Ok(self.read_all()?.keys().cloned().collect())
    }
}
