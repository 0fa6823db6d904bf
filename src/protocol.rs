//! Wire conventions of the device control protocol.
//!
//! Requests and replies are nested JSON objects addressing parameters by
//! path. Introspection (namespace enumeration and constraints) lives under
//! reserved key paths which are never part of a device's parameter tree.

use crate::error::ApiError;
use crate::tree::LimitsDescriptor;
use crate::types::ParamPath;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_schema_key() -> Vec<String> {
    vec!["osc".to_string(), "schema".to_string()]
}

fn default_limits_key() -> Vec<String> {
    vec!["osc".to_string(), "limits".to_string()]
}

fn default_error_key() -> Vec<String> {
    vec!["osc".to_string(), "error".to_string()]
}

fn default_identity_path() -> Vec<String> {
    vec!["device".to_string(), "identity".to_string()]
}

fn default_name_path() -> Vec<String> {
    vec!["device".to_string(), "name".to_string()]
}

fn default_save_path() -> Vec<String> {
    vec!["device".to_string(), "save_settings".to_string()]
}

/// Reserved key paths used by the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Namespace enumeration key path
    #[serde(default = "default_schema_key")]
    pub schema_key: Vec<String>,

    /// Constraints (limits) key path
    #[serde(default = "default_limits_key")]
    pub limits_key: Vec<String>,

    /// Key path where devices report request errors
    #[serde(default = "default_error_key")]
    pub error_key: Vec<String>,

    /// Parent path of the fingerprint fields
    #[serde(default = "default_identity_path")]
    pub identity_path: Vec<String>,

    /// Human readable device name
    #[serde(default = "default_name_path")]
    pub name_path: Vec<String>,

    /// Parameter that persists the running settings
    #[serde(default = "default_save_path")]
    pub save_path: Vec<String>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            schema_key: default_schema_key(),
            limits_key: default_limits_key(),
            error_key: default_error_key(),
            identity_path: default_identity_path(),
            name_path: default_name_path(),
            save_path: default_save_path(),
        }
    }
}

/// Outcome of a namespace enumeration for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Children {
    Leaf,
    Names(Vec<String>),
}

/// Request builder and reply decoder for one protocol configuration.
#[derive(Debug, Clone, Default)]
pub struct Protocol {
    config: ProtocolConfig,
}

impl Protocol {
    pub fn new(config: ProtocolConfig) -> Result<Self, ApiError> {
        for (name, key) in [
            ("schema_key", &config.schema_key),
            ("limits_key", &config.limits_key),
            ("error_key", &config.error_key),
        ] {
            if key.is_empty() {
                return Err(ApiError::ConfigError(format!(
                    "protocol.{} must not be empty",
                    name
                )));
            }
        }
        if config.schema_key == config.limits_key {
            return Err(ApiError::ConfigError(
                "protocol.schema_key and protocol.limits_key must differ".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    fn schema_key(&self) -> ParamPath {
        ParamPath::new(self.config.schema_key.iter().cloned())
    }

    fn limits_key(&self) -> ParamPath {
        ParamPath::new(self.config.limits_key.iter().cloned())
    }

    fn error_key(&self) -> ParamPath {
        ParamPath::new(self.config.error_key.iter().cloned())
    }

    /// Top-level keys that belong to the protocol, not to the device.
    pub fn reserved_roots(&self) -> Vec<&str> {
        let mut roots: Vec<&str> = Vec::new();
        for key in [&self.config.schema_key, &self.config.limits_key] {
            if let Some(first) = key.first() {
                if !roots.contains(&first.as_str()) {
                    roots.push(first.as_str());
                }
            }
        }
        roots
    }

    pub fn is_reserved_root(&self, name: &str) -> bool {
        self.reserved_roots().contains(&name)
    }

    pub fn identity_field(&self, field: &str) -> ParamPath {
        ParamPath::new(self.config.identity_path.iter().cloned()).child(field)
    }

    pub fn name_path(&self) -> ParamPath {
        ParamPath::new(self.config.name_path.iter().cloned())
    }

    pub fn save_path(&self) -> ParamPath {
        ParamPath::new(self.config.save_path.iter().cloned())
    }

    /// `{"osc":{"schema":null}}` for the root, `{"osc":{"schema":[{"a":{"b":null}}]}}` otherwise.
    pub fn enumeration_request(&self, path: &ParamPath) -> Value {
        self.schema_key().wrap(Self::addressed(path))
    }

    pub fn limits_request(&self, path: &ParamPath) -> Value {
        self.limits_key().wrap(Self::addressed(path))
    }

    pub fn value_request(&self, path: &ParamPath) -> Value {
        path.wrap(Value::Null)
    }

    pub fn write_request(&self, path: &ParamPath, value: Value) -> Value {
        path.wrap(value)
    }

    fn addressed(path: &ParamPath) -> Value {
        if path.is_root() {
            Value::Null
        } else {
            Value::Array(vec![path.wrap(Value::Null)])
        }
    }

    /// Error payload reported by the device, if any.
    pub fn error_in<'a>(&self, reply: &'a Value) -> Option<&'a Value> {
        self.error_key().lookup(reply)
    }

    /// Decode an enumeration reply for `path`.
    ///
    /// A missing enumeration key means the device does not speak the
    /// introspection protocol. A null, absent or empty entry at `path` marks
    /// a leaf.
    pub fn parse_children(
        &self,
        device: &str,
        path: &ParamPath,
        reply: &Value,
    ) -> Result<Children, ApiError> {
        let body = self.schema_key().lookup(reply).ok_or_else(|| {
            ApiError::SchemaIncompatible {
                device: device.to_string(),
                reason: format!("enumeration reply for {} lacks schema key: {}", path, reply),
            }
        })?;
        let body = Self::unwrap_single(body);
        let entry = if path.is_root() {
            Some(body)
        } else {
            path.lookup(body)
        };
        match entry {
            Some(Value::Object(map)) if !map.is_empty() => {
                Ok(Children::Names(map.keys().cloned().collect()))
            }
            Some(Value::Object(_)) | Some(Value::Null) | None => {
                if path.is_root() {
                    return Err(ApiError::SchemaIncompatible {
                        device: device.to_string(),
                        reason: "device reports an empty namespace".to_string(),
                    });
                }
                Ok(Children::Leaf)
            }
            Some(other) => Err(ApiError::SchemaIncompatible {
                device: device.to_string(),
                reason: format!("unexpected enumeration entry at {}: {}", path, other),
            }),
        }
    }

    /// Decode a constraints reply for the leaf at `path`.
    ///
    /// Devices wrap the descriptor in a one-element list; a bare object is
    /// accepted too. A missing descriptor yields an empty one.
    pub fn parse_limits(
        &self,
        device: &str,
        path: &ParamPath,
        reply: &Value,
    ) -> Result<LimitsDescriptor, ApiError> {
        let body = self.limits_key().lookup(reply).ok_or_else(|| {
            ApiError::SchemaIncompatible {
                device: device.to_string(),
                reason: format!("limits reply for {} lacks limits key: {}", path, reply),
            }
        })?;
        let body = Self::unwrap_single(body);
        match path.lookup(body).map(Self::unwrap_single) {
            Some(Value::Object(map)) => Ok(LimitsDescriptor::from_map(map.clone())),
            Some(Value::Null) | None => Ok(LimitsDescriptor::default()),
            Some(other) => Err(ApiError::SchemaIncompatible {
                device: device.to_string(),
                reason: format!("unexpected limits entry at {}: {}", path, other),
            }),
        }
    }

    /// Extract the value at `path` from a query reply.
    pub fn parse_value(&self, path: &ParamPath, reply: &Value) -> Option<Value> {
        path.lookup(reply).cloned()
    }

    fn unwrap_single(value: &Value) -> &Value {
        match value {
            Value::Array(items) if items.len() == 1 => &items[0],
            other => other,
        }
    }

    /// Build the reply a device sends for an error, used by the in-memory device.
    pub fn error_reply(&self, code: u16, description: &str) -> Value {
        let mut detail = Map::new();
        detail.insert("desc".to_string(), Value::String(description.to_string()));
        let mut entry = Map::new();
        entry.insert(code.to_string(), Value::Object(detail));
        self.error_key()
            .wrap(Value::Array(vec![Value::Object(entry)]))
    }
}
