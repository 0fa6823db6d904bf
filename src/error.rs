//! Error types
//!
//! Per-device failures (`Transport`, `SchemaIncompatible`, `IdentityMismatch`,
//! `Cancelled`) abort the current device operation. `WriteRejected` is only
//! ever recorded per leaf during a restore and never escalated.

use crate::types::ParamPath;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Transport error for {device}: {reason}")]
    Transport { device: String, reason: String },

    #[error("Device {device} did not answer {request}")]
    Timeout { device: String, request: String },

    #[error("Device {device} does not support schema introspection: {reason}")]
    SchemaIncompatible { device: String, reason: String },

    #[error("Identity mismatch for {device}: {field} is {actual:?}, backup expects {expected:?}")]
    IdentityMismatch {
        device: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Device {device} rejected write to {path}: {reason}")]
    WriteRejected {
        device: String,
        path: ParamPath,
        reason: String,
    },

    #[error("Parameter {0} is not exposed by the device schema")]
    UnknownParameter(ParamPath),

    #[error("Parameter {0} is read-only")]
    ReadOnly(ParamPath),

    #[error("Invalid value for {path}: {reason}")]
    InvalidValue { path: ParamPath, reason: String },

    #[error("Invalid parameter path: {0}")]
    InvalidPath(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    pub fn transport(device: impl Into<String>, reason: impl Into<String>) -> Self {
        ApiError::Transport {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that abort the whole device operation.
    pub fn is_fatal_for_device(&self) -> bool {
        !matches!(self, ApiError::WriteRejected { .. })
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
