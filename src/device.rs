//! Device handles, fingerprints and the per-device lifecycle.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A loudspeaker addressed on the network.
///
/// `interface` is the link-scope qualifier needed for IPv6 link-local
/// addresses (e.g. `en0` or a numeric scope id). It travels with the handle
/// into every transport call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Device {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            interface: None,
            name: None,
        }
    }

    pub fn with_interface(mut self, interface: Option<String>) -> Self {
        self.interface = interface;
        self
    }

    /// Network identity used to key the schema cache and backup records.
    pub fn identity(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.interface {
            Some(iface) => write!(f, "{}%{}", self.address, iface),
            None => write!(f, "{}", self.address),
        }
    }
}

/// Identity fields reported under `device.identity`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub product: String,
    pub serial: String,
    pub version: String,
    #[serde(default)]
    pub vendor: String,
}

impl Fingerprint {
    /// Compare the fields that pin a backup to one physical device.
    ///
    /// `vendor` is informational and not part of the gate.
    pub fn verify(&self, expected: &Fingerprint, device: &Device) -> Result<(), ApiError> {
        let checks = [
            ("product", &expected.product, &self.product),
            ("serial", &expected.serial, &self.serial),
            ("version", &expected.version, &self.version),
        ];
        for (field, expected, actual) in checks {
            if expected != actual {
                return Err(ApiError::IdentityMismatch {
                    device: device.to_string(),
                    field: field.to_string(),
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Lifecycle of one device within a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Unconnected,
    Connected,
    SchemaResolved,
    Populating,
    Populated,
    Restoring,
    Restored,
    Aborted,
}

impl DeviceState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeviceState::Populated | DeviceState::Restored | DeviceState::Aborted
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition(self, next: DeviceState) -> bool {
        use DeviceState::*;
        match (self, next) {
            (_, Aborted) => !self.is_terminal(),
            (Unconnected, Connected) => true,
            (Connected, SchemaResolved) => true,
            (SchemaResolved, Populating) => true,
            (Populating, Populated) => true,
            (SchemaResolved, Restoring) => true,
            (Restoring, Restored) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceState::Unconnected => "unconnected",
            DeviceState::Connected => "connected",
            DeviceState::SchemaResolved => "schema_resolved",
            DeviceState::Populating => "populating",
            DeviceState::Populated => "populated",
            DeviceState::Restoring => "restoring",
            DeviceState::Restored => "restored",
            DeviceState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}
