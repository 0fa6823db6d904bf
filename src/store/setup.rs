//! Known devices, persisted between runs.

use super::{read_json, write_json};
use crate::device::Device;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSetup {
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl DeviceSetup {
    /// Missing file means no known devices.
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<(), ApiError> {
        write_json(path, self)
    }

    /// Add or replace the device with the same address. Returns true if new.
    pub fn upsert(&mut self, device: Device) -> bool {
        match self.devices.iter_mut().find(|d| d.address == device.address) {
            Some(existing) => {
                *existing = device;
                false
            }
            None => {
                self.devices.push(device);
                true
            }
        }
    }

    pub fn remove(&mut self, address: &str) -> bool {
        let before = self.devices.len();
        self.devices.retain(|d| d.address != address);
        self.devices.len() != before
    }

    /// All devices, or only the one at `target`.
    pub fn select(&self, target: Option<usize>) -> Result<Vec<Device>, ApiError> {
        match target {
            None => Ok(self.devices.clone()),
            Some(index) => self.devices.get(index).cloned().map(|d| vec![d]).ok_or_else(|| {
                ApiError::ConfigError(format!(
                    "Target {} out of range. There are {} device(s) in the setup file.",
                    index,
                    self.devices.len()
                ))
            }),
        }
    }
}
