use serde_json::json;
use ssc_state::api::ControlApi;
use ssc_state::device::{Device, Fingerprint};
use ssc_state::protocol::Protocol;
use ssc_state::store::FileSchemaCache;
use ssc_state::transport::{MemoryDevice, MemoryTransport};
use std::sync::Arc;
use tempfile::TempDir;

pub const LEFT: &str = "fe80::1";
pub const RIGHT: &str = "fe80::2";

pub fn fingerprint(serial: &str) -> Fingerprint {
    Fingerprint {
        product: "KH 120 II".to_string(),
        serial: serial.to_string(),
        version: "1_4_2".to_string(),
        vendor: "Georg Neumann GmbH".to_string(),
    }
}

/// `a.b` writeable (3), `a.c` const (7), plus the identity leaves.
pub fn scenario_device(serial: &str) -> MemoryDevice {
    MemoryDevice::new()
        .with_identity("Left", &fingerprint(serial))
        .with_parameter(&["a", "b"], json!({"writeable": true}), json!(3))
        .with_parameter(&["a", "c"], json!({"const": true}), json!(7))
}

/// A richer device with nested namespaces and mixed limits.
pub fn studio_monitor(name: &str, serial: &str) -> MemoryDevice {
    MemoryDevice::new()
        .with_identity(name, &fingerprint(serial))
        .with_parameter(&["audio", "out", "level"], json!({"min": -60, "max": 0}), json!(-6))
        .with_parameter(&["audio", "out", "mute"], json!({"writeable": true}), json!(false))
        .with_parameter(&["audio", "out", "delay"], json!({"min": 0, "max": 500}), json!(0))
        .with_parameter(&["ui", "logo", "brightness"], json!({"min": 0, "max": 100}), json!(80))
        .with_parameter(&["device", "save_settings"], json!({"writeable": true}), json!(false))
        .with_parameter(&["device", "serial_bus"], json!({"const": true}), json!("rs485"))
}

pub struct Harness {
    pub temp: TempDir,
    pub transport: Arc<MemoryTransport>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
            transport: Arc::new(MemoryTransport::new(Protocol::default())),
        }
    }

    pub fn with_device(self, address: &str, device: MemoryDevice) -> Self {
        self.transport.add_device(address, device);
        self
    }

    pub fn cache(&self) -> Arc<FileSchemaCache> {
        Arc::new(FileSchemaCache::new(self.temp.path().join("schema_cache.json")))
    }

    pub fn api(&self) -> ControlApi {
        ControlApi::new(self.transport.clone(), Protocol::default(), self.cache())
    }
}

pub fn device(address: &str) -> Device {
    Device::new(address)
}
