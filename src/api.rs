//! Control API
//!
//! Operations exposed to the command-line layer. Every operation takes a set
//! of devices and returns one outcome per device; a failing device never
//! aborts its siblings.

use crate::concurrency::{run_per_device, CancelToken, DeviceOutcome};
use crate::control::ParameterControl;
use crate::device::Device;
use crate::error::ApiError;
use crate::protocol::Protocol;
use crate::restore::RestoreReport;
use crate::schema::SchemaResolver;
use crate::session::DeviceSession;
use crate::store::{BackupRecord, DeviceBackup, SchemaCacheStore};
use crate::transport::{DeviceClient, Transport};
use crate::tree::ParameterTree;
use crate::types::ParamPath;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Leaf counts for one captured device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureCounts {
    pub captured: usize,
    /// Leaves the device would not report a value for
    pub unpopulated: usize,
}

/// Result of a snapshot run.
///
/// `record` holds every device that completed; `outcomes` reports the leaf
/// counts, or the error, per requested device.
#[derive(Debug)]
pub struct Snapshot {
    pub record: BackupRecord,
    pub outcomes: Vec<DeviceOutcome<CaptureCounts>>,
}

pub struct ControlApi {
    transport: Arc<dyn Transport>,
    protocol: Protocol,
    cache: Arc<dyn SchemaCacheStore>,
    cancel: CancelToken,
    parallel: bool,
}

impl ControlApi {
    pub fn new(
        transport: Arc<dyn Transport>,
        protocol: Protocol,
        cache: Arc<dyn SchemaCacheStore>,
    ) -> Self {
        Self {
            transport,
            protocol,
            cache,
            cancel: CancelToken::new(),
            parallel: false,
        }
    }

    /// Run device sequences side by side.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    fn client<'a>(&'a self, device: &'a Device) -> DeviceClient<'a> {
        DeviceClient::new(self.transport.as_ref(), &self.protocol, device, &self.cancel)
    }

    fn session<'a>(&'a self, device: &'a Device) -> DeviceSession<'a> {
        DeviceSession::new(self.client(device), SchemaResolver::new(self.cache.as_ref()))
    }

    /// Schema for one device, from cache unless `force`.
    pub fn resolve_schema(&self, device: &Device, force: bool) -> Result<ParameterTree, ApiError> {
        self.session(device).discover(force)
    }

    /// Rediscover and recache the schema of every device.
    pub fn refresh_schema(&self, devices: &[Device]) -> Vec<DeviceOutcome<ParameterTree>> {
        run_per_device(devices, self.parallel, |device| self.resolve_schema(device, true))
    }

    /// Capture fingerprint and every leaf value of each device into one record.
    pub fn snapshot(&self, devices: &[Device], comment: Option<String>, rescan: bool) -> Snapshot {
        let results = run_per_device(devices, self.parallel, |device| {
            self.session(device).snapshot(rescan)
        });

        let mut captured = BTreeMap::new();
        let outcomes: Vec<DeviceOutcome<CaptureCounts>> = results
            .into_iter()
            .map(|outcome| {
                let result = outcome.result.map(|capture| {
                    let counts = CaptureCounts {
                        captured: capture.backup.commands.documents().len(),
                        unpopulated: capture.unpopulated.len(),
                    };
                    captured.insert(outcome.device.identity().to_string(), capture.backup);
                    counts
                });
                DeviceOutcome {
                    device: outcome.device,
                    result,
                }
            })
            .collect();

        let record = BackupRecord::new(captured, comment);
        info!(devices = record.devices.len(), timestamp = record.timestamp, "Snapshot captured");
        Snapshot { record, outcomes }
    }

    /// Replay `record` onto each device.
    ///
    /// A device without an entry in the record fails with
    /// `IdentityMismatch` before any request is sent to it.
    pub fn restore(
        &self,
        record: &BackupRecord,
        devices: &[Device],
        rescan: bool,
    ) -> Vec<DeviceOutcome<RestoreReport>> {
        run_per_device(devices, self.parallel, |device| {
            let backup = entry_for(record, device)?;
            self.session(device).restore(backup, rescan)
        })
    }

    pub fn get(&self, devices: &[Device], path: &ParamPath) -> Vec<DeviceOutcome<Value>> {
        run_per_device(devices, self.parallel, |device| {
            let client = self.client(device);
            client.connect()?;
            ParameterControl::new(client).get(path)
        })
    }

    /// Write one parameter after checking it against each device's schema.
    pub fn set(&self, devices: &[Device], path: &ParamPath, value: &Value) -> Vec<DeviceOutcome<Value>> {
        run_per_device(devices, self.parallel, |device| {
            let schema = self.resolve_schema(device, false)?;
            ParameterControl::new(self.client(device)).set(&schema, path, value.clone())
        })
    }

    pub fn save_settings(&self, devices: &[Device]) -> Vec<DeviceOutcome<Value>> {
        run_per_device(devices, self.parallel, |device| {
            let schema = self.resolve_schema(device, false)?;
            ParameterControl::new(self.client(device)).save_settings(&schema)
        })
    }

    pub fn device_name(&self, device: &Device) -> Result<String, ApiError> {
        let client = self.client(device);
        client.connect()?;
        ParameterControl::new(client).device_name()
    }
}

fn entry_for<'r>(record: &'r BackupRecord, device: &Device) -> Result<&'r DeviceBackup, ApiError> {
    record.device(device.identity()).ok_or_else(|| {
        warn!(device = %device, "No entry in backup record");
        ApiError::IdentityMismatch {
            device: device.to_string(),
            field: "identity".to_string(),
            expected: format!("one of {:?}", record.devices.keys().collect::<Vec<_>>()),
            actual: device.identity().to_string(),
        }
    })
}
