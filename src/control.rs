//! Single-parameter access and device identity.
//!
//! Writes are gated by the discovered schema: a device either exposes a path
//! or it does not, and its own limits decide writeability and range.

use crate::device::Fingerprint;
use crate::error::ApiError;
use crate::transport::{Answer, DeviceClient};
use crate::tree::ParameterTree;
use crate::types::ParamPath;
use serde_json::Value;
use tracing::{info, warn};

pub struct ParameterControl<'a> {
    client: DeviceClient<'a>,
}

impl<'a> ParameterControl<'a> {
    pub fn new(client: DeviceClient<'a>) -> Self {
        Self { client }
    }

    /// Current value of one parameter.
    pub fn get(&self, path: &ParamPath) -> Result<Value, ApiError> {
        let protocol = self.client.protocol();
        match self.client.call(&protocol.value_request(path))? {
            Answer::Accepted(reply) => protocol
                .parse_value(path, &reply)
                .ok_or_else(|| ApiError::UnknownParameter(path.clone())),
            Answer::Rejected(_) => Err(ApiError::UnknownParameter(path.clone())),
        }
    }

    /// Check `value` against the schema entry for `path` without writing.
    pub fn validate(schema: &ParameterTree, path: &ParamPath, value: &Value) -> Result<(), ApiError> {
        let limits = schema
            .limits(path)
            .ok_or_else(|| ApiError::UnknownParameter(path.clone()))?;
        if limits.denies_write() {
            return Err(ApiError::ReadOnly(path.clone()));
        }
        if let Some(number) = value.as_f64() {
            if let Some(min) = limits.min() {
                if number < min {
                    return Err(ApiError::InvalidValue {
                        path: path.clone(),
                        reason: format!("{} is below minimum {}", number, min),
                    });
                }
            }
            if let Some(max) = limits.max() {
                if number > max {
                    return Err(ApiError::InvalidValue {
                        path: path.clone(),
                        reason: format!("{} is above maximum {}", number, max),
                    });
                }
            }
        }
        Ok(())
    }

    /// Validate and write one parameter. Returns the device's reply.
    pub fn set(
        &self,
        schema: &ParameterTree,
        path: &ParamPath,
        value: Value,
    ) -> Result<Value, ApiError> {
        Self::validate(schema, path, &value)?;
        let request = self.client.protocol().write_request(path, value);
        match self.client.call(&request)? {
            Answer::Accepted(reply) => {
                info!(device = %self.client.device(), path = %path, "Parameter set");
                Ok(reply)
            }
            Answer::Rejected(reply) => Err(ApiError::WriteRejected {
                device: self.client.device().to_string(),
                path: path.clone(),
                reason: reply.to_string(),
            }),
        }
    }

    /// Persist running settings on devices that expose the save parameter.
    pub fn save_settings(&self, schema: &ParameterTree) -> Result<Value, ApiError> {
        let path = self.client.protocol().save_path();
        self.set(schema, &path, Value::Bool(true))
    }

    pub fn device_name(&self) -> Result<String, ApiError> {
        self.get(&self.client.protocol().name_path())
            .map(|value| value_to_string(&value))
    }

    /// Read `product`, `serial`, `version` and `vendor`.
    ///
    /// Fields the device does not report come back empty, so they fail the
    /// identity check against any non-empty expectation.
    pub fn read_fingerprint(&self) -> Result<Fingerprint, ApiError> {
        let read = |field: &str| -> Result<String, ApiError> {
            let path = self.client.protocol().identity_field(field);
            match self.get(&path) {
                Ok(value) => Ok(value_to_string(&value)),
                Err(ApiError::UnknownParameter(_)) => {
                    warn!(device = %self.client.device(), field, "Identity field not reported");
                    Ok(String::new())
                }
                Err(e) => Err(e),
            }
        };
        Ok(Fingerprint {
            product: read("product")?,
            serial: read("serial")?,
            version: read("version")?,
            vendor: read("vendor")?,
        })
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::CancelToken;
    use crate::device::Device;
    use crate::protocol::Protocol;
    use crate::transport::{MemoryDevice, MemoryTransport};
    use crate::tree::SchemaWalker;
    use serde_json::json;

    fn fingerprint() -> Fingerprint {
        Fingerprint {
            product: "KH 80".to_string(),
            serial: "42".to_string(),
            version: "2_0_1".to_string(),
            vendor: "Georg Neumann GmbH".to_string(),
        }
    }

    fn emulated() -> MemoryTransport {
        let transport = MemoryTransport::new(Protocol::default());
        transport.add_device(
            "fe80::1",
            MemoryDevice::new()
                .with_identity("Left", &fingerprint())
                .with_parameter(&["ui", "logo", "brightness"], json!({"min": 0, "max": 100}), json!(50))
                .with_parameter(&["device", "save_settings"], json!({"writeable": true}), json!(false)),
        );
        transport
    }

    fn with_control<F: FnOnce(&MemoryTransport, ParameterControl, ParameterTree)>(f: F) {
        let transport = emulated();
        let protocol = Protocol::default();
        let device = Device::new("fe80::1");
        let cancel = CancelToken::new();
        let client = DeviceClient::new(&transport, &protocol, &device, &cancel);
        let schema = SchemaWalker::new(client).discover_tree().unwrap();
        transport.clear_requests();
        f(&transport, ParameterControl::new(client), schema);
    }

    #[test]
    fn test_read_fingerprint_and_name() {
        with_control(|_, control, _| {
            assert_eq!(control.read_fingerprint().unwrap(), fingerprint());
            assert_eq!(control.device_name().unwrap(), "Left");
        });
    }

    #[test]
    fn test_set_within_limits() {
        with_control(|transport, control, schema| {
            let path = ParamPath::new(["ui", "logo", "brightness"]);
            control.set(&schema, &path, json!(80)).unwrap();
            assert_eq!(control.get(&path).unwrap(), json!(80));
            assert_eq!(transport.writes_to("fe80::1").len(), 1);
        });
    }

    #[test]
    fn test_set_out_of_range_issues_no_write() {
        with_control(|transport, control, schema| {
            let path = ParamPath::new(["ui", "logo", "brightness"]);
            let err = control.set(&schema, &path, json!(101)).unwrap_err();
            assert!(matches!(err, ApiError::InvalidValue { .. }));
            assert!(transport.requests().is_empty());
        });
    }

    #[test]
    fn test_set_read_only_and_unknown() {
        with_control(|transport, control, schema| {
            let serial = ParamPath::new(["device", "identity", "serial"]);
            assert!(matches!(
                control.set(&schema, &serial, json!("1")),
                Err(ApiError::ReadOnly(_))
            ));
            let unknown = ParamPath::new(["audio", "out", "dimm"]);
            assert!(matches!(
                control.set(&schema, &unknown, json!(-20)),
                Err(ApiError::UnknownParameter(_))
            ));
            assert!(transport.requests().is_empty());
        });
    }

    #[test]
    fn test_save_settings() {
        with_control(|transport, control, schema| {
            control.save_settings(&schema).unwrap();
            assert_eq!(
                transport.writes_to("fe80::1"),
                vec![json!({"device": {"save_settings": true}})]
            );
        });
    }
}
