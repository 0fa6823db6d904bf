//! Transport contract and adapters
//!
//! A transport sends one request document to one device and blocks until the
//! reply or a timeout. Everything above this layer talks to devices through
//! [`DeviceClient`], which adds cancellation, logging and classification of
//! device-reported errors.

pub mod memory;
pub mod tcp;

use crate::concurrency::CancelToken;
use crate::device::Device;
use crate::error::ApiError;
use crate::protocol::Protocol;
use serde_json::Value;
use tracing::{debug, warn};

pub use memory::{MemoryDevice, MemoryTransport};
pub use tcp::TcpTransport;

/// Raw outcome of one exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Response(Value),
    Timeout,
}

/// Port every device exchange goes through.
pub trait Transport: Send + Sync {
    /// Establish (or verify) the connection to `device`.
    fn connect(&self, _device: &Device) -> Result<(), ApiError> {
        Ok(())
    }

    fn send(&self, device: &Device, request: &Value) -> Result<Reply, ApiError>;
}

/// Classified reply of a device that answered.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Accepted(Value),
    Rejected(Value),
}

/// One device bound to a transport and protocol.
#[derive(Clone, Copy)]
pub struct DeviceClient<'a> {
    transport: &'a dyn Transport,
    protocol: &'a Protocol,
    device: &'a Device,
    cancel: &'a CancelToken,
}

impl<'a> DeviceClient<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        protocol: &'a Protocol,
        device: &'a Device,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            transport,
            protocol,
            device,
            cancel,
        }
    }

    pub fn device(&self) -> &'a Device {
        self.device
    }

    pub fn protocol(&self) -> &'a Protocol {
        self.protocol
    }

    pub fn connect(&self) -> Result<(), ApiError> {
        self.cancel.check()?;
        self.transport.connect(self.device)
    }

    /// Send `request`; a timeout is fatal for the device.
    pub fn call(&self, request: &Value) -> Result<Answer, ApiError> {
        self.cancel.check()?;
        debug!(device = %self.device, request = %request, "SSC request");
        match self.transport.send(self.device, request)? {
            Reply::Response(reply) => {
                debug!(device = %self.device, reply = %reply, "SSC reply");
                if let Some(error) = self.protocol.error_in(&reply) {
                    warn!(device = %self.device, request = %request, error = %error, "Device reported error");
                    Ok(Answer::Rejected(reply))
                } else {
                    Ok(Answer::Accepted(reply))
                }
            }
            Reply::Timeout => {
                warn!(device = %self.device, request = %request, "No reply from device");
                Err(ApiError::Timeout {
                    device: self.device.to_string(),
                    request: request.to_string(),
                })
            }
        }
    }
}
