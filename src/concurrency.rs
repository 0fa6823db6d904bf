//! Cancellation and per-device fan-out
//!
//! Each device runs its own strictly sequential request sequence. Devices are
//! independent, so sequences may run side by side on scoped threads; one
//! device failing never cancels its siblings. Only an operator interrupt
//! (the shared [`CancelToken`]) stops everything.

use crate::device::Device;
use crate::error::ApiError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::warn;

/// Shared stop flag, checked before every request.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), ApiError> {
        if self.is_cancelled() {
            Err(ApiError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Outcome of one device's operation.
#[derive(Debug)]
pub struct DeviceOutcome<T> {
    pub device: Device,
    pub result: Result<T, ApiError>,
}

/// Run `op` once per device and collect every outcome in input order.
///
/// With `parallel` set, each device gets its own scoped thread.
pub fn run_per_device<T, F>(devices: &[Device], parallel: bool, op: F) -> Vec<DeviceOutcome<T>>
where
    T: Send,
    F: Fn(&Device) -> Result<T, ApiError> + Sync,
{
    if !parallel || devices.len() < 2 {
        return devices
            .iter()
            .map(|device| DeviceOutcome {
                device: device.clone(),
                result: op(device),
            })
            .collect();
    }

    thread::scope(|scope| {
        let handles: Vec<_> = devices
            .iter()
            .map(|device| {
                let op = &op;
                (device, scope.spawn(move || op(device)))
            })
            .collect();

        handles
            .into_iter()
            .map(|(device, handle)| {
                let result = handle.join().unwrap_or_else(|_| {
                    warn!(device = %device, "Device worker panicked");
                    Err(ApiError::transport(device.to_string(), "worker panicked"))
                });
                DeviceOutcome {
                    device: device.clone(),
                    result,
                }
            })
            .collect()
    })
}
