//! TCP transport: one JSON document per line, `\r\n` terminated.

use super::{Reply, Transport};
use crate::device::Device;
use crate::error::ApiError;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::ffi::CString;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{IpAddr, SocketAddr, SocketAddrV6, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_PORT: u16 = 45;

struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

/// Persistent per-device connections, opened lazily.
pub struct TcpTransport {
    port: u16,
    timeout: Duration,
    connections: Mutex<HashMap<Device, Arc<Mutex<Connection>>>>,
}

impl TcpTransport {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self {
            port,
            timeout,
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn socket_addr(&self, device: &Device) -> Result<SocketAddr, ApiError> {
        match device.address.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => {
                let scope_id = match &device.interface {
                    Some(iface) => resolve_scope_id(device, iface)?,
                    None => 0,
                };
                Ok(SocketAddr::V6(SocketAddrV6::new(ip, self.port, 0, scope_id)))
            }
            Ok(ip) => Ok(SocketAddr::new(ip, self.port)),
            Err(_) => (device.address.as_str(), self.port)
                .to_socket_addrs()
                .map_err(|e| ApiError::transport(device.to_string(), e.to_string()))?
                .next()
                .ok_or_else(|| {
                    ApiError::transport(device.to_string(), "address resolved to nothing")
                }),
        }
    }

    fn open(&self, device: &Device) -> Result<Connection, ApiError> {
        let addr = self.socket_addr(device)?;
        let stream = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| ApiError::transport(device.to_string(), format!("connect: {}", e)))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.timeout)))
            .and_then(|_| stream.set_nodelay(true))
            .map_err(|e| ApiError::transport(device.to_string(), e.to_string()))?;
        let writer = stream
            .try_clone()
            .map_err(|e| ApiError::transport(device.to_string(), e.to_string()))?;
        info!(device = %device, addr = %addr, "Connected");
        Ok(Connection {
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Get or open the connection for `device`.
    ///
    /// The map lock is only held for lookups so devices never wait on each
    /// other's connects or exchanges.
    fn connection(&self, device: &Device) -> Result<Arc<Mutex<Connection>>, ApiError> {
        if let Some(conn) = self.connections.lock().get(device) {
            return Ok(conn.clone());
        }
        let conn = Arc::new(Mutex::new(self.open(device)?));
        let mut map = self.connections.lock();
        // Another thread may have connected meanwhile; keep the first one.
        Ok(map.entry(device.clone()).or_insert(conn).clone())
    }

    fn exchange(conn: &mut Connection, device: &Device, request: &Value) -> Result<Reply, ApiError> {
        let mut line = serde_json::to_string(request)?;
        line.push_str("\r\n");
        conn.writer
            .write_all(line.as_bytes())
            .and_then(|_| conn.writer.flush())
            .map_err(|e| ApiError::transport(device.to_string(), format!("write: {}", e)))?;

        let mut buf = String::new();
        match conn.reader.read_line(&mut buf) {
            Ok(0) => Err(ApiError::transport(
                device.to_string(),
                "connection closed by device",
            )),
            Ok(_) => {
                let reply = serde_json::from_str(buf.trim_end()).map_err(|e| {
                    ApiError::transport(device.to_string(), format!("invalid reply {:?}: {}", buf, e))
                })?;
                Ok(Reply::Response(reply))
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(Reply::Timeout)
            }
            Err(e) => Err(ApiError::transport(device.to_string(), format!("read: {}", e))),
        }
    }
}

impl Transport for TcpTransport {
    fn connect(&self, device: &Device) -> Result<(), ApiError> {
        self.connection(device).map(|_| ())
    }

    fn send(&self, device: &Device, request: &Value) -> Result<Reply, ApiError> {
        let conn = self.connection(device)?;
        let result = {
            let mut guard = conn.lock();
            Self::exchange(&mut guard, device, request)
        };
        if !matches!(result, Ok(Reply::Response(_))) {
            // A late reply would otherwise be read as the answer to the next request.
            debug!(device = %device, "Dropping connection");
            self.connections.lock().remove(device);
        }
        result
    }
}

fn resolve_scope_id(device: &Device, interface: &str) -> Result<u32, ApiError> {
    let interface = interface.trim_start_matches('%');
    if let Ok(id) = interface.parse::<u32>() {
        return Ok(id);
    }
    let name = CString::new(interface)
        .map_err(|_| ApiError::transport(device.to_string(), "interface name contains NUL"))?;
    // SAFETY: `name` is a valid NUL-terminated string for the duration of the call.
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    if index == 0 {
        return Err(ApiError::transport(
            device.to_string(),
            format!("unknown network interface {}", interface),
        ));
    }
    Ok(index)
}
