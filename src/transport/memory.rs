//! In-memory device emulator.
//!
//! Serves enumeration, limits, query and write requests from a
//! [`ParameterTree`] following the same wire conventions as real devices, and
//! records every request it receives.

use super::{Reply, Transport};
use crate::device::{Device, Fingerprint};
use crate::error::ApiError;
use crate::protocol::Protocol;
use crate::tree::flatten::split_value_document;
use crate::tree::{LeafNode, LimitsDescriptor, Located, ParameterNode, ParameterTree};
use crate::types::ParamPath;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

/// Emulated device state.
#[derive(Debug, Clone, Default)]
pub struct MemoryDevice {
    pub tree: ParameterTree,
    /// Never answers when set.
    pub offline: bool,
    /// Does not implement the introspection namespace.
    pub no_introspection: bool,
    /// Writes to these paths are answered with an error.
    pub reject_writes: HashSet<ParamPath>,
    /// Value queries to these paths are answered with an error.
    pub reject_queries: HashSet<ParamPath>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter with limits and a current value.
    ///
    /// # Panics
    ///
    /// If `path` conflicts with an already emulated parameter.
    pub fn with_parameter(mut self, path: &[&str], limits: Value, value: Value) -> Self {
        let limits = match limits {
            Value::Object(map) => LimitsDescriptor::from_map(map),
            _ => LimitsDescriptor::default(),
        };
        if let Err(e) = self
            .tree
            .insert_leaf(&ParamPath::new(path.iter().copied()), LeafNode::with_value(limits, value))
        {
            panic!("invalid emulated parameter {:?}: {}", path, e);
        }
        self
    }

    /// Add const identity parameters under `device.identity` and a `device.name`.
    pub fn with_identity(self, name: &str, fingerprint: &Fingerprint) -> Self {
        let constant = serde_json::json!({"const": true, "writeable": false});
        self.with_parameter(&["device", "name"], serde_json::json!({"writeable": true}), Value::from(name))
            .with_parameter(&["device", "identity", "product"], constant.clone(), Value::from(fingerprint.product.clone()))
            .with_parameter(&["device", "identity", "serial"], constant.clone(), Value::from(fingerprint.serial.clone()))
            .with_parameter(&["device", "identity", "version"], constant.clone(), Value::from(fingerprint.version.clone()))
            .with_parameter(&["device", "identity", "vendor"], constant, Value::from(fingerprint.vendor.clone()))
    }

    pub fn value(&self, path: &ParamPath) -> Option<&Value> {
        self.tree.leaf(path).and_then(|leaf| leaf.value.as_ref())
    }
}

/// A network of emulated devices keyed by address.
pub struct MemoryTransport {
    protocol: Protocol,
    devices: Mutex<BTreeMap<String, MemoryDevice>>,
    log: Mutex<Vec<(String, Value)>>,
}

impl MemoryTransport {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            devices: Mutex::new(BTreeMap::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn add_device(&self, address: &str, device: MemoryDevice) {
        self.devices.lock().insert(address.to_string(), device);
    }

    pub fn update_device<F: FnOnce(&mut MemoryDevice)>(&self, address: &str, f: F) {
        if let Some(device) = self.devices.lock().get_mut(address) {
            f(device);
        }
    }

    pub fn device_state(&self, address: &str) -> Option<MemoryDevice> {
        self.devices.lock().get(address).cloned()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.log.lock().clone()
    }

    pub fn requests_to(&self, address: &str) -> Vec<Value> {
        self.log
            .lock()
            .iter()
            .filter(|(addr, _)| addr == address)
            .map(|(_, req)| req.clone())
            .collect()
    }

    pub fn clear_requests(&self) {
        self.log.lock().clear();
    }

    /// Requests that are neither introspection nor pure queries.
    pub fn writes_to(&self, address: &str) -> Vec<Value> {
        let schema = self
            .device_state(address)
            .map(|device| device.tree)
            .unwrap_or_default();
        self.requests_to(address)
            .into_iter()
            .filter(|req| !self.is_introspection(req) && !is_query(&schema, req))
            .collect()
    }

    pub fn introspection_requests_to(&self, address: &str) -> Vec<Value> {
        self.requests_to(address)
            .into_iter()
            .filter(|req| self.is_introspection(req))
            .collect()
    }

    fn is_introspection(&self, request: &Value) -> bool {
        request
            .as_object()
            .map(|map| map.keys().any(|k| self.protocol.is_reserved_root(k)))
            .unwrap_or(false)
    }

    fn schema_key(&self) -> ParamPath {
        ParamPath::new(self.protocol.config().schema_key.iter().cloned())
    }

    fn limits_key(&self) -> ParamPath {
        ParamPath::new(self.protocol.config().limits_key.iter().cloned())
    }

    fn handle(&self, state: &mut MemoryDevice, request: &Value) -> Value {
        if let Some(addressed) = self.schema_key().lookup(request) {
            if state.no_introspection {
                return self.protocol.error_reply(404, "address not found");
            }
            return self.enumerate(state, addressed);
        }
        if let Some(addressed) = self.limits_key().lookup(request) {
            if state.no_introspection {
                return self.protocol.error_reply(404, "address not found");
            }
            return self.limits(state, addressed);
        }
        self.query_or_write(state, request)
    }

    fn addressed_path(addressed: &Value) -> Option<ParamPath> {
        let inner = match addressed {
            Value::Array(items) if items.len() == 1 => &items[0],
            Value::Null => return Some(ParamPath::root()),
            other => other,
        };
        ParamPath::from_document(inner).ok().map(|(path, _)| path)
    }

    fn enumerate(&self, state: &MemoryDevice, addressed: &Value) -> Value {
        let path = match Self::addressed_path(addressed) {
            Some(path) => path,
            None => return self.protocol.error_reply(400, "malformed address"),
        };
        let body = if path.is_root() {
            let mut root = listing(state.tree.children());
            for reserved in self.protocol.reserved_roots() {
                root.insert(reserved.to_string(), Value::Object(Map::new()));
            }
            Value::Object(root)
        } else {
            match state.tree.get(&path) {
                Some(ParameterNode::Internal(children)) => {
                    path.wrap(Value::Object(listing(children)))
                }
                Some(ParameterNode::Leaf(_)) => path.wrap(Value::Null),
                None => return self.protocol.error_reply(404, "address not found"),
            }
        };
        self.schema_key().wrap(Value::Array(vec![body]))
    }

    fn limits(&self, state: &MemoryDevice, addressed: &Value) -> Value {
        let path = match Self::addressed_path(addressed) {
            Some(path) if !path.is_root() => path,
            _ => return self.protocol.error_reply(400, "malformed address"),
        };
        match state.tree.limits(&path) {
            Some(limits) => {
                let descriptor = Value::Array(vec![Value::Object(limits.as_map().clone())]);
                self.limits_key()
                    .wrap(Value::Array(vec![path.wrap(descriptor)]))
            }
            None => self.protocol.error_reply(404, "address not found"),
        }
    }

    fn query_or_write(&self, state: &mut MemoryDevice, request: &Value) -> Value {
        let documents = split_value_document(&state.tree, request);
        if documents.is_empty() {
            return self.protocol.error_reply(400, "empty request");
        }
        let mut reply = Value::Object(Map::new());
        for document in documents {
            let (path, value) = match state.tree.locate(&document) {
                Ok(Located::Leaf { path, value, .. }) => (path, value),
                Ok(Located::Unknown(_)) => return self.protocol.error_reply(404, "address not found"),
                Err(_) => return self.protocol.error_reply(400, "malformed address"),
            };
            let leaf = match state.tree.leaf_mut(&path) {
                Some(leaf) => leaf,
                None => return self.protocol.error_reply(404, "address not found"),
            };
            let current = if value.is_null() {
                if state.reject_queries.contains(&path) {
                    return self.protocol.error_reply(503, "value unavailable");
                }
                leaf.value.clone().unwrap_or(Value::Null)
            } else {
                if leaf.limits.denies_write() || state.reject_writes.contains(&path) {
                    return self.protocol.error_reply(403, "not writeable");
                }
                leaf.value = Some(value.clone());
                value
            };
            merge(&mut reply, path.wrap(current));
        }
        reply
    }
}

impl Transport for MemoryTransport {
    fn connect(&self, device: &Device) -> Result<(), ApiError> {
        match self.devices.lock().get(&device.address) {
            Some(state) if !state.offline => Ok(()),
            Some(_) => Err(ApiError::transport(device.to_string(), "device offline")),
            None => Err(ApiError::transport(device.to_string(), "no route to device")),
        }
    }

    fn send(&self, device: &Device, request: &Value) -> Result<Reply, ApiError> {
        self.log
            .lock()
            .push((device.address.clone(), request.clone()));
        let mut devices = self.devices.lock();
        let state = match devices.get_mut(&device.address) {
            Some(state) => state,
            None => return Err(ApiError::transport(device.to_string(), "no route to device")),
        };
        if state.offline {
            return Ok(Reply::Timeout);
        }
        Ok(Reply::Response(self.handle(state, request)))
    }
}

/// Child names mapped to `null` for leaves and `{}` for namespaces.
fn listing(children: &BTreeMap<String, ParameterNode>) -> Map<String, Value> {
    children
        .iter()
        .map(|(name, node)| {
            let marker = if node.is_leaf() {
                Value::Null
            } else {
                Value::Object(Map::new())
            };
            (name.clone(), marker)
        })
        .collect()
}

fn is_query(schema: &ParameterTree, request: &Value) -> bool {
    split_value_document(schema, request).iter().all(|doc| match schema.locate(doc) {
        Ok(Located::Leaf { value, .. }) => value.is_null(),
        _ => matches!(ParamPath::from_document(doc), Ok((_, Value::Null))),
    })
}

fn merge(target: &mut Value, document: Value) {
    if let (Value::Object(target_map), Value::Object(doc_map)) = (target, document) {
        for (key, value) in doc_map {
            match target_map.get_mut(&key) {
                Some(existing) if existing.is_object() => merge(existing, value),
                _ => {
                    target_map.insert(key, value);
                }
            }
        }
    }
}
