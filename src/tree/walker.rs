//! Recursive namespace discovery.

use super::node::{LeafNode, LimitsDescriptor, ParameterNode, ParameterTree};
use crate::error::ApiError;
use crate::protocol::Children;
use crate::transport::{Answer, DeviceClient};
use crate::types::ParamPath;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Asks a device to describe its own namespace.
///
/// One enumeration request per node and one limits request per leaf. Any
/// unanswered request aborts the walk; a partial tree is never returned.
pub struct SchemaWalker<'a> {
    client: DeviceClient<'a>,
}

impl<'a> SchemaWalker<'a> {
    pub fn new(client: DeviceClient<'a>) -> Self {
        Self { client }
    }

    fn device_name(&self) -> String {
        self.client.device().to_string()
    }

    pub fn discover_children(&self, path: &ParamPath) -> Result<Children, ApiError> {
        let protocol = self.client.protocol();
        let request = protocol.enumeration_request(path);
        match self.client.call(&request)? {
            Answer::Accepted(reply) => protocol.parse_children(&self.device_name(), path, &reply),
            Answer::Rejected(reply) => Err(ApiError::SchemaIncompatible {
                device: self.device_name(),
                reason: format!("enumeration of {} rejected: {}", path, reply),
            }),
        }
    }

    pub fn discover_limits(&self, path: &ParamPath) -> Result<LimitsDescriptor, ApiError> {
        let protocol = self.client.protocol();
        let request = protocol.limits_request(path);
        match self.client.call(&request)? {
            Answer::Accepted(reply) => protocol.parse_limits(&self.device_name(), path, &reply),
            Answer::Rejected(reply) => Err(ApiError::SchemaIncompatible {
                device: self.device_name(),
                reason: format!("limits of {} rejected: {}", path, reply),
            }),
        }
    }

    /// Discover the whole namespace starting at the root.
    pub fn discover_tree(&self) -> Result<ParameterTree, ApiError> {
        let root = ParamPath::root();
        let names = match self.discover_children(&root)? {
            Children::Names(names) => names,
            Children::Leaf => {
                return Err(ApiError::SchemaIncompatible {
                    device: self.device_name(),
                    reason: "root enumerates as a leaf".to_string(),
                })
            }
        };

        let protocol = self.client.protocol();
        let mut children = BTreeMap::new();
        for name in names {
            if protocol.is_reserved_root(&name) {
                debug!(name = %name, "Skipping reserved namespace");
                continue;
            }
            let node = self.discover_node(&root.child(&name))?;
            children.insert(name, node);
        }

        let tree = ParameterTree::from_children(children);
        info!(
            device = %self.client.device(),
            leaves = tree.leaf_count(),
            "Schema discovered"
        );
        Ok(tree)
    }

    fn discover_node(&self, path: &ParamPath) -> Result<ParameterNode, ApiError> {
        match self.discover_children(path)? {
            Children::Leaf => {
                let limits = self.discover_limits(path)?;
                debug!(path = %path, "Discovered leaf");
                Ok(ParameterNode::Leaf(LeafNode::new(limits)))
            }
            Children::Names(names) => {
                let mut children = BTreeMap::new();
                for name in names {
                    children.insert(name.clone(), self.discover_node(&path.child(&name))?);
                }
                Ok(ParameterNode::Internal(children))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::CancelToken;
    use crate::device::Device;
    use crate::protocol::Protocol;
    use crate::transport::{MemoryDevice, MemoryTransport};
    use serde_json::json;

    fn emulated() -> MemoryTransport {
        let transport = MemoryTransport::new(Protocol::default());
        transport.add_device(
            "fe80::1",
            MemoryDevice::new()
                .with_parameter(&["a", "b"], json!({"writeable": true}), json!(3))
                .with_parameter(&["a", "c"], json!({"const": true}), json!(7))
                .with_parameter(&["ui", "logo", "brightness"], json!({"min": 0, "max": 100}), json!(50)),
        );
        transport
    }

    #[test]
    fn test_discover_tree_excludes_reserved_namespace() {
        let transport = emulated();
        let protocol = Protocol::default();
        let device = Device::new("fe80::1");
        let cancel = CancelToken::new();
        let walker = SchemaWalker::new(DeviceClient::new(&transport, &protocol, &device, &cancel));

        let tree = walker.discover_tree().unwrap();
        assert!(tree.children().get("osc").is_none());
        let paths: Vec<String> = tree.leaf_paths().iter().map(ToString::to_string).collect();
        assert_eq!(paths, vec!["a/b", "a/c", "ui/logo/brightness"]);
        assert!(tree.limits(&ParamPath::new(["a", "c"])).unwrap().is_const());
        assert_eq!(tree.leaf(&ParamPath::new(["a", "b"])).unwrap().value, None);

        // 1 root + 3 internal + 3 leaf enumerations, 3 limits requests
        assert_eq!(transport.requests_to("fe80::1").len(), 10);
    }

    #[test]
    fn test_discover_without_introspection_is_incompatible() {
        let transport = emulated();
        transport.update_device("fe80::1", |d| d.no_introspection = true);
        let protocol = Protocol::default();
        let device = Device::new("fe80::1");
        let cancel = CancelToken::new();
        let walker = SchemaWalker::new(DeviceClient::new(&transport, &protocol, &device, &cancel));
        assert!(matches!(
            walker.discover_tree(),
            Err(ApiError::SchemaIncompatible { .. })
        ));
    }

    #[test]
    fn test_discover_offline_device_fails() {
        let transport = emulated();
        transport.update_device("fe80::1", |d| d.offline = true);
        let protocol = Protocol::default();
        let device = Device::new("fe80::1");
        let cancel = CancelToken::new();
        let walker = SchemaWalker::new(DeviceClient::new(&transport, &protocol, &device, &cancel));
        assert!(matches!(walker.discover_tree(), Err(ApiError::Timeout { .. })));
    }

    #[test]
    fn test_cancelled_walk_issues_no_requests() {
        let transport = emulated();
        let protocol = Protocol::default();
        let device = Device::new("fe80::1");
        let cancel = CancelToken::new();
        cancel.cancel();
        let walker = SchemaWalker::new(DeviceClient::new(&transport, &protocol, &device, &cancel));
        assert!(matches!(walker.discover_tree(), Err(ApiError::Cancelled)));
        assert!(transport.requests().is_empty());
    }
}
