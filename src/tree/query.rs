//! Populate a schema tree with current device values.

use super::node::ParameterTree;
use crate::error::ApiError;
use crate::transport::{Answer, DeviceClient};
use serde_json::Value;
use tracing::{debug, warn};

pub struct ValueQuerier<'a> {
    client: DeviceClient<'a>,
}

impl<'a> ValueQuerier<'a> {
    pub fn new(client: DeviceClient<'a>) -> Self {
        Self { client }
    }

    /// Query every leaf once, depth first, and store the value on the node.
    ///
    /// Returns the raw reply of each query. A leaf whose query the device
    /// rejects keeps no value and is left out of snapshots; an unanswered
    /// query aborts.
    pub fn populate(&self, tree: &mut ParameterTree) -> Result<Vec<Value>, ApiError> {
        let protocol = self.client.protocol();
        let mut replies = Vec::new();
        for path in tree.leaf_paths() {
            let request = protocol.value_request(&path);
            let (value, reply) = match self.client.call(&request)? {
                Answer::Accepted(reply) => (protocol.parse_value(&path, &reply), reply),
                Answer::Rejected(reply) => {
                    warn!(device = %self.client.device(), path = %path, "Value query rejected");
                    (None, reply)
                }
            };
            if value.is_none() {
                debug!(path = %path, "No value for leaf");
            }
            if let Some(leaf) = tree.leaf_mut(&path) {
                leaf.value = value;
            }
            replies.push(reply);
        }
        Ok(replies)
    }
}
