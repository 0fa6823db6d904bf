//! Schema resolution: cached tree or fresh discovery.

use crate::error::ApiError;
use crate::store::SchemaCacheStore;
use crate::transport::DeviceClient;
use crate::tree::{ParameterTree, SchemaWalker};
use tracing::{info, warn};

pub struct SchemaResolver<'a> {
    cache: &'a dyn SchemaCacheStore,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(cache: &'a dyn SchemaCacheStore) -> Self {
        Self { cache }
    }

    /// Cached schema for the device, discovering (and caching) it on a miss.
    ///
    /// `force` skips the cache lookup. A cache hit issues no requests; the
    /// cached tree may be stale if the device firmware changed.
    pub fn resolve(&self, client: DeviceClient<'_>, force: bool) -> Result<ParameterTree, ApiError> {
        let identity = client.device().identity();
        if !force {
            match self.cache.load(identity) {
                Ok(Some(tree)) => return Ok(tree),
                Ok(None) => {}
                Err(e) => warn!(identity, error = %e, "Ignoring unreadable schema cache"),
            }
        }
        self.discover(client)
    }

    /// Always walk the device and overwrite its cache entry.
    pub fn discover(&self, client: DeviceClient<'_>) -> Result<ParameterTree, ApiError> {
        let identity = client.device().identity();
        info!(device = %client.device(), "Discovering schema");
        let tree = SchemaWalker::new(client).discover_tree()?;
        self.cache.store(identity, &tree)?;
        Ok(tree)
    }
}
