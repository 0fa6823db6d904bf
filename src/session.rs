//! Per-device session
//!
//! Drives one device through `Unconnected → Connected → SchemaResolved` and
//! then either `Populating → Populated` (snapshot) or `Restoring → Restored`.
//! Any error moves the session to `Aborted`.

use crate::control::ParameterControl;
use crate::device::{DeviceState, Fingerprint};
use crate::error::ApiError;
use crate::restore::{RestoreEngine, RestoreReport};
use crate::schema::SchemaResolver;
use crate::store::DeviceBackup;
use crate::transport::DeviceClient;
use crate::tree::{ParameterTree, ValueQuerier};
use crate::types::ParamPath;
use tracing::{error, info, warn};

/// Values read from one device.
#[derive(Debug, Clone)]
pub struct Capture {
    pub backup: DeviceBackup,
    /// Leaves the device would not report a value for. Missing from `backup`.
    pub unpopulated: Vec<ParamPath>,
}

pub struct DeviceSession<'a> {
    client: DeviceClient<'a>,
    resolver: SchemaResolver<'a>,
    state: DeviceState,
    schema: Option<ParameterTree>,
}

impl<'a> DeviceSession<'a> {
    pub fn new(client: DeviceClient<'a>, resolver: SchemaResolver<'a>) -> Self {
        Self {
            client,
            resolver,
            state: DeviceState::Unconnected,
            schema: None,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn schema(&self) -> Option<&ParameterTree> {
        self.schema.as_ref()
    }

    fn transition(&mut self, next: DeviceState) -> Result<(), ApiError> {
        if !self.state.can_transition(next) {
            return Err(ApiError::InvalidState(format!(
                "{} -> {} for {}",
                self.state,
                next,
                self.client.device()
            )));
        }
        info!(device = %self.client.device(), from = %self.state, to = %next, "Session state");
        self.state = next;
        Ok(())
    }

    /// Move to `Aborted` on error and pass the result through.
    fn guard<T>(&mut self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(e) = &result {
            if !self.state.is_terminal() {
                error!(device = %self.client.device(), from = %self.state, error = %e, "Session aborted");
                self.state = DeviceState::Aborted;
            }
        }
        result
    }

    pub fn connect(&mut self) -> Result<(), ApiError> {
        let result = self.client.connect();
        self.guard(result)?;
        self.transition(DeviceState::Connected)
    }

    /// Resolve the schema from cache, or discover it (always, with `force`).
    pub fn resolve_schema(&mut self, force: bool) -> Result<&ParameterTree, ApiError> {
        let result = self.resolver.resolve(self.client, force);
        let tree = self.guard(result)?;
        self.transition(DeviceState::SchemaResolved)?;
        Ok(&*self.schema.insert(tree))
    }

    /// Fingerprint plus current value of every leaf.
    pub fn snapshot(&mut self, force_discovery: bool) -> Result<Capture, ApiError> {
        self.connect()?;
        let result = ParameterControl::new(self.client).read_fingerprint();
        let fingerprint = self.guard(result)?;
        let mut tree = self.resolve_schema(force_discovery)?.clone();

        self.transition(DeviceState::Populating)?;
        let result = ValueQuerier::new(self.client).populate(&mut tree);
        self.guard(result)?;
        self.transition(DeviceState::Populated)?;

        let unpopulated: Vec<ParamPath> = tree
            .leaves()
            .into_iter()
            .filter(|(_, leaf)| leaf.value.is_none())
            .map(|(path, _)| path)
            .collect();
        if !unpopulated.is_empty() {
            warn!(
                device = %self.client.device(),
                count = unpopulated.len(),
                "Leaves without a value are missing from the snapshot"
            );
        }
        Ok(Capture {
            backup: DeviceBackup::from_tree(fingerprint, &tree),
            unpopulated,
        })
    }

    /// Verify identity, resolve the schema and replay `backup`.
    ///
    /// A mismatching fingerprint aborts from `Connected`, before any write.
    pub fn restore(&mut self, backup: &DeviceBackup, force_discovery: bool) -> Result<RestoreReport, ApiError> {
        self.connect()?;
        let engine = RestoreEngine::new(self.client);
        let result = engine.verify_identity(&backup.fingerprint);
        self.guard(result)?;
        self.resolve_schema(force_discovery)?;

        self.transition(DeviceState::Restoring)?;
        let documents = backup.commands.documents();
        let result = match &self.schema {
            Some(schema) => engine.apply(schema, &documents),
            None => Err(ApiError::InvalidState("schema not resolved".to_string())),
        };
        let report = self.guard(result)?;
        self.transition(DeviceState::Restored)?;
        Ok(report)
    }

    /// Connect and resolve the schema only.
    pub fn discover(&mut self, force: bool) -> Result<ParameterTree, ApiError> {
        self.connect()?;
        self.resolve_schema(force).cloned()
    }

    pub fn fingerprint(&self) -> Result<Fingerprint, ApiError> {
        ParameterControl::new(self.client).read_fingerprint()
    }
}
