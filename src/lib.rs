//! ssc-state: schema-driven discovery, snapshot and restore for loudspeakers
//!
//! Devices describe their own parameter namespace over a JSON control
//! protocol. [`tree::SchemaWalker`] discovers it into a [`tree::ParameterTree`],
//! [`tree::ValueQuerier`] fills in current values, [`tree::flatten`] turns the
//! result into single-leaf documents for a [`store::BackupRecord`], and
//! [`restore::RestoreEngine`] replays a record after checking the device
//! fingerprint, skipping leaves the device marks read-only.

pub mod api;
pub mod concurrency;
pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod restore;
pub mod schema;
pub mod session;
pub mod store;
pub mod tooling;
pub mod transport;
pub mod tree;
pub mod types;

pub use api::{ControlApi, Snapshot};
pub use device::{Device, Fingerprint};
pub use error::ApiError;
pub use types::ParamPath;
