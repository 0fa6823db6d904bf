//! Restore a backup record onto a device.
//!
//! The live fingerprint must match the record before anything is written.
//! After that every stored leaf document is replayed independently: read-only
//! leaves are skipped, device rejections are recorded, and only a transport
//! failure or cancellation stops the replay.

use crate::control::ParameterControl;
use crate::device::Fingerprint;
use crate::error::ApiError;
use crate::store::DeviceBackup;
use crate::transport::{Answer, DeviceClient};
use crate::tree::{Located, ParameterTree};
use crate::types::ParamPath;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// What happened to one stored leaf document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum LeafOutcome {
    Written,
    /// Limits mark the leaf `const` or not `writeable`
    SkippedReadOnly,
    /// The device schema does not expose this path
    SkippedUnknown,
    /// The document does not address exactly one leaf
    Invalid(String),
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafReport {
    pub path: Option<ParamPath>,
    pub outcome: LeafOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RestoreReport {
    pub device: String,
    pub leaves: Vec<LeafReport>,
}

impl RestoreReport {
    fn count(&self, pred: impl Fn(&LeafOutcome) -> bool) -> usize {
        self.leaves.iter().filter(|l| pred(&l.outcome)).count()
    }

    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, LeafOutcome::Written))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, LeafOutcome::SkippedReadOnly | LeafOutcome::SkippedUnknown))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, LeafOutcome::Rejected(_) | LeafOutcome::Invalid(_)))
    }

    /// Write errors as `ApiError::WriteRejected`, for callers that surface them.
    pub fn rejections(&self) -> Vec<ApiError> {
        self.leaves
            .iter()
            .filter_map(|leaf| match (&leaf.path, &leaf.outcome) {
                (Some(path), LeafOutcome::Rejected(reason)) => Some(ApiError::WriteRejected {
                    device: self.device.clone(),
                    path: path.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

pub struct RestoreEngine<'a> {
    client: DeviceClient<'a>,
}

impl<'a> RestoreEngine<'a> {
    pub fn new(client: DeviceClient<'a>) -> Self {
        Self { client }
    }

    /// Compare the live fingerprint against the backup. Issues queries only.
    pub fn verify_identity(&self, expected: &Fingerprint) -> Result<Fingerprint, ApiError> {
        let live = ParameterControl::new(self.client).read_fingerprint()?;
        live.verify(expected, self.client.device())?;
        debug!(device = %self.client.device(), serial = %live.serial, "Identity verified");
        Ok(live)
    }

    /// Replay `documents` against the leaves of `schema`.
    pub fn apply(&self, schema: &ParameterTree, documents: &[Value]) -> Result<RestoreReport, ApiError> {
        let device = self.client.device();
        let mut report = RestoreReport {
            device: device.to_string(),
            leaves: Vec::with_capacity(documents.len()),
        };

        for document in documents {
            let (path, limits) = match schema.locate(document) {
                Ok(Located::Leaf { path, leaf, .. }) => (path, &leaf.limits),
                Ok(Located::Unknown(path)) => {
                    warn!(device = %device, path = %path, "Path not in device schema, skipping");
                    report.leaves.push(LeafReport {
                        path: Some(path),
                        outcome: LeafOutcome::SkippedUnknown,
                    });
                    continue;
                }
                Err(e) => {
                    warn!(device = %device, error = %e, "Skipping malformed backup entry");
                    report.leaves.push(LeafReport {
                        path: None,
                        outcome: LeafOutcome::Invalid(e.to_string()),
                    });
                    continue;
                }
            };

            let outcome = if limits.denies_write() {
                debug!(device = %device, path = %path, "Read-only, skipping");
                LeafOutcome::SkippedReadOnly
            } else {
                match self.client.call(document)? {
                    Answer::Accepted(_) => LeafOutcome::Written,
                    Answer::Rejected(reply) => {
                        warn!(device = %device, path = %path, reply = %reply, "Write rejected");
                        LeafOutcome::Rejected(reply.to_string())
                    }
                }
            };
            report.leaves.push(LeafReport {
                path: Some(path),
                outcome,
            });
        }

        info!(
            device = %device,
            written = report.written(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Restore applied"
        );
        Ok(report)
    }

    /// Verify identity, then replay the stored documents.
    pub fn restore(&self, schema: &ParameterTree, backup: &DeviceBackup) -> Result<RestoreReport, ApiError> {
        self.verify_identity(&backup.fingerprint)?;
        self.apply(schema, &backup.commands.documents_for(schema))
    }
}
