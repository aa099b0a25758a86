//! Bootstrap status tracking.
//!
//! A `KubeadmConfig` moves through three states:
//!
//! - `Pending`: nothing rendered yet, no error recorded
//! - `Ready`: bootstrap data published; never changes again
//! - `Failed`: terminal error recorded for one spec fingerprint; retried only
//!   once the spec content changes
//!
//! `transition` is pure. The reconciler feeds it the observed state and the
//! render outcome and persists whatever it returns.

use crate::error::{BootstrapError, Severity};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use crds::{BootstrapErrorReason, BootstrapPhase, KubeadmConfigSpec, KubeadmConfigStatus};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Rendered bootstrap payload. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapData(Arc<[u8]>);

impl BootstrapData {
    /// Raw payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Wire form stored in `status.bootstrapData`
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

impl From<Vec<u8>> for BootstrapData {
    fn from(bytes: Vec<u8>) -> Self {
        BootstrapData(bytes.into())
    }
}

impl fmt::Debug for BootstrapData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BootstrapData({} bytes)", self.0.len())
    }
}

/// Hex SHA-256 of the spec's JSON encoding.
///
/// Struct fields serialize in declaration order and maps are `BTreeMap`s, so
/// equal specs always produce equal fingerprints.
pub fn spec_fingerprint(spec: &KubeadmConfigSpec) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_vec(spec)?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// Published bootstrap data. There is no way to modify or replace it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyStatus {
    bootstrap_data: String,
    spec_hash: Option<String>,
}

impl ReadyStatus {
    fn new(data: &BootstrapData, spec_hash: &str) -> Self {
        Self {
            bootstrap_data: data.to_base64(),
            spec_hash: Some(spec_hash.to_string()),
        }
    }

    /// Base64 payload exactly as published
    pub fn bootstrap_data(&self) -> &str {
        &self.bootstrap_data
    }

    /// Fingerprint of the spec the payload was rendered from
    pub fn spec_hash(&self) -> Option<&str> {
        self.spec_hash.as_deref()
    }
}

/// Terminal failure recorded against one spec fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedStatus {
    reason: String,
    message: String,
    spec_hash: Option<String>,
}

impl FailedStatus {
    fn new(reason: BootstrapErrorReason, message: String, spec_hash: &str) -> Self {
        Self {
            reason: reason.as_str().to_string(),
            message,
            spec_hash: Some(spec_hash.to_string()),
        }
    }

    /// Reason as recorded. Values written by other versions are kept verbatim.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Human-readable failure detail
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Fingerprint of the spec that failed
    pub fn spec_hash(&self) -> Option<&str> {
        self.spec_hash.as_deref()
    }
}

/// Bootstrap state of one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackedStatus {
    /// Nothing rendered yet
    Pending,
    /// Bootstrap data published
    Ready(ReadyStatus),
    /// Terminal failure recorded
    Failed(FailedStatus),
}

impl TrackedStatus {
    /// Decode the status stored on the resource.
    ///
    /// An empty `errorReason` is not an error; it decodes to `Pending`.
    pub fn from_observed(status: Option<&KubeadmConfigStatus>) -> Self {
        let Some(status) = status else {
            return TrackedStatus::Pending;
        };

        if let Some(data) = status.bootstrap_data.as_deref().filter(|d| !d.is_empty()) {
            if status.ready {
                return TrackedStatus::Ready(ReadyStatus {
                    bootstrap_data: data.to_string(),
                    spec_hash: status.observed_spec_hash.clone(),
                });
            }
        }

        if let Some(reason) = status.error_reason.as_deref().filter(|r| !r.trim().is_empty()) {
            return TrackedStatus::Failed(FailedStatus {
                reason: reason.to_string(),
                message: status.error_message.clone().unwrap_or_default(),
                spec_hash: status.observed_spec_hash.clone(),
            });
        }

        TrackedStatus::Pending
    }

    /// Phase written to `status.phase`
    pub fn phase(&self) -> BootstrapPhase {
        match self {
            TrackedStatus::Pending => BootstrapPhase::Pending,
            TrackedStatus::Ready(_) => BootstrapPhase::Ready,
            TrackedStatus::Failed(_) => BootstrapPhase::Failed,
        }
    }

    /// Whether a spec with `spec_hash` should be rendered from this state.
    pub fn needs_render(&self, spec_hash: &str) -> bool {
        match self {
            TrackedStatus::Pending => true,
            TrackedStatus::Ready(_) => false,
            TrackedStatus::Failed(failed) => failed.spec_hash() != Some(spec_hash),
        }
    }
}

/// What the reconciler should do after a render attempt
#[derive(Debug)]
pub enum Transition {
    /// Keep the stored status as is
    Unchanged,
    /// Write this status
    Persist(TrackedStatus),
    /// Leave the status alone and retry with backoff
    Retry(BootstrapError),
}

/// Compute the next status from the current one and a render outcome.
pub fn transition(
    current: &TrackedStatus,
    spec_hash: &str,
    outcome: Result<BootstrapData, BootstrapError>,
) -> Transition {
    if !current.needs_render(spec_hash) {
        return Transition::Unchanged;
    }

    match outcome {
        Ok(data) => Transition::Persist(TrackedStatus::Ready(ReadyStatus::new(&data, spec_hash))),
        Err(error) => match error.severity() {
            Severity::Terminal(reason) => Transition::Persist(TrackedStatus::Failed(
                FailedStatus::new(reason, error.to_string(), spec_hash),
            )),
            Severity::Transient => Transition::Retry(error),
        },
    }
}

/// JSON merge patch for the status subresource.
///
/// Every field is written; fields that do not apply are set to `null` so stale
/// values from an earlier state are cleared.
pub fn status_patch(status: &TrackedStatus) -> serde_json::Value {
    let phase = status.phase().as_str();
    match status {
        TrackedStatus::Pending => serde_json::json!({
            "status": {
                "phase": phase,
                "ready": false,
                "bootstrapData": null,
                "errorReason": null,
                "errorMessage": null,
                "observedSpecHash": null,
            }
        }),
        TrackedStatus::Ready(ready) => serde_json::json!({
            "status": {
                "phase": phase,
                "ready": true,
                "bootstrapData": ready.bootstrap_data(),
                "errorReason": null,
                "errorMessage": null,
                "observedSpecHash": ready.spec_hash(),
            }
        }),
        TrackedStatus::Failed(failed) => serde_json::json!({
            "status": {
                "phase": phase,
                "ready": false,
                "bootstrapData": null,
                "errorReason": failed.reason(),
                "errorMessage": failed.message(),
                "observedSpecHash": failed.spec_hash(),
            }
        }),
    }
}
