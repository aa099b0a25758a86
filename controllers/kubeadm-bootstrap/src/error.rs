//! Controller-specific error types.
//!
//! `BootstrapError` is the outcome of validating and rendering a spec. Its
//! `severity()` decides between recording a terminal status and requeueing.
//! `ControllerError` is what a reconcile returns to the runtime; every variant
//! is retried by the error policy.

use crate::cloudinit::RenderError;
use crate::validation::ValidationError;
use crds::BootstrapErrorReason;
use kube::Error as KubeError;
use thiserror::Error;

/// Whether a failure is recorded in status or retried with backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Will not resolve without a spec change; recorded with this reason
    Terminal(BootstrapErrorReason),
    /// Retried with backoff and never recorded in status
    Transient,
}

/// Failure while turning a spec into bootstrap data
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The spec is malformed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The validated spec could not be rendered
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl BootstrapError {
    /// Terminal failures are recorded, transient ones retried
    pub fn severity(&self) -> Severity {
        match self {
            BootstrapError::Validation(e) => Severity::Terminal(e.reason()),
            BootstrapError::Render(e) => e.severity(),
        }
    }
}

/// Errors that can occur in the kubeadm bootstrap controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Transient bootstrap failure (e.g. renderer timeout)
    #[error("Transient bootstrap failure: {0}")]
    Transient(BootstrapError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reconciliation failed
    #[error("Reconciliation failed: {0}")]
    Reconciliation(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error (probe listener)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
