//! KubeadmRenderer trait for mocking
//!
//! The controller depends on this trait rather than the concrete renderer so
//! tests can substitute failing or slow implementations.

use crate::error::KubeadmRenderError;
use crds::{ClusterConfiguration, InitConfiguration, JoinConfiguration};

/// Which kubeadm command to synthesize, with its structured input.
#[derive(Debug, Clone, Copy)]
pub enum KubeadmInvocation<'a> {
    /// First control plane node: `kubeadm init`
    Init {
        cluster: &'a ClusterConfiguration,
        init: &'a InitConfiguration,
    },
    /// Any other node: `kubeadm join`
    Join {
        join: &'a JoinConfiguration,
    },
}

/// Rendered kubeadm step: a config file plus the command that consumes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeadmCommand {
    /// Where the config file is written on the node
    pub config_path: String,
    /// Config file contents
    pub config: String,
    /// Shell command that runs kubeadm
    pub command: String,
}

/// Trait for kubeadm structure-to-text rendering
///
/// Implementations must be deterministic and side-effect free.
#[async_trait::async_trait]
pub trait KubeadmRenderer: Send + Sync {
    /// Render the config file and command for an invocation
    async fn render(&self, invocation: KubeadmInvocation<'_>) -> Result<KubeadmCommand, KubeadmRenderError>;
}
