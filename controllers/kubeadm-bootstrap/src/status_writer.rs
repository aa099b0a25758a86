//! Status persistence seam.
//!
//! The reconciler writes through `StatusWriter` so tests can record patches
//! without an API server.

use crate::error::ControllerError;
use crds::KubeadmConfig;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};

/// Writes a status merge patch for one `KubeadmConfig`
#[async_trait::async_trait]
pub trait StatusWriter: Send + Sync {
    async fn write_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ControllerError>;
}

/// `StatusWriter` backed by the status subresource
#[derive(Clone)]
pub struct KubeStatusWriter {
    client: Client,
}

impl KubeStatusWriter {
    /// Writer using `client` for status patches
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for KubeStatusWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStatusWriter").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl StatusWriter for KubeStatusWriter {
    async fn write_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ControllerError> {
        let api: Api<KubeadmConfig> = Api::namespaced(self.client.clone(), namespace);
        let pp = PatchParams::default();
        api.patch_status(name, &pp, &Patch::Merge(patch)).await?;
        Ok(())
    }
}
