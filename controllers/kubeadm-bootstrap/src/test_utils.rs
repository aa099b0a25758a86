//! Test utilities for unit testing reconcilers
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::cloudinit::PayloadRenderer;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crate::status_writer::StatusWriter;
use crds::{
    BootstrapTokenDiscovery, ClusterConfiguration, Discovery, File, InitConfiguration,
    JoinConfiguration, KubeadmConfig, KubeadmConfigSpec, KubeadmConfigStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kubeadm_render::MockKubeadmRenderer;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A status patch captured by `RecordingStatusWriter`
#[derive(Debug, Clone)]
pub struct RecordedPatch {
    pub namespace: String,
    pub name: String,
    pub patch: serde_json::Value,
}

/// `StatusWriter` that keeps every patch in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingStatusWriter {
    patches: Arc<Mutex<Vec<RecordedPatch>>>,
    conflict: bool,
}

impl RecordingStatusWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer whose every write fails like an update conflict
    pub fn conflicting() -> Self {
        Self {
            conflict: true,
            ..Self::default()
        }
    }

    pub fn patches(&self) -> Vec<RecordedPatch> {
        self.patches.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl StatusWriter for RecordingStatusWriter {
    async fn write_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ControllerError> {
        if self.conflict {
            return Err(ControllerError::Reconciliation(format!(
                "conflict writing status of {namespace}/{name}"
            )));
        }
        self.patches.lock().unwrap().push(RecordedPatch {
            namespace: namespace.to_string(),
            name: name.to_string(),
            patch: patch.clone(),
        });
        Ok(())
    }
}

/// Reconciler wired to a mock kubeadm renderer and a recording writer
pub fn create_test_reconciler(
    kubeadm: MockKubeadmRenderer,
    writer: RecordingStatusWriter,
    render_timeout: Duration,
) -> Reconciler {
    Reconciler::new(
        PayloadRenderer::new(Arc::new(kubeadm), render_timeout),
        Arc::new(writer),
        Metrics::new().unwrap(),
        1,
        10,
    )
}

/// Helper to create test KubeadmConfig CRD
pub fn create_test_kubeadm_config(name: &str, namespace: &str, spec: KubeadmConfigSpec) -> KubeadmConfig {
    KubeadmConfig {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec,
        status: None,
    }
}

/// Apply a recorded merge patch to the object, as the API server would
pub fn apply_status_patch(config: &mut KubeadmConfig, patch: &RecordedPatch) {
    let status: KubeadmConfigStatus = serde_json::from_value(patch.patch["status"].clone()).unwrap();
    config.status = Some(status);
}

/// Init spec with one file and a pre and post command
pub fn init_spec() -> KubeadmConfigSpec {
    KubeadmConfigSpec {
        cluster_configuration: Some(ClusterConfiguration {
            kubernetes_version: Some("v1.30.2".to_string()),
            cluster_name: Some("test".to_string()),
            ..Default::default()
        }),
        init_configuration: Some(InitConfiguration::default()),
        files: vec![File {
            path: "/etc/a".to_string(),
            content: Some("a".to_string()),
            ..Default::default()
        }],
        pre_kubeadm_commands: vec!["echo pre".to_string()],
        post_kubeadm_commands: vec!["echo post".to_string()],
        ..Default::default()
    }
}

/// Join spec using bootstrap token discovery
pub fn join_spec() -> KubeadmConfigSpec {
    KubeadmConfigSpec {
        join_configuration: Some(JoinConfiguration {
            discovery: Discovery {
                bootstrap_token: Some(BootstrapTokenDiscovery {
                    token: "abcdef.0123456789abcdef".to_string(),
                    api_server_endpoint: "10.0.0.1:6443".to_string(),
                    ca_cert_hashes: vec!["sha256:deadbeef".to_string()],
                    unsafe_skip_ca_verification: false,
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
