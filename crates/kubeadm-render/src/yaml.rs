//! YAML kubeadm renderer
//!
//! Emits kubeadm `v1beta1` documents with `serde_yaml`. Struct fields keep
//! their declaration order and maps are `BTreeMap`s, so identical input always
//! yields identical bytes.

use crate::error::KubeadmRenderError;
use crate::renderer_trait::{KubeadmCommand, KubeadmInvocation, KubeadmRenderer};
use crds::{Discovery, InitConfiguration, JoinConfiguration, NodeRegistrationOptions};
use serde::Serialize;
use tracing::debug;

/// kubeadm API version written into every document
pub const KUBEADM_API_VERSION: &str = "kubeadm.k8s.io/v1beta1";

/// Config file consumed by `kubeadm init`
pub const INIT_CONFIG_PATH: &str = "/run/kubeadm/kubeadm.yaml";

/// Config file consumed by `kubeadm join`
pub const JOIN_CONFIG_PATH: &str = "/run/kubeadm/kubeadm-join-config.yaml";

const TAINT_EFFECTS: [&str; 3] = ["NoSchedule", "PreferNoSchedule", "NoExecute"];

/// A kubeadm document: `apiVersion` and `kind` followed by the body fields.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TypedDocument<'a, T: Serialize> {
    api_version: &'static str,
    kind: &'static str,
    #[serde(flatten)]
    body: &'a T,
}

fn document<T: Serialize>(kind: &'static str, body: &T) -> Result<String, KubeadmRenderError> {
    let doc = TypedDocument {
        api_version: KUBEADM_API_VERSION,
        kind,
        body,
    };
    Ok(serde_yaml::to_string(&doc)?)
}

/// Default `KubeadmRenderer` backed by `serde_yaml`
#[derive(Debug, Clone, Default)]
pub struct YamlKubeadmRenderer;

impl YamlKubeadmRenderer {
    /// Create a renderer
    pub fn new() -> Self {
        Self
    }

    /// Synchronous rendering used by the async trait method
    pub fn render_sync(&self, invocation: KubeadmInvocation<'_>) -> Result<KubeadmCommand, KubeadmRenderError> {
        match invocation {
            KubeadmInvocation::Init { cluster, init } => {
                check_init(init)?;
                let config = [
                    document("ClusterConfiguration", cluster)?,
                    document("InitConfiguration", init)?,
                ]
                .join("---\n");
                debug!("Rendered kubeadm init configuration ({} bytes)", config.len());
                Ok(KubeadmCommand {
                    config_path: INIT_CONFIG_PATH.to_string(),
                    config,
                    command: format!("kubeadm init --config {INIT_CONFIG_PATH}"),
                })
            }
            KubeadmInvocation::Join { join } => {
                check_join(join)?;
                let config = document("JoinConfiguration", join)?;
                debug!("Rendered kubeadm join configuration ({} bytes)", config.len());
                Ok(KubeadmCommand {
                    config_path: JOIN_CONFIG_PATH.to_string(),
                    config,
                    command: format!("kubeadm join --config {JOIN_CONFIG_PATH}"),
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl KubeadmRenderer for YamlKubeadmRenderer {
    async fn render(&self, invocation: KubeadmInvocation<'_>) -> Result<KubeadmCommand, KubeadmRenderError> {
        self.render_sync(invocation)
    }
}

fn check_init(init: &InitConfiguration) -> Result<(), KubeadmRenderError> {
    for (i, token) in init.bootstrap_tokens.iter().enumerate() {
        if token.token.is_empty() {
            return Err(KubeadmRenderError::invalid(
                format!("initConfiguration.bootstrapTokens[{i}].token"),
                "must not be empty",
            ));
        }
    }
    check_node_registration("initConfiguration.nodeRegistration", init.node_registration.as_ref())
}

fn check_join(join: &JoinConfiguration) -> Result<(), KubeadmRenderError> {
    check_discovery(&join.discovery)?;
    check_node_registration("joinConfiguration.nodeRegistration", join.node_registration.as_ref())
}

fn check_discovery(discovery: &Discovery) -> Result<(), KubeadmRenderError> {
    match (&discovery.bootstrap_token, &discovery.file) {
        (Some(_), Some(_)) => Err(KubeadmRenderError::invalid(
            "joinConfiguration.discovery",
            "bootstrapToken and file are mutually exclusive",
        )),
        (None, None) => Err(KubeadmRenderError::invalid(
            "joinConfiguration.discovery",
            "one of bootstrapToken or file is required",
        )),
        (Some(token), None) => {
            if token.token.is_empty() {
                return Err(KubeadmRenderError::invalid(
                    "joinConfiguration.discovery.bootstrapToken.token",
                    "must not be empty",
                ));
            }
            if token.api_server_endpoint.trim().is_empty() {
                return Err(KubeadmRenderError::invalid(
                    "joinConfiguration.discovery.bootstrapToken.apiServerEndpoint",
                    "must not be empty",
                ));
            }
            if token.ca_cert_hashes.is_empty() && !token.unsafe_skip_ca_verification {
                return Err(KubeadmRenderError::invalid(
                    "joinConfiguration.discovery.bootstrapToken.caCertHashes",
                    "required unless unsafeSkipCAVerification is set",
                ));
            }
            Ok(())
        }
        (None, Some(file)) => {
            if file.kube_config_path.trim().is_empty() {
                return Err(KubeadmRenderError::invalid(
                    "joinConfiguration.discovery.file.kubeConfigPath",
                    "must not be empty",
                ));
            }
            Ok(())
        }
    }
}

fn check_node_registration(
    field: &str,
    registration: Option<&NodeRegistrationOptions>,
) -> Result<(), KubeadmRenderError> {
    let Some(registration) = registration else {
        return Ok(());
    };
    for (i, taint) in registration.taints.iter().enumerate() {
        if taint.key.is_empty() {
            return Err(KubeadmRenderError::invalid(
                format!("{field}.taints[{i}].key"),
                "must not be empty",
            ));
        }
        if !TAINT_EFFECTS.contains(&taint.effect.as_str()) {
            return Err(KubeadmRenderError::invalid(
                format!("{field}.taints[{i}].effect"),
                format!("unknown effect {:?}", taint.effect),
            ));
        }
    }
    Ok(())
}
