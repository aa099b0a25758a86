//! KubeadmConfig CRD
//!
//! Declares how a new node initializes or joins a Kubernetes control plane.
//! The controller renders `spec` into a cloud-config payload and publishes it
//! through `status.bootstrapData`.

use crate::kubeadm::{ClusterConfiguration, InitConfiguration, JoinConfiguration};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Desired bootstrap configuration.
///
/// Either `clusterConfiguration` and `initConfiguration` are set together, or
/// `joinConfiguration` is set on its own.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "bootstrap.cluster.x-k8s.io",
    version = "v1alpha2",
    kind = "KubeadmConfig",
    namespaced,
    status = "KubeadmConfigStatus",
    category = "cluster-api",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Reason","type":"string","jsonPath":".status.errorReason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmConfigSpec {
    /// Cluster-wide configuration for `kubeadm init` (paired with `initConfiguration`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_configuration: Option<ClusterConfiguration>,

    /// Node configuration for `kubeadm init` (paired with `clusterConfiguration`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_configuration: Option<InitConfiguration>,

    /// Configuration for `kubeadm join`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_configuration: Option<JoinConfiguration>,

    /// Extra files written on the node before kubeadm runs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,

    /// Commands run before kubeadm
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_kubeadm_commands: Vec<String>,

    /// Commands run after kubeadm
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_kubeadm_commands: Vec<String>,

    /// Output format of the bootstrap data (defaults to cloud-config)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub format: Option<Format>,
}

impl KubeadmConfigSpec {
    /// Effective output format, applying the cloud-config default.
    pub fn effective_format(&self) -> Format {
        self.format.clone().unwrap_or_default()
    }
}

/// Extra file materialized through cloud-init `write_files`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// Absolute path on the node
    #[serde(default)]
    pub path: String,

    /// Ownership, e.g. "root:root"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Octal permissions, e.g. "0640"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,

    /// How `content` is encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<FileEncoding>,

    /// File content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileEncoding {
    /// Content is written verbatim
    #[default]
    Plain,

    /// Content is base64 and decoded on the node
    Base64,
}

/// Bootstrap data output format.
///
/// Only `cloud-config` is supported. Other values are kept verbatim so the
/// controller can report them instead of failing to decode the object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Format {
    #[default]
    CloudConfig,
    Unsupported(String),
}

impl Format {
    /// Value as written in `spec.format`
    pub fn as_str(&self) -> &str {
        match self {
            Format::CloudConfig => "cloud-config",
            Format::Unsupported(other) => other,
        }
    }
}

impl From<String> for Format {
    fn from(value: String) -> Self {
        if value == "cloud-config" {
            Format::CloudConfig
        } else {
            Format::Unsupported(value)
        }
    }
}

impl From<Format> for String {
    fn from(value: Format) -> Self {
        match value {
            Format::CloudConfig => "cloud-config".to_string(),
            Format::Unsupported(other) => other,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed bootstrap state, written only by the controller.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmConfigStatus {
    /// Whether `bootstrapData` is ready to be consumed
    #[serde(default)]
    pub ready: bool,

    /// Lifecycle phase
    #[serde(default)]
    pub phase: BootstrapPhase,

    /// Base64-encoded cloud-config payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_data: Option<String>,

    /// Set on non-retryable errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,

    /// Set on non-retryable errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Fingerprint of the spec that produced this status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_spec_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
/// Bootstrap phase
///
/// Serializes as PascalCase and also accepts lowercase.
#[serde(rename_all = "PascalCase")]
pub enum BootstrapPhase {
    /// Not yet rendered
    #[default]
    #[serde(alias = "pending")]
    Pending,

    /// Bootstrap data published
    #[serde(alias = "ready")]
    Ready,

    /// Terminal error, waiting for a spec change
    #[serde(alias = "failed")]
    Failed,
}

impl BootstrapPhase {
    /// Canonical PascalCase name
    pub fn as_str(self) -> &'static str {
        match self {
            BootstrapPhase::Pending => "Pending",
            BootstrapPhase::Ready => "Ready",
            BootstrapPhase::Failed => "Failed",
        }
    }
}

/// Reasons recorded in `status.errorReason`. All of them are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapErrorReason {
    /// Both or neither of the init/join shapes were set
    AmbiguousOrMissingConfiguration,
    /// Only one of clusterConfiguration/initConfiguration was set
    IncompletePair,
    /// A file entry is malformed
    InvalidFile,
    /// The requested format cannot be rendered
    UnsupportedFormat,
    /// The kubeadm or cloud-config rendering step rejected the input
    UpstreamRenderFailure,
}

impl BootstrapErrorReason {
    /// Value written to `status.errorReason`
    pub fn as_str(self) -> &'static str {
        match self {
            BootstrapErrorReason::AmbiguousOrMissingConfiguration => "AmbiguousOrMissingConfiguration",
            BootstrapErrorReason::IncompletePair => "IncompletePair",
            BootstrapErrorReason::InvalidFile => "InvalidFile",
            BootstrapErrorReason::UnsupportedFormat => "UnsupportedFormat",
            BootstrapErrorReason::UpstreamRenderFailure => "UpstreamRenderFailure",
        }
    }
}

impl fmt::Display for BootstrapErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
