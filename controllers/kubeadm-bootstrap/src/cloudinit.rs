//! Cloud-config payload rendering.
//!
//! Produces a `#cloud-config` document with a fixed layout:
//!
//! ```text
//! #cloud-config
//! write_files:   user files in declared order, then the kubeadm config file
//! runcmd:        preKubeadmCommands, the kubeadm command, postKubeadmCommands
//! ```
//!
//! The document is emitted by `serde_yaml` from plain structs, so quoting and
//! escaping of file content and commands is never done by hand.

use crate::error::Severity;
use crate::status::BootstrapData;
use crate::validation::{ConfigShape, ValidatedConfig, ValidatedFile};
use crds::{BootstrapErrorReason, FileEncoding, Format};
use kubeadm_render::{KubeadmCommand, KubeadmInvocation, KubeadmRenderer};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// First line of every payload
pub const CLOUD_CONFIG_HEADER: &str = "#cloud-config\n";
/// Owner for files that do not set one
pub const DEFAULT_FILE_OWNER: &str = "root:root";
/// Mode for files that do not set one
pub const DEFAULT_FILE_PERMISSIONS: &str = "0640";

/// Failure while producing bootstrap data from a validated spec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// `spec.format` names something other than cloud-config
    #[error("format {0:?} is not supported; only cloud-config can be rendered")]
    UnsupportedFormat(String),

    /// kubeadm or YAML emission rejected the input
    #[error("rendering failed: {detail}")]
    UpstreamRenderFailure { detail: String },

    /// kubeadm did not answer in time
    #[error("kubeadm rendering did not finish within {0:?}")]
    Timeout(Duration),
}

impl RenderError {
    /// Whether the failure is recorded or retried
    pub fn severity(&self) -> Severity {
        match self {
            RenderError::UnsupportedFormat(_) => {
                Severity::Terminal(BootstrapErrorReason::UnsupportedFormat)
            }
            RenderError::UpstreamRenderFailure { .. } => {
                Severity::Terminal(BootstrapErrorReason::UpstreamRenderFailure)
            }
            RenderError::Timeout(_) => Severity::Transient,
        }
    }
}

impl From<serde_yaml::Error> for RenderError {
    fn from(e: serde_yaml::Error) -> Self {
        RenderError::UpstreamRenderFailure {
            detail: e.to_string(),
        }
    }
}

#[derive(Serialize)]
struct CloudConfig<'a> {
    write_files: Vec<WriteFile<'a>>,
    runcmd: Vec<&'a str>,
}

#[derive(Serialize)]
struct WriteFile<'a> {
    path: &'a str,
    owner: &'a str,
    permissions: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'static str>,
    content: &'a str,
}

impl<'a> From<&ValidatedFile<'a>> for WriteFile<'a> {
    fn from(file: &ValidatedFile<'a>) -> Self {
        WriteFile {
            path: file.path,
            owner: file.owner.unwrap_or(DEFAULT_FILE_OWNER),
            permissions: file.permissions.unwrap_or(DEFAULT_FILE_PERMISSIONS),
            encoding: match file.encoding {
                FileEncoding::Plain => None,
                FileEncoding::Base64 => Some("b64"),
            },
            content: file.content,
        }
    }
}

/// Renders validated specs into cloud-config bootstrap data.
pub struct PayloadRenderer {
    kubeadm: Arc<dyn KubeadmRenderer>,
    timeout: Duration,
}

impl std::fmt::Debug for PayloadRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadRenderer")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PayloadRenderer {
    /// Renderer that gives kubeadm at most `timeout` per call
    pub fn new(kubeadm: Arc<dyn KubeadmRenderer>, timeout: Duration) -> Self {
        Self { kubeadm, timeout }
    }

    /// Render `validated` in `format`.
    ///
    /// The format is checked before kubeadm is consulted. Only a kubeadm
    /// timeout is transient; every other error is terminal.
    pub async fn render(
        &self,
        validated: &ValidatedConfig<'_>,
        format: &Format,
    ) -> Result<BootstrapData, RenderError> {
        if let Format::Unsupported(other) = format {
            return Err(RenderError::UnsupportedFormat(other.clone()));
        }

        let invocation = match validated.shape() {
            ConfigShape::Init { cluster, init } => KubeadmInvocation::Init { cluster, init },
            ConfigShape::Join { join } => KubeadmInvocation::Join { join },
        };

        let kubeadm = tokio::time::timeout(self.timeout, self.kubeadm.render(invocation))
            .await
            .map_err(|_elapsed| RenderError::Timeout(self.timeout))?
            .map_err(|e| RenderError::UpstreamRenderFailure {
                detail: e.to_string(),
            })?;

        let document = cloud_config(validated, &kubeadm)?;
        debug!("Rendered cloud-config ({} bytes)", document.len());
        Ok(BootstrapData::from(document.into_bytes()))
    }
}

/// Assemble the cloud-config document around an already rendered kubeadm step.
pub fn cloud_config(
    validated: &ValidatedConfig<'_>,
    kubeadm: &KubeadmCommand,
) -> Result<String, RenderError> {
    let mut write_files: Vec<WriteFile<'_>> =
        validated.files().iter().map(WriteFile::from).collect();
    write_files.push(WriteFile {
        path: &kubeadm.config_path,
        owner: DEFAULT_FILE_OWNER,
        permissions: DEFAULT_FILE_PERMISSIONS,
        encoding: None,
        content: &kubeadm.config,
    });

    let runcmd: Vec<&str> = validated
        .pre_commands()
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(kubeadm.command.as_str()))
        .chain(validated.post_commands().iter().map(String::as_str))
        .collect();

    let body = serde_yaml::to_string(&CloudConfig {
        write_files,
        runcmd,
    })?;

    let mut document = String::with_capacity(CLOUD_CONFIG_HEADER.len() + body.len());
    document.push_str(CLOUD_CONFIG_HEADER);
    document.push_str(&body);
    Ok(document)
}
