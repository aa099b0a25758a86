//! Kubeadm renderer errors

use thiserror::Error;

/// Errors that can occur while rendering kubeadm configuration
#[derive(Debug, Error)]
pub enum KubeadmRenderError {
    /// A structured field cannot be rendered into a usable kubeadm config
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        field: String,
        reason: String,
    },

    /// YAML serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

impl KubeadmRenderError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
