//! Kubeadm bootstrap CRD definitions
//!
//! Kubernetes Custom Resource Definitions for the kubeadm bootstrap controller.

pub mod kubeadm;
pub mod kubeadm_config;

pub use kubeadm::*;
pub use kubeadm_config::*;
