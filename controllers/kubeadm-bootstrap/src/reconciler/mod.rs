//! Reconciliation logic for KubeadmConfig resources.
//!
//! The reconciler owns the render pipeline (validation, cloud-config
//! rendering) and the per-resource backoff used by the watcher's error policy.

pub mod kubeadm_config;
#[cfg(test)]
mod kubeadm_config_test;

use crate::backoff::FibonacciBackoff;
use crate::cloudinit::PayloadRenderer;
use crate::metrics::Metrics;
use crate::status_writer::StatusWriter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }
}

/// Reconciles KubeadmConfig resources.
pub struct Reconciler {
    pub(crate) renderer: PayloadRenderer,
    pub(crate) status_writer: Arc<dyn StatusWriter>,
    pub(crate) metrics: Metrics,
    backoff_min_secs: u64,
    backoff_max_secs: u64,
    /// Error count tracking per resource (namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("renderer", &self.renderer)
            .field("backoff_min_secs", &self.backoff_min_secs)
            .field("backoff_max_secs", &self.backoff_max_secs)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        renderer: PayloadRenderer,
        status_writer: Arc<dyn StatusWriter>,
        metrics: Metrics,
        backoff_min_secs: u64,
        backoff_max_secs: u64,
    ) -> Self {
        Self {
            renderer,
            status_writer,
            metrics,
            backoff_min_secs,
            backoff_max_secs,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a failure for a resource and get its next backoff.
    ///
    /// Returns (backoff_seconds, error_count)
    pub fn get_backoff_for_resource(&self, resource_key: &str) -> (u64, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(|| BackoffState::new(self.backoff_min_secs, self.backoff_max_secs));
                state.error_count = state.error_count.saturating_add(1);
                (state.backoff.next_backoff_seconds(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using maximum backoff", e);
                (self.backoff_max_secs, 0)
            }
        }
    }

    /// Forget the failure history of a resource after a successful reconcile
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }
}
