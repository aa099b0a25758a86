//! KubeadmConfig reconciliation.

use super::Reconciler;
use crate::error::{BootstrapError, ControllerError};
use crate::metrics::ReconcileResult;
use crate::status::{spec_fingerprint, status_patch, transition, BootstrapData, TrackedStatus, Transition};
use crate::validation::validate;
use crds::{KubeadmConfig, KubeadmConfigSpec};
use kube_runtime::controller::Action;
use std::time::Instant;
use tracing::{debug, info, warn};

impl Reconciler {
    /// Reconciles a KubeadmConfig resource.
    ///
    /// Renders bootstrap data for a `Pending` resource, or for a `Failed` one
    /// whose spec changed since the failure, and records the result in status.
    /// A `Ready` resource is never rendered or written again. Transient
    /// failures leave the status untouched and are returned for requeue.
    pub async fn reconcile_kubeadm_config(
        &self,
        config: &KubeadmConfig,
    ) -> Result<Action, ControllerError> {
        let name = config.metadata.name.as_deref().ok_or_else(|| {
            ControllerError::Reconciliation("KubeadmConfig missing name".to_string())
        })?;
        let namespace = config.metadata.namespace.as_deref().unwrap_or("default");
        let key = format!("{namespace}/{name}");

        let current = TrackedStatus::from_observed(config.status.as_ref());
        if let TrackedStatus::Ready(_) = current {
            debug!("KubeadmConfig {} already has bootstrap data, skipping", key);
            return Ok(self.skip(&key));
        }

        let spec_hash = spec_fingerprint(&config.spec)?;
        if !current.needs_render(&spec_hash) {
            debug!("KubeadmConfig {} failed for this spec already, waiting for a change", key);
            return Ok(self.skip(&key));
        }

        let started = Instant::now();
        let outcome = self.render(&config.spec).await;
        self.metrics.observe_render(started.elapsed());

        let next = match transition(&current, &spec_hash, outcome) {
            Transition::Unchanged => return Ok(self.skip(&key)),
            Transition::Retry(error) => {
                self.metrics.record(ReconcileResult::Transient);
                return Err(ControllerError::Transient(error));
            }
            Transition::Persist(next) => next,
        };

        let patch = status_patch(&next);
        if let Err(e) = self.status_writer.write_status(namespace, name, &patch).await {
            self.metrics.record(ReconcileResult::Transient);
            return Err(e);
        }

        match &next {
            TrackedStatus::Ready(ready) => {
                info!(
                    "KubeadmConfig {} is ready ({} bytes of bootstrap data)",
                    key,
                    ready.bootstrap_data().len()
                );
                self.metrics.record(ReconcileResult::Ready);
            }
            TrackedStatus::Failed(failed) => {
                warn!("KubeadmConfig {} failed: {}: {}", key, failed.reason(), failed.message());
                self.metrics.record(ReconcileResult::Failed);
            }
            TrackedStatus::Pending => {}
        }

        self.reset_backoff(&key);
        Ok(Action::await_change())
    }

    /// Validate and render a spec
    async fn render(&self, spec: &KubeadmConfigSpec) -> Result<BootstrapData, BootstrapError> {
        let validated = validate(spec)?;
        let data = self.renderer.render(&validated, &spec.effective_format()).await?;
        Ok(data)
    }

    fn skip(&self, key: &str) -> Action {
        self.metrics.record(ReconcileResult::Skipped);
        self.reset_backoff(key);
        Action::await_change()
    }
}
