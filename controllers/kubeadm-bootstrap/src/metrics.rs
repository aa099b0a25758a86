//! Prometheus metrics for reconciliations and rendering.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// How a single reconciliation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileResult {
    /// Bootstrap data was published
    Ready,
    /// A terminal failure was recorded
    Failed,
    /// Nothing to do (already ready, or failed with an unchanged spec)
    Skipped,
    /// Requeued with backoff
    Transient,
}

impl ReconcileResult {
    /// Value of the `result` label
    pub fn as_str(self) -> &'static str {
        match self {
            ReconcileResult::Ready => "ready",
            ReconcileResult::Failed => "failed",
            ReconcileResult::Skipped => "skipped",
            ReconcileResult::Transient => "transient",
        }
    }
}

/// Controller metrics on a private registry
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    reconciliations: IntCounterVec,
    render_duration: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create and register all controller metrics
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconciliations = IntCounterVec::new(
            Opts::new(
                "kubeadm_bootstrap_reconciliations_total",
                "KubeadmConfig reconciliations by result",
            ),
            &["result"],
        )?;
        let render_duration = Histogram::with_opts(HistogramOpts::new(
            "kubeadm_bootstrap_render_duration_seconds",
            "Time spent rendering bootstrap data",
        ))?;

        registry.register(Box::new(reconciliations.clone()))?;
        registry.register(Box::new(render_duration.clone()))?;

        Ok(Self {
            registry,
            reconciliations,
            render_duration,
        })
    }

    /// Count one reconciliation
    pub fn record(&self, result: ReconcileResult) {
        self.reconciliations.with_label_values(&[result.as_str()]).inc();
    }

    /// Record how long a render took
    pub fn observe_render(&self, elapsed: Duration) {
        self.render_duration.observe(elapsed.as_secs_f64());
    }

    #[cfg(test)]
    pub fn count(&self, result: ReconcileResult) -> u64 {
        self.reconciliations.with_label_values(&[result.as_str()]).get()
    }

    /// Prometheus text exposition of every registered metric
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
