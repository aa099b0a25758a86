//! Mock KubeadmRenderer for unit testing
//!
//! Delegates to `YamlKubeadmRenderer` by default and can be configured to
//! fail or to stall, so callers can exercise their error and timeout paths.

use crate::error::KubeadmRenderError;
use crate::renderer_trait::{KubeadmCommand, KubeadmInvocation, KubeadmRenderer};
use crate::yaml::YamlKubeadmRenderer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mock renderer for testing
#[derive(Debug, Clone, Default)]
pub struct MockKubeadmRenderer {
    inner: YamlKubeadmRenderer,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockKubeadmRenderer {
    /// Create a mock that renders like the real implementation
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every render fail with `InvalidField`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of render calls observed so far (shared across clones)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl KubeadmRenderer for MockKubeadmRenderer {
    async fn render(&self, invocation: KubeadmInvocation<'_>) -> Result<KubeadmCommand, KubeadmRenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.failure {
            return Err(KubeadmRenderError::invalid("mock", reason.clone()));
        }
        self.inner.render_sync(invocation)
    }
}
