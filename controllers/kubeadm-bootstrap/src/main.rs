//! Kubeadm Bootstrap Controller
//!
//! Watches KubeadmConfig resources and publishes, for each one, the
//! cloud-config bootstrap data a new node runs to initialize or join a
//! Kubernetes control plane.
//!
//! Bootstrap data is rendered once. After a KubeadmConfig is Ready its data is
//! never regenerated; terminal failures are retried only when the spec changes.

mod backoff;
mod cloudinit;
mod config;
mod controller;
mod error;
mod metrics;
mod probes;
mod reconciler;
mod status;
mod status_writer;
mod validation;
mod watcher;
#[cfg(test)]
mod test_utils;

use anyhow::Context;
use config::ControllerConfig;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Kubeadm Bootstrap Controller");

    let config = ControllerConfig::from_env().context("failed to load controller configuration")?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Render timeout: {:?}", config.render_timeout);
    info!("  Concurrency: {}, debounce: {:?}", config.concurrency, config.debounce);
    info!("  Backoff: {}s..{}s", config.backoff_min_secs, config.backoff_max_secs);
    info!("  Probes: {}", config.probes_addr);

    let controller = Controller::new(config)
        .await
        .context("failed to initialize controller")?;
    controller.run().await?;

    Ok(())
}
