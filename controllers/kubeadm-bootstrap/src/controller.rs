//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the reconciler,
//! the KubeadmConfig watcher and the probe server together and runs them
//! until one of them stops or a shutdown signal arrives.

use crate::cloudinit::PayloadRenderer;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::probes::{self, ProbeState};
use crate::reconciler::Reconciler;
use crate::status_writer::KubeStatusWriter;
use crate::watcher::{WatchSettings, Watcher};
use crds::KubeadmConfig;
use kube::{Api, Client};
use kubeadm_render::YamlKubeadmRenderer;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Main controller for KubeadmConfig bootstrap data.
#[derive(Debug)]
pub struct Controller {
    kubeadm_config_watcher: JoinHandle<Result<(), ControllerError>>,
    probe_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its background tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Kubeadm Bootstrap Controller");

        let kube_client = Client::try_default().await?;

        let kubeadm_config_api: Api<KubeadmConfig> = match config.namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        let metrics = Metrics::new()?;
        let probe_state = ProbeState::new(metrics.clone());

        let renderer = PayloadRenderer::new(Arc::new(YamlKubeadmRenderer::new()), config.render_timeout);
        let reconciler = Arc::new(Reconciler::new(
            renderer,
            Arc::new(KubeStatusWriter::new(kube_client)),
            metrics,
            config.backoff_min_secs,
            config.backoff_max_secs,
        ));

        let watcher_instance = Arc::new(Watcher::new(
            reconciler,
            kubeadm_config_api,
            WatchSettings {
                debounce: config.debounce,
                concurrency: config.concurrency,
            },
            probe_state.readiness(),
        ));

        let kubeadm_config_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_kubeadm_configs().await })
        };

        let probes_addr = config.probes_addr;
        let probe_server = tokio::spawn(async move { probes::serve(probes_addr, probe_state).await });

        info!("Controller started");
        Ok(Self {
            kubeadm_config_watcher,
            probe_server,
        })
    }

    /// Runs until a task stops or SIGINT/SIGTERM is received.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        tokio::select! {
            result = &mut self.kubeadm_config_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("KubeadmConfig watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("KubeadmConfig watcher error: {}", e)))?;
            }
            result = &mut self.probe_server => {
                result.map_err(|e| ControllerError::Watch(format!("Probe server panicked: {}", e)))??;
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, stopping controller");
                self.kubeadm_config_watcher.abort();
                self.probe_server.abort();
            }
        }

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
