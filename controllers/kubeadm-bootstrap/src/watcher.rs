//! Kubernetes resource watchers.
//!
//! This module handles watching KubeadmConfig resources for changes and
//! triggering reconciliation using kube_runtime::Controller.
//!
//! The generic `watch_resource()` helper runs the reconcile loop with automatic
//! reconnection and a per-resource Fibonacci backoff on errors.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::KubeadmConfig;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::{
    controller::{self, Action, Config as RuntimeConfig},
    reflector::ObjectRef,
    watcher, Controller,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Event batching and parallelism for a watcher
#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    /// Quiet period before reconciling a burst of events
    pub debounce: Duration,
    /// Max reconciliations running at once
    pub concurrency: u16,
}

/// `namespace/name` of any namespaced resource
fn resource_key<K: kube::Resource>(obj: &K) -> String {
    object_key(obj.namespace().as_deref(), &obj.name_any())
}

fn object_key(namespace: Option<&str>, name: &str) -> String {
    format!("{}/{}", namespace.unwrap_or("default"), name)
}

/// Log one controller result. A requeued object that no longer exists has
/// been deleted, so its backoff state is dropped.
fn handle_result<K, E>(
    reconciler: &Reconciler,
    resource_name: &str,
    res: Result<(ObjectRef<K>, Action), controller::Error<ControllerError, E>>,
) where
    K: kube::Resource,
    E: std::fmt::Display,
{
    match res {
        Ok((obj, _action)) => debug!(
            "Reconciled {} {}",
            resource_name,
            object_key(obj.namespace.as_deref(), &obj.name)
        ),
        Err(controller::Error::ObjectNotFound(obj)) => {
            let key = object_key(obj.namespace.as_deref(), &obj.name);
            debug!("{} {} was deleted, dropping its backoff state", resource_name, key);
            reconciler.reset_backoff(&key);
        }
        Err(e) => error!("Controller error for {}: {}", resource_name, e),
    }
}

/// Generic watcher helper around kube_runtime::Controller.
///
/// - Controller handles reconnection and keeps watching indefinitely
/// - Errors are requeued with the resource's Fibonacci backoff
/// - `ready` is raised while the controller stream is running
async fn watch_resource<K, F>(
    api: Api<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    resource_name: &'static str,
    settings: WatchSettings,
    ready: Arc<AtomicBool>,
) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(Arc<Reconciler>, Arc<K>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Action, ControllerError>> + Send>> + Send + Sync + Clone + 'static,
{
    info!("Starting {} watcher", resource_name);

    // Error policy: requeue with per-resource Fibonacci backoff
    let error_policy = move |obj: Arc<K>, error: &ControllerError, ctx: Arc<Reconciler>| {
        let key = resource_key(obj.as_ref());
        let (backoff_secs, error_count) = ctx.get_backoff_for_resource(&key);
        error!(
            "Reconciliation error for {} {} (attempt {}), retrying in {}s: {}",
            resource_name, key, error_count, backoff_secs, error
        );
        Action::requeue(Duration::from_secs(backoff_secs))
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            debug!("Reconciling {} {}", resource_name, resource_key(obj.as_ref()));
            reconcile_fn(ctx, obj).await
        }
    };

    let controller_config = RuntimeConfig::default()
        .debounce(settings.debounce)
        .concurrency(settings.concurrency);

    ready.store(true, Ordering::SeqCst);
    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .run(reconcile, error_policy, reconciler.clone())
        .for_each(|res| {
            let reconciler = reconciler.clone();
            async move { handle_result(&reconciler, resource_name, res) }
        })
        .await;
    ready.store(false, Ordering::SeqCst);

    Err(ControllerError::Watch(format!("{resource_name} watch stream ended")))
}

/// Watches KubeadmConfig resources for changes.
#[derive(Debug)]
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    kubeadm_config_api: Api<KubeadmConfig>,
    settings: WatchSettings,
    ready: Arc<AtomicBool>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        reconciler: Arc<Reconciler>,
        kubeadm_config_api: Api<KubeadmConfig>,
        settings: WatchSettings,
        ready: Arc<AtomicBool>,
    ) -> Self {
        Self {
            reconciler,
            kubeadm_config_api,
            settings,
            ready,
        }
    }

    /// Starts watching KubeadmConfig resources.
    pub async fn watch_kubeadm_configs(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.kubeadm_config_api.clone(),
            self.reconciler.clone(),
            |reconciler, resource| {
                Box::pin(async move { reconciler.reconcile_kubeadm_config(&*resource).await })
            },
            "KubeadmConfig",
            self.settings,
            self.ready.clone(),
        )
        .await
    }
}
