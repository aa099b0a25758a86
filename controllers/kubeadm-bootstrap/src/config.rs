//! Controller configuration loaded from environment variables.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONCURRENCY: u16 = 4;
const DEFAULT_DEBOUNCE_MILLIS: u64 = 1000;
const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;
const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;
const DEFAULT_PROBES_ADDR: &str = "0.0.0.0:8080";

/// Runtime settings for the kubeadm bootstrap controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch (`None` watches all namespaces)
    pub namespace: Option<String>,
    /// Upper bound on a single kubeadm render call
    pub render_timeout: Duration,
    /// Max reconciliations running at once
    pub concurrency: u16,
    /// Quiet period before a burst of events is reconciled
    pub debounce: Duration,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    /// Listener for `/healthz`, `/readyz` and `/metrics`
    pub probes_addr: SocketAddr,
}

impl ControllerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty());
        let render_timeout_secs: u64 =
            parse_or(&lookup, "RENDER_TIMEOUT_SECS", DEFAULT_RENDER_TIMEOUT_SECS)?;
        let concurrency: u16 = parse_or(&lookup, "RECONCILE_CONCURRENCY", DEFAULT_CONCURRENCY)?;
        let debounce_millis: u64 =
            parse_or(&lookup, "RECONCILE_DEBOUNCE_MILLIS", DEFAULT_DEBOUNCE_MILLIS)?;
        let backoff_min_secs: u64 = parse_or(&lookup, "BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS)?;
        let backoff_max_secs: u64 = parse_or(&lookup, "BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS)?;
        let probes_addr: SocketAddr = match lookup("PROBES_ADDR") {
            Some(raw) => parse_value("PROBES_ADDR", &raw)?,
            None => parse_value("PROBES_ADDR", DEFAULT_PROBES_ADDR)?,
        };

        if render_timeout_secs == 0 {
            return Err(ControllerError::InvalidConfig(
                "RENDER_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        if concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_CONCURRENCY must be greater than zero".to_string(),
            ));
        }
        if backoff_min_secs == 0 || backoff_min_secs > backoff_max_secs {
            return Err(ControllerError::InvalidConfig(format!(
                "BACKOFF_MIN_SECS ({backoff_min_secs}) must be non-zero and not exceed BACKOFF_MAX_SECS ({backoff_max_secs})"
            )));
        }

        Ok(Self {
            namespace,
            render_timeout: Duration::from_secs(render_timeout_secs),
            concurrency,
            debounce: Duration::from_millis(debounce_millis),
            backoff_min_secs,
            backoff_max_secs,
            probes_addr,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ControllerError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ControllerError::InvalidConfig(format!("{key}={raw:?}: {e}")))
}
