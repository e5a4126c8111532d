//! Periodic cluster and state store probes feeding the health registry

use std::sync::Arc;
use std::time::Duration;

use dashboard_lib::health::components;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::AppState;

/// Probe the cluster API and the state store once
pub async fn probe_once(state: &AppState) {
    let cluster = state.controller.cluster().ping().await;
    match &cluster {
        Ok(version) => debug!(version = %version, "Cluster API reachable"),
        Err(e) => warn!(error = %e, "Cluster API probe failed"),
    }
    state
        .health_registry
        .record_probe(components::KUBE_API, cluster.map(|_| ()).map_err(|e| e.to_string()))
        .await;

    let store = state.store.list().await;
    if let Ok(records) = &store {
        state.metrics.set_paused_workloads(records.len() as i64);
    }
    if let Err(e) = &store {
        warn!(error = %e, "State store probe failed");
    }
    state
        .health_registry
        .record_probe(components::STATE_STORE, store.map(|_| ()).map_err(|e| e.to_string()))
        .await;
}

/// Probe on every `interval` tick until `cancel` fires
pub async fn run(state: Arc<AppState>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => probe_once(&state).await,
        }
    }
    debug!("Health probe loop stopped");
}
