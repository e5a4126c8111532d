//! Cluster Reader
//!
//! Lists cluster inventories through [`ClusterApi`] and normalizes them into
//! the display schema. Sub-queries are issued one after another, so fields
//! of one snapshot may reflect slightly different instants.

mod normalize;

#[cfg(test)]
mod tests;

pub use normalize::{
    deployment_marked_paused, format_age, normalize_deployment, normalize_namespace,
    normalize_node, normalize_pod, normalize_service, pod_marked_paused,
};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::cluster::ClusterApi;
use crate::error::ClusterError;
use crate::models::ClusterSnapshot;

/// Builds [`ClusterSnapshot`]s from a cluster handle
#[derive(Clone)]
pub struct ClusterReader {
    cluster: Arc<dyn ClusterApi>,
}

impl ClusterReader {
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    pub fn cluster(&self) -> &Arc<dyn ClusterApi> {
        &self.cluster
    }

    /// Poll every inventory once and normalize the result
    pub async fn snapshot(&self) -> Result<ClusterSnapshot, ClusterError> {
        let nodes = self.cluster.list_nodes().await?;
        let namespaces = self.cluster.list_namespaces().await?;
        let pods = self.cluster.list_pods(None).await?;
        let deployments = self.cluster.list_deployments(None).await?;
        let services = self.cluster.list_services(None).await?;

        let now = Utc::now();

        let mut pod_counts: HashMap<String, usize> = HashMap::new();
        for pod in &pods {
            if let Some(ns) = pod.metadata.namespace.as_ref() {
                *pod_counts.entry(ns.clone()).or_default() += 1;
            }
        }
        let mut service_counts: HashMap<String, usize> = HashMap::new();
        for service in &services {
            if let Some(ns) = service.metadata.namespace.as_ref() {
                *service_counts.entry(ns.clone()).or_default() += 1;
            }
        }

        let snapshot = ClusterSnapshot {
            last_updated: now,
            nodes: nodes.iter().map(|n| normalize_node(n, now)).collect(),
            namespaces: namespaces
                .iter()
                .map(|ns| normalize_namespace(ns, &pod_counts, &service_counts, now))
                .collect(),
            pods: pods.iter().map(|p| normalize_pod(p, now)).collect(),
            deployments: deployments
                .iter()
                .map(|d| normalize_deployment(d, now))
                .collect(),
            services: services.iter().map(|s| normalize_service(s, now)).collect(),
        };

        debug!(
            nodes = snapshot.nodes.len(),
            pods = snapshot.pods.len(),
            deployments = snapshot.deployments.len(),
            "Cluster snapshot built"
        );
        Ok(snapshot)
    }
}
