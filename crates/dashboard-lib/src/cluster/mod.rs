//! Cluster control plane abstraction
//!
//! [`ClusterApi`] is the only way the reader and the controller talk to the
//! orchestrator. Two implementations are provided:
//! - [`KubeCluster`]: a real Kubernetes API server via `kube`
//! - [`InMemoryCluster`]: an in-process cluster for tests and demo mode

mod demo;
pub mod fixtures;
mod kubernetes;
mod memory;

pub use kubernetes::KubeCluster;
pub use self::memory::{
    ClusterBuilder, ConvergenceMode, InMemoryCluster, Operation, SignalEvent,
};

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{Namespace, Node, Pod, Service};
use serde::{Deserialize, Serialize};

use crate::error::ClusterError;

/// Annotation and label keys the dashboard writes on live objects
pub mod annotations {
    /// Mirror of "paused by the dashboard" on a deployment
    pub const PAUSED: &str = "k8s-dashboard/paused";
    /// Mirror of the pre-pause replica count on a deployment
    pub const ORIGINAL_REPLICAS: &str = "k8s-dashboard/original-replicas";
    /// Pod label marking a pod the dashboard stopped in place
    pub const STATUS_LABEL: &str = "k8s-dashboard/status";
    pub const STATUS_PAUSED: &str = "paused";
}

/// Optional features of a cluster backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// The backend has a pause flag that stops a deployment's pods without
    /// touching its replica count
    pub native_pause: bool,
    /// Commands can be executed inside running containers
    pub exec: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            native_pause: false,
            exec: true,
        }
    }
}

/// Process signal delivered to a container's PID 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Stop,
    Cont,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Stop => "STOP",
            Signal::Cont => "CONT",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIG{}", self.as_str())
    }
}

/// Typed access to the cluster control plane.
///
/// Implementations must be safe for concurrent use: reads and mutations from
/// different requests may interleave freely.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Cheap connectivity check, returns the server version string
    async fn ping(&self) -> Result<String, ClusterError>;

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError>;

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ClusterError>;

    /// `None` lists across all namespaces
    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>, ClusterError>;

    async fn list_deployments(&self, namespace: Option<&str>)
        -> Result<Vec<Deployment>, ClusterError>;

    async fn list_services(&self, namespace: Option<&str>) -> Result<Vec<Service>, ClusterError>;

    async fn get_deployment(&self, namespace: &str, name: &str)
        -> Result<Deployment, ClusterError>;

    async fn get_replica_set(&self, namespace: &str, name: &str)
        -> Result<ReplicaSet, ClusterError>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClusterError>;

    /// Set `spec.replicas`. With `resource_version` the update is rejected
    /// with [`ClusterError::Conflict`] if the object changed since that read.
    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
        resource_version: Option<&str>,
    ) -> Result<Deployment, ClusterError>;

    async fn set_deployment_paused(
        &self,
        namespace: &str,
        name: &str,
        paused: bool,
    ) -> Result<Deployment, ClusterError>;

    /// Set (`Some`) or remove (`None`) annotations on a deployment
    async fn annotate_deployment(
        &self,
        namespace: &str,
        name: &str,
        annotations: &BTreeMap<String, Option<String>>,
    ) -> Result<(), ClusterError>;

    /// Set (`Some`) or remove (`None`) labels on a pod
    async fn label_pod(
        &self,
        namespace: &str,
        name: &str,
        labels: &BTreeMap<String, Option<String>>,
    ) -> Result<(), ClusterError>;

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, ClusterError>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    /// Deliver `signal` to PID 1 of `container` in `pod`
    async fn signal_container(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        signal: Signal,
    ) -> Result<(), ClusterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_names() {
        assert_eq!(Signal::Stop.as_str(), "STOP");
        assert_eq!(Signal::Cont.to_string(), "SIGCONT");
    }

    #[test]
    fn test_default_capabilities() {
        let caps = Capabilities::default();
        assert!(!caps.native_pause);
        assert!(caps.exec);
    }
}
