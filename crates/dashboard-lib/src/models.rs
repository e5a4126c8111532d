//! Core data models for the dashboard
//!
//! Display-schema views of cluster objects as served by `/api/data`, plus
//! the derived usage and health types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One poll of the cluster, normalized for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub last_updated: DateTime<Utc>,
    pub nodes: Vec<NodeView>,
    pub namespaces: Vec<NamespaceView>,
    pub pods: Vec<PodView>,
    pub deployments: Vec<DeploymentView>,
    pub services: Vec<ServiceView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeView {
    pub name: String,
    /// `Ready`, `NotReady` or `Unknown`
    pub status: String,
    /// `master` or `worker`
    pub role: String,
    /// Capacity for display, e.g. `4` / `15.6Gi`
    pub cpu: String,
    pub memory: String,
    pub cpu_capacity_cores: f64,
    pub cpu_allocatable_cores: f64,
    pub memory_capacity_mib: f64,
    pub memory_allocatable_mib: f64,
    pub age: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceView {
    pub name: String,
    pub status: String,
    pub age: String,
    pub pods: usize,
    pub services: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStateKind {
    Running,
    Waiting,
    Terminated,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerView {
    pub name: String,
    pub ready: bool,
    pub restart_count: i32,
    pub state: ContainerStateKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodView {
    pub name: String,
    pub namespace: String,
    /// Phase, or `Paused` for pods the dashboard stopped in place
    pub status: String,
    pub phase: String,
    /// `ready/total` containers
    pub ready: String,
    pub restarts: i32,
    pub age: String,
    pub cpu: String,
    pub memory: String,
    pub cpu_request_cores: f64,
    pub memory_request_mib: f64,
    pub node: Option<String>,
    pub owner_kind: Option<String>,
    pub owner_name: Option<String>,
    pub containers: Vec<ContainerView>,
    pub init_containers: Vec<ContainerView>,
    pub start_time: Option<DateTime<Utc>>,
    pub scheduled: bool,
}

impl PodView {
    pub fn is_paused(&self) -> bool {
        self.status == "Paused"
    }

    /// `Succeeded` and `Failed` pods hold no resources
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase.as_str(), "Succeeded" | "Failed")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentView {
    pub name: String,
    pub namespace: String,
    /// `ready/desired`
    pub replicas: String,
    pub desired: i32,
    pub ready: i32,
    pub available: i32,
    pub age: String,
    /// `Available`, `Progressing`, `Failed`, `Paused` or `Unknown`
    pub status: String,
    pub paused: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceView {
    pub name: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub cluster_ip: String,
    pub external_ip: String,
    pub ports: String,
    pub age: String,
}

/// Capacity, allocatable and requested amounts of one resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageFigure {
    pub capacity: f64,
    pub allocatable: f64,
    pub requested: f64,
    /// requested / allocatable, in percent
    pub percent: f64,
    pub display: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodRequest {
    pub name: String,
    pub namespace: String,
    pub cpu_cores: f64,
    pub memory_mib: f64,
}

/// Cluster-wide requested resources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Cores
    pub cpu: UsageFigure,
    /// MiB
    pub memory: UsageFigure,
    pub top_pods: Vec<PodRequest>,
}
