//! Core library for the Kubernetes workload dashboard
//!
//! This crate provides:
//! - Cluster access behind the [`cluster::ClusterApi`] trait (Kubernetes or in-memory)
//! - Snapshot reading and normalization into the dashboard's display schema
//! - Resource aggregation and the cluster health/alert engine
//! - The ownership-aware pause/resume controller and its state store
//! - Service health checks and observability

pub mod aggregate;
pub mod alerts;
pub mod cluster;
pub mod control;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod quantity;
pub mod reader;
pub mod store;

pub use alerts::{AlertEngine, AlertThresholds, ClusterHealth, PodHealth};
pub use cluster::{ClusterApi, InMemoryCluster, KubeCluster};
pub use control::{
    ActionOutcome, BarePodStrategy, ControllerConfig, Lookup, PauseController, WorkloadRef,
    WorkloadStatus,
};
pub use error::{ClusterError, ControlError, ErrorKind};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{DashboardMetrics, StructuredLogger};
pub use reader::ClusterReader;
pub use store::{FileStateStore, MemoryStateStore, WorkloadId, WorkloadStateStore};
