//! Workload state store
//!
//! Durable mapping from a workload identity (`namespace/name`) to the
//! [`PauseRecord`] that remembers "paused by the dashboard, at N replicas".
//!
//! Two backends are provided:
//! - [`FileStateStore`]: one JSON document per workload, replaced atomically
//! - [`MemoryStateStore`]: process-local map for tests and demo mode

mod file;
mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of a controllable workload: `(namespace, name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkloadId {
    pub namespace: String,
    pub name: String,
}

impl WorkloadId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Store key, `{namespace}/{name}`
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Kind of object a pause record was written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    Deployment,
    Pod,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadKind::Deployment => write!(f, "Deployment"),
            WorkloadKind::Pod => write!(f, "Pod"),
        }
    }
}

/// Mechanism used to stop the workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseMechanism {
    /// Deployment scaled to zero replicas
    ScaledToZero,
    /// Orchestrator-native pause flag set
    NativePause,
    /// Container processes stopped in place with SIGSTOP
    Signalled,
    /// Pod deleted; `pod_template` holds what is needed to recreate it
    Deleted,
}

/// Durable fact that a workload was paused by the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseRecord {
    pub kind: WorkloadKind,
    pub original_replicas: u32,
    pub paused: bool,
    pub paused_at: DateTime<Utc>,
    pub mechanism: PauseMechanism,
    /// `original_replicas` was assumed rather than observed (the workload was
    /// already at zero when the pause arrived)
    #[serde(default)]
    pub assumed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<Pod>,
}

impl PauseRecord {
    pub fn deployment(original_replicas: u32, mechanism: PauseMechanism) -> Self {
        Self {
            kind: WorkloadKind::Deployment,
            original_replicas,
            paused: true,
            paused_at: Utc::now(),
            mechanism,
            assumed: false,
            pod_template: None,
        }
    }

    pub fn pod(mechanism: PauseMechanism, template: Pod) -> Self {
        Self {
            kind: WorkloadKind::Pod,
            original_replicas: 1,
            paused: true,
            paused_at: Utc::now(),
            mechanism,
            assumed: false,
            pod_template: Some(template),
        }
    }

    pub fn assumed(mut self) -> Self {
        self.assumed = true;
        self
    }
}

/// Failure inside a state store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid state key {0:?}")]
    InvalidKey(String),
}

/// Persistence used by the controller for pause records.
///
/// A `put` must be visible to a subsequent `get` in the same process. Calls
/// for different workloads never coordinate with each other.
#[async_trait]
pub trait WorkloadStateStore: Send + Sync {
    async fn put(&self, id: &WorkloadId, record: &PauseRecord) -> Result<(), StoreError>;

    async fn get(&self, id: &WorkloadId) -> Result<Option<PauseRecord>, StoreError>;

    /// Removing an absent record is not an error
    async fn delete(&self, id: &WorkloadId) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<(WorkloadId, PauseRecord)>, StoreError>;
}
