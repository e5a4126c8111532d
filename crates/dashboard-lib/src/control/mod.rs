//! Pause/resume controller
//!
//! Stops and restarts workloads while keeping what is needed to restore
//! them:
//! - a pod managed through a ReplicaSet is resolved to its Deployment, which
//!   is scaled to zero (or natively paused) and later scaled back
//! - a bare pod is stopped in place with `SIGSTOP` or deleted and later
//!   recreated from its stored spec
//!
//! The [`WorkloadStateStore`](crate::store::WorkloadStateStore) record is
//! written before any mutation and removed only after a successful resume.

mod controller;
pub mod convergence;
pub mod ownership;

#[cfg(test)]
mod tests;

pub use controller::PauseController;
pub use convergence::{wait_for_replicas, Convergence, WaitOptions};
pub use ownership::{climb, OwnerChain, OwnerRef};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{PauseMechanism, PauseRecord, WorkloadId, WorkloadKind};

/// How bare pods are paused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarePodStrategy {
    /// Delete the pod and recreate it from its stored spec
    #[default]
    Recreate,
    /// `SIGSTOP` every container in place, deleting only if that fails
    Signal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Replica count used when resuming a workload with no pause record
    pub default_resume_replicas: u32,
    pub bare_pod_strategy: BarePodStrategy,
    /// Write `k8s-dashboard/*` annotations on paused deployments
    pub mirror_annotations: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_resume_replicas: 1,
            bare_pod_strategy: BarePodStrategy::Recreate,
            mirror_annotations: true,
        }
    }
}

/// Which object a bare name is looked up as first when no owner hints are
/// given
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lookup {
    /// A deployment with the name wins over a pod with the same name
    #[default]
    DeploymentFirst,
    /// A live pod with the name wins; its owner chain is still climbed
    PodFirst,
}

/// What a caller asked to act on: a name plus optional ownership hints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub lookup: Lookup,
}

impl WorkloadRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            owner_kind: None,
            owner_name: None,
            lookup: Lookup::default(),
        }
    }

    pub fn pod_first(mut self) -> Self {
        self.lookup = Lookup::PodFirst;
        self
    }

    pub fn owned_by(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.owner_kind = Some(kind.into());
        self.owner_name = Some(name.into());
        self
    }
}

/// The workload an action was resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
}

impl Target {
    pub fn new(kind: WorkloadKind, id: &WorkloadId) -> Self {
        Self {
            kind,
            namespace: id.namespace.clone(),
            name: id.name.clone(),
        }
    }

    pub fn id(&self) -> WorkloadId {
        WorkloadId::new(&self.namespace, &self.name)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Result of a successful pause or resume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub target: Target,
    pub message: String,
    /// Replica count before the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_replicas: Option<u32>,
    /// Replica count the action set or restored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    /// Whether the live object was changed
    pub mutated: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Running,
    Stopped,
    Scaling,
}

impl RunState {
    pub fn derive(desired: u32, available: u32) -> Self {
        if desired == 0 {
            RunState::Stopped
        } else if available == desired {
            RunState::Running
        } else {
            RunState::Scaling
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Running => write!(f, "Running"),
            RunState::Stopped => write!(f, "Stopped"),
            RunState::Scaling => write!(f, "Scaling"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadStatus {
    pub namespace: String,
    pub name: String,
    pub kind: WorkloadKind,
    pub status: RunState,
    /// Desired replica count (`spec.replicas`)
    pub current_replicas: u32,
    pub available_replicas: u32,
    pub ready_replicas: u32,
    pub paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_replicas: Option<u32>,
}

/// One entry of the paused-workload listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PausedWorkload {
    pub namespace: String,
    pub name: String,
    pub kind: WorkloadKind,
    pub original_replicas: u32,
    pub paused_at: DateTime<Utc>,
    pub mechanism: PauseMechanism,
    pub assumed: bool,
}

impl PausedWorkload {
    pub fn from_record(id: WorkloadId, record: &PauseRecord) -> Self {
        Self {
            namespace: id.namespace,
            name: id.name,
            kind: record.kind,
            original_replicas: record.original_replicas,
            paused_at: record.paused_at,
            mechanism: record.mechanism,
            assumed: record.assumed,
        }
    }
}
