//! Where commands are executed: the dashboard HTTP API, or the cluster
//! directly through the same controller the server runs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use dashboard_lib::{
    aggregate::aggregate,
    control::{ControllerConfig, PauseController, PausedWorkload, WorkloadRef, WorkloadStatus},
    AlertEngine, AlertThresholds, ClusterApi, ClusterReader, FileStateStore, KubeCluster,
    PodHealth,
};

use crate::client::{
    ActionRequest, ActionResponse, ApiClient, Overview, PausedResponse, PodHealthResponse,
    StatusResponse,
};

/// In-process controller and reader over a live cluster
pub struct DirectBackend {
    controller: PauseController,
    reader: ClusterReader,
    engine: AlertEngine,
}

impl DirectBackend {
    pub fn new(cluster: Arc<dyn ClusterApi>, state_dir: PathBuf) -> Self {
        Self {
            controller: PauseController::new(
                cluster.clone(),
                Arc::new(FileStateStore::new(state_dir)),
                ControllerConfig::default(),
            ),
            reader: ClusterReader::new(cluster),
            engine: AlertEngine::new(AlertThresholds::default()),
        }
    }

    /// Connect using `kubeconfig` when given, else the default client config
    pub async fn connect(
        kubeconfig: Option<&Path>,
        context: Option<&str>,
        state_dir: PathBuf,
    ) -> Result<Self> {
        let cluster = match kubeconfig {
            Some(path) => KubeCluster::from_kubeconfig(path, context).await,
            None => KubeCluster::connect(context).await,
        }
        .context("Failed to connect to the cluster")?;

        Ok(Self::new(Arc::new(cluster), state_dir))
    }
}

pub enum Backend {
    Api(ApiClient),
    Direct(Box<DirectBackend>),
}

impl Backend {
    pub fn describe(&self) -> String {
        match self {
            Backend::Api(client) => format!("API at {}", client.base_url()),
            Backend::Direct(_) => "cluster (direct)".to_string(),
        }
    }

    pub async fn pause(&self, workload: &WorkloadRef) -> Result<ActionResponse> {
        match self {
            Backend::Api(client) => {
                client
                    .post("api/workloads/pause", &action_request(workload, None))
                    .await
            }
            Backend::Direct(direct) => Ok(direct.controller.pause(workload).await?.into()),
        }
    }

    pub async fn resume(
        &self,
        workload: &WorkloadRef,
        replicas: Option<u32>,
    ) -> Result<ActionResponse> {
        match self {
            Backend::Api(client) => {
                client
                    .post("api/workloads/resume", &action_request(workload, replicas))
                    .await
            }
            Backend::Direct(direct) => {
                Ok(direct.controller.resume(workload, replicas).await?.into())
            }
        }
    }

    pub async fn status(&self, namespace: &str, name: &str) -> Result<WorkloadStatus> {
        match self {
            Backend::Api(client) => {
                let response: StatusResponse = client
                    .get_with_query(
                        "api/workloads/status",
                        &[("namespace", namespace), ("name", name)],
                    )
                    .await?;
                Ok(response.workload)
            }
            Backend::Direct(direct) => Ok(direct
                .controller
                .status(&WorkloadRef::new(namespace, name))
                .await?),
        }
    }

    pub async fn paused(&self) -> Result<Vec<PausedWorkload>> {
        match self {
            Backend::Api(client) => {
                let response: PausedResponse = client.get("api/workloads/paused").await?;
                Ok(response.workloads)
            }
            Backend::Direct(direct) => Ok(direct.controller.paused_workloads().await?),
        }
    }

    pub async fn overview(&self) -> Result<Overview> {
        match self {
            Backend::Api(client) => client.get("api/data").await,
            Backend::Direct(direct) => {
                let snapshot = direct.reader.snapshot().await?;
                let resource_usage = aggregate(&snapshot);
                let cluster_health = direct.engine.evaluate(&snapshot, &resource_usage);
                Ok(Overview {
                    snapshot,
                    resource_usage,
                    cluster_health,
                })
            }
        }
    }

    pub async fn pod_health(&self) -> Result<Vec<PodHealth>> {
        match self {
            Backend::Api(client) => {
                let response: PodHealthResponse = client.get("api/pods/health").await?;
                Ok(response.pods)
            }
            Backend::Direct(direct) => {
                let snapshot = direct.reader.snapshot().await?;
                Ok(direct.engine.pod_health(&snapshot))
            }
        }
    }
}

fn action_request(workload: &WorkloadRef, replicas: Option<u32>) -> ActionRequest {
    ActionRequest {
        namespace: workload.namespace.clone(),
        name: workload.name.clone(),
        owner_kind: workload.owner_kind.clone(),
        owner_name: workload.owner_name.clone(),
        replicas,
    }
}
