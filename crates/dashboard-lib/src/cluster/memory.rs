//! In-process cluster
//!
//! Keeps typed objects in maps, assigns resource versions, enforces
//! optimistic concurrency on scale calls and reconciles deployments into
//! replica sets and pods. Failures can be injected per operation.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateRunning, ContainerStatus, Namespace, Node, Pod, PodCondition,
    PodStatus, Service,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use super::fixtures::controller_ref;
use super::{Capabilities, ClusterApi, Signal};
use crate::error::ClusterError;

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// Operations that can be made to fail with [`InMemoryCluster::fail_next`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Ping,
    List,
    GetDeployment,
    GetReplicaSet,
    GetPod,
    Scale,
    SetPaused,
    Annotate,
    LabelPod,
    CreatePod,
    DeletePod,
    Signal,
}

/// How deployment status follows spec changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvergenceMode {
    /// Status, replica sets and pods follow the spec on every mutation
    #[default]
    Immediate,
    /// Status only changes through [`InMemoryCluster::converge_deployment`]
    Manual,
}

/// A signal delivered through [`ClusterApi::signal_container`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalEvent {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub signal: Signal,
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    namespaces: BTreeMap<String, Namespace>,
    pods: BTreeMap<Key, Pod>,
    deployments: BTreeMap<Key, Deployment>,
    replica_sets: BTreeMap<Key, ReplicaSet>,
    services: BTreeMap<Key, Service>,
    failures: HashMap<Operation, VecDeque<ClusterError>>,
    /// Per-container signal failures, consumed once each
    container_failures: HashMap<(String, Signal), ClusterError>,
    signals: Vec<SignalEvent>,
    version: u64,
    pod_serial: u64,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn stamp(&mut self, meta: &mut ObjectMeta) {
        meta.resource_version = Some(self.next_version());
        if meta.uid.is_none() {
            meta.uid = Some(format!("uid-{}", self.version));
        }
        if meta.creation_timestamp.is_none() {
            meta.creation_timestamp = Some(Time(Utc::now()));
        }
    }

    fn take_failure(&mut self, op: Operation) -> Result<(), ClusterError> {
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn deployment_mut(&mut self, namespace: &str, name: &str) -> Result<&mut Deployment, ClusterError> {
        self.deployments.get_mut(&key(namespace, name)).ok_or_else(|| {
            ClusterError::NotFound(format!("deployments.apps \"{name}\" not found"))
        })
    }

    /// Bring the deployment's status, replica set and pods in line with its
    /// spec. A paused deployment runs zero pods.
    fn reconcile(&mut self, namespace: &str, name: &str) {
        let Some(deployment) = self.deployments.get(&key(namespace, name)) else {
            return;
        };
        let spec = deployment.spec.clone().unwrap_or_default();
        let paused = spec.paused.unwrap_or(false);
        let desired = if paused { 0 } else { spec.replicas.unwrap_or(1).max(0) };

        if let Some(deployment) = self.deployments.get_mut(&key(namespace, name)) {
            let status = deployment.status.get_or_insert_with(Default::default);
            status.replicas = Some(desired);
            status.ready_replicas = Some(desired);
            status.available_replicas = Some(desired);
            status.updated_replicas = Some(desired);
        }

        let owned_rs: Vec<Key> = self
            .replica_sets
            .iter()
            .filter(|(k, rs)| k.0 == namespace && is_controlled_by(&rs.metadata, "Deployment", name))
            .map(|(k, _)| k.clone())
            .collect();
        let Some(rs_key) = owned_rs.first().cloned() else {
            return;
        };

        let template = match self.replica_sets.get_mut(&rs_key) {
            Some(rs) => {
                if let Some(spec) = rs.spec.as_mut() {
                    spec.replicas = Some(desired);
                }
                let status = rs.status.get_or_insert_with(Default::default);
                status.replicas = desired;
                status.ready_replicas = Some(desired);
                status.available_replicas = Some(desired);
                rs.spec.as_ref().and_then(|s| s.template.clone())
            }
            None => None,
        };

        let rs_name = rs_key.1.clone();
        let mut current: Vec<Key> = self
            .pods
            .iter()
            .filter(|(k, pod)| k.0 == namespace && is_controlled_by(&pod.metadata, "ReplicaSet", &rs_name))
            .map(|(k, _)| k.clone())
            .collect();

        let desired = desired as usize;
        while current.len() > desired {
            if let Some(k) = current.pop() {
                self.pods.remove(&k);
            }
        }
        while current.len() < desired {
            self.pod_serial += 1;
            let pod_name = format!("{}-{:05x}", rs_name, self.pod_serial);
            let mut pod = Pod {
                metadata: template
                    .as_ref()
                    .and_then(|t| t.metadata.clone())
                    .unwrap_or_default(),
                spec: template.as_ref().and_then(|t| t.spec.clone()),
                status: None,
            };
            pod.metadata.name = Some(pod_name.clone());
            pod.metadata.namespace = Some(namespace.to_string());
            pod.metadata.owner_references = Some(vec![controller_ref("ReplicaSet", &rs_name)]);
            pod.metadata.creation_timestamp = None;
            if let Some(spec) = pod.spec.as_mut() {
                spec.node_name.get_or_insert_with(|| "worker-1".to_string());
            }
            pod.status = Some(running_status(&pod));
            self.stamp(&mut pod.metadata);
            let k = key(namespace, &pod_name);
            self.pods.insert(k.clone(), pod);
            current.push(k);
        }
    }
}

fn is_controlled_by(meta: &ObjectMeta, kind: &str, name: &str) -> bool {
    meta.owner_references
        .as_ref()
        .map(|refs| {
            refs.iter()
                .any(|r| r.controller == Some(true) && r.kind == kind && r.name == name)
        })
        .unwrap_or(false)
}

/// Status of a freshly started pod whose containers are all ready
fn running_status(pod: &Pod) -> PodStatus {
    let now = Time(Utc::now());
    let container_statuses = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .map(|c| ContainerStatus {
                    name: c.name.clone(),
                    image: c.image.clone().unwrap_or_default(),
                    ready: true,
                    started: Some(true),
                    state: Some(ContainerState {
                        running: Some(ContainerStateRunning {
                            started_at: Some(now.clone()),
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
                .collect()
        })
        .unwrap_or_default();

    PodStatus {
        phase: Some("Running".to_string()),
        start_time: Some(now),
        conditions: Some(vec![
            PodCondition {
                type_: "PodScheduled".to_string(),
                status: "True".to_string(),
                ..Default::default()
            },
            PodCondition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
                ..Default::default()
            },
        ]),
        container_statuses: Some(container_statuses),
        ..Default::default()
    }
}

/// In-memory [`ClusterApi`] implementation.
///
/// Cloning shares the underlying state.
#[derive(Clone)]
pub struct InMemoryCluster {
    state: Arc<RwLock<State>>,
    capabilities: Capabilities,
    convergence: ConvergenceMode,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ClusterBuilder {
        ClusterBuilder::default()
    }

    /// Queue `err` to be returned by the next call of `op`
    pub async fn fail_next(&self, op: Operation, err: ClusterError) {
        self.state
            .write()
            .await
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Fail the next `signal` delivered to any container named `container`
    pub async fn fail_signal_to(&self, container: &str, signal: Signal, err: ClusterError) {
        self.state
            .write()
            .await
            .container_failures
            .insert((container.to_string(), signal), err);
    }

    pub async fn signals(&self) -> Vec<SignalEvent> {
        self.state.read().await.signals.clone()
    }

    pub async fn insert_pod(&self, pod: Pod) {
        let mut state = self.state.write().await;
        let mut pod = pod;
        state.stamp(&mut pod.metadata);
        let k = key(
            pod.metadata.namespace.as_deref().unwrap_or("default"),
            pod.metadata.name.as_deref().unwrap_or_default(),
        );
        state.pods.insert(k, pod);
    }

    pub async fn insert_deployment(&self, deployment: Deployment) {
        let mut state = self.state.write().await;
        let mut deployment = deployment;
        state.stamp(&mut deployment.metadata);
        let k = key(
            deployment.metadata.namespace.as_deref().unwrap_or("default"),
            deployment.metadata.name.as_deref().unwrap_or_default(),
        );
        state.deployments.insert(k, deployment);
    }

    pub async fn remove_replica_set(&self, namespace: &str, name: &str) {
        self.state.write().await.replica_sets.remove(&key(namespace, name));
    }

    pub async fn remove_deployment(&self, namespace: &str, name: &str) {
        self.state.write().await.deployments.remove(&key(namespace, name));
    }

    /// Desired replica count of a deployment, if it exists
    pub async fn deployment_replicas(&self, namespace: &str, name: &str) -> Option<i32> {
        self.state
            .read()
            .await
            .deployments
            .get(&key(namespace, name))
            .and_then(|d| d.spec.as_ref())
            .and_then(|s| s.replicas)
    }

    pub async fn pod_exists(&self, namespace: &str, name: &str) -> bool {
        self.state.read().await.pods.contains_key(&key(namespace, name))
    }

    /// Simulate a write by another actor, invalidating earlier reads
    pub async fn touch_deployment(&self, namespace: &str, name: &str) {
        let mut state = self.state.write().await;
        let version = state.next_version();
        if let Some(d) = state.deployments.get_mut(&key(namespace, name)) {
            d.metadata.resource_version = Some(version);
        }
    }

    /// Set observed availability directly (manual convergence)
    pub async fn set_available(&self, namespace: &str, name: &str, available: i32) {
        let mut state = self.state.write().await;
        if let Some(d) = state.deployments.get_mut(&key(namespace, name)) {
            let status = d.status.get_or_insert_with(Default::default);
            status.available_replicas = Some(available);
            status.ready_replicas = Some(available);
            status.replicas = Some(available);
        }
    }

    /// Reconcile one deployment regardless of convergence mode
    pub async fn converge_deployment(&self, namespace: &str, name: &str) {
        self.state.write().await.reconcile(namespace, name);
    }

    fn after_deployment_change(&self, state: &mut State, namespace: &str, name: &str) {
        if self.convergence == ConvergenceMode::Immediate {
            state.reconcile(namespace, name);
        }
    }
}

/// Seeds an [`InMemoryCluster`]
#[derive(Default)]
pub struct ClusterBuilder {
    state: State,
    capabilities: Capabilities,
    convergence: ConvergenceMode,
}

impl ClusterBuilder {
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn convergence(mut self, mode: ConvergenceMode) -> Self {
        self.convergence = mode;
        self
    }

    pub fn node(mut self, mut node: Node) -> Self {
        self.state.stamp(&mut node.metadata);
        let name = node.metadata.name.clone().unwrap_or_default();
        self.state.nodes.insert(name, node);
        self
    }

    pub fn namespace(mut self, mut namespace: Namespace) -> Self {
        self.state.stamp(&mut namespace.metadata);
        let name = namespace.metadata.name.clone().unwrap_or_default();
        self.state.namespaces.insert(name, namespace);
        self
    }

    pub fn pod(mut self, mut pod: Pod) -> Self {
        self.state.stamp(&mut pod.metadata);
        let k = key(
            pod.metadata.namespace.as_deref().unwrap_or("default"),
            pod.metadata.name.as_deref().unwrap_or_default(),
        );
        self.state.pods.insert(k, pod);
        self
    }

    pub fn deployment(mut self, mut deployment: Deployment) -> Self {
        self.state.stamp(&mut deployment.metadata);
        let k = key(
            deployment.metadata.namespace.as_deref().unwrap_or("default"),
            deployment.metadata.name.as_deref().unwrap_or_default(),
        );
        self.state.deployments.insert(k, deployment);
        self
    }

    pub fn replica_set(mut self, mut replica_set: ReplicaSet) -> Self {
        self.state.stamp(&mut replica_set.metadata);
        let k = key(
            replica_set.metadata.namespace.as_deref().unwrap_or("default"),
            replica_set.metadata.name.as_deref().unwrap_or_default(),
        );
        self.state.replica_sets.insert(k, replica_set);
        self
    }

    pub fn service(mut self, mut service: Service) -> Self {
        self.state.stamp(&mut service.metadata);
        let k = key(
            service.metadata.namespace.as_deref().unwrap_or("default"),
            service.metadata.name.as_deref().unwrap_or_default(),
        );
        self.state.services.insert(k, service);
        self
    }

    pub fn build(self) -> InMemoryCluster {
        InMemoryCluster {
            state: Arc::new(RwLock::new(self.state)),
            capabilities: self.capabilities,
            convergence: self.convergence,
        }
    }
}

fn in_namespace<T: Clone>(map: &BTreeMap<Key, T>, namespace: Option<&str>) -> Vec<T> {
    map.iter()
        .filter(|(k, _)| namespace.map_or(true, |ns| k.0 == ns))
        .map(|(_, v)| v.clone())
        .collect()
}

#[async_trait]
impl ClusterApi for InMemoryCluster {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn ping(&self) -> Result<String, ClusterError> {
        self.state.write().await.take_failure(Operation::Ping)?;
        Ok("v1.28.0-memory".to_string())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::List)?;
        Ok(state.nodes.values().cloned().collect())
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ClusterError> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::List)?;
        Ok(state.namespaces.values().cloned().collect())
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>, ClusterError> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::List)?;
        Ok(in_namespace(&state.pods, namespace))
    }

    async fn list_deployments(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<Deployment>, ClusterError> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::List)?;
        Ok(in_namespace(&state.deployments, namespace))
    }

    async fn list_services(&self, namespace: Option<&str>) -> Result<Vec<Service>, ClusterError> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::List)?;
        Ok(in_namespace(&state.services, namespace))
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::GetDeployment)?;
        state.deployment_mut(namespace, name).map(|d| d.clone())
    }

    async fn get_replica_set(&self, namespace: &str, name: &str) -> Result<ReplicaSet, ClusterError> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::GetReplicaSet)?;
        state
            .replica_sets
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(format!("replicasets.apps \"{name}\" not found")))
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClusterError> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::GetPod)?;
        state
            .pods
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(format!("pods \"{name}\" not found")))
    }

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
        resource_version: Option<&str>,
    ) -> Result<Deployment, ClusterError> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::Scale)?;
        let version = state.next_version();

        let deployment = state.deployment_mut(namespace, name)?;
        if let Some(expected) = resource_version {
            if deployment.metadata.resource_version.as_deref() != Some(expected) {
                return Err(ClusterError::Conflict(format!(
                    "Operation cannot be fulfilled on deployments.apps \"{name}\": the object has been modified; please apply your changes to the latest version and try again"
                )));
            }
        }
        deployment.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
        deployment.metadata.resource_version = Some(version);

        self.after_deployment_change(&mut state, namespace, name);
        debug!(namespace, name, replicas, "In-memory deployment scaled");
        state.deployment_mut(namespace, name).map(|d| d.clone())
    }

    async fn set_deployment_paused(
        &self,
        namespace: &str,
        name: &str,
        paused: bool,
    ) -> Result<Deployment, ClusterError> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::SetPaused)?;
        let version = state.next_version();

        let deployment = state.deployment_mut(namespace, name)?;
        deployment.spec.get_or_insert_with(Default::default).paused = Some(paused);
        deployment.metadata.resource_version = Some(version);

        self.after_deployment_change(&mut state, namespace, name);
        state.deployment_mut(namespace, name).map(|d| d.clone())
    }

    async fn annotate_deployment(
        &self,
        namespace: &str,
        name: &str,
        annotations: &BTreeMap<String, Option<String>>,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::Annotate)?;
        let version = state.next_version();

        let deployment = state.deployment_mut(namespace, name)?;
        let existing = deployment
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new);
        for (k, v) in annotations {
            match v {
                Some(value) => {
                    existing.insert(k.clone(), value.clone());
                }
                None => {
                    existing.remove(k);
                }
            }
        }
        deployment.metadata.resource_version = Some(version);
        Ok(())
    }

    async fn label_pod(
        &self,
        namespace: &str,
        name: &str,
        labels: &BTreeMap<String, Option<String>>,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::LabelPod)?;
        let version = state.next_version();

        let pod = state
            .pods
            .get_mut(&key(namespace, name))
            .ok_or_else(|| ClusterError::NotFound(format!("pods \"{name}\" not found")))?;
        let existing = pod.metadata.labels.get_or_insert_with(BTreeMap::new);
        for (k, v) in labels {
            match v {
                Some(value) => {
                    existing.insert(k.clone(), value.clone());
                }
                None => {
                    existing.remove(k);
                }
            }
        }
        pod.metadata.resource_version = Some(version);
        Ok(())
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, ClusterError> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::CreatePod)?;

        let name = pod
            .metadata
            .name
            .clone()
            .ok_or_else(|| ClusterError::Unavailable("pod name is required".to_string()))?;
        let k = key(namespace, &name);
        if state.pods.contains_key(&k) {
            return Err(ClusterError::Conflict(format!("pods \"{name}\" already exists")));
        }

        let mut created = pod.clone();
        created.metadata.namespace = Some(namespace.to_string());
        if let Some(spec) = created.spec.as_mut() {
            spec.node_name.get_or_insert_with(|| "worker-1".to_string());
        }
        created.status = Some(running_status(&created));
        state.stamp(&mut created.metadata);
        state.pods.insert(k, created.clone());
        Ok(created)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::DeletePod)?;
        state
            .pods
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| ClusterError::NotFound(format!("pods \"{name}\" not found")))
    }

    async fn signal_container(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        signal: Signal,
    ) -> Result<(), ClusterError> {
        if !self.capabilities.exec {
            return Err(ClusterError::Unsupported(
                "exec is not available on this cluster".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        state.take_failure(Operation::Signal)?;
        let target = state
            .pods
            .get(&key(namespace, pod))
            .ok_or_else(|| ClusterError::NotFound(format!("pods \"{pod}\" not found")))?;
        let has_container = target
            .spec
            .as_ref()
            .map(|s| s.containers.iter().any(|c| c.name == container))
            .unwrap_or(false);
        if !has_container {
            return Err(ClusterError::NotFound(format!(
                "container {container} not found in pod {pod}"
            )));
        }
        if let Some(err) = state
            .container_failures
            .remove(&(container.to_string(), signal))
        {
            return Err(err);
        }

        state.signals.push(SignalEvent {
            namespace: namespace.to_string(),
            pod: pod.to_string(),
            container: container.to_string(),
            signal,
        });
        Ok(())
    }
}
