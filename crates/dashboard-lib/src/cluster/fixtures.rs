//! Builders for Kubernetes objects
//!
//! Used to seed [`InMemoryCluster`](super::InMemoryCluster) in tests and in
//! demo mode. Every builder produces a fully populated object (metadata,
//! spec and status) so the reader sees the same shape a real API server
//! would return.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentCondition, DeploymentSpec, DeploymentStatus, ReplicaSet,
    ReplicaSetSpec, ReplicaSetStatus,
};
use k8s_openapi::api::core::v1::{
    Container, ContainerState, ContainerStateRunning, ContainerStateTerminated,
    ContainerStateWaiting, ContainerStatus, LoadBalancerIngress, LoadBalancerStatus, Namespace,
    NamespaceStatus, Node, NodeCondition, NodeStatus, Pod, PodCondition, PodSpec, PodStatus,
    PodTemplateSpec, ResourceRequirements, Service, ServicePort, ServiceSpec, ServiceStatus,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    LabelSelector, ObjectMeta, OwnerReference, Time,
};

/// Default container image for generated pods
pub const DEFAULT_IMAGE: &str = "nginx:1.25";

fn ago(seconds: i64) -> Time {
    Time(Utc::now() - Duration::seconds(seconds))
}

fn meta(namespace: Option<&str>, name: &str, age_secs: i64) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        creation_timestamp: Some(ago(age_secs)),
        ..Default::default()
    }
}

fn requests(cpu: &str, memory: &str) -> ResourceRequirements {
    let mut map = BTreeMap::new();
    map.insert("cpu".to_string(), Quantity(cpu.to_string()));
    map.insert("memory".to_string(), Quantity(memory.to_string()));
    ResourceRequirements {
        requests: Some(map),
        ..Default::default()
    }
}

/// Controller owner reference as set by Kubernetes controllers
pub fn controller_ref(kind: &str, name: &str) -> OwnerReference {
    let api_version = match kind {
        "Deployment" | "ReplicaSet" | "StatefulSet" | "DaemonSet" => "apps/v1",
        "Job" => "batch/v1",
        _ => "v1",
    };
    OwnerReference {
        api_version: api_version.to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: format!("uid-{}", name),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Pod template with a single container `app`
pub fn pod_template(app: &str, cpu: &str, memory: &str) -> PodTemplateSpec {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), app.to_string());
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "app".to_string(),
                image: Some(DEFAULT_IMAGE.to_string()),
                resources: Some(requests(cpu, memory)),
                ..Default::default()
            }],
            ..Default::default()
        }),
    }
}

fn selector(app: &str) -> LabelSelector {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), app.to_string());
    LabelSelector {
        match_labels: Some(labels),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Pods
// ---------------------------------------------------------------------------

/// Start building a running, ready pod with one container
pub fn pod(namespace: &str, name: &str) -> PodBuilder {
    PodBuilder::new(namespace, name)
}

#[derive(Debug, Clone)]
pub struct PodBuilder {
    pod: Pod,
}

impl PodBuilder {
    pub fn new(namespace: &str, name: &str) -> Self {
        let age = 3600;
        let pod = Pod {
            metadata: meta(Some(namespace), name, age),
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "app".to_string(),
                    image: Some(DEFAULT_IMAGE.to_string()),
                    resources: Some(requests("100m", "128Mi")),
                    ..Default::default()
                }],
                node_name: Some("worker-1".to_string()),
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                start_time: Some(ago(age)),
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
                container_statuses: Some(vec![ContainerStatus {
                    name: "app".to_string(),
                    image: DEFAULT_IMAGE.to_string(),
                    ready: true,
                    started: Some(true),
                    restart_count: 0,
                    state: Some(ContainerState {
                        running: Some(ContainerStateRunning {
                            started_at: Some(ago(age)),
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
        };
        Self { pod }
    }

    fn status(&mut self) -> &mut PodStatus {
        self.pod.status.get_or_insert_with(Default::default)
    }

    fn spec(&mut self) -> &mut PodSpec {
        self.pod.spec.get_or_insert_with(Default::default)
    }

    fn first_container_status(&mut self) -> Option<&mut ContainerStatus> {
        self.status()
            .container_statuses
            .as_mut()
            .and_then(|statuses| statuses.first_mut())
    }

    /// Controller owner reference (`ReplicaSet`, `StatefulSet`, ...)
    pub fn owned_by(mut self, kind: &str, name: &str) -> Self {
        self.pod.metadata.owner_references = Some(vec![controller_ref(kind, name)]);
        self
    }

    /// Append another container to the pod spec
    pub fn container(mut self, name: &str, image: &str) -> Self {
        self.spec().containers.push(Container {
            name: name.to_string(),
            image: Some(image.to_string()),
            ..Default::default()
        });
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.pod
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn annotation(mut self, key: &str, value: &str) -> Self {
        self.pod
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn on_node(mut self, node: &str) -> Self {
        self.spec().node_name = Some(node.to_string());
        self
    }

    pub fn image(mut self, image: &str) -> Self {
        if let Some(container) = self.spec().containers.first_mut() {
            container.image = Some(image.to_string());
        }
        if let Some(status) = self.first_container_status() {
            status.image = image.to_string();
        }
        self
    }

    pub fn requests(mut self, cpu: &str, memory: &str) -> Self {
        if let Some(container) = self.spec().containers.first_mut() {
            container.resources = Some(requests(cpu, memory));
        }
        self
    }

    /// Creation and start time `seconds` in the past
    pub fn age_secs(mut self, seconds: i64) -> Self {
        self.pod.metadata.creation_timestamp = Some(ago(seconds));
        self.status().start_time = Some(ago(seconds));
        if let Some(status) = self.first_container_status() {
            if let Some(running) = status.state.as_mut().and_then(|s| s.running.as_mut()) {
                running.started_at = Some(ago(seconds));
            }
        }
        self
    }

    pub fn restarts(mut self, count: i32) -> Self {
        if let Some(status) = self.first_container_status() {
            status.restart_count = count;
        }
        self
    }

    /// Phase `Pending`, scheduled onto a node, containers not yet created
    pub fn pending(mut self) -> Self {
        let status = self.status();
        status.phase = Some("Pending".to_string());
        status.container_statuses = Some(vec![ContainerStatus {
            name: "app".to_string(),
            image: DEFAULT_IMAGE.to_string(),
            ready: false,
            state: Some(ContainerState {
                waiting: Some(ContainerStateWaiting {
                    reason: Some("ContainerCreating".to_string()),
                    message: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);
        self
    }

    /// Phase `Pending` without a node assignment
    pub fn unscheduled(mut self) -> Self {
        self = self.pending();
        self.spec().node_name = None;
        let status = self.status();
        status.start_time = None;
        status.conditions = Some(vec![PodCondition {
            type_: "PodScheduled".to_string(),
            status: "False".to_string(),
            reason: Some("Unschedulable".to_string()),
            ..Default::default()
        }]);
        self
    }

    /// First container waiting with `reason`, e.g. `CrashLoopBackOff`
    pub fn waiting(mut self, reason: &str) -> Self {
        if let Some(status) = self.first_container_status() {
            status.ready = false;
            status.state = Some(ContainerState {
                waiting: Some(ContainerStateWaiting {
                    reason: Some(reason.to_string()),
                    message: None,
                }),
                ..Default::default()
            });
        }
        self
    }

    /// First container running for `seconds` but failing its readiness probe
    pub fn not_ready_for(mut self, seconds: i64) -> Self {
        if let Some(status) = self.first_container_status() {
            status.ready = false;
            status.state = Some(ContainerState {
                running: Some(ContainerStateRunning {
                    started_at: Some(ago(seconds)),
                }),
                ..Default::default()
            });
        }
        self
    }

    /// Phase `Succeeded` with the first container terminated cleanly
    pub fn completed(mut self) -> Self {
        self.status().phase = Some("Succeeded".to_string());
        if let Some(status) = self.first_container_status() {
            status.ready = false;
            status.state = Some(ContainerState {
                terminated: Some(ContainerStateTerminated {
                    exit_code: 0,
                    reason: Some("Completed".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }
        self
    }

    /// Add an init container stuck waiting with `reason`
    pub fn init_waiting(mut self, reason: &str) -> Self {
        self.spec()
            .init_containers
            .get_or_insert_with(Vec::new)
            .push(Container {
                name: "init".to_string(),
                image: Some("busybox:1.36".to_string()),
                ..Default::default()
            });
        let status = self.status();
        status.phase = Some("Pending".to_string());
        status.init_container_statuses = Some(vec![ContainerStatus {
            name: "init".to_string(),
            image: "busybox:1.36".to_string(),
            ready: false,
            state: Some(ContainerState {
                waiting: Some(ContainerStateWaiting {
                    reason: Some(reason.to_string()),
                    message: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);
        self
    }

    pub fn build(self) -> Pod {
        self.pod
    }
}

// ---------------------------------------------------------------------------
// Deployments and replica sets
// ---------------------------------------------------------------------------

/// Start building an available deployment with `replicas` ready pods
pub fn deployment(namespace: &str, name: &str, replicas: i32) -> DeploymentBuilder {
    DeploymentBuilder::new(namespace, name, replicas)
}

#[derive(Debug, Clone)]
pub struct DeploymentBuilder {
    deployment: Deployment,
}

impl DeploymentBuilder {
    pub fn new(namespace: &str, name: &str, replicas: i32) -> Self {
        let deployment = Deployment {
            metadata: meta(Some(namespace), name, 86_400),
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                selector: selector(name),
                template: pod_template(name, "100m", "128Mi"),
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                replicas: Some(replicas),
                ready_replicas: Some(replicas),
                available_replicas: Some(replicas),
                updated_replicas: Some(replicas),
                conditions: Some(vec![DeploymentCondition {
                    type_: "Available".to_string(),
                    status: "True".to_string(),
                    reason: Some("MinimumReplicasAvailable".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
        };
        Self { deployment }
    }

    /// Observed availability lagging behind the desired count
    pub fn available(mut self, available: i32) -> Self {
        let status = self.deployment.status.get_or_insert_with(Default::default);
        status.ready_replicas = Some(available);
        status.available_replicas = Some(available);
        let desired = self
            .deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1);
        if available < desired {
            status.conditions = Some(vec![DeploymentCondition {
                type_: "Progressing".to_string(),
                status: "True".to_string(),
                reason: Some("ReplicaSetUpdated".to_string()),
                ..Default::default()
            }]);
        }
        self
    }

    pub fn requests(mut self, cpu: &str, memory: &str) -> Self {
        if let Some(spec) = self.deployment.spec.as_mut() {
            spec.template = pod_template(
                self.deployment.metadata.name.as_deref().unwrap_or("app"),
                cpu,
                memory,
            );
        }
        self
    }

    pub fn annotation(mut self, key: &str, value: &str) -> Self {
        self.deployment
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn age_secs(mut self, seconds: i64) -> Self {
        self.deployment.metadata.creation_timestamp = Some(ago(seconds));
        self
    }

    pub fn build(self) -> Deployment {
        self.deployment
    }
}

/// Replica set controlled by `deployment`
pub fn replica_set(namespace: &str, name: &str, deployment: &str, replicas: i32) -> ReplicaSet {
    let mut metadata = meta(Some(namespace), name, 86_400);
    metadata.owner_references = Some(vec![controller_ref("Deployment", deployment)]);
    ReplicaSet {
        metadata,
        spec: Some(ReplicaSetSpec {
            replicas: Some(replicas),
            selector: selector(deployment),
            template: Some(pod_template(deployment, "100m", "128Mi")),
            ..Default::default()
        }),
        status: Some(ReplicaSetStatus {
            replicas,
            ready_replicas: Some(replicas),
            available_replicas: Some(replicas),
            ..Default::default()
        }),
    }
}

// ---------------------------------------------------------------------------
// Cluster-scoped objects and services
// ---------------------------------------------------------------------------

/// Start building a ready worker node
pub fn node(name: &str) -> NodeBuilder {
    NodeBuilder::new(name)
}

#[derive(Debug, Clone)]
pub struct NodeBuilder {
    node: Node,
}

impl NodeBuilder {
    pub fn new(name: &str) -> Self {
        let mut node = Node {
            metadata: meta(None, name, 30 * 86_400),
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: "True".to_string(),
                    reason: Some("KubeletReady".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        node.metadata.labels = Some(BTreeMap::from([(
            "kubernetes.io/hostname".to_string(),
            name.to_string(),
        )]));
        Self { node }.capacity("4", "8Gi")
    }

    /// Capacity with allocatable slightly lower, as the kubelet reserves some
    pub fn capacity(mut self, cpu: &str, memory: &str) -> Self {
        let status = self.node.status.get_or_insert_with(Default::default);
        let capacity = BTreeMap::from([
            ("cpu".to_string(), Quantity(cpu.to_string())),
            ("memory".to_string(), Quantity(memory.to_string())),
            ("pods".to_string(), Quantity("110".to_string())),
        ]);
        status.allocatable = Some(capacity.clone());
        status.capacity = Some(capacity);
        self
    }

    pub fn allocatable(mut self, cpu: &str, memory: &str) -> Self {
        let status = self.node.status.get_or_insert_with(Default::default);
        status.allocatable = Some(BTreeMap::from([
            ("cpu".to_string(), Quantity(cpu.to_string())),
            ("memory".to_string(), Quantity(memory.to_string())),
        ]));
        self
    }

    pub fn control_plane(mut self) -> Self {
        self.node
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(
                "node-role.kubernetes.io/control-plane".to_string(),
                String::new(),
            );
        self
    }

    pub fn not_ready(mut self) -> Self {
        let status = self.node.status.get_or_insert_with(Default::default);
        status.conditions = Some(vec![NodeCondition {
            type_: "Ready".to_string(),
            status: "False".to_string(),
            reason: Some("KubeletNotReady".to_string()),
            ..Default::default()
        }]);
        self
    }

    pub fn build(self) -> Node {
        self.node
    }
}

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: meta(None, name, 30 * 86_400),
        status: Some(NamespaceStatus {
            phase: Some("Active".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Service of `service_type` exposing `ports` as `(port, node_port, protocol)`
pub fn service(
    namespace: &str,
    name: &str,
    service_type: &str,
    cluster_ip: &str,
    ports: &[(i32, Option<i32>, &str)],
) -> Service {
    let ports = ports
        .iter()
        .map(|(port, node_port, protocol)| ServicePort {
            port: *port,
            node_port: *node_port,
            protocol: Some(protocol.to_string()),
            ..Default::default()
        })
        .collect();

    Service {
        metadata: meta(Some(namespace), name, 30 * 86_400),
        spec: Some(ServiceSpec {
            type_: Some(service_type.to_string()),
            cluster_ip: Some(cluster_ip.to_string()),
            ports: Some(ports),
            ..Default::default()
        }),
        status: Some(ServiceStatus::default()),
    }
}

/// Mark a LoadBalancer service as provisioned with an ingress IP
pub fn with_ingress_ip(mut service: Service, ip: &str) -> Service {
    service.status = Some(ServiceStatus {
        load_balancer: Some(LoadBalancerStatus {
            ingress: Some(vec![LoadBalancerIngress {
                ip: Some(ip.to_string()),
                ..Default::default()
            }]),
        }),
        ..Default::default()
    });
    service
}
