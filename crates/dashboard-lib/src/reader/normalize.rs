//! Native object to display-schema conversion

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ContainerStatus, Namespace, Node, Pod, Service};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use tracing::debug;

use crate::cluster::annotations;
use crate::models::{
    ContainerStateKind, ContainerView, DeploymentView, NamespaceView, NodeView, PodView,
    ServiceView,
};
use crate::quantity;

/// `{d}d`, `{h}h` or `{m}m` since `created`; `Unknown` without a timestamp
pub fn format_age(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created) = created else {
        return "Unknown".to_string();
    };
    let elapsed = now.signed_duration_since(created);
    if elapsed.num_days() > 0 {
        format!("{}d", elapsed.num_days())
    } else if elapsed.num_hours() > 0 {
        format!("{}h", elapsed.num_hours())
    } else {
        format!("{}m", elapsed.num_minutes().max(0))
    }
}

fn cpu_of(quantities: Option<&BTreeMap<String, Quantity>>) -> f64 {
    quantities
        .and_then(|q| q.get("cpu"))
        .map(|q| {
            quantity::parse_cpu(&q.0).unwrap_or_else(|e| {
                debug!(error = %e, "Treating unparseable CPU quantity as zero");
                0.0
            })
        })
        .unwrap_or(0.0)
}

fn memory_of(quantities: Option<&BTreeMap<String, Quantity>>) -> f64 {
    quantities
        .and_then(|q| q.get("memory"))
        .map(|q| {
            quantity::parse_memory_mib(&q.0).unwrap_or_else(|e| {
                debug!(error = %e, "Treating unparseable memory quantity as zero");
                0.0
            })
        })
        .unwrap_or(0.0)
}

pub fn normalize_node(node: &Node, now: DateTime<Utc>) -> NodeView {
    let is_control_plane = node
        .metadata
        .labels
        .as_ref()
        .map(|labels| {
            labels.keys().any(|k| {
                k == "node-role.kubernetes.io/master"
                    || k == "node-role.kubernetes.io/control-plane"
            })
        })
        .unwrap_or(false);

    let status = node
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|c| c.type_ == "Ready"))
        .map(|c| if c.status == "True" { "Ready" } else { "NotReady" })
        .unwrap_or("Unknown");

    let capacity = node.status.as_ref().and_then(|s| s.capacity.as_ref());
    let allocatable = node
        .status
        .as_ref()
        .and_then(|s| s.allocatable.as_ref())
        .or(capacity);

    let cpu_capacity = cpu_of(capacity);
    let memory_capacity = memory_of(capacity);

    NodeView {
        name: node.metadata.name.clone().unwrap_or_default(),
        status: status.to_string(),
        role: if is_control_plane { "master" } else { "worker" }.to_string(),
        cpu: quantity::format_cpu(cpu_capacity),
        memory: quantity::format_memory(memory_capacity),
        cpu_capacity_cores: cpu_capacity,
        cpu_allocatable_cores: cpu_of(allocatable),
        memory_capacity_mib: memory_capacity,
        memory_allocatable_mib: memory_of(allocatable),
        age: format_age(node.metadata.creation_timestamp.as_ref().map(|t| t.0), now),
    }
}

/// Pod and service counts come from the already-listed inventory
pub fn normalize_namespace(
    namespace: &Namespace,
    pod_counts: &HashMap<String, usize>,
    service_counts: &HashMap<String, usize>,
    now: DateTime<Utc>,
) -> NamespaceView {
    let name = namespace.metadata.name.clone().unwrap_or_default();
    NamespaceView {
        status: namespace
            .status
            .as_ref()
            .and_then(|s| s.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        age: format_age(namespace.metadata.creation_timestamp.as_ref().map(|t| t.0), now),
        pods: pod_counts.get(&name).copied().unwrap_or(0),
        services: service_counts.get(&name).copied().unwrap_or(0),
        name,
    }
}

fn container_view(status: &ContainerStatus) -> ContainerView {
    let mut view = ContainerView {
        name: status.name.clone(),
        ready: status.ready,
        restart_count: status.restart_count,
        state: ContainerStateKind::Unknown,
        reason: None,
        started_at: None,
        exit_code: None,
    };

    if let Some(state) = status.state.as_ref() {
        if let Some(running) = state.running.as_ref() {
            view.state = ContainerStateKind::Running;
            view.started_at = running.started_at.as_ref().map(|t| t.0);
        } else if let Some(waiting) = state.waiting.as_ref() {
            view.state = ContainerStateKind::Waiting;
            view.reason = waiting.reason.clone();
        } else if let Some(terminated) = state.terminated.as_ref() {
            view.state = ContainerStateKind::Terminated;
            view.reason = terminated.reason.clone();
            view.exit_code = Some(terminated.exit_code);
        }
    }
    view
}

/// True when the dashboard stopped this pod in place
pub fn pod_marked_paused(pod: &Pod) -> bool {
    let labelled = pod
        .metadata
        .labels
        .as_ref()
        .and_then(|l| l.get(annotations::STATUS_LABEL))
        .map(|v| v == annotations::STATUS_PAUSED)
        .unwrap_or(false);
    let annotated = pod
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(annotations::PAUSED))
        .map(|v| v == "true")
        .unwrap_or(false);
    labelled || annotated
}

pub fn normalize_pod(pod: &Pod, now: DateTime<Utc>) -> PodView {
    let status = pod.status.as_ref();
    let phase = status
        .and_then(|s| s.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let containers: Vec<ContainerView> = status
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| statuses.iter().map(container_view).collect())
        .unwrap_or_default();
    let init_containers: Vec<ContainerView> = status
        .and_then(|s| s.init_container_statuses.as_ref())
        .map(|statuses| statuses.iter().map(container_view).collect())
        .unwrap_or_default();

    let total = pod
        .spec
        .as_ref()
        .map(|s| s.containers.len())
        .unwrap_or(containers.len());
    let ready = containers.iter().filter(|c| c.ready).count();
    let restarts = containers.iter().map(|c| c.restart_count).sum();

    let (cpu_request, memory_request) = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers.iter().fold((0.0, 0.0), |(cpu, mem), c| {
                let requests = c.resources.as_ref().and_then(|r| r.requests.as_ref());
                (cpu + cpu_of(requests), mem + memory_of(requests))
            })
        })
        .unwrap_or((0.0, 0.0));

    let node = pod.spec.as_ref().and_then(|s| s.node_name.clone());
    let scheduled = status
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|c| c.type_ == "PodScheduled"))
        .map(|c| c.status == "True")
        .unwrap_or(node.is_some());

    let owner = pod
        .metadata
        .owner_references
        .as_ref()
        .and_then(|refs| refs.iter().find(|r| r.controller == Some(true)).or(refs.first()));

    let display_status = if pod_marked_paused(pod) {
        "Paused".to_string()
    } else {
        phase.clone()
    };

    PodView {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        status: display_status,
        phase,
        ready: format!("{ready}/{total}"),
        restarts,
        age: format_age(pod.metadata.creation_timestamp.as_ref().map(|t| t.0), now),
        cpu: quantity::format_cpu(cpu_request),
        memory: quantity::format_memory(memory_request),
        cpu_request_cores: cpu_request,
        memory_request_mib: memory_request,
        node,
        owner_kind: owner.map(|o| o.kind.clone()),
        owner_name: owner.map(|o| o.name.clone()),
        containers,
        init_containers,
        start_time: status.and_then(|s| s.start_time.as_ref()).map(|t| t.0),
        scheduled,
    }
}

/// True when the dashboard's mirror annotation or `spec.paused` is set
pub fn deployment_marked_paused(deployment: &Deployment) -> bool {
    let annotated = deployment
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(annotations::PAUSED))
        .map(|v| v == "true")
        .unwrap_or(false);
    let native = deployment
        .spec
        .as_ref()
        .and_then(|s| s.paused)
        .unwrap_or(false);
    annotated || native
}

fn deployment_condition_status(deployment: &Deployment) -> &'static str {
    let conditions = deployment
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref());
    let Some(conditions) = conditions else {
        return "Unknown";
    };

    let is = |type_: &str, status: &str| {
        conditions
            .iter()
            .any(|c| c.type_ == type_ && c.status == status)
    };
    let deadline_exceeded = conditions.iter().any(|c| {
        c.type_ == "Progressing" && c.reason.as_deref() == Some("ProgressDeadlineExceeded")
    });

    if is("ReplicaFailure", "True") || deadline_exceeded {
        "Failed"
    } else if is("Available", "True") {
        "Available"
    } else if is("Progressing", "True") {
        "Progressing"
    } else {
        "Unknown"
    }
}

pub fn normalize_deployment(deployment: &Deployment, now: DateTime<Utc>) -> DeploymentView {
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let status = deployment.status.as_ref();
    let ready = status.and_then(|s| s.ready_replicas).unwrap_or(0);
    let available = status.and_then(|s| s.available_replicas).unwrap_or(0);
    let paused = deployment_marked_paused(deployment);

    DeploymentView {
        name: deployment.metadata.name.clone().unwrap_or_default(),
        namespace: deployment.metadata.namespace.clone().unwrap_or_default(),
        replicas: format!("{ready}/{desired}"),
        desired,
        ready,
        available,
        age: format_age(deployment.metadata.creation_timestamp.as_ref().map(|t| t.0), now),
        status: if paused {
            "Paused".to_string()
        } else {
            deployment_condition_status(deployment).to_string()
        },
        paused,
    }
}

pub fn normalize_service(service: &Service, now: DateTime<Utc>) -> ServiceView {
    let spec = service.spec.as_ref();
    let service_type = spec
        .and_then(|s| s.type_.clone())
        .unwrap_or_else(|| "ClusterIP".to_string());

    let ingress = service
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .and_then(|ingress| ingress.first());
    let external_ip = match ingress {
        Some(entry) => entry
            .ip
            .clone()
            .or_else(|| entry.hostname.clone())
            .unwrap_or_else(|| "<pending>".to_string()),
        None if service_type == "LoadBalancer" => "<pending>".to_string(),
        None => "None".to_string(),
    };

    let ports = spec
        .and_then(|s| s.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .map(|p| {
                    let mut out = p.port.to_string();
                    if let Some(node_port) = p.node_port {
                        out.push_str(&format!(":{node_port}"));
                    }
                    if let Some(protocol) = p.protocol.as_deref() {
                        out.push_str(&format!("/{protocol}"));
                    }
                    out
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();

    ServiceView {
        name: service.metadata.name.clone().unwrap_or_default(),
        namespace: service.metadata.namespace.clone().unwrap_or_default(),
        service_type,
        cluster_ip: spec
            .and_then(|s| s.cluster_ip.clone())
            .unwrap_or_else(|| "None".to_string()),
        external_ip,
        ports,
        age: format_age(service.metadata.creation_timestamp.as_ref().map(|t| t.0), now),
    }
}
