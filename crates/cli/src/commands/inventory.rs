//! `get` commands listing cluster objects

use anyhow::Result;
use dashboard_lib::{DeploymentView, NamespaceView, NodeView, PodView, ServiceView};
use tabled::Tabled;

use crate::backend::Backend;
use crate::output::{color_status, print_json, print_rows, yes_no, OutputFormat};

/// Object kinds `kdash get` can list
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Resource {
    Nodes,
    Namespaces,
    Pods,
    Deployments,
    Services,
}

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Age")]
    age: String,
}

impl From<&NodeView> for NodeRow {
    fn from(n: &NodeView) -> Self {
        Self {
            name: n.name.clone(),
            status: color_status(&n.status),
            role: n.role.clone(),
            cpu: n.cpu.clone(),
            memory: n.memory.clone(),
            age: n.age.clone(),
        }
    }
}

#[derive(Tabled)]
struct NamespaceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Pods")]
    pods: usize,
    #[tabled(rename = "Services")]
    services: usize,
    #[tabled(rename = "Age")]
    age: String,
}

impl From<&NamespaceView> for NamespaceRow {
    fn from(n: &NamespaceView) -> Self {
        Self {
            name: n.name.clone(),
            status: color_status(&n.status),
            pods: n.pods,
            services: n.services,
            age: n.age.clone(),
        }
    }
}

#[derive(Tabled)]
struct PodRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Ready")]
    ready: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Restarts")]
    restarts: i32,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Age")]
    age: String,
}

impl From<&PodView> for PodRow {
    fn from(p: &PodView) -> Self {
        Self {
            namespace: p.namespace.clone(),
            name: p.name.clone(),
            ready: p.ready.clone(),
            status: color_status(&p.status),
            restarts: p.restarts,
            node: p.node.clone().unwrap_or_else(|| "<none>".to_string()),
            age: p.age.clone(),
        }
    }
}

#[derive(Tabled)]
struct DeploymentRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Ready")]
    replicas: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Paused")]
    paused: String,
    #[tabled(rename = "Age")]
    age: String,
}

impl From<&DeploymentView> for DeploymentRow {
    fn from(d: &DeploymentView) -> Self {
        Self {
            namespace: d.namespace.clone(),
            name: d.name.clone(),
            replicas: d.replicas.clone(),
            status: color_status(&d.status),
            paused: yes_no(d.paused),
            age: d.age.clone(),
        }
    }
}

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    service_type: String,
    #[tabled(rename = "Cluster IP")]
    cluster_ip: String,
    #[tabled(rename = "External IP")]
    external_ip: String,
    #[tabled(rename = "Ports")]
    ports: String,
    #[tabled(rename = "Age")]
    age: String,
}

impl From<&ServiceView> for ServiceRow {
    fn from(s: &ServiceView) -> Self {
        Self {
            namespace: s.namespace.clone(),
            name: s.name.clone(),
            service_type: s.service_type.clone(),
            cluster_ip: s.cluster_ip.clone(),
            external_ip: s.external_ip.clone(),
            ports: s.ports.clone(),
            age: s.age.clone(),
        }
    }
}

fn in_namespace(namespace: Option<&str>, object_namespace: &str) -> bool {
    namespace.map_or(true, |ns| ns == object_namespace)
}

/// List one kind of object, optionally restricted to a namespace
pub async fn get(
    backend: &Backend,
    resource: Resource,
    namespace: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let snapshot = backend.overview().await?.snapshot;

    match resource {
        Resource::Nodes => {
            let nodes = snapshot.nodes;
            match format {
                OutputFormat::Json => print_json(&nodes)?,
                OutputFormat::Table => {
                    print_rows(nodes.iter().map(NodeRow::from).collect(), "No nodes found")
                }
            }
        }
        Resource::Namespaces => {
            let namespaces = snapshot.namespaces;
            match format {
                OutputFormat::Json => print_json(&namespaces)?,
                OutputFormat::Table => print_rows(
                    namespaces.iter().map(NamespaceRow::from).collect(),
                    "No namespaces found",
                ),
            }
        }
        Resource::Pods => {
            let pods: Vec<_> = snapshot
                .pods
                .into_iter()
                .filter(|p| in_namespace(namespace, &p.namespace))
                .collect();
            match format {
                OutputFormat::Json => print_json(&pods)?,
                OutputFormat::Table => {
                    print_rows(pods.iter().map(PodRow::from).collect(), "No pods found")
                }
            }
        }
        Resource::Deployments => {
            let deployments: Vec<_> = snapshot
                .deployments
                .into_iter()
                .filter(|d| in_namespace(namespace, &d.namespace))
                .collect();
            match format {
                OutputFormat::Json => print_json(&deployments)?,
                OutputFormat::Table => print_rows(
                    deployments.iter().map(DeploymentRow::from).collect(),
                    "No deployments found",
                ),
            }
        }
        Resource::Services => {
            let services: Vec<_> = snapshot
                .services
                .into_iter()
                .filter(|s| in_namespace(namespace, &s.namespace))
                .collect();
            match format {
                OutputFormat::Json => print_json(&services)?,
                OutputFormat::Table => print_rows(
                    services.iter().map(ServiceRow::from).collect(),
                    "No services found",
                ),
            }
        }
    }

    Ok(())
}
