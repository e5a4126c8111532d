//! Normalization tests against fixture objects

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};

use super::*;
use crate::cluster::{annotations, fixtures, InMemoryCluster};
use crate::models::ContainerStateKind;

#[test]
fn test_format_age_buckets() {
    let now = Utc::now();
    assert_eq!(format_age(Some(now - Duration::days(3)), now), "3d");
    assert_eq!(format_age(Some(now - Duration::hours(5)), now), "5h");
    assert_eq!(format_age(Some(now - Duration::minutes(42)), now), "42m");
    assert_eq!(format_age(Some(now - Duration::seconds(20)), now), "0m");
    assert_eq!(format_age(None, now), "Unknown");
}

#[test]
fn test_node_role_and_status() {
    let now = Utc::now();
    let master = normalize_node(
        &fixtures::node("m1").control_plane().capacity("4", "8Gi").build(),
        now,
    );
    assert_eq!(master.role, "master");
    assert_eq!(master.status, "Ready");
    assert_eq!(master.cpu, "4");
    assert_eq!(master.memory, "8Gi");
    assert!((master.memory_capacity_mib - 8192.0).abs() < 1e-9);

    let worker = normalize_node(&fixtures::node("w1").not_ready().build(), now);
    assert_eq!(worker.role, "worker");
    assert_eq!(worker.status, "NotReady");
}

#[test]
fn test_node_without_conditions_is_unknown() {
    let mut node = fixtures::node("w1").build();
    if let Some(status) = node.status.as_mut() {
        status.conditions = None;
    }
    assert_eq!(normalize_node(&node, Utc::now()).status, "Unknown");
}

#[test]
fn test_pod_fields() {
    let pod = fixtures::pod("prod", "app-abc")
        .owned_by("ReplicaSet", "app-7d9f")
        .requests("250m", "512Mi")
        .restarts(2)
        .build();
    let view = normalize_pod(&pod, Utc::now());

    assert_eq!(view.status, "Running");
    assert_eq!(view.ready, "1/1");
    assert_eq!(view.restarts, 2);
    assert_eq!(view.cpu, "250m");
    assert_eq!(view.memory, "512Mi");
    assert_eq!(view.owner_kind.as_deref(), Some("ReplicaSet"));
    assert_eq!(view.owner_name.as_deref(), Some("app-7d9f"));
    assert_eq!(view.containers[0].state, ContainerStateKind::Running);
    assert!(view.scheduled);
}

#[test]
fn test_paused_label_overrides_phase() {
    let pod = fixtures::pod("default", "standalone-1")
        .label(annotations::STATUS_LABEL, annotations::STATUS_PAUSED)
        .build();
    let view = normalize_pod(&pod, Utc::now());
    assert_eq!(view.status, "Paused");
    assert_eq!(view.phase, "Running");
}

#[test]
fn test_waiting_and_init_container_state() {
    let pod = fixtures::pod("default", "broken")
        .waiting("CrashLoopBackOff")
        .init_waiting("ImagePullBackOff")
        .build();
    let view = normalize_pod(&pod, Utc::now());

    assert_eq!(view.ready, "0/1");
    assert_eq!(view.containers[0].state, ContainerStateKind::Waiting);
    assert_eq!(view.containers[0].reason.as_deref(), Some("CrashLoopBackOff"));
    assert_eq!(
        view.init_containers[0].reason.as_deref(),
        Some("ImagePullBackOff")
    );
}

#[test]
fn test_unparseable_request_counts_as_zero() {
    let pod = fixtures::pod("default", "odd").requests("lots", "128Mi").build();
    let view = normalize_pod(&pod, Utc::now());
    assert_eq!(view.cpu_request_cores, 0.0);
    assert!((view.memory_request_mib - 128.0).abs() < 1e-9);
}

#[test]
fn test_deployment_status_derivation() {
    let now = Utc::now();

    let available = normalize_deployment(&fixtures::deployment("prod", "app", 3).build(), now);
    assert_eq!(available.status, "Available");
    assert_eq!(available.replicas, "3/3");

    let progressing =
        normalize_deployment(&fixtures::deployment("prod", "app", 3).available(1).build(), now);
    assert_eq!(progressing.status, "Progressing");
    assert_eq!(progressing.replicas, "1/3");

    let paused = normalize_deployment(
        &fixtures::deployment("prod", "app", 0)
            .annotation(annotations::PAUSED, "true")
            .build(),
        now,
    );
    assert_eq!(paused.status, "Paused");
    assert!(paused.paused);
}

#[test]
fn test_service_external_ip_and_ports() {
    let now = Utc::now();

    let node_port = normalize_service(
        &fixtures::service("nginx", "nginx", "NodePort", "10.0.0.5", &[(80, Some(30080), "TCP")]),
        now,
    );
    assert_eq!(node_port.external_ip, "None");
    assert_eq!(node_port.ports, "80:30080/TCP");

    let pending = normalize_service(
        &fixtures::service(
            "prod",
            "lb",
            "LoadBalancer",
            "10.0.0.6",
            &[(53, None, "UDP"), (53, None, "TCP")],
        ),
        now,
    );
    assert_eq!(pending.external_ip, "<pending>");
    assert_eq!(pending.ports, "53/UDP, 53/TCP");

    let provisioned = normalize_service(
        &fixtures::with_ingress_ip(
            fixtures::service("prod", "lb", "LoadBalancer", "10.0.0.6", &[(443, None, "TCP")]),
            "203.0.113.10",
        ),
        now,
    );
    assert_eq!(provisioned.external_ip, "203.0.113.10");
}

#[test]
fn test_namespace_counts() {
    let mut pods = HashMap::new();
    pods.insert("prod".to_string(), 4);
    let services = HashMap::new();

    let view = normalize_namespace(&fixtures::namespace("prod"), &pods, &services, Utc::now());
    assert_eq!(view.status, "Active");
    assert_eq!(view.pods, 4);
    assert_eq!(view.services, 0);
}

#[tokio::test]
async fn test_snapshot_from_demo_cluster() {
    let reader = ClusterReader::new(Arc::new(InMemoryCluster::demo()));
    let snapshot = reader.snapshot().await.unwrap();

    assert_eq!(snapshot.nodes.len(), 5);
    let prod = snapshot
        .namespaces
        .iter()
        .find(|ns| ns.name == "prod")
        .unwrap();
    let prod_pods = snapshot.pods.iter().filter(|p| p.namespace == "prod").count();
    assert_eq!(prod.pods, prod_pods);
    assert!(snapshot.deployments.iter().any(|d| d.name == "app"));
}

#[tokio::test]
async fn test_snapshot_propagates_list_failure() {
    let cluster = InMemoryCluster::demo();
    cluster
        .fail_next(
            crate::cluster::Operation::List,
            crate::error::ClusterError::Forbidden("nodes is forbidden".into()),
        )
        .await;

    let reader = ClusterReader::new(Arc::new(cluster));
    let err = reader.snapshot().await.unwrap_err();
    assert!(matches!(err, crate::error::ClusterError::Forbidden(_)));
}
