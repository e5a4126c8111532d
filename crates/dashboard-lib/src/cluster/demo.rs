//! Seed inventory for demo mode

use super::fixtures::{self, deployment, namespace, node, pod, replica_set, service};
use super::{ClusterBuilder, InMemoryCluster};

const DAY: i64 = 86_400;

impl InMemoryCluster {
    /// A small production-like cluster: three control-plane nodes (one
    /// NotReady), two workers, system and application namespaces,
    /// deployments with replica-set chains, a bare pod, unhealthy pods and
    /// one service of each type.
    pub fn demo() -> Self {
        let mut builder = InMemoryCluster::builder()
            .node(node("kube-master-1").control_plane().capacity("4", "8Gi").build())
            .node(node("kube-master-2").control_plane().capacity("4", "8Gi").build())
            .node(
                node("kube-master-3")
                    .control_plane()
                    .capacity("4", "8Gi")
                    .not_ready()
                    .build(),
            )
            .node(
                node("kube-worker-1")
                    .capacity("8", "16Gi")
                    .allocatable("7800m", "15Gi")
                    .build(),
            )
            .node(
                node("kube-worker-2")
                    .capacity("8", "16Gi")
                    .allocatable("7800m", "15Gi")
                    .build(),
            );

        for ns in ["default", "kube-system", "kube-public", "nginx", "prod", "datadog"] {
            builder = builder.namespace(namespace(ns));
        }

        builder = seed_workload(builder, "kube-system", "coredns", "668d6bf9bc", 2, "100m", "70Mi", 18 * DAY);
        builder = seed_workload(builder, "kube-system", "metrics-server", "59988764cc", 1, "100m", "200Mi", 11 * 3600);
        builder = seed_workload(builder, "nginx", "nginx", "5fff689cfc", 1, "100m", "64Mi", 2 * DAY);
        builder = seed_workload(builder, "prod", "app", "7c5d8f9b6d", 3, "200m", "256Mi", 18 * DAY);
        builder = seed_workload(builder, "prod", "db", "6f7c9d8e5a", 2, "500m", "1Gi", 18 * DAY);
        builder = seed_workload(builder, "prod", "cache", "84b6c7d9f1", 2, "300m", "512Mi", 18 * DAY);

        // Rollout stuck behind an image that never pulls
        builder = builder
            .deployment(
                deployment("datadog", "datadog", 2)
                    .available(0)
                    .requests("200m", "256Mi")
                    .age_secs(600)
                    .build(),
            )
            .replica_set(replica_set("datadog", "datadog-6b7f9c", "datadog", 2))
            .pod(
                pod("datadog", "datadog-6b7f9c-5qglw")
                    .owned_by("ReplicaSet", "datadog-6b7f9c")
                    .requests("200m", "256Mi")
                    .on_node("kube-worker-1")
                    .age_secs(600)
                    .pending()
                    .build(),
            )
            .pod(
                pod("datadog", "datadog-6b7f9c-h8wbx")
                    .owned_by("ReplicaSet", "datadog-6b7f9c")
                    .requests("200m", "256Mi")
                    .on_node("kube-worker-2")
                    .age_secs(600)
                    .waiting("ImagePullBackOff")
                    .build(),
            );

        // Bare pod with no controller
        builder = builder.pod(
            pod("prod", "monitoring")
                .requests("200m", "256Mi")
                .on_node("kube-worker-2")
                .age_secs(18 * DAY)
                .build(),
        );

        // Static control-plane pods, one of them restarting a lot
        builder = builder
            .pod(
                pod("kube-system", "kube-apiserver-kube-master-1")
                    .owned_by("Node", "kube-master-1")
                    .requests("500m", "512Mi")
                    .on_node("kube-master-1")
                    .age_secs(18 * DAY)
                    .restarts(13)
                    .build(),
            )
            .pod(
                pod("kube-system", "etcd-kube-master-1")
                    .owned_by("Node", "kube-master-1")
                    .requests("200m", "256Mi")
                    .on_node("kube-master-1")
                    .age_secs(18 * DAY)
                    .restarts(6)
                    .build(),
            )
            .pod(
                pod("default", "migrate-schema")
                    .requests("100m", "64Mi")
                    .init_waiting("CrashLoopBackOff")
                    .age_secs(900)
                    .build(),
            );

        builder
            .service(service("default", "kubernetes", "ClusterIP", "10.96.0.1", &[(443, None, "TCP")]))
            .service(service(
                "kube-system",
                "kube-dns",
                "ClusterIP",
                "10.96.0.10",
                &[(53, None, "UDP"), (53, None, "TCP"), (9153, None, "TCP")],
            ))
            .service(service(
                "nginx",
                "nginx",
                "NodePort",
                "10.108.47.222",
                &[(80, Some(30080), "TCP")],
            ))
            .service(fixtures::with_ingress_ip(
                service("prod", "app", "LoadBalancer", "10.100.12.7", &[(443, Some(31443), "TCP")]),
                "203.0.113.10",
            ))
            .service(service(
                "datadog",
                "datadog-agent",
                "LoadBalancer",
                "10.105.36.154",
                &[(8125, Some(31125), "UDP")],
            ))
            .build()
    }
}

/// Deployment `name` with its replica set and `replicas` running pods
#[allow(clippy::too_many_arguments)]
fn seed_workload(
    builder: ClusterBuilder,
    namespace: &str,
    name: &str,
    hash: &str,
    replicas: i32,
    cpu: &str,
    memory: &str,
    age_secs: i64,
) -> ClusterBuilder {
    let rs_name = format!("{name}-{hash}");
    let mut builder = builder
        .deployment(
            deployment(namespace, name, replicas)
                .requests(cpu, memory)
                .age_secs(age_secs)
                .build(),
        )
        .replica_set(replica_set(namespace, &rs_name, name, replicas));

    for i in 0..replicas {
        builder = builder.pod(
            pod(namespace, &format!("{rs_name}-{:05x}", 0xa11 + i))
                .owned_by("ReplicaSet", &rs_name)
                .requests(cpu, memory)
                .on_node(if i % 2 == 0 { "kube-worker-1" } else { "kube-worker-2" })
                .age_secs(age_secs)
                .build(),
        );
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterApi;

    #[tokio::test]
    async fn test_demo_inventory_has_every_kind() {
        let cluster = InMemoryCluster::demo();
        assert_eq!(cluster.list_nodes().await.unwrap().len(), 5);
        assert!(cluster.list_namespaces().await.unwrap().len() >= 5);
        assert!(!cluster.list_services(None).await.unwrap().is_empty());

        let rs = cluster.get_replica_set("prod", "app-7c5d8f9b6d").await.unwrap();
        assert_eq!(rs.metadata.owner_references.unwrap()[0].name, "app");
        assert!(cluster.get_pod("prod", "monitoring").await.is_ok());
    }
}
