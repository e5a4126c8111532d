//! Pause/resume scenarios against the in-memory cluster

use std::sync::Arc;

use crate::cluster::{
    annotations, fixtures, Capabilities, ClusterApi, ConvergenceMode, InMemoryCluster, Operation,
    Signal,
};
use crate::error::{ClusterError, ErrorKind};
use crate::store::{
    FileStateStore, MemoryStateStore, PauseMechanism, PauseRecord, WorkloadId, WorkloadKind,
    WorkloadStateStore,
};

use super::*;

struct Harness {
    cluster: InMemoryCluster,
    store: MemoryStateStore,
    controller: PauseController,
}

fn harness_with(cluster: InMemoryCluster, config: ControllerConfig) -> Harness {
    let store = MemoryStateStore::new();
    let controller = PauseController::new(
        Arc::new(cluster.clone()),
        Arc::new(store.clone()),
        config,
    );
    Harness {
        cluster,
        store,
        controller,
    }
}

fn harness(cluster: InMemoryCluster) -> Harness {
    harness_with(cluster, ControllerConfig::default())
}

/// `prod/app` at 3 replicas, managed through `app-rs`
fn prod_app() -> InMemoryCluster {
    InMemoryCluster::builder()
        .deployment(fixtures::deployment("prod", "app", 3).build())
        .replica_set(fixtures::replica_set("prod", "app-rs", "app", 3))
        .pod(fixtures::pod("prod", "app-rs-abcde").owned_by("ReplicaSet", "app-rs").build())
        .build()
}

fn id(namespace: &str, name: &str) -> WorkloadId {
    WorkloadId::new(namespace, name)
}

mod deployment_tests {
    use super::*;

    #[tokio::test]
    async fn test_pause_then_resume_restores_replicas() {
        let h = harness(prod_app());

        let paused = h.controller.pause(&WorkloadRef::new("prod", "app")).await.unwrap();
        assert!(paused.mutated);
        assert_eq!(paused.previous_replicas, Some(3));
        assert_eq!(paused.replicas, Some(0));
        assert_eq!(h.cluster.deployment_replicas("prod", "app").await, Some(0));

        let record = h.store.get(&id("prod", "app")).await.unwrap().unwrap();
        assert_eq!(record.original_replicas, 3);
        assert!(record.paused);
        assert_eq!(record.mechanism, PauseMechanism::ScaledToZero);

        let resumed = h
            .controller
            .resume(&WorkloadRef::new("prod", "app"), None)
            .await
            .unwrap();
        assert!(resumed.mutated);
        assert_eq!(resumed.replicas, Some(3));
        assert!(resumed.warnings.is_empty());
        assert_eq!(h.cluster.deployment_replicas("prod", "app").await, Some(3));
        assert!(h.store.get(&id("prod", "app")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pause_is_idempotent() {
        let h = harness(prod_app());
        let target = WorkloadRef::new("prod", "app");

        h.controller.pause(&target).await.unwrap();
        let first = h.store.get(&id("prod", "app")).await.unwrap().unwrap();

        let second = h.controller.pause(&target).await.unwrap();
        assert!(!second.mutated);
        assert_eq!(second.previous_replicas, Some(3));
        assert!(second.message.contains("already paused"));

        let after = h.store.get(&id("prod", "app")).await.unwrap().unwrap();
        assert_eq!(after, first);
        assert_eq!(h.cluster.deployment_replicas("prod", "app").await, Some(0));
    }

    #[tokio::test]
    async fn test_pause_of_zero_replica_deployment_assumes_default() {
        let cluster = InMemoryCluster::builder()
            .deployment(fixtures::deployment("prod", "idle", 0).build())
            .build();
        let h = harness(cluster);

        let outcome = h.controller.pause(&WorkloadRef::new("prod", "idle")).await.unwrap();
        assert!(!outcome.mutated);
        assert_eq!(outcome.warnings.len(), 1);

        let record = h.store.get(&id("prod", "idle")).await.unwrap().unwrap();
        assert_eq!(record.original_replicas, 1);
        assert!(record.assumed);

        let resumed = h
            .controller
            .resume(&WorkloadRef::new("prod", "idle"), None)
            .await
            .unwrap();
        assert_eq!(resumed.replicas, Some(1));
        assert!(resumed.warnings[0].contains("assumed"));
    }

    #[tokio::test]
    async fn test_resume_without_record_defaults_to_one_with_warning() {
        let cluster = InMemoryCluster::builder()
            .deployment(fixtures::deployment("prod", "stopped", 0).build())
            .build();
        let h = harness(cluster);

        let outcome = h
            .controller
            .resume(&WorkloadRef::new("prod", "stopped"), None)
            .await
            .unwrap();

        assert!(outcome.mutated);
        assert_eq!(outcome.replicas, Some(1));
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.message.contains("No pause record found"));
        assert_eq!(h.cluster.deployment_replicas("prod", "stopped").await, Some(1));
    }

    #[tokio::test]
    async fn test_configured_default_resume_replicas() {
        let cluster = InMemoryCluster::builder()
            .deployment(fixtures::deployment("prod", "stopped", 0).build())
            .build();
        let h = harness_with(
            cluster,
            ControllerConfig {
                default_resume_replicas: 2,
                ..ControllerConfig::default()
            },
        );

        h.controller
            .resume(&WorkloadRef::new("prod", "stopped"), None)
            .await
            .unwrap();
        assert_eq!(h.cluster.deployment_replicas("prod", "stopped").await, Some(2));
    }

    #[tokio::test]
    async fn test_resume_of_running_deployment_without_record_is_a_noop() {
        let h = harness(prod_app());

        let outcome = h
            .controller
            .resume(&WorkloadRef::new("prod", "app"), None)
            .await
            .unwrap();

        assert!(!outcome.mutated);
        assert!(outcome.message.contains("already running"));
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(h.cluster.deployment_replicas("prod", "app").await, Some(3));
    }

    #[tokio::test]
    async fn test_resume_when_already_at_recorded_count() {
        let h = harness(prod_app());
        h.store
            .put(
                &id("prod", "app"),
                &PauseRecord::deployment(3, PauseMechanism::ScaledToZero),
            )
            .await
            .unwrap();

        let outcome = h
            .controller
            .resume(&WorkloadRef::new("prod", "app"), None)
            .await
            .unwrap();
        assert!(!outcome.mutated);
        assert!(h.store.get(&id("prod", "app")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_explicit_replicas_override_record() {
        let h = harness(prod_app());
        h.controller.pause(&WorkloadRef::new("prod", "app")).await.unwrap();

        let outcome = h
            .controller
            .resume(&WorkloadRef::new("prod", "app"), Some(5))
            .await
            .unwrap();
        assert_eq!(outcome.replicas, Some(5));
        assert_eq!(h.cluster.deployment_replicas("prod", "app").await, Some(5));
    }

    #[tokio::test]
    async fn test_legacy_annotation_used_when_no_record() {
        let cluster = InMemoryCluster::builder()
            .deployment(
                fixtures::deployment("prod", "old", 0)
                    .annotation(annotations::ORIGINAL_REPLICAS, "4")
                    .build(),
            )
            .build();
        let h = harness(cluster);

        let outcome = h
            .controller
            .resume(&WorkloadRef::new("prod", "old"), None)
            .await
            .unwrap();
        assert_eq!(outcome.replicas, Some(4));
        assert!(outcome.warnings[0].contains(annotations::ORIGINAL_REPLICAS));
    }

    #[tokio::test]
    async fn test_mirror_annotations_follow_pause_state() {
        let h = harness(prod_app());

        h.controller.pause(&WorkloadRef::new("prod", "app")).await.unwrap();
        let deployment = h.cluster.get_deployment("prod", "app").await.unwrap();
        let annotations_after_pause = deployment.metadata.annotations.unwrap_or_default();
        assert_eq!(
            annotations_after_pause.get(annotations::PAUSED).map(String::as_str),
            Some("true")
        );
        assert_eq!(
            annotations_after_pause
                .get(annotations::ORIGINAL_REPLICAS)
                .map(String::as_str),
            Some("3")
        );

        h.controller
            .resume(&WorkloadRef::new("prod", "app"), None)
            .await
            .unwrap();
        let deployment = h.cluster.get_deployment("prod", "app").await.unwrap();
        let annotations_after_resume = deployment.metadata.annotations.unwrap_or_default();
        assert!(!annotations_after_resume.contains_key(annotations::PAUSED));
        assert!(!annotations_after_resume.contains_key(annotations::ORIGINAL_REPLICAS));
    }

    #[tokio::test]
    async fn test_mirror_annotations_can_be_disabled() {
        let h = harness_with(
            prod_app(),
            ControllerConfig {
                mirror_annotations: false,
                ..ControllerConfig::default()
            },
        );

        h.controller.pause(&WorkloadRef::new("prod", "app")).await.unwrap();
        let deployment = h.cluster.get_deployment("prod", "app").await.unwrap();
        assert!(!deployment
            .metadata
            .annotations
            .unwrap_or_default()
            .contains_key(annotations::PAUSED));
    }

    #[tokio::test]
    async fn test_native_pause_preferred_when_available() {
        let cluster = InMemoryCluster::builder()
            .capabilities(Capabilities {
                native_pause: true,
                exec: true,
            })
            .deployment(fixtures::deployment("prod", "app", 3).build())
            .build();
        let h = harness(cluster);

        let outcome = h.controller.pause(&WorkloadRef::new("prod", "app")).await.unwrap();
        assert!(outcome.mutated);
        // replicas untouched, only the flag changes
        assert_eq!(h.cluster.deployment_replicas("prod", "app").await, Some(3));
        let record = h.store.get(&id("prod", "app")).await.unwrap().unwrap();
        assert_eq!(record.mechanism, PauseMechanism::NativePause);

        let status = h.controller.status(&WorkloadRef::new("prod", "app")).await.unwrap();
        assert_eq!(status.status, RunState::Stopped);
        assert!(status.paused);

        h.controller
            .resume(&WorkloadRef::new("prod", "app"), None)
            .await
            .unwrap();
        let deployment = h.cluster.get_deployment("prod", "app").await.unwrap();
        assert_eq!(deployment.spec.unwrap().paused, Some(false));
        assert!(h.store.get(&id("prod", "app")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_reports_pause_record() {
        let h = harness(prod_app());
        let target = WorkloadRef::new("prod", "app");

        let running = h.controller.status(&target).await.unwrap();
        assert_eq!(running.status, RunState::Running);
        assert_eq!(running.current_replicas, 3);
        assert!(!running.paused);

        h.controller.pause(&target).await.unwrap();
        let stopped = h.controller.status(&target).await.unwrap();
        assert_eq!(stopped.status, RunState::Stopped);
        assert_eq!(stopped.current_replicas, 0);
        assert!(stopped.paused);
        assert_eq!(stopped.original_replicas, Some(3));
    }

    #[tokio::test]
    async fn test_status_scaling_while_converging() {
        let cluster = InMemoryCluster::builder()
            .convergence(ConvergenceMode::Manual)
            .deployment(fixtures::deployment("prod", "app", 3).available(3).build())
            .build();
        let h = harness(cluster);
        let target = WorkloadRef::new("prod", "app");

        h.controller.pause(&target).await.unwrap();
        h.controller.resume(&target, Some(4)).await.unwrap();

        let status = h.controller.status(&target).await.unwrap();
        assert_eq!(status.status, RunState::Scaling);

        h.cluster.converge_deployment("prod", "app").await;
        let status = h.controller.status(&target).await.unwrap();
        assert_eq!(status.status, RunState::Running);
        assert_eq!(status.available_replicas, 4);
    }

    #[tokio::test]
    async fn test_status_of_missing_workload_is_not_found() {
        let h = harness(prod_app());
        let err = h
            .controller
            .status(&WorkloadRef::new("prod", "nonexistent-dep"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.workload(), &id("prod", "nonexistent-dep"));
    }

    #[tokio::test]
    async fn test_paused_workloads_lists_records() {
        let cluster = InMemoryCluster::builder()
            .deployment(fixtures::deployment("prod", "a", 2).build())
            .deployment(fixtures::deployment("prod", "b", 1).build())
            .build();
        let h = harness(cluster);

        h.controller.pause(&WorkloadRef::new("prod", "a")).await.unwrap();
        h.controller.pause(&WorkloadRef::new("prod", "b")).await.unwrap();
        h.controller.resume(&WorkloadRef::new("prod", "b"), None).await.unwrap();

        let paused = h.controller.paused_workloads().await.unwrap();
        assert_eq!(paused.len(), 1);
        assert_eq!(paused[0].name, "a");
        assert_eq!(paused[0].original_replicas, 2);
        assert_eq!(paused[0].kind, WorkloadKind::Deployment);
    }

    #[tokio::test]
    async fn test_concurrent_actions_on_different_workloads() {
        let cluster = InMemoryCluster::builder()
            .deployment(fixtures::deployment("prod", "a", 2).build())
            .deployment(fixtures::deployment("prod", "b", 5).build())
            .build();
        let h = harness(cluster);

        let a = WorkloadRef::new("prod", "a");
        let b = WorkloadRef::new("prod", "b");
        let (ra, rb) = tokio::join!(h.controller.pause(&a), h.controller.pause(&b));
        assert!(ra.is_ok() && rb.is_ok());

        assert_eq!(h.store.len().await, 2);
        assert_eq!(
            h.store.get(&id("prod", "b")).await.unwrap().unwrap().original_replicas,
            5
        );
    }

    /// `default/nginx` as both a 2-replica deployment and a bare pod
    fn shared_name() -> InMemoryCluster {
        InMemoryCluster::builder()
            .deployment(fixtures::deployment("default", "nginx", 2).build())
            .pod(fixtures::pod("default", "nginx").image("nginx:1.25").build())
            .build()
    }

    #[tokio::test]
    async fn test_pause_keeps_record_of_same_named_pod() {
        let h = harness(shared_name());
        let pod = WorkloadRef::new("default", "nginx").pod_first();
        let deployment = WorkloadRef::new("default", "nginx");

        let paused = h.controller.pause(&pod).await.unwrap();
        assert_eq!(paused.target.kind, WorkloadKind::Pod);
        assert!(!h.cluster.pod_exists("default", "nginx").await);

        let err = h.controller.pause(&deployment).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("resume it first"));
        assert_eq!(h.cluster.deployment_replicas("default", "nginx").await, Some(2));

        let record = h.store.get(&id("default", "nginx")).await.unwrap().unwrap();
        assert_eq!(record.kind, WorkloadKind::Pod);
        assert!(record.pod_template.is_some());

        let resumed = h.controller.resume(&pod, None).await.unwrap();
        assert_eq!(resumed.target.kind, WorkloadKind::Pod);
        assert!(h.cluster.pod_exists("default", "nginx").await);

        h.controller.pause(&deployment).await.unwrap();
        assert_eq!(h.cluster.deployment_replicas("default", "nginx").await, Some(0));
    }

    #[tokio::test]
    async fn test_deployment_resume_leaves_pod_record() {
        let h = harness(shared_name());
        h.controller
            .pause(&WorkloadRef::new("default", "nginx").pod_first())
            .await
            .unwrap();

        let outcome = h
            .controller
            .resume(&WorkloadRef::new("default", "nginx"), None)
            .await
            .unwrap();
        assert_eq!(outcome.target.kind, WorkloadKind::Deployment);
        assert!(!outcome.mutated);

        let record = h.store.get(&id("default", "nginx")).await.unwrap().unwrap();
        assert_eq!(record.kind, WorkloadKind::Pod);
    }

    #[tokio::test]
    async fn test_file_store_survives_controller_restart() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = prod_app();

        let first = PauseController::new(
            Arc::new(cluster.clone()),
            Arc::new(FileStateStore::new(dir.path())),
            ControllerConfig::default(),
        );
        first.pause(&WorkloadRef::new("prod", "app")).await.unwrap();
        drop(first);

        let second = PauseController::new(
            Arc::new(cluster.clone()),
            Arc::new(FileStateStore::new(dir.path())),
            ControllerConfig::default(),
        );
        let outcome = second
            .resume(&WorkloadRef::new("prod", "app"), None)
            .await
            .unwrap();
        assert_eq!(outcome.replicas, Some(3));
        assert!(outcome.warnings.is_empty());
        assert_eq!(cluster.deployment_replicas("prod", "app").await, Some(3));
    }
}

mod ownership_tests {
    use super::*;

    fn dep_chain() -> InMemoryCluster {
        InMemoryCluster::builder()
            .deployment(fixtures::deployment("prod", "dep-1", 2).build())
            .replica_set(fixtures::replica_set("prod", "rs-1", "dep-1", 2))
            .pod(fixtures::pod("prod", "rs-1-aaaaa").owned_by("ReplicaSet", "rs-1").build())
            .build()
    }

    #[tokio::test]
    async fn test_owner_hints_resolve_to_deployment() {
        let h = harness(dep_chain());

        let outcome = h
            .controller
            .pause(&WorkloadRef::new("prod", "rs-1-aaaaa").owned_by("ReplicaSet", "rs-1"))
            .await
            .unwrap();

        assert_eq!(outcome.target.kind, WorkloadKind::Deployment);
        assert_eq!(outcome.target.name, "dep-1");
        assert_eq!(h.cluster.deployment_replicas("prod", "dep-1").await, Some(0));
        assert!(h.store.get(&id("prod", "dep-1")).await.unwrap().is_some());
        assert!(h.store.get(&id("prod", "rs-1")).await.unwrap().is_none());
        assert!(h.store.get(&id("prod", "rs-1-aaaaa")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pod_name_without_hints_climbs_owner_chain() {
        let h = harness(dep_chain());

        let paused = h
            .controller
            .pause(&WorkloadRef::new("prod", "rs-1-aaaaa"))
            .await
            .unwrap();
        assert_eq!(paused.target.name, "dep-1");

        let resumed = h
            .controller
            .resume(&WorkloadRef::new("prod", "dep-1"), None)
            .await
            .unwrap();
        assert_eq!(resumed.replicas, Some(2));
    }

    #[tokio::test]
    async fn test_pod_first_lookup_prefers_bare_pod() {
        let cluster = InMemoryCluster::builder()
            .deployment(fixtures::deployment("default", "nginx", 2).build())
            .pod(fixtures::pod("default", "nginx").build())
            .build();
        let h = harness(cluster);

        let outcome = h
            .controller
            .pause(&WorkloadRef::new("default", "nginx").pod_first())
            .await
            .unwrap();
        assert_eq!(outcome.target.kind, WorkloadKind::Pod);
        assert_eq!(h.cluster.deployment_replicas("default", "nginx").await, Some(2));
        assert!(!h.cluster.pod_exists("default", "nginx").await);
    }

    #[tokio::test]
    async fn test_pod_first_lookup_still_climbs_owners() {
        let h = harness(dep_chain());
        let outcome = h
            .controller
            .pause(&WorkloadRef::new("prod", "rs-1-aaaaa").pod_first())
            .await
            .unwrap();
        assert_eq!(outcome.target.kind, WorkloadKind::Deployment);
        assert_eq!(outcome.target.name, "dep-1");
        assert_eq!(h.cluster.deployment_replicas("prod", "dep-1").await, Some(0));
    }

    #[tokio::test]
    async fn test_explicit_deployment_owner() {
        let h = harness(dep_chain());

        let outcome = h
            .controller
            .pause(&WorkloadRef::new("prod", "anything").owned_by("Deployment", "dep-1"))
            .await
            .unwrap();
        assert_eq!(outcome.target.name, "dep-1");
    }

    #[tokio::test]
    async fn test_missing_replica_set_falls_back_to_bare_pod() {
        let h = harness(dep_chain());
        h.cluster.remove_replica_set("prod", "rs-1").await;

        let outcome = h
            .controller
            .pause(&WorkloadRef::new("prod", "rs-1-aaaaa").owned_by("ReplicaSet", "rs-1"))
            .await
            .unwrap();

        assert_eq!(outcome.target.kind, WorkloadKind::Pod);
        assert_eq!(outcome.target.name, "rs-1-aaaaa");
        assert!(outcome.warnings.iter().any(|w| w.contains("rs-1")));
        assert_eq!(h.cluster.deployment_replicas("prod", "dep-1").await, Some(2));
        assert!(!h.cluster.pod_exists("prod", "rs-1-aaaaa").await);
    }

    #[tokio::test]
    async fn test_foreign_owner_kind_falls_back_to_bare_pod() {
        let cluster = InMemoryCluster::builder()
            .pod(fixtures::pod("prod", "db-0").owned_by("StatefulSet", "db").build())
            .build();
        let h = harness(cluster);

        let outcome = h
            .controller
            .pause(&WorkloadRef::new("prod", "db-0").owned_by("StatefulSet", "db"))
            .await
            .unwrap();
        assert_eq!(outcome.target.kind, WorkloadKind::Pod);
        assert!(outcome.warnings[0].contains("StatefulSet"));
    }

    #[tokio::test]
    async fn test_resolution_error_other_than_not_found_is_surfaced() {
        let h = harness(dep_chain());
        h.cluster
            .fail_next(
                Operation::GetReplicaSet,
                ClusterError::Unavailable("etcd timeout".into()),
            )
            .await;

        let err = h
            .controller
            .pause(&WorkloadRef::new("prod", "rs-1-aaaaa").owned_by("ReplicaSet", "rs-1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.to_string().contains("etcd timeout"));
    }
}

mod bare_pod_tests {
    use super::*;

    fn standalone() -> InMemoryCluster {
        InMemoryCluster::builder()
            .pod(
                fixtures::pod("default", "standalone-1")
                    .image("registry.local/tools:2.1")
                    .label("team", "ops")
                    .build(),
            )
            .build()
    }

    #[tokio::test]
    async fn test_recreate_round_trip_keeps_spec() {
        let h = harness(standalone());
        let target = WorkloadRef::new("default", "standalone-1");

        let paused = h.controller.pause(&target).await.unwrap();
        assert_eq!(paused.target.kind, WorkloadKind::Pod);
        assert!(!h.cluster.pod_exists("default", "standalone-1").await);

        let record = h.store.get(&id("default", "standalone-1")).await.unwrap().unwrap();
        assert_eq!(record.mechanism, PauseMechanism::Deleted);
        let template = record.pod_template.unwrap();
        assert!(template.metadata.uid.is_none());
        assert!(template.metadata.resource_version.is_none());
        assert!(template.status.is_none());
        assert!(template.spec.as_ref().unwrap().node_name.is_none());

        let resumed = h.controller.resume(&target, None).await.unwrap();
        assert!(resumed.mutated);
        assert!(h.store.get(&id("default", "standalone-1")).await.unwrap().is_none());

        let pod = h.cluster.get_pod("default", "standalone-1").await.unwrap();
        let container = &pod.spec.unwrap().containers[0];
        assert_eq!(container.image.as_deref(), Some("registry.local/tools:2.1"));
        assert_eq!(
            pod.metadata.labels.unwrap().get("team").map(String::as_str),
            Some("ops")
        );
    }

    #[tokio::test]
    async fn test_deleted_pod_status_and_repeat_pause() {
        let h = harness(standalone());
        let target = WorkloadRef::new("default", "standalone-1");
        h.controller.pause(&target).await.unwrap();

        let status = h.controller.status(&target).await.unwrap();
        assert_eq!(status.kind, WorkloadKind::Pod);
        assert_eq!(status.status, RunState::Stopped);
        assert!(status.paused);

        let again = h.controller.pause(&target).await.unwrap();
        assert!(!again.mutated);
    }

    #[tokio::test]
    async fn test_signal_strategy_stops_in_place() {
        let h = harness_with(
            standalone(),
            ControllerConfig {
                bare_pod_strategy: BarePodStrategy::Signal,
                ..ControllerConfig::default()
            },
        );
        let target = WorkloadRef::new("default", "standalone-1");

        let paused = h.controller.pause(&target).await.unwrap();
        assert!(paused.mutated);
        assert!(h.cluster.pod_exists("default", "standalone-1").await);

        let pod = h.cluster.get_pod("default", "standalone-1").await.unwrap();
        assert_eq!(
            pod.metadata
                .labels
                .unwrap()
                .get(annotations::STATUS_LABEL)
                .map(String::as_str),
            Some(annotations::STATUS_PAUSED)
        );
        let record = h.store.get(&id("default", "standalone-1")).await.unwrap().unwrap();
        assert_eq!(record.mechanism, PauseMechanism::Signalled);

        h.controller.resume(&target, None).await.unwrap();
        let signals: Vec<Signal> = h.cluster.signals().await.into_iter().map(|s| s.signal).collect();
        assert_eq!(signals, vec![Signal::Stop, Signal::Cont]);

        let pod = h.cluster.get_pod("default", "standalone-1").await.unwrap();
        assert!(!pod
            .metadata
            .labels
            .unwrap_or_default()
            .contains_key(annotations::STATUS_LABEL));
        assert!(h.store.get(&id("default", "standalone-1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signal_strategy_falls_back_to_delete_without_exec() {
        let cluster = InMemoryCluster::builder()
            .capabilities(Capabilities {
                native_pause: false,
                exec: false,
            })
            .pod(fixtures::pod("default", "standalone-1").build())
            .build();
        let h = harness_with(
            cluster,
            ControllerConfig {
                bare_pod_strategy: BarePodStrategy::Signal,
                ..ControllerConfig::default()
            },
        );
        let target = WorkloadRef::new("default", "standalone-1");

        let paused = h.controller.pause(&target).await.unwrap();
        assert!(paused.warnings[0].contains("in-place stop failed"));
        assert!(!h.cluster.pod_exists("default", "standalone-1").await);
        let record = h.store.get(&id("default", "standalone-1")).await.unwrap().unwrap();
        assert_eq!(record.mechanism, PauseMechanism::Deleted);

        h.controller.resume(&target, None).await.unwrap();
        assert!(h.cluster.pod_exists("default", "standalone-1").await);
    }

    fn signal_config() -> ControllerConfig {
        ControllerConfig {
            bare_pod_strategy: BarePodStrategy::Signal,
            ..ControllerConfig::default()
        }
    }

    fn two_containers() -> InMemoryCluster {
        InMemoryCluster::builder()
            .pod(
                fixtures::pod("default", "standalone-1")
                    .container("sidecar", "gcr.io/distroless/static")
                    .build(),
            )
            .build()
    }

    fn delivered(events: Vec<crate::cluster::SignalEvent>) -> Vec<(String, Signal)> {
        events.into_iter().map(|e| (e.container, e.signal)).collect()
    }

    #[tokio::test]
    async fn test_partial_stop_is_rolled_back_before_delete() {
        let h = harness_with(two_containers(), signal_config());
        h.cluster
            .fail_signal_to(
                "sidecar",
                Signal::Stop,
                ClusterError::Unavailable("kill: not found".into()),
            )
            .await;
        let target = WorkloadRef::new("default", "standalone-1");

        let paused = h.controller.pause(&target).await.unwrap();
        assert!(paused.warnings[0].contains("in-place stop failed"));
        assert_eq!(
            delivered(h.cluster.signals().await),
            vec![("app".to_string(), Signal::Stop), ("app".to_string(), Signal::Cont)]
        );
        assert!(!h.cluster.pod_exists("default", "standalone-1").await);
        let record = h.store.get(&id("default", "standalone-1")).await.unwrap().unwrap();
        assert_eq!(record.mechanism, PauseMechanism::Deleted);
    }

    #[tokio::test]
    async fn test_failed_delete_after_partial_stop_leaves_pod_running() {
        let h = harness_with(two_containers(), signal_config());
        h.cluster
            .fail_signal_to(
                "sidecar",
                Signal::Stop,
                ClusterError::Unavailable("kill: not found".into()),
            )
            .await;
        h.cluster
            .fail_next(
                Operation::DeletePod,
                ClusterError::Forbidden("pods \"standalone-1\" is forbidden".into()),
            )
            .await;
        let target = WorkloadRef::new("default", "standalone-1");

        let err = h.controller.pause(&target).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(h.cluster.pod_exists("default", "standalone-1").await);
        assert!(h.store.get(&id("default", "standalone-1")).await.unwrap().is_none());

        let signals = delivered(h.cluster.signals().await);
        assert_eq!(signals.last(), Some(&("app".to_string(), Signal::Cont)));

        let status = h.controller.status(&target).await.unwrap();
        assert!(!status.paused);
        assert_eq!(status.status, RunState::Running);
    }

    #[tokio::test]
    async fn test_failed_rollback_keeps_signalled_record() {
        let h = harness_with(two_containers(), signal_config());
        h.cluster
            .fail_signal_to(
                "sidecar",
                Signal::Stop,
                ClusterError::Unavailable("kill: not found".into()),
            )
            .await;
        h.cluster
            .fail_signal_to("app", Signal::Cont, ClusterError::Unavailable("exec timed out".into()))
            .await;
        let target = WorkloadRef::new("default", "standalone-1");

        let err = h.controller.pause(&target).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(h.cluster.pod_exists("default", "standalone-1").await);
        let record = h.store.get(&id("default", "standalone-1")).await.unwrap().unwrap();
        assert_eq!(record.mechanism, PauseMechanism::Signalled);

        h.controller.resume(&target, None).await.unwrap();
        assert_eq!(
            delivered(h.cluster.signals().await),
            vec![
                ("app".to_string(), Signal::Stop),
                ("app".to_string(), Signal::Cont),
                ("sidecar".to_string(), Signal::Cont),
            ]
        );
        assert!(h.store.get(&id("default", "standalone-1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resume_of_running_pod_without_record() {
        let h = harness(standalone());
        let outcome = h
            .controller
            .resume(&WorkloadRef::new("default", "standalone-1"), None)
            .await
            .unwrap();
        assert!(!outcome.mutated);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_recreate_failure_keeps_record() {
        let h = harness(standalone());
        let target = WorkloadRef::new("default", "standalone-1");
        h.controller.pause(&target).await.unwrap();

        h.cluster
            .fail_next(
                Operation::CreatePod,
                ClusterError::Forbidden("pods is forbidden: exceeded quota".into()),
            )
            .await;
        let err = h.controller.resume(&target, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(h.store.get(&id("default", "standalone-1")).await.unwrap().is_some());

        h.controller.resume(&target, None).await.unwrap();
        assert!(h.cluster.pod_exists("default", "standalone-1").await);
    }
}

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_scale_conflict_is_retried_once() {
        let h = harness(prod_app());
        h.cluster
            .fail_next(
                Operation::Scale,
                ClusterError::Conflict("the object has been modified".into()),
            )
            .await;

        let outcome = h.controller.pause(&WorkloadRef::new("prod", "app")).await.unwrap();
        assert!(outcome.mutated);
        assert_eq!(h.cluster.deployment_replicas("prod", "app").await, Some(0));
    }

    #[tokio::test]
    async fn test_repeated_conflict_is_surfaced_and_record_kept() {
        let h = harness(prod_app());
        for _ in 0..2 {
            h.cluster
                .fail_next(
                    Operation::Scale,
                    ClusterError::Conflict("the object has been modified".into()),
                )
                .await;
        }

        let err = h.controller.pause(&WorkloadRef::new("prod", "app")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // written before the mutation, so the count is never lost
        let record = h.store.get(&id("prod", "app")).await.unwrap().unwrap();
        assert_eq!(record.original_replicas, 3);
        assert_eq!(h.cluster.deployment_replicas("prod", "app").await, Some(3));
    }

    #[tokio::test]
    async fn test_pause_after_foreign_write() {
        let h = harness(prod_app());
        // an earlier write by another actor must not trip the precondition
        h.cluster.touch_deployment("prod", "app").await;

        h.controller.pause(&WorkloadRef::new("prod", "app")).await.unwrap();
        assert_eq!(h.cluster.deployment_replicas("prod", "app").await, Some(0));
    }

    #[tokio::test]
    async fn test_failed_pause_then_retry_keeps_original_count() {
        let h = harness(prod_app());
        h.cluster
            .fail_next(
                Operation::Scale,
                ClusterError::Unavailable("connection refused".into()),
            )
            .await;

        let err = h.controller.pause(&WorkloadRef::new("prod", "app")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.to_string().contains("prod/app"));
        assert!(err.to_string().contains("connection refused"));

        h.controller.pause(&WorkloadRef::new("prod", "app")).await.unwrap();
        h.controller
            .resume(&WorkloadRef::new("prod", "app"), None)
            .await
            .unwrap();
        assert_eq!(h.cluster.deployment_replicas("prod", "app").await, Some(3));
    }

    #[tokio::test]
    async fn test_failed_resume_keeps_record() {
        let h = harness(prod_app());
        h.controller.pause(&WorkloadRef::new("prod", "app")).await.unwrap();

        h.cluster
            .fail_next(
                Operation::Scale,
                ClusterError::Forbidden("deployments.apps \"app\" is forbidden".into()),
            )
            .await;
        let err = h
            .controller
            .resume(&WorkloadRef::new("prod", "app"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(err.to_string().contains("is forbidden"));

        let record = h.store.get(&id("prod", "app")).await.unwrap().unwrap();
        assert_eq!(record.original_replicas, 3);
    }

    #[tokio::test]
    async fn test_annotation_failure_does_not_fail_pause() {
        let h = harness(prod_app());
        h.cluster
            .fail_next(
                Operation::Annotate,
                ClusterError::Forbidden("cannot patch annotations".into()),
            )
            .await;

        let outcome = h.controller.pause(&WorkloadRef::new("prod", "app")).await.unwrap();
        assert!(outcome.mutated);
        assert_eq!(h.cluster.deployment_replicas("prod", "app").await, Some(0));
    }

    #[tokio::test]
    async fn test_unknown_workload_is_not_found() {
        let h = harness(prod_app());
        let err = h
            .controller
            .pause(&WorkloadRef::new("prod", "ghost"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
