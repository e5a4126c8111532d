use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ownership::{climb, OwnerRef};
use super::{
    ActionOutcome, BarePodStrategy, ControllerConfig, Lookup, PausedWorkload, RunState, Target,
    WorkloadRef, WorkloadStatus,
};
use crate::cluster::{annotations, ClusterApi, Signal};
use crate::error::{ClusterError, ControlError};
use crate::store::{PauseMechanism, PauseRecord, WorkloadId, WorkloadKind, WorkloadStateStore};

/// A resolved action target plus the warnings collected while resolving it
struct Resolution {
    target: Target,
    warnings: Vec<String>,
}

/// Ownership-aware pause/resume state machine.
///
/// Holds no pause state of its own: every decision re-reads the cluster and
/// the store. Actions on the same workload are serialised by a per-workload
/// mutex; actions on different workloads never wait for each other.
pub struct PauseController {
    cluster: Arc<dyn ClusterApi>,
    store: Arc<dyn WorkloadStateStore>,
    config: ControllerConfig,
    locks: DashMap<WorkloadId, Arc<Mutex<()>>>,
}

fn desired_replicas(deployment: &Deployment) -> u32 {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1)
        .max(0) as u32
}

fn natively_paused(deployment: &Deployment) -> bool {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.paused)
        .unwrap_or(false)
}

fn container_names(pod: &Pod) -> Vec<String> {
    pod.spec
        .as_ref()
        .map(|s| s.containers.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default()
}

fn pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conds| conds.iter().any(|c| c.type_ == "Ready" && c.status == "True"))
        .unwrap_or(false)
}

/// Copy of a pod that can be submitted again as a new object
fn sanitize_pod(pod: &Pod) -> Pod {
    let mut pod = pod.clone();
    pod.status = None;

    let meta = &mut pod.metadata;
    meta.uid = None;
    meta.resource_version = None;
    meta.creation_timestamp = None;
    meta.deletion_timestamp = None;
    meta.deletion_grace_period_seconds = None;
    meta.generation = None;
    meta.managed_fields = None;
    meta.owner_references = None;
    if let Some(labels) = meta.labels.as_mut() {
        labels.remove(annotations::STATUS_LABEL);
    }

    if let Some(spec) = pod.spec.as_mut() {
        spec.node_name = None;
    }
    pod
}

fn with_warnings(message: String, warnings: &[String]) -> String {
    if warnings.is_empty() {
        message
    } else {
        format!("{message} (warning: {})", warnings.join("; "))
    }
}

impl PauseController {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        store: Arc<dyn WorkloadStateStore>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            cluster,
            store,
            config,
            locks: DashMap::new(),
        }
    }

    pub fn cluster(&self) -> &Arc<dyn ClusterApi> {
        &self.cluster
    }

    /// Stop a workload, remembering how to bring it back
    pub async fn pause(&self, workload: &WorkloadRef) -> Result<ActionOutcome, ControlError> {
        let Resolution { target, warnings } = self.resolve(workload).await?;
        let id = target.id();
        let lock = self.lock_for(&id);
        let outcome = {
            let _guard = lock.lock().await;
            match target.kind {
                WorkloadKind::Deployment => self.pause_deployment(&id, warnings).await,
                WorkloadKind::Pod => self.pause_pod(&id, warnings).await,
            }
        };
        drop(lock);
        self.release_lock(&id);
        outcome
    }

    /// Restart a paused workload. `replicas` overrides the stored count for
    /// deployments.
    pub async fn resume(
        &self,
        workload: &WorkloadRef,
        replicas: Option<u32>,
    ) -> Result<ActionOutcome, ControlError> {
        let Resolution { target, warnings } = self.resolve(workload).await?;
        let id = target.id();
        let lock = self.lock_for(&id);
        let outcome = {
            let _guard = lock.lock().await;
            match target.kind {
                WorkloadKind::Deployment => self.resume_deployment(&id, replicas, warnings).await,
                WorkloadKind::Pod => self.resume_pod(&id, warnings).await,
            }
        };
        drop(lock);
        self.release_lock(&id);
        outcome
    }

    /// Replica counts, derived run state and pause record of a workload
    pub async fn status(&self, workload: &WorkloadRef) -> Result<WorkloadStatus, ControlError> {
        let Resolution { target, .. } = self.resolve(workload).await?;
        let id = target.id();
        let record = self.record_for(&id, target.kind).await?;

        match target.kind {
            WorkloadKind::Deployment => {
                let deployment = self
                    .cluster
                    .get_deployment(&id.namespace, &id.name)
                    .await
                    .map_err(|e| ControlError::from_cluster(&id, e))?;
                let desired = desired_replicas(&deployment);
                let status = deployment.status.clone().unwrap_or_default();
                let available = status.available_replicas.unwrap_or(0).max(0) as u32;
                let ready = status.ready_replicas.unwrap_or(0).max(0) as u32;
                Ok(WorkloadStatus {
                    namespace: id.namespace.clone(),
                    name: id.name.clone(),
                    kind: WorkloadKind::Deployment,
                    status: RunState::derive(
                        if natively_paused(&deployment) { 0 } else { desired },
                        available,
                    ),
                    current_replicas: desired,
                    available_replicas: available,
                    ready_replicas: ready,
                    paused: record.is_some() || natively_paused(&deployment),
                    original_replicas: record.map(|r| r.original_replicas),
                })
            }
            WorkloadKind::Pod => {
                let pod = self.live_pod(&id).await?;
                let running = pod.is_some() && record.is_none();
                let ready = u32::from(running && pod.as_ref().map(pod_ready).unwrap_or(false));
                let desired = u32::from(running);
                Ok(WorkloadStatus {
                    namespace: id.namespace.clone(),
                    name: id.name.clone(),
                    kind: WorkloadKind::Pod,
                    status: RunState::derive(desired, ready),
                    current_replicas: desired,
                    available_replicas: ready,
                    ready_replicas: ready,
                    paused: record.is_some(),
                    original_replicas: record.map(|r| r.original_replicas),
                })
            }
        }
    }

    /// Every workload with a pause record
    pub async fn paused_workloads(&self) -> Result<Vec<PausedWorkload>, ControlError> {
        let records = self.store.list().await.map_err(|e| {
            ControlError::from_store(&WorkloadId::new("*", "*"), e)
        })?;
        Ok(records
            .into_iter()
            .map(|(id, record)| PausedWorkload::from_record(id, &record))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    async fn resolve(&self, workload: &WorkloadRef) -> Result<Resolution, ControlError> {
        let requested = WorkloadId::new(&workload.namespace, &workload.name);
        let mut warnings = Vec::new();

        if let Some(kind) = workload.owner_kind.as_deref().filter(|k| !k.is_empty()) {
            let owner = OwnerRef::new(
                kind,
                workload.owner_name.as_deref().unwrap_or(&workload.name),
            );
            if let Some(deployment) = self.climb_to_deployment(&requested, &owner, &mut warnings).await? {
                return Ok(Resolution {
                    target: Target::new(
                        WorkloadKind::Deployment,
                        &WorkloadId::new(&workload.namespace, deployment),
                    ),
                    warnings,
                });
            }
            return self.resolve_bare_pod(&requested, warnings).await;
        }

        if workload.lookup == Lookup::PodFirst {
            if let Some(pod) = self.live_pod(&requested).await? {
                return self.resolve_live_pod(&requested, &pod, warnings).await;
            }
            // a pod this controller deleted
            let stored = self
                .store
                .get(&requested)
                .await
                .map_err(|e| ControlError::from_store(&requested, e))?;
            if stored.is_some_and(|r| r.kind == WorkloadKind::Pod) {
                return Ok(Resolution {
                    target: Target::new(WorkloadKind::Pod, &requested),
                    warnings,
                });
            }
        }

        match self.cluster.get_deployment(&requested.namespace, &requested.name).await {
            Ok(_) => {
                return Ok(Resolution {
                    target: Target::new(WorkloadKind::Deployment, &requested),
                    warnings,
                })
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(ControlError::from_cluster(&requested, e)),
        }

        match self.live_pod(&requested).await? {
            Some(pod) => self.resolve_live_pod(&requested, &pod, warnings).await,
            None => self.resolve_bare_pod(&requested, warnings).await,
        }
    }

    /// The deployment managing `pod`, or the pod itself when it has none
    async fn resolve_live_pod(
        &self,
        requested: &WorkloadId,
        pod: &Pod,
        mut warnings: Vec<String>,
    ) -> Result<Resolution, ControlError> {
        if let Some(owner) = OwnerRef::controller_of(&pod.metadata) {
            if let Some(deployment) = self.climb_to_deployment(requested, &owner, &mut warnings).await? {
                return Ok(Resolution {
                    target: Target::new(
                        WorkloadKind::Deployment,
                        &WorkloadId::new(&requested.namespace, deployment),
                    ),
                    warnings,
                });
            }
        }
        Ok(Resolution {
            target: Target::new(WorkloadKind::Pod, requested),
            warnings,
        })
    }

    async fn climb_to_deployment(
        &self,
        requested: &WorkloadId,
        owner: &OwnerRef,
        warnings: &mut Vec<String>,
    ) -> Result<Option<String>, ControlError> {
        let chain = climb(self.cluster.as_ref(), &requested.namespace, owner)
            .await
            .map_err(|e| ControlError::from_cluster(requested, e))?;

        if let Some(deployment) = chain.deployment() {
            debug!(workload = %requested, deployment, "Resolved owning deployment");
            return Ok(Some(deployment.to_string()));
        }

        if let Some(reason) = chain.broken {
            warn!(workload = %requested, owner = %owner, reason = %reason, "Ownership climb stopped, handling as bare pod");
            warnings.push(format!("{reason}; handling {requested} as a bare pod"));
        }
        Ok(None)
    }

    /// A live pod, or a pod this controller deleted and still holds a record for
    async fn resolve_bare_pod(
        &self,
        id: &WorkloadId,
        warnings: Vec<String>,
    ) -> Result<Resolution, ControlError> {
        if self.live_pod(id).await?.is_some() || self.record_for(id, WorkloadKind::Pod).await?.is_some() {
            return Ok(Resolution {
                target: Target::new(WorkloadKind::Pod, id),
                warnings,
            });
        }
        Err(ControlError::NotFound {
            workload: id.clone(),
            reason: format!("no deployment or pod named {} in namespace {}", id.name, id.namespace),
        })
    }

    // -----------------------------------------------------------------------
    // Deployments
    // -----------------------------------------------------------------------

    async fn pause_deployment(
        &self,
        id: &WorkloadId,
        mut warnings: Vec<String>,
    ) -> Result<ActionOutcome, ControlError> {
        let deployment = self.get_deployment(id).await?;
        let existing = self.record_for(id, WorkloadKind::Deployment).await?;
        let replicas = desired_replicas(&deployment);
        let target = Target::new(WorkloadKind::Deployment, id);

        if self.cluster.capabilities().native_pause {
            if natively_paused(&deployment) {
                if existing.is_none() {
                    self.put_record(id, &PauseRecord::deployment(replicas, PauseMechanism::NativePause))
                        .await?;
                }
                return Ok(ActionOutcome {
                    message: with_warnings(format!("{target} is already paused"), &warnings),
                    target,
                    previous_replicas: Some(replicas),
                    replicas: Some(replicas),
                    mutated: false,
                    warnings,
                });
            }

            self.put_record(id, &PauseRecord::deployment(replicas, PauseMechanism::NativePause))
                .await?;
            self.cluster
                .set_deployment_paused(&id.namespace, &id.name, true)
                .await
                .map_err(|e| ControlError::from_cluster(id, e))?;
            self.mirror_pause(id, replicas).await;
            info!(workload = %id, replicas, "Deployment paused natively");

            return Ok(ActionOutcome {
                message: with_warnings(format!("{target} paused"), &warnings),
                target,
                previous_replicas: Some(replicas),
                replicas: Some(replicas),
                mutated: true,
                warnings,
            });
        }

        if replicas == 0 {
            let previous = match existing {
                Some(record) => record.original_replicas,
                None => {
                    let assumed = self.config.default_resume_replicas;
                    self.put_record(
                        id,
                        &PauseRecord::deployment(assumed, PauseMechanism::ScaledToZero).assumed(),
                    )
                    .await?;
                    warnings.push(format!(
                        "{id} was already at 0 replicas; {assumed} will be restored on resume"
                    ));
                    assumed
                }
            };
            return Ok(ActionOutcome {
                message: with_warnings(format!("{target} is already paused"), &warnings),
                target,
                previous_replicas: Some(previous),
                replicas: Some(0),
                mutated: false,
                warnings,
            });
        }

        let mut original = replicas;
        self.put_record(id, &PauseRecord::deployment(original, PauseMechanism::ScaledToZero))
            .await?;

        match self
            .cluster
            .scale_deployment(&id.namespace, &id.name, 0, deployment.metadata.resource_version.as_deref())
            .await
        {
            Ok(_) => {}
            Err(ClusterError::Conflict(reason)) => {
                warn!(workload = %id, reason = %reason, "Scale conflicted, retrying with a fresh read");
                let fresh = self.get_deployment(id).await?;
                let fresh_replicas = desired_replicas(&fresh);
                if fresh_replicas > 0 && fresh_replicas != original {
                    original = fresh_replicas;
                    self.put_record(id, &PauseRecord::deployment(original, PauseMechanism::ScaledToZero))
                        .await?;
                }
                self.cluster
                    .scale_deployment(&id.namespace, &id.name, 0, fresh.metadata.resource_version.as_deref())
                    .await
                    .map_err(|e| ControlError::from_cluster(id, e))?;
            }
            Err(e) => return Err(ControlError::from_cluster(id, e)),
        }

        self.mirror_pause(id, original).await;
        info!(workload = %id, original, "Deployment scaled to zero");

        Ok(ActionOutcome {
            message: with_warnings(
                format!("{target} scaled from {original} to 0 replicas"),
                &warnings,
            ),
            target,
            previous_replicas: Some(original),
            replicas: Some(0),
            mutated: true,
            warnings,
        })
    }

    async fn resume_deployment(
        &self,
        id: &WorkloadId,
        explicit: Option<u32>,
        mut warnings: Vec<String>,
    ) -> Result<ActionOutcome, ControlError> {
        let deployment = self.get_deployment(id).await?;
        let record = self.record_for(id, WorkloadKind::Deployment).await?;
        let current = desired_replicas(&deployment);
        let target = Target::new(WorkloadKind::Deployment, id);

        let native = match &record {
            Some(r) => r.mechanism == PauseMechanism::NativePause,
            None => self.cluster.capabilities().native_pause,
        };

        if native {
            let paused = natively_paused(&deployment);
            if !paused && record.is_none() && explicit.map_or(true, |n| n == current) {
                warnings.push(format!("No pause record found for {id}; it is already running"));
                return Ok(ActionOutcome {
                    message: with_warnings(format!("{target} is already running"), &warnings),
                    target,
                    previous_replicas: Some(current),
                    replicas: Some(current),
                    mutated: false,
                    warnings,
                });
            }

            if paused {
                self.cluster
                    .set_deployment_paused(&id.namespace, &id.name, false)
                    .await
                    .map_err(|e| ControlError::from_cluster(id, e))?;
            }
            let replicas = explicit.unwrap_or(current);
            if replicas != current {
                self.scale_with_retry(id, &deployment, replicas).await?;
            }
            self.delete_record(id, WorkloadKind::Deployment).await?;
            self.mirror_resume(id).await;
            info!(workload = %id, replicas, "Deployment resumed natively");

            return Ok(ActionOutcome {
                message: with_warnings(format!("{target} resumed with {replicas} replicas"), &warnings),
                target,
                previous_replicas: Some(current),
                replicas: Some(replicas),
                mutated: true,
                warnings,
            });
        }

        let replicas = match (explicit, &record) {
            (Some(n), _) => n,
            (None, Some(r)) => {
                if r.assumed {
                    warnings.push(format!(
                        "{id} was already at 0 replicas when paused; restoring assumed count {}",
                        r.original_replicas
                    ));
                }
                r.original_replicas
            }
            (None, None) => {
                let legacy = deployment
                    .metadata
                    .annotations
                    .as_ref()
                    .and_then(|a| a.get(annotations::ORIGINAL_REPLICAS))
                    .and_then(|v| v.parse::<u32>().ok());
                match legacy {
                    Some(n) => {
                        warnings.push(format!(
                            "No pause record found for {id}; restoring {n} replicas from the {} annotation",
                            annotations::ORIGINAL_REPLICAS
                        ));
                        n
                    }
                    None if current > 0 => {
                        warnings.push(format!(
                            "No pause record found for {id}; it is already running with {current} replicas"
                        ));
                        return Ok(ActionOutcome {
                            message: with_warnings(format!("{target} is already running"), &warnings),
                            target,
                            previous_replicas: Some(current),
                            replicas: Some(current),
                            mutated: false,
                            warnings,
                        });
                    }
                    None => {
                        let n = self.config.default_resume_replicas;
                        warnings.push(format!(
                            "No pause record found for {id}; defaulting to {n} replicas"
                        ));
                        n
                    }
                }
            }
        };

        if current == replicas && replicas > 0 {
            self.delete_record(id, WorkloadKind::Deployment).await?;
            self.mirror_resume(id).await;
            return Ok(ActionOutcome {
                message: with_warnings(
                    format!("{target} is already running with {replicas} replicas"),
                    &warnings,
                ),
                target,
                previous_replicas: Some(current),
                replicas: Some(replicas),
                mutated: false,
                warnings,
            });
        }

        self.scale_with_retry(id, &deployment, replicas).await?;
        self.delete_record(id, WorkloadKind::Deployment).await?;
        self.mirror_resume(id).await;
        info!(workload = %id, replicas, "Deployment scaled back up");

        Ok(ActionOutcome {
            message: with_warnings(format!("{target} scaled to {replicas} replicas"), &warnings),
            target,
            previous_replicas: Some(current),
            replicas: Some(replicas),
            mutated: true,
            warnings,
        })
    }

    /// Scale with the read's resource version, retrying once on conflict
    async fn scale_with_retry(
        &self,
        id: &WorkloadId,
        deployment: &Deployment,
        replicas: u32,
    ) -> Result<(), ControlError> {
        let count = i32::try_from(replicas).unwrap_or(i32::MAX);
        match self
            .cluster
            .scale_deployment(&id.namespace, &id.name, count, deployment.metadata.resource_version.as_deref())
            .await
        {
            Ok(_) => Ok(()),
            Err(ClusterError::Conflict(reason)) => {
                warn!(workload = %id, reason = %reason, "Scale conflicted, retrying with a fresh read");
                let fresh = self.get_deployment(id).await?;
                self.cluster
                    .scale_deployment(&id.namespace, &id.name, count, fresh.metadata.resource_version.as_deref())
                    .await
                    .map(|_| ())
                    .map_err(|e| ControlError::from_cluster(id, e))
            }
            Err(e) => Err(ControlError::from_cluster(id, e)),
        }
    }

    async fn mirror_pause(&self, id: &WorkloadId, original: u32) {
        if !self.config.mirror_annotations {
            return;
        }
        let mut patch = BTreeMap::new();
        patch.insert(annotations::PAUSED.to_string(), Some("true".to_string()));
        patch.insert(annotations::ORIGINAL_REPLICAS.to_string(), Some(original.to_string()));
        if let Err(e) = self.cluster.annotate_deployment(&id.namespace, &id.name, &patch).await {
            warn!(workload = %id, error = %e, "Failed to write pause annotations");
        }
    }

    async fn mirror_resume(&self, id: &WorkloadId) {
        if !self.config.mirror_annotations {
            return;
        }
        let mut patch = BTreeMap::new();
        patch.insert(annotations::PAUSED.to_string(), None);
        patch.insert(annotations::ORIGINAL_REPLICAS.to_string(), None);
        if let Err(e) = self.cluster.annotate_deployment(&id.namespace, &id.name, &patch).await {
            warn!(workload = %id, error = %e, "Failed to clear pause annotations");
        }
    }

    // -----------------------------------------------------------------------
    // Bare pods
    // -----------------------------------------------------------------------

    async fn pause_pod(
        &self,
        id: &WorkloadId,
        mut warnings: Vec<String>,
    ) -> Result<ActionOutcome, ControlError> {
        let target = Target::new(WorkloadKind::Pod, id);
        let existing = self.record_for(id, WorkloadKind::Pod).await?;
        let pod = self.live_pod(id).await?;

        let Some(pod) = pod else {
            // deleted by an earlier pause and not recreated since
            return Ok(ActionOutcome {
                message: with_warnings(format!("{target} is already paused"), &warnings),
                target,
                previous_replicas: Some(1),
                replicas: Some(0),
                mutated: false,
                warnings,
            });
        };

        if existing.map(|r| r.mechanism) == Some(PauseMechanism::Signalled) {
            return Ok(ActionOutcome {
                message: with_warnings(format!("{target} is already paused"), &warnings),
                target,
                previous_replicas: Some(1),
                replicas: Some(0),
                mutated: false,
                warnings,
            });
        }

        let template = sanitize_pod(&pod);

        if self.config.bare_pod_strategy == BarePodStrategy::Signal {
            self.put_record(id, &PauseRecord::pod(PauseMechanism::Signalled, template.clone()))
                .await?;
            let containers = container_names(&pod);
            match self.signal_containers(id, &containers, Signal::Stop).await {
                Ok(()) => {
                    self.label_pod(id, Some(annotations::STATUS_PAUSED)).await;
                    info!(workload = %id, "Pod stopped in place");
                    return Ok(ActionOutcome {
                        message: with_warnings(
                            format!("{target} stopped in place with {}", Signal::Stop),
                            &warnings,
                        ),
                        target,
                        previous_replicas: Some(1),
                        replicas: Some(0),
                        mutated: true,
                        warnings,
                    });
                }
                Err((stopped, e)) => {
                    warn!(workload = %id, error = %e, "In-place stop failed, deleting pod instead");
                    // the Signalled record stays until every stopped container runs again
                    self.signal_containers(id, &containers[..stopped], Signal::Cont)
                        .await
                        .map_err(|(_, cont)| ControlError::from_cluster(id, cont))?;
                    warnings.push(format!("in-place stop failed ({e}); pod deleted instead"));
                }
            }
        }

        self.put_record(id, &PauseRecord::pod(PauseMechanism::Deleted, template))
            .await?;
        match self.cluster.delete_pod(&id.namespace, &id.name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warnings.push(format!("{target} was already gone; its stored spec is kept"));
            }
            Err(e) => {
                // the pod is still running, so nothing is paused
                if let Err(cleanup) = self.delete_record(id, WorkloadKind::Pod).await {
                    warn!(workload = %id, error = %cleanup, "Failed to drop pause record of a pod that was not deleted");
                }
                return Err(ControlError::from_cluster(id, e));
            }
        }
        info!(workload = %id, "Pod deleted, spec stored for recreation");

        Ok(ActionOutcome {
            message: with_warnings(
                format!("{target} deleted; it will be recreated from its stored spec on resume"),
                &warnings,
            ),
            target,
            previous_replicas: Some(1),
            replicas: Some(0),
            mutated: true,
            warnings,
        })
    }

    async fn resume_pod(
        &self,
        id: &WorkloadId,
        mut warnings: Vec<String>,
    ) -> Result<ActionOutcome, ControlError> {
        let target = Target::new(WorkloadKind::Pod, id);
        let record = self.record_for(id, WorkloadKind::Pod).await?;
        let pod = self.live_pod(id).await?;

        let Some(record) = record else {
            if pod.is_none() {
                return Err(ControlError::NotFound {
                    workload: id.clone(),
                    reason: format!("pod {} not found and no pause record exists", id.name),
                });
            }
            warnings.push(format!("No pause record found for {id}; it is already running"));
            return Ok(ActionOutcome {
                message: with_warnings(format!("{target} is already running"), &warnings),
                target,
                previous_replicas: Some(1),
                replicas: Some(1),
                mutated: false,
                warnings,
            });
        };

        let message = match (record.mechanism, pod) {
            (PauseMechanism::Signalled, Some(pod)) => {
                self.signal_containers(id, &container_names(&pod), Signal::Cont)
                    .await
                    .map_err(|(_, e)| ControlError::from_cluster(id, e))?;
                self.label_pod(id, None).await;
                format!("{target} continued with {}", Signal::Cont)
            }
            (_, Some(_)) => {
                warnings.push(format!("{target} already exists; nothing to recreate"));
                self.delete_record(id, WorkloadKind::Pod).await?;
                return Ok(ActionOutcome {
                    message: with_warnings(format!("{target} is already running"), &warnings),
                    target,
                    previous_replicas: Some(0),
                    replicas: Some(1),
                    mutated: false,
                    warnings,
                });
            }
            (mechanism, None) => {
                if mechanism == PauseMechanism::Signalled {
                    warnings.push(format!(
                        "{target} disappeared while stopped; recreating it from its stored spec"
                    ));
                }
                let template = record.pod_template.as_ref().ok_or_else(|| ControlError::NotFound {
                    workload: id.clone(),
                    reason: "pause record holds no pod spec to recreate".to_string(),
                })?;
                match self.cluster.create_pod(&id.namespace, template).await {
                    Ok(_) => {}
                    Err(ClusterError::Conflict(reason)) => {
                        warnings.push(format!("{target} was recreated concurrently: {reason}"));
                    }
                    Err(e) => return Err(ControlError::from_cluster(id, e)),
                }
                format!("{target} recreated from its stored spec")
            }
        };

        self.delete_record(id, WorkloadKind::Pod).await?;
        info!(workload = %id, "Pod resumed");

        Ok(ActionOutcome {
            message: with_warnings(message, &warnings),
            target,
            previous_replicas: Some(0),
            replicas: Some(1),
            mutated: true,
            warnings,
        })
    }

    /// Signal each container in order. On failure, reports how many
    /// containers had already received the signal.
    async fn signal_containers(
        &self,
        id: &WorkloadId,
        containers: &[String],
        signal: Signal,
    ) -> Result<(), (usize, ClusterError)> {
        for (delivered, container) in containers.iter().enumerate() {
            self.cluster
                .signal_container(&id.namespace, &id.name, container, signal)
                .await
                .map_err(|e| (delivered, e))?;
            debug!(workload = %id, container = %container, %signal, "Signal delivered");
        }
        Ok(())
    }

    async fn label_pod(&self, id: &WorkloadId, value: Option<&str>) {
        let mut patch = BTreeMap::new();
        patch.insert(annotations::STATUS_LABEL.to_string(), value.map(str::to_string));
        if let Err(e) = self.cluster.label_pod(&id.namespace, &id.name, &patch).await {
            warn!(workload = %id, error = %e, "Failed to update pod status label");
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn get_deployment(&self, id: &WorkloadId) -> Result<Deployment, ControlError> {
        self.cluster
            .get_deployment(&id.namespace, &id.name)
            .await
            .map_err(|e| ControlError::from_cluster(id, e))
    }

    async fn live_pod(&self, id: &WorkloadId) -> Result<Option<Pod>, ControlError> {
        match self.cluster.get_pod(&id.namespace, &id.name).await {
            Ok(pod) => Ok(Some(pod)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(ControlError::from_cluster(id, e)),
        }
    }

    /// The stored record for `id`, ignoring one written for another kind
    async fn record_for(
        &self,
        id: &WorkloadId,
        kind: WorkloadKind,
    ) -> Result<Option<PauseRecord>, ControlError> {
        let record = self
            .store
            .get(id)
            .await
            .map_err(|e| ControlError::from_store(id, e))?;
        match record {
            Some(r) if r.kind != kind => {
                warn!(workload = %id, stored = %r.kind, expected = %kind, "Ignoring pause record of another kind");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Records share one slot per `namespace/name`; a record written for the
    /// other kind is never replaced.
    async fn put_record(&self, id: &WorkloadId, record: &PauseRecord) -> Result<(), ControlError> {
        let stored = self
            .store
            .get(id)
            .await
            .map_err(|e| ControlError::from_store(id, e))?;
        if let Some(stored) = stored.filter(|r| r.kind != record.kind) {
            return Err(ControlError::Conflict {
                workload: id.clone(),
                reason: format!(
                    "a paused {} with the same name holds the pause record; resume it first",
                    stored.kind
                ),
            });
        }
        self.store
            .put(id, record)
            .await
            .map_err(|e| ControlError::from_store(id, e))
    }

    /// Remove the record for `id` if it was written for `kind`
    async fn delete_record(&self, id: &WorkloadId, kind: WorkloadKind) -> Result<(), ControlError> {
        if self.record_for(id, kind).await?.is_none() {
            return Ok(());
        }
        self.store
            .delete(id)
            .await
            .map_err(|e| ControlError::from_store(id, e))
    }

    fn lock_for(&self, id: &WorkloadId) -> Arc<Mutex<()>> {
        self.locks.entry(id.clone()).or_default().clone()
    }

    fn release_lock(&self, id: &WorkloadId) {
        self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

