//! [`ClusterApi`] over a real Kubernetes API server

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{Namespace, Node, Pod, Service};
use kube::api::{AttachParams, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use serde_json::json;
use tracing::{debug, info};

use super::{Capabilities, ClusterApi, Signal};
use crate::error::ClusterError;

/// Kubernetes-backed cluster handle.
///
/// Built once at startup and shared; the underlying [`Client`] is cheap to
/// clone and safe for concurrent use.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    context: Option<String>,
}

impl KubeCluster {
    /// Connect using in-cluster config or the default kubeconfig.
    ///
    /// With `context` set, that kubeconfig context is used instead of the
    /// current one.
    pub async fn connect(context: Option<&str>) -> Result<Self, ClusterError> {
        let client = match context {
            Some(ctx) => {
                let options = KubeConfigOptions {
                    context: Some(ctx.to_string()),
                    cluster: None,
                    user: None,
                };
                let config = Config::from_kubeconfig(&options)
                    .await
                    .map_err(|e| ClusterError::Unavailable(format!("kubeconfig: {e}")))?;
                Client::try_from(config)?
            }
            None => Client::try_default().await?,
        };

        info!(context = ?context, "Connected to Kubernetes API");
        Ok(Self {
            client,
            context: context.map(str::to_string),
        })
    }

    /// Connect using an explicit kubeconfig file
    pub async fn from_kubeconfig(path: &Path, context: Option<&str>) -> Result<Self, ClusterError> {
        let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
            ClusterError::Unavailable(format!("failed to read kubeconfig {}: {e}", path.display()))
        })?;
        let options = KubeConfigOptions {
            context: context.map(str::to_string),
            cluster: None,
            user: None,
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| ClusterError::Unavailable(format!("kubeconfig: {e}")))?;
        let client = Client::try_from(config)?;

        info!(path = %path.display(), context = ?context, "Connected to Kubernetes API");
        Ok(Self {
            client,
            context: context.map(str::to_string),
        })
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn scoped<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    fn capabilities(&self) -> Capabilities {
        // `spec.paused` only freezes rollouts; it does not stop running pods.
        Capabilities {
            native_pause: false,
            exec: true,
        }
    }

    async fn ping(&self) -> Result<String, ClusterError> {
        let version = self.client.apiserver_version().await?;
        Ok(version.git_version)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>, ClusterError> {
        let api: Api<Pod> = self.scoped(namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_deployments(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<Deployment>, ClusterError> {
        let api: Api<Deployment> = self.scoped(namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_services(&self, namespace: Option<&str>) -> Result<Vec<Service>, ClusterError> {
        let api: Api<Service> = self.scoped(namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError> {
        let api: Api<Deployment> = self.namespaced(namespace);
        Ok(api.get(name).await?)
    }

    async fn get_replica_set(&self, namespace: &str, name: &str) -> Result<ReplicaSet, ClusterError> {
        let api: Api<ReplicaSet> = self.namespaced(namespace);
        Ok(api.get(name).await?)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClusterError> {
        let api: Api<Pod> = self.namespaced(namespace);
        Ok(api.get(name).await?)
    }

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
        resource_version: Option<&str>,
    ) -> Result<Deployment, ClusterError> {
        let api: Api<Deployment> = self.namespaced(namespace);

        // A resourceVersion in a merge patch makes the API server reject the
        // update with 409 if the object has moved on.
        let patch = match resource_version {
            Some(rv) => json!({
                "metadata": { "resourceVersion": rv },
                "spec": { "replicas": replicas }
            }),
            None => json!({ "spec": { "replicas": replicas } }),
        };

        debug!(namespace, name, replicas, "Scaling deployment");
        Ok(api
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn set_deployment_paused(
        &self,
        namespace: &str,
        name: &str,
        paused: bool,
    ) -> Result<Deployment, ClusterError> {
        let api: Api<Deployment> = self.namespaced(namespace);
        let patch = json!({ "spec": { "paused": paused } });
        Ok(api
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn annotate_deployment(
        &self,
        namespace: &str,
        name: &str,
        annotations: &BTreeMap<String, Option<String>>,
    ) -> Result<(), ClusterError> {
        let api: Api<Deployment> = self.namespaced(namespace);
        // null values remove the key under merge-patch semantics
        let patch = json!({ "metadata": { "annotations": annotations } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn label_pod(
        &self,
        namespace: &str,
        name: &str,
        labels: &BTreeMap<String, Option<String>>,
    ) -> Result<(), ClusterError> {
        let api: Api<Pod> = self.namespaced(namespace);
        let patch = json!({ "metadata": { "labels": labels } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, ClusterError> {
        let api: Api<Pod> = self.namespaced(namespace);
        Ok(api.create(&PostParams::default(), pod).await?)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let api: Api<Pod> = self.namespaced(namespace);
        api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn signal_container(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        signal: Signal,
    ) -> Result<(), ClusterError> {
        let api: Api<Pod> = self.namespaced(namespace);
        let flag = format!("-{}", signal.as_str());
        let params = AttachParams::default()
            .container(container)
            .stdout(false)
            .stderr(true);

        let mut attached = api.exec(pod, vec!["kill", flag.as_str(), "1"], &params).await?;
        let status = match attached.take_status() {
            Some(status) => status.await,
            None => None,
        };
        attached
            .join()
            .await
            .map_err(|e| ClusterError::Unavailable(format!("exec session failed: {e}")))?;

        match status {
            Some(s) if s.status.as_deref() == Some("Failure") => Err(ClusterError::Unavailable(
                s.message
                    .unwrap_or_else(|| format!("kill {flag} 1 failed in {pod}/{container}")),
            )),
            _ => {
                debug!(namespace, pod, container, %signal, "Signal delivered");
                Ok(())
            }
        }
    }
}
