//! Ownership resolution
//!
//! Climbs a pod's controller reference to the deployment that manages it.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::cluster::ClusterApi;
use crate::error::ClusterError;

/// pod -> ReplicaSet -> Deployment
pub const MAX_HOPS: usize = 2;

pub const KIND_DEPLOYMENT: &str = "Deployment";
pub const KIND_REPLICA_SET: &str = "ReplicaSet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
}

impl OwnerRef {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// The controlling owner of an object, or its first owner when none is
    /// flagged as controller
    pub fn controller_of(meta: &ObjectMeta) -> Option<Self> {
        let refs = meta.owner_references.as_ref()?;
        refs.iter()
            .find(|r| r.controller == Some(true))
            .or_else(|| refs.first())
            .map(|r| Self::new(&r.kind, &r.name))
    }
}

impl std::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// Result of a climb
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerChain {
    /// Owners whose objects were read, nearest first
    pub owners: Vec<OwnerRef>,
    /// Why the climb stopped short, when it did
    pub broken: Option<String>,
}

impl OwnerChain {
    /// Last successfully resolved owner
    pub fn top(&self) -> Option<&OwnerRef> {
        self.owners.last()
    }

    pub fn deployment(&self) -> Option<&str> {
        self.top()
            .filter(|o| o.kind == KIND_DEPLOYMENT)
            .map(|o| o.name.as_str())
    }
}

/// Follow `start` up to [`MAX_HOPS`] owners.
///
/// A missing object or an owner kind outside the deployment chain ends the
/// climb and is reported in [`OwnerChain::broken`]. Any other cluster error
/// is returned.
pub async fn climb(
    cluster: &dyn ClusterApi,
    namespace: &str,
    start: &OwnerRef,
) -> Result<OwnerChain, ClusterError> {
    let mut chain = OwnerChain::default();
    let mut next = Some(start.clone());

    for _ in 0..MAX_HOPS {
        let Some(owner) = next.take() else {
            break;
        };

        let parent = match owner.kind.as_str() {
            KIND_REPLICA_SET => match cluster.get_replica_set(namespace, &owner.name).await {
                Ok(rs) => OwnerRef::controller_of(&rs.metadata),
                Err(e) if e.is_not_found() => {
                    chain.broken = Some(format!("{owner} not found"));
                    break;
                }
                Err(e) => return Err(e),
            },
            KIND_DEPLOYMENT => match cluster.get_deployment(namespace, &owner.name).await {
                Ok(_) => None,
                Err(e) if e.is_not_found() => {
                    chain.broken = Some(format!("{owner} not found"));
                    break;
                }
                Err(e) => return Err(e),
            },
            other => {
                chain.broken = Some(format!("owner kind {other} is not managed by a deployment"));
                break;
            }
        };

        chain.owners.push(owner);
        next = parent;
    }

    if chain.broken.is_none() && chain.deployment().is_none() {
        if let Some(top) = chain.top() {
            chain.broken = Some(format!("{top} has no owning deployment"));
        }
    }

    Ok(chain)
}
