//! Error taxonomy shared by the cluster adapters, the state store and the
//! pause/resume controller.

use std::fmt;

use thiserror::Error;

use crate::store::{StoreError, WorkloadId};

/// Failure reported by a [`ClusterApi`](crate::cluster::ClusterApi) call.
///
/// The payload is always the reason string reported by the orchestrator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Optimistic-concurrency rejection (stale resource version) or an
    /// already-existing object on create
    #[error("conflict: {0}")]
    Conflict(String),

    /// The orchestrator rejected the request itself (malformed or failed
    /// validation); retrying the same request cannot succeed
    #[error("invalid: {0}")]
    Invalid(String),

    /// Transient failure: network, throttling or server-side error
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The cluster backend cannot perform the operation at all
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl ClusterError {
    /// Reason string without the classification prefix
    pub fn reason(&self) -> &str {
        match self {
            ClusterError::NotFound(r)
            | ClusterError::Forbidden(r)
            | ClusterError::Conflict(r)
            | ClusterError::Invalid(r)
            | ClusterError::Unavailable(r)
            | ClusterError::Unsupported(r) => r,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) => {
                let reason = if response.message.is_empty() {
                    response.reason.clone()
                } else {
                    response.message.clone()
                };
                match response.code {
                    404 => ClusterError::NotFound(reason),
                    401 | 403 => ClusterError::Forbidden(reason),
                    409 => ClusterError::Conflict(reason),
                    400 | 422 => ClusterError::Invalid(reason),
                    _ => ClusterError::Unavailable(reason),
                }
            }
            other => ClusterError::Unavailable(other.to_string()),
        }
    }
}

/// Classification of a failed workload action, used for HTTP mapping and
/// metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Unavailable,
    Conflict,
    Invalid,
    Store,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Forbidden => write!(f, "forbidden"),
            ErrorKind::Unavailable => write!(f, "unavailable"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::Invalid => write!(f, "invalid"),
            ErrorKind::Store => write!(f, "store"),
        }
    }
}

/// Error returned by the pause/resume controller.
///
/// Every variant names the workload and carries the underlying reason so a
/// caller can show it verbatim.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("workload {workload} not found: {reason}")]
    NotFound { workload: WorkloadId, reason: String },

    #[error("permission denied for workload {workload}: {reason}")]
    Forbidden { workload: WorkloadId, reason: String },

    #[error("cluster unavailable while handling workload {workload}: {reason}")]
    Unavailable { workload: WorkloadId, reason: String },

    #[error("conflicting update to workload {workload}: {reason}")]
    Conflict { workload: WorkloadId, reason: String },

    #[error("request for workload {workload} rejected as invalid: {reason}")]
    Invalid { workload: WorkloadId, reason: String },

    #[error("state store failure for workload {workload}: {source}")]
    Store {
        workload: WorkloadId,
        #[source]
        source: StoreError,
    },
}

impl ControlError {
    /// Attach a workload identity to a cluster failure
    pub fn from_cluster(workload: &WorkloadId, err: ClusterError) -> Self {
        let workload = workload.clone();
        match err {
            ClusterError::NotFound(reason) => ControlError::NotFound { workload, reason },
            ClusterError::Forbidden(reason) => ControlError::Forbidden { workload, reason },
            ClusterError::Conflict(reason) => ControlError::Conflict { workload, reason },
            ClusterError::Invalid(reason) => ControlError::Invalid { workload, reason },
            ClusterError::Unavailable(reason) | ClusterError::Unsupported(reason) => {
                ControlError::Unavailable { workload, reason }
            }
        }
    }

    pub fn from_store(workload: &WorkloadId, source: StoreError) -> Self {
        ControlError::Store {
            workload: workload.clone(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ControlError::NotFound { .. } => ErrorKind::NotFound,
            ControlError::Forbidden { .. } => ErrorKind::Forbidden,
            ControlError::Unavailable { .. } => ErrorKind::Unavailable,
            ControlError::Conflict { .. } => ErrorKind::Conflict,
            ControlError::Invalid { .. } => ErrorKind::Invalid,
            ControlError::Store { .. } => ErrorKind::Store,
        }
    }

    pub fn workload(&self) -> &WorkloadId {
        match self {
            ControlError::NotFound { workload, .. }
            | ControlError::Forbidden { workload, .. }
            | ControlError::Unavailable { workload, .. }
            | ControlError::Conflict { workload, .. }
            | ControlError::Invalid { workload, .. }
            | ControlError::Store { workload, .. } => workload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_error_maps_to_control_error_kind() {
        let id = WorkloadId::new("prod", "app");

        let err = ControlError::from_cluster(&id, ClusterError::NotFound("gone".into()));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.workload(), &id);

        let err = ControlError::from_cluster(&id, ClusterError::Unsupported("no exec".into()));
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        let err = ControlError::from_cluster(&id, ClusterError::Invalid("spec.containers: Required value".into()));
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(err.kind().to_string(), "invalid");
    }

    #[test]
    fn test_control_error_message_names_workload_and_reason() {
        let id = WorkloadId::new("prod", "app");
        let err = ControlError::from_cluster(
            &id,
            ClusterError::Forbidden("deployments.apps \"app\" is forbidden".into()),
        );

        let message = err.to_string();
        assert!(message.contains("prod/app"));
        assert!(message.contains("is forbidden"));
    }

    #[test]
    fn test_kube_api_error_classification() {
        let api_error = |code: u16| {
            kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("status {code}"),
                reason: "Reason".to_string(),
                code,
            })
        };

        assert!(matches!(ClusterError::from(api_error(404)), ClusterError::NotFound(_)));
        assert!(matches!(ClusterError::from(api_error(403)), ClusterError::Forbidden(_)));
        assert!(matches!(ClusterError::from(api_error(409)), ClusterError::Conflict(_)));
        assert!(matches!(ClusterError::from(api_error(400)), ClusterError::Invalid(_)));
        assert!(matches!(ClusterError::from(api_error(422)), ClusterError::Invalid(_)));
        assert!(matches!(ClusterError::from(api_error(429)), ClusterError::Unavailable(_)));
        assert!(matches!(ClusterError::from(api_error(503)), ClusterError::Unavailable(_)));
        assert_eq!(ClusterError::from(api_error(404)).reason(), "status 404");
    }
}
