//! Health & Alert Engine
//!
//! Evaluates a normalized [`ClusterSnapshot`](crate::models::ClusterSnapshot)
//! against a fixed rule set to produce a cluster health verdict, discrete
//! alerts and per-pod issue reports.

mod engine;

pub use engine::{AlertEngine, AlertThresholds};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ContainerView;

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Alert type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    NodeNotReady,
    PodNotRunning,
    ApplicationDeadlock,
    ResourceStarvation,
    CrashLoop,
    StuckInitContainer,
    PendingTooLong,
    DeploymentUnavailable,
    ResourcePressure,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::NodeNotReady => write!(f, "NodeNotReady"),
            AlertType::PodNotRunning => write!(f, "PodNotRunning"),
            AlertType::ApplicationDeadlock => write!(f, "ApplicationDeadlock"),
            AlertType::ResourceStarvation => write!(f, "ResourceStarvation"),
            AlertType::CrashLoop => write!(f, "CrashLoop"),
            AlertType::StuckInitContainer => write!(f, "StuckInitContainer"),
            AlertType::PendingTooLong => write!(f, "PendingTooLong"),
            AlertType::DeploymentUnavailable => write!(f, "DeploymentUnavailable"),
            AlertType::ResourcePressure => write!(f, "ResourcePressure"),
        }
    }
}

/// One rule violation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    /// Kind and name of the offending object, e.g. `Pod prod/app-1`
    pub object: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// Overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn from_severity(severity: Option<AlertSeverity>) -> Self {
        match severity {
            None => HealthStatus::Healthy,
            Some(AlertSeverity::Warning) => HealthStatus::Warning,
            Some(AlertSeverity::Critical) => HealthStatus::Critical,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Warning => write!(f, "Warning"),
            HealthStatus::Critical => write!(f, "Critical"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthComponent {
    pub name: String,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterHealth {
    pub status: HealthStatus,
    pub components: Vec<HealthComponent>,
    pub alerts: Vec<Alert>,
}

impl ClusterHealth {
    pub fn count(&self, severity: AlertSeverity) -> usize {
        self.alerts.iter().filter(|a| a.severity == severity).count()
    }
}

/// A detected problem on one pod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodIssue {
    #[serde(rename = "type")]
    pub issue_type: AlertType,
    pub severity: AlertSeverity,
    pub description: String,
    /// `H:MM:SS` for time-based rules, `Ongoing` otherwise
    pub duration: String,
}

/// Per-pod report served by `/api/pods/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodHealth {
    pub name: String,
    pub namespace: String,
    pub status: String,
    pub start_time: Option<DateTime<Utc>>,
    pub container_statuses: Vec<ContainerView>,
    pub potential_issues: Vec<PodIssue>,
}
