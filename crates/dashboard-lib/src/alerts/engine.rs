//! Rule evaluation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    Alert, AlertSeverity, AlertType, ClusterHealth, HealthComponent, HealthStatus, PodHealth,
    PodIssue,
};
use crate::models::{ClusterSnapshot, ContainerStateKind, PodView, ResourceUsage};

/// Rule thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Running-but-not-ready time before a deadlock is suspected
    pub deadlock_secs: i64,
    /// Restarts above this (and up to `crash_loop_restarts`) suggest starvation
    pub starvation_restarts: i32,
    /// Restarts above this are a crash loop
    pub crash_loop_restarts: i32,
    /// Time a scheduled pod may stay Pending
    pub pending_secs: i64,
    /// Requested share of allocatable CPU or memory, in percent
    pub pressure_percent: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            deadlock_secs: 300,
            starvation_restarts: 3,
            crash_loop_restarts: 10,
            pending_secs: 300,
            pressure_percent: 90.0,
        }
    }
}

/// `H:MM:SS`
fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

fn ongoing() -> String {
    "Ongoing".to_string()
}

#[derive(Debug, Clone, Default)]
pub struct AlertEngine {
    thresholds: AlertThresholds,
}

impl AlertEngine {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Container- and phase-level issues on a single pod
    pub fn pod_issues(&self, pod: &PodView, now: DateTime<Utc>) -> Vec<PodIssue> {
        let t = &self.thresholds;
        let mut issues = Vec::new();

        if pod.phase == "Running" {
            for c in &pod.containers {
                if c.ready || c.state != ContainerStateKind::Running {
                    continue;
                }
                let Some(started) = c.started_at else {
                    continue;
                };
                let secs = now.signed_duration_since(started).num_seconds();
                if secs > t.deadlock_secs {
                    issues.push(PodIssue {
                        issue_type: AlertType::ApplicationDeadlock,
                        severity: AlertSeverity::Warning,
                        description: format!(
                            "Container {} running but not ready for {} seconds",
                            c.name, secs
                        ),
                        duration: format_duration(secs),
                    });
                }
            }
        }

        for c in &pod.containers {
            if c.restart_count > t.starvation_restarts && c.restart_count <= t.crash_loop_restarts {
                issues.push(PodIssue {
                    issue_type: AlertType::ResourceStarvation,
                    severity: AlertSeverity::Warning,
                    description: format!(
                        "Container {} has restarted {} times, possible resource issues",
                        c.name, c.restart_count
                    ),
                    duration: ongoing(),
                });
            }
            let backing_off = c.state == ContainerStateKind::Waiting
                && c.reason.as_deref() == Some("CrashLoopBackOff");
            if c.restart_count > t.crash_loop_restarts || backing_off {
                issues.push(PodIssue {
                    issue_type: AlertType::CrashLoop,
                    severity: AlertSeverity::Critical,
                    description: if backing_off {
                        format!("Container {} is in CrashLoopBackOff", c.name)
                    } else {
                        format!("Container {} has restarted {} times", c.name, c.restart_count)
                    },
                    duration: ongoing(),
                });
            }
        }

        for c in &pod.init_containers {
            if c.state != ContainerStateKind::Waiting {
                continue;
            }
            let reason = c.reason.as_deref().unwrap_or("Unknown");
            if reason != "PodInitializing" {
                issues.push(PodIssue {
                    issue_type: AlertType::StuckInitContainer,
                    severity: AlertSeverity::Critical,
                    description: format!("Init container {} stuck: {}", c.name, reason),
                    duration: ongoing(),
                });
            }
        }

        if pod.phase == "Pending" && pod.scheduled {
            if let Some(start) = pod.start_time {
                let secs = now.signed_duration_since(start).num_seconds();
                if secs > t.pending_secs {
                    issues.push(PodIssue {
                        issue_type: AlertType::PendingTooLong,
                        severity: AlertSeverity::Warning,
                        description: format!("Pod stuck in Pending state for {} seconds", secs),
                        duration: format_duration(secs),
                    });
                }
            }
        }

        issues
    }

    /// Issue report for every pod in the snapshot
    pub fn pod_health(&self, snapshot: &ClusterSnapshot) -> Vec<PodHealth> {
        let now = Utc::now();
        snapshot
            .pods
            .iter()
            .map(|pod| PodHealth {
                name: pod.name.clone(),
                namespace: pod.namespace.clone(),
                status: pod.status.clone(),
                start_time: pod.start_time,
                container_statuses: pod.containers.clone(),
                potential_issues: self.pod_issues(pod, now),
            })
            .collect()
    }

    /// Evaluate every rule and derive the cluster verdict
    pub fn evaluate(&self, snapshot: &ClusterSnapshot, usage: &ResourceUsage) -> ClusterHealth {
        let now = Utc::now();
        let mut node_alerts = Vec::new();
        let mut pod_alerts = Vec::new();
        let mut deployment_alerts = Vec::new();
        let mut resource_alerts = Vec::new();

        for node in &snapshot.nodes {
            if node.status != "Ready" {
                node_alerts.push(Alert {
                    alert_type: AlertType::NodeNotReady,
                    severity: AlertSeverity::Critical,
                    object: format!("Node {}", node.name),
                    message: format!("Node {} is {}", node.name, node.status),
                    duration: None,
                });
            }
        }

        for pod in snapshot.pods.iter().filter(|p| !p.is_paused()) {
            let object = format!("Pod {}/{}", pod.namespace, pod.name);
            if !matches!(pod.phase.as_str(), "Running" | "Succeeded") {
                pod_alerts.push(Alert {
                    alert_type: AlertType::PodNotRunning,
                    severity: AlertSeverity::Warning,
                    object: object.clone(),
                    message: format!("Pod {} in {} is {}", pod.name, pod.namespace, pod.phase),
                    duration: None,
                });
            }
            for issue in self.pod_issues(pod, now) {
                pod_alerts.push(Alert {
                    alert_type: issue.issue_type,
                    severity: issue.severity,
                    object: object.clone(),
                    message: issue.description,
                    duration: Some(issue.duration),
                });
            }
        }

        for deployment in &snapshot.deployments {
            if deployment.desired > 0
                && deployment.available < deployment.desired
                && !deployment.paused
            {
                deployment_alerts.push(Alert {
                    alert_type: AlertType::DeploymentUnavailable,
                    severity: AlertSeverity::Warning,
                    object: format!("Deployment {}/{}", deployment.namespace, deployment.name),
                    message: format!(
                        "Deployment {} has {}/{} replicas available",
                        deployment.name, deployment.available, deployment.desired
                    ),
                    duration: None,
                });
            }
        }

        for (resource, figure) in [("CPU", &usage.cpu), ("Memory", &usage.memory)] {
            if figure.percent > self.thresholds.pressure_percent {
                resource_alerts.push(Alert {
                    alert_type: AlertType::ResourcePressure,
                    severity: AlertSeverity::Warning,
                    object: "Cluster".to_string(),
                    message: format!(
                        "{} requests at {:.1}% of allocatable",
                        resource, figure.percent
                    ),
                    duration: None,
                });
            }
        }

        let worst = |alerts: &[Alert]| alerts.iter().map(|a| a.severity).max();
        let components = vec![
            HealthComponent {
                name: "API Server".to_string(),
                status: HealthStatus::Healthy,
            },
            HealthComponent {
                name: "Node Status".to_string(),
                status: HealthStatus::from_severity(worst(&node_alerts)),
            },
            HealthComponent {
                name: "Workloads".to_string(),
                status: HealthStatus::from_severity(worst(&pod_alerts)),
            },
            HealthComponent {
                name: "Deployments".to_string(),
                status: HealthStatus::from_severity(worst(&deployment_alerts)),
            },
            HealthComponent {
                name: "Resources".to_string(),
                status: HealthStatus::from_severity(worst(&resource_alerts)),
            },
        ];

        let mut alerts = node_alerts;
        alerts.extend(pod_alerts);
        alerts.extend(deployment_alerts);
        alerts.extend(resource_alerts);

        ClusterHealth {
            status: HealthStatus::from_severity(worst(&alerts)),
            components,
            alerts,
        }
    }
}
