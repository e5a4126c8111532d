//! Observability infrastructure for the dashboard
//!
//! Provides:
//! - Prometheus metrics (snapshot latency, workload actions, paused workloads, alerts)
//! - Structured logging of domain events with tracing

use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, register_int_gauge_vec,
    Histogram, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::alerts::{AlertSeverity, ClusterHealth};
use crate::error::ControlError;
use crate::store::WorkloadId;

/// Histogram buckets for snapshot latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DashboardMetricsInner> = OnceLock::new();

struct DashboardMetricsInner {
    snapshot_latency_seconds: Histogram,
    workload_actions_total: IntCounterVec,
    paused_workloads: IntGauge,
    cluster_alerts: IntGaugeVec,
}

impl DashboardMetricsInner {
    fn new() -> Self {
        Self {
            snapshot_latency_seconds: register_histogram!(
                "kube_dashboard_snapshot_latency_seconds",
                "Time spent building a cluster snapshot",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register snapshot_latency_seconds"),

            workload_actions_total: register_int_counter_vec!(
                "kube_dashboard_workload_actions_total",
                "Pause/resume actions by outcome",
                &["action", "outcome"]
            )
            .expect("Failed to register workload_actions_total"),

            paused_workloads: register_int_gauge!(
                "kube_dashboard_paused_workloads",
                "Workloads currently holding a pause record"
            )
            .expect("Failed to register paused_workloads"),

            cluster_alerts: register_int_gauge_vec!(
                "kube_dashboard_cluster_alerts",
                "Active cluster alerts by severity",
                &["severity"]
            )
            .expect("Failed to register cluster_alerts"),
        }
    }
}

/// Handle to the process-global dashboard metrics.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct DashboardMetrics {
    _private: (),
}

impl Default for DashboardMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DashboardMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DashboardMetricsInner {
        GLOBAL_METRICS.get_or_init(DashboardMetricsInner::new)
    }

    pub fn observe_snapshot_latency(&self, duration_secs: f64) {
        self.inner().snapshot_latency_seconds.observe(duration_secs);
    }

    /// `outcome` is `success` or an error kind such as `not_found`
    pub fn inc_workload_action(&self, action: &str, outcome: &str) {
        self.inner()
            .workload_actions_total
            .with_label_values(&[action, outcome])
            .inc();
    }

    pub fn set_paused_workloads(&self, count: i64) {
        self.inner().paused_workloads.set(count);
    }

    pub fn set_cluster_alerts(&self, health: &ClusterHealth) {
        for severity in [AlertSeverity::Warning, AlertSeverity::Critical] {
            self.inner()
                .cluster_alerts
                .with_label_values(&[&severity.to_string()])
                .set(health.count(severity) as i64);
        }
    }
}

/// Structured logger for dashboard events
///
/// Every event carries a stable `event` field and the `instance` the
/// dashboard is serving (kube context or `demo`).
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, addr: &str, mode: &str) {
        info!(
            event = "dashboard_started",
            instance = %self.instance,
            version = %version,
            addr = %addr,
            mode = %mode,
            "Dashboard started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "dashboard_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Dashboard shutting down"
        );
    }

    pub fn log_pause(
        &self,
        workload: &WorkloadId,
        kind: &str,
        previous_replicas: Option<u32>,
        mutated: bool,
    ) {
        info!(
            event = "workload_paused",
            instance = %self.instance,
            namespace = %workload.namespace,
            name = %workload.name,
            kind = %kind,
            previous_replicas = ?previous_replicas,
            mutated = mutated,
            "Workload paused"
        );
    }

    pub fn log_resume(
        &self,
        workload: &WorkloadId,
        kind: &str,
        replicas: Option<u32>,
        warnings: &[String],
    ) {
        if warnings.is_empty() {
            info!(
                event = "workload_resumed",
                instance = %self.instance,
                namespace = %workload.namespace,
                name = %workload.name,
                kind = %kind,
                replicas = ?replicas,
                "Workload resumed"
            );
        } else {
            warn!(
                event = "workload_resumed",
                instance = %self.instance,
                namespace = %workload.namespace,
                name = %workload.name,
                kind = %kind,
                replicas = ?replicas,
                warnings = ?warnings,
                "Workload resumed with warnings"
            );
        }
    }

    pub fn log_action_failed(&self, action: &str, error: &ControlError) {
        warn!(
            event = "workload_action_failed",
            instance = %self.instance,
            action = %action,
            namespace = %error.workload().namespace,
            name = %error.workload().name,
            error_kind = %error.kind(),
            error = %error,
            "Workload action failed"
        );
    }

    pub fn log_snapshot(&self, health: &ClusterHealth, pods: usize, duration_secs: f64) {
        info!(
            event = "snapshot_built",
            instance = %self.instance,
            status = %health.status,
            alerts = health.alerts.len(),
            pods = pods,
            duration_secs = duration_secs,
            "Cluster snapshot built"
        );
    }
}
