//! Cluster health: verdict, resource usage, alerts and unhealthy pods

use anyhow::Result;
use colored::Colorize;
use dashboard_lib::alerts::Alert;
use serde::Serialize;
use tabled::Tabled;

use crate::backend::Backend;
use crate::client::Overview;
use crate::output::{
    color_percent, color_severity, color_status, print_json, print_rows, print_success,
    OutputFormat,
};

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Type")]
    alert_type: String,
    #[tabled(rename = "Object")]
    object: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "For")]
    duration: String,
}

impl From<&Alert> for AlertRow {
    fn from(a: &Alert) -> Self {
        Self {
            severity: color_severity(&a.severity.to_string()),
            alert_type: a.alert_type.to_string(),
            object: a.object.clone(),
            message: a.message.clone(),
            duration: a.duration.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Tabled)]
struct PodIssueRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Pod")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Issues")]
    issues: usize,
}

#[derive(Serialize)]
struct HealthReport<'a> {
    overview: &'a Overview,
    unhealthy_pods: usize,
}

/// Show the cluster health verdict
pub async fn show(backend: &Backend, format: OutputFormat, verbose: bool) -> Result<()> {
    let overview = backend.overview().await?;
    let pods = backend.pod_health().await?;
    let unhealthy: Vec<_> = pods
        .iter()
        .filter(|p| !p.potential_issues.is_empty())
        .collect();

    if format == OutputFormat::Json {
        return print_json(&HealthReport {
            overview: &overview,
            unhealthy_pods: unhealthy.len(),
        });
    }

    let health = &overview.cluster_health;
    println!(
        "{} {}",
        "Cluster health:".bold(),
        color_status(&health.status.to_string())
    );
    for component in &health.components {
        println!(
            "  {:<12} {}",
            component.name,
            color_status(&component.status.to_string())
        );
    }

    let usage = &overview.resource_usage;
    println!(
        "\n{} CPU {} ({}), memory {} ({})",
        "Requested:".bold(),
        usage.cpu.display,
        color_percent(usage.cpu.percent),
        usage.memory.display,
        color_percent(usage.memory.percent),
    );
    println!();

    if health.alerts.is_empty() {
        print_success("No alerts");
    } else {
        print_rows(health.alerts.iter().map(AlertRow::from).collect(), "No alerts");
    }

    if verbose && !unhealthy.is_empty() {
        println!();
        print_rows(
            unhealthy
                .iter()
                .map(|p| PodIssueRow {
                    namespace: p.namespace.clone(),
                    name: p.name.clone(),
                    status: color_status(&p.status),
                    issues: p.potential_issues.len(),
                })
                .collect(),
            "No unhealthy pods",
        );
    }

    Ok(())
}
