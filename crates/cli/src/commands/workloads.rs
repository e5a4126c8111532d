//! Pause, resume and status commands

use std::time::Duration;

use anyhow::Result;
use dashboard_lib::control::{
    wait_for_replicas, Convergence, PausedWorkload, WaitOptions, WorkloadRef, WorkloadStatus,
};
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::client::ActionResponse;
use crate::output::{
    color_status, print_info, print_json, print_rows, print_success, print_warning, yes_no,
    OutputFormat,
};

/// Row for the workload status table
#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Replicas")]
    replicas: String,
    #[tabled(rename = "Ready")]
    ready: u32,
    #[tabled(rename = "Paused")]
    paused: String,
    #[tabled(rename = "Original")]
    original: String,
}

impl From<&WorkloadStatus> for StatusRow {
    fn from(s: &WorkloadStatus) -> Self {
        Self {
            namespace: s.namespace.clone(),
            name: s.name.clone(),
            kind: s.kind.to_string(),
            status: color_status(&s.status.to_string()),
            replicas: format!("{}/{}", s.available_replicas, s.current_replicas),
            ready: s.ready_replicas,
            paused: yes_no(s.paused),
            original: s
                .original_replicas
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Row for the paused workloads table
#[derive(Tabled)]
struct PausedRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Replicas")]
    original_replicas: String,
    #[tabled(rename = "Mechanism")]
    mechanism: String,
    #[tabled(rename = "Paused At")]
    paused_at: String,
}

impl From<&PausedWorkload> for PausedRow {
    fn from(p: &PausedWorkload) -> Self {
        let replicas = if p.assumed {
            format!("{} (assumed)", p.original_replicas)
        } else {
            p.original_replicas.to_string()
        };
        Self {
            namespace: p.namespace.clone(),
            name: p.name.clone(),
            kind: p.kind.to_string(),
            original_replicas: replicas,
            mechanism: serde_json::to_value(&p.mechanism)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            paused_at: p.paused_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }
}

/// Options shared by pause and resume
pub struct ActionArgs {
    pub namespace: String,
    pub name: String,
    pub owner_kind: Option<String>,
    pub owner_name: Option<String>,
    pub wait: bool,
    pub timeout_secs: u64,
}

impl ActionArgs {
    fn workload(&self) -> WorkloadRef {
        let mut workload = WorkloadRef::new(&self.namespace, &self.name);
        workload.owner_kind = self.owner_kind.clone();
        workload.owner_name = self.owner_name.clone();
        workload
    }
}

/// Pause a workload, optionally waiting for its pods to go away
pub async fn pause(
    backend: &Backend,
    args: ActionArgs,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let response = backend.pause(&args.workload()).await?;
    report(&response, format, verbose)?;

    if args.wait {
        wait(backend, &response, 0, args.timeout_secs, format).await?;
    }
    Ok(())
}

/// Resume a workload, optionally waiting for its replicas to become available
pub async fn resume(
    backend: &Backend,
    args: ActionArgs,
    replicas: Option<u32>,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let response = backend.resume(&args.workload(), replicas).await?;
    report(&response, format, verbose)?;

    if args.wait {
        let target = response.replicas.or(replicas).unwrap_or(1);
        wait(backend, &response, target, args.timeout_secs, format).await?;
    }
    Ok(())
}

fn report(response: &ActionResponse, format: OutputFormat, verbose: bool) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(response)?,
        OutputFormat::Table => {
            print_success(&response.message);
            if verbose {
                print_info(&format!(
                    "Target: {} (replicas {} -> {})",
                    response.target,
                    fmt_replicas(response.previous_replicas),
                    fmt_replicas(response.replicas),
                ));
            }
        }
    }
    Ok(())
}

fn fmt_replicas(replicas: Option<u32>) -> String {
    replicas.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string())
}

async fn wait(
    backend: &Backend,
    response: &ActionResponse,
    target: u32,
    timeout_secs: u64,
    format: OutputFormat,
) -> Result<()> {
    let namespace = response.target.namespace.as_str();
    let name = response.target.name.as_str();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    if format == OutputFormat::Table {
        print_info(&format!(
            "Waiting up to {}s for {} to reach {} available replicas",
            timeout_secs, response.target, target
        ));
    }

    let options = WaitOptions::with_timeout(Duration::from_secs(timeout_secs));
    let probe = move || backend.status(namespace, name);
    let result = wait_for_replicas(probe, target, options, &cancel).await;
    signal.abort();

    match result? {
        Convergence::Converged(status) => {
            if format == OutputFormat::Table {
                print_success(&format!(
                    "{} has {} available replicas",
                    response.target, status.available_replicas
                ));
            }
        }
        Convergence::TimedOut { last } => {
            print_warning(&format!(
                "Timed out after {}s waiting for {} ({}/{} available)",
                timeout_secs, response.target, last.available_replicas, last.current_replicas
            ));
        }
        Convergence::Cancelled => print_warning("Wait cancelled"),
    }
    Ok(())
}

/// Show the run state of one workload
pub async fn status(
    backend: &Backend,
    namespace: &str,
    name: &str,
    format: OutputFormat,
) -> Result<()> {
    let status = backend.status(namespace, name).await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => print_rows(vec![StatusRow::from(&status)], "No status available"),
    }
    Ok(())
}

/// List workloads the dashboard has paused
pub async fn paused(backend: &Backend, format: OutputFormat) -> Result<()> {
    let paused = backend.paused().await?;

    match format {
        OutputFormat::Json => print_json(&paused)?,
        OutputFormat::Table => {
            let count = paused.len();
            print_rows(paused.iter().map(PausedRow::from).collect(), "No paused workloads");
            if count > 0 {
                println!("\nTotal: {} paused workloads", count);
            }
        }
    }
    Ok(())
}
