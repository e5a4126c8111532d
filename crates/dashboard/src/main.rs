//! Kube Dashboard - cluster overview and workload pause/resume service
//!
//! Reads nodes, namespaces, pods, deployments and services from the
//! cluster, evaluates health alerts and pauses or resumes workloads on
//! request.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dashboard_lib::{
    cluster::ClusterApi,
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    store::WorkloadStateStore,
    FileStateStore, InMemoryCluster, KubeCluster, MemoryStateStore,
};
use kube_dashboard::{
    api,
    config::{DashboardConfig, LogFormat, Mode},
    probe,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DASHBOARD_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

async fn connect(
    config: &DashboardConfig,
) -> Result<(Arc<dyn ClusterApi>, Arc<dyn WorkloadStateStore>)> {
    match config.mode {
        Mode::Demo => Ok((
            Arc::new(InMemoryCluster::demo()),
            Arc::new(MemoryStateStore::new()),
        )),
        Mode::Kube => {
            let cluster = KubeCluster::connect(config.kube_context.as_deref())
                .await
                .context("Failed to build Kubernetes client")?;
            info!(
                context = cluster.context().unwrap_or("current"),
                state_dir = %config.state_dir.display(),
                "Kubernetes client configured"
            );
            Ok((
                Arc::new(cluster),
                Arc::new(FileStateStore::new(config.state_dir.clone())),
            ))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before tracing so the log format applies
    let config = DashboardConfig::load()?;
    init_tracing(config.log_format);

    info!(mode = config.mode.as_str(), "Starting kube-dashboard");

    let (cluster, store) = connect(&config).await?;

    // Initialize health registry; readiness waits for the first cluster probe
    let health_registry = HealthRegistry::new();
    health_registry.register(components::KUBE_API).await;
    health_registry.register(components::STATE_STORE).await;

    let instance = std::env::var("HOSTNAME").unwrap_or_else(|_| "kube-dashboard".to_string());
    let logger = StructuredLogger::new(instance);
    let addr = config.listen_addr();
    logger.log_startup(DASHBOARD_VERSION, &addr, config.mode.as_str());

    let app_state = Arc::new(api::AppState::new(
        cluster,
        store,
        config.controller_config(),
        health_registry,
        logger.clone(),
    ));

    let shutdown = CancellationToken::new();
    let probe_handle = tokio::spawn(probe::run(
        app_state.clone(),
        Duration::from_secs(config.health_probe_interval_secs.max(1)),
        shutdown.clone(),
    ));

    let server_shutdown = shutdown.clone();
    let mut server = tokio::spawn(async move {
        api::serve(&addr, app_state, async move {
            server_shutdown.cancelled().await;
        })
        .await
    });

    // Wait for shutdown signal, or for the server to exit on its own
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            shutdown.cancel();
            server.await??;
        }
        result = &mut server => {
            logger.log_shutdown("API server stopped");
            shutdown.cancel();
            result??;
        }
    }

    probe_handle.await?;
    info!("Shutdown complete");

    Ok(())
}
