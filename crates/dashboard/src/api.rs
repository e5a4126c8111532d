//! HTTP API: dashboard data, workload actions, health checks and Prometheus metrics

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use dashboard_lib::{
    aggregate::aggregate,
    alerts::{Alert, AlertEngine, AlertThresholds, ClusterHealth, PodHealth},
    cluster::ClusterApi,
    control::{
        ActionOutcome, ControllerConfig, Lookup, PauseController, PausedWorkload, Target,
        WorkloadRef, WorkloadStatus,
    },
    error::{ClusterError, ControlError, ErrorKind},
    health::{ComponentStatus, HealthRegistry},
    models::{ClusterSnapshot, ResourceUsage},
    observability::{DashboardMetrics, StructuredLogger},
    reader::ClusterReader,
    store::WorkloadStateStore,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Shared application state
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: DashboardMetrics,
    pub logger: StructuredLogger,
    pub reader: ClusterReader,
    pub engine: AlertEngine,
    pub controller: PauseController,
    pub store: Arc<dyn WorkloadStateStore>,
}

impl AppState {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        store: Arc<dyn WorkloadStateStore>,
        controller_config: ControllerConfig,
        health_registry: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            health_registry,
            metrics: DashboardMetrics::new(),
            logger,
            reader: ClusterReader::new(cluster.clone()),
            engine: AlertEngine::new(AlertThresholds::default()),
            controller: PauseController::new(cluster, store.clone(), controller_config),
            store,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of every failed API call
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, error: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            success: false,
            message: message.into(),
            error: error.to_string(),
        }),
    )
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn control_error(err: &ControlError) -> ApiError {
    let kind = err.kind();
    api_error(status_for(kind), &kind.to_string(), err.to_string())
}

fn cluster_error(err: &ClusterError) -> ApiError {
    let (status, kind) = match err {
        ClusterError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorKind::NotFound),
        ClusterError::Forbidden(_) => (StatusCode::FORBIDDEN, ErrorKind::Forbidden),
        ClusterError::Conflict(_) => (StatusCode::CONFLICT, ErrorKind::Conflict),
        ClusterError::Invalid(_) => (StatusCode::UNPROCESSABLE_ENTITY, ErrorKind::Invalid),
        ClusterError::Unavailable(_) | ClusterError::Unsupported(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, ErrorKind::Unavailable)
        }
    };
    api_error(status, &kind.to_string(), format!("Failed to read cluster state: {err}"))
}

fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Body of pause/resume calls; `deployment_name` and `pod_name` are accepted
/// for `name`
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default, alias = "deployment_name", alias = "pod_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub owner_kind: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub replicas: Option<u32>,
}

impl ActionRequest {
    fn workload(&self, lookup: Lookup) -> Result<WorkloadRef, ApiError> {
        let name = self
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| bad_request("Workload name is required"))?;
        Ok(WorkloadRef {
            namespace: self.namespace.clone(),
            name: name.to_string(),
            owner_kind: self.owner_kind.clone(),
            owner_name: self.owner_name.clone(),
            lookup,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default, alias = "deployment_name")]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    pub target: Target,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl From<ActionOutcome> for ActionResponse {
    fn from(outcome: ActionOutcome) -> Self {
        Self {
            success: true,
            message: outcome.message,
            previous_replicas: outcome.previous_replicas,
            replicas: outcome.replicas,
            target: outcome.target,
            warnings: outcome.warnings,
        }
    }
}

/// Status fields are flattened next to `success`
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(flatten)]
    pub workload: WorkloadStatus,
}

#[derive(Debug, Serialize)]
pub struct PausedResponse {
    pub success: bool,
    pub workloads: Vec<PausedWorkload>,
}

/// `/api/data` payload
#[derive(Debug, Serialize)]
pub struct DataResponse {
    #[serde(flatten)]
    pub snapshot: ClusterSnapshot,
    pub resource_usage: ResourceUsage,
    pub cluster_health: ClusterHealth,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Serialize)]
pub struct PodHealthResponse {
    pub pods: Vec<PodHealth>,
}

// ---------------------------------------------------------------------------
// Service health
// ---------------------------------------------------------------------------

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

// ---------------------------------------------------------------------------
// Cluster data
// ---------------------------------------------------------------------------

async fn snapshot(state: &AppState) -> Result<ClusterSnapshot, ApiError> {
    state.reader.snapshot().await.map_err(|e| {
        error!(error = %e, "Failed to build cluster snapshot");
        cluster_error(&e)
    })
}

async fn cluster_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DataResponse>, ApiError> {
    let start = Instant::now();
    let snapshot = snapshot(&state).await?;
    let usage = aggregate(&snapshot);
    let health = state.engine.evaluate(&snapshot, &usage);

    let elapsed = start.elapsed().as_secs_f64();
    state.metrics.observe_snapshot_latency(elapsed);
    state.metrics.set_cluster_alerts(&health);
    state.logger.log_snapshot(&health, snapshot.pods.len(), elapsed);

    Ok(Json(DataResponse {
        snapshot,
        resource_usage: usage,
        alerts: health.alerts.clone(),
        cluster_health: health,
    }))
}

async fn pods_health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PodHealthResponse>, ApiError> {
    let snapshot = snapshot(&state).await?;
    Ok(Json(PodHealthResponse {
        pods: state.engine.pod_health(&snapshot),
    }))
}

// ---------------------------------------------------------------------------
// Workload actions
// ---------------------------------------------------------------------------

async fn record_outcome(
    state: &AppState,
    action: &str,
    result: &Result<ActionOutcome, ControlError>,
) {
    match result {
        Ok(outcome) => {
            state.metrics.inc_workload_action(action, "success");
            let id = outcome.target.id();
            let kind = outcome.target.kind.to_string();
            if action == "pause" {
                state
                    .logger
                    .log_pause(&id, &kind, outcome.previous_replicas, outcome.mutated);
            } else {
                state
                    .logger
                    .log_resume(&id, &kind, outcome.replicas, &outcome.warnings);
            }
        }
        Err(e) => {
            state
                .metrics
                .inc_workload_action(action, &e.kind().to_string());
            state.logger.log_action_failed(action, e);
        }
    }

    if let Ok(records) = state.store.list().await {
        state.metrics.set_paused_workloads(records.len() as i64);
    }
}

async fn pause(
    state: &AppState,
    body: Result<Json<ActionRequest>, JsonRejection>,
    lookup: Lookup,
) -> Result<Json<ActionResponse>, ApiError> {
    let Json(request) = body.map_err(|e| bad_request(e.body_text()))?;
    let workload = request.workload(lookup)?;

    let result = state.controller.pause(&workload).await;
    record_outcome(state, "pause", &result).await;
    result
        .map(|outcome| Json(outcome.into()))
        .map_err(|e| control_error(&e))
}

async fn resume(
    state: &AppState,
    body: Result<Json<ActionRequest>, JsonRejection>,
    lookup: Lookup,
) -> Result<Json<ActionResponse>, ApiError> {
    let Json(request) = body.map_err(|e| bad_request(e.body_text()))?;
    let workload = request.workload(lookup)?;

    let result = state.controller.resume(&workload, request.replicas).await;
    record_outcome(state, "resume", &result).await;
    result
        .map(|outcome| Json(outcome.into()))
        .map_err(|e| control_error(&e))
}

async fn pause_workload(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    pause(&state, body, Lookup::DeploymentFirst).await
}

async fn resume_workload(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    resume(&state, body, Lookup::DeploymentFirst).await
}

/// Pod rows name the pod itself; a same-named deployment only wins through
/// the pod's owner chain
async fn stop_pod(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    pause(&state, body, Lookup::PodFirst).await
}

async fn start_pod(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    resume(&state, body, Lookup::PodFirst).await
}

async fn workload_status(
    State(state): State<Arc<AppState>>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Query(query) = query.map_err(|e| bad_request(e.body_text()))?;
    let name = query
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| bad_request("Workload name is required"))?;

    let status = state
        .controller
        .status(&WorkloadRef::new(query.namespace, name))
        .await
        .map_err(|e| control_error(&e))?;

    Ok(Json(StatusResponse {
        success: true,
        workload: status,
    }))
}

async fn paused_workloads(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PausedResponse>, ApiError> {
    let paused = state
        .controller
        .paused_workloads()
        .await
        .map_err(|e| control_error(&e))?;
    state.metrics.set_paused_workloads(paused.len() as i64);

    Ok(Json(PausedResponse {
        success: true,
        workloads: paused,
    }))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/data", get(cluster_data))
        .route("/api/pods/health", get(pods_health))
        .route("/api/workloads/pause", post(pause_workload))
        .route("/api/workloads/resume", post(resume_workload))
        .route("/api/workloads/status", get(workload_status))
        .route("/api/workloads/paused", get(paused_workloads))
        // older dashboard routes
        .route("/api/pods/stop", post(stop_pod))
        .route("/api/pods/start", post(start_pod))
        .route("/api/deployment/stop", post(pause_workload))
        .route("/api/deployment/start", post(resume_workload))
        .route("/api/deployment/status", get(workload_status))
        .with_state(state)
}

/// Start the API server, stopping when `shutdown` resolves
pub async fn serve(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
