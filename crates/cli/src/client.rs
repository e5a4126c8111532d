//! API client for communicating with the dashboard HTTP API

use anyhow::{Context, Result};
use dashboard_lib::{
    control::{ActionOutcome, PausedWorkload, Target, WorkloadStatus},
    ClusterHealth, ClusterSnapshot, PodHealth, ResourceUsage,
};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the dashboard
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with_query(path, &[]).await
    }

    /// Make a GET request with query parameters
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let mut url = self.base_url.join(path).context("Invalid path")?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        parse(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        parse(response).await
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("API error ({}): {}", status, error_message(&body));
    }

    response.json().await.context("Failed to parse response")
}

/// The server's error message, or the raw body when it is not an error document
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => format!("{} [{}]", err.message, err.error),
        Err(_) => body.to_string(),
    }
}

// API request and response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub namespace: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(flatten)]
    pub workload: WorkloadStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PausedResponse {
    pub success: bool,
    pub workloads: Vec<PausedWorkload>,
}

/// Cluster overview as served by `/api/data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Overview {
    #[serde(flatten)]
    pub snapshot: ClusterSnapshot,
    pub resource_usage: ResourceUsage,
    pub cluster_health: ClusterHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodHealthResponse {
    pub pods: Vec<PodHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub success: bool,
    pub message: String,
    pub error: String,
}
