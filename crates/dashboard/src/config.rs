//! Dashboard configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dashboard_lib::control::{BarePodStrategy, ControllerConfig};
use serde::Deserialize;

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "DASHBOARD_CONFIG";

/// Which cluster the dashboard serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Kubernetes API from kubeconfig or in-cluster config
    #[default]
    Kube,
    /// Seeded in-memory cluster with a memory-backed state store
    Demo,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Kube => "kube",
            Mode::Demo => "demo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Dashboard configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// HTTP port for the dashboard API, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub mode: Mode,

    /// Kubeconfig context; the current context when unset
    #[serde(default)]
    pub kube_context: Option<String>,

    /// Root directory of the workload state store
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default = "default_resume_replicas")]
    pub default_resume_replicas: u32,

    #[serde(default)]
    pub bare_pod_strategy: BarePodStrategy,

    #[serde(default = "default_true")]
    pub mirror_annotations: bool,

    /// Interval between cluster and state store probes
    #[serde(default = "default_probe_interval")]
    pub health_probe_interval_secs: u64,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_api_port() -> u16 {
    8888
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./dashboard-state")
}

fn default_resume_replicas() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_probe_interval() -> u64 {
    15
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            bind_address: default_bind_address(),
            mode: Mode::default(),
            kube_context: None,
            state_dir: default_state_dir(),
            default_resume_replicas: default_resume_replicas(),
            bare_pod_strategy: BarePodStrategy::default(),
            mirror_annotations: true,
            health_probe_interval_secs: default_probe_interval(),
            log_format: LogFormat::default(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from `DASHBOARD_*` environment variables, layered
    /// over the file named by `DASHBOARD_CONFIG` when set
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
        Self::load_from(file.as_deref())
    }

    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix("DASHBOARD").try_parsing(true))
            .build()
            .context("Failed to read dashboard configuration")?;

        config
            .try_deserialize()
            .context("Invalid dashboard configuration")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.api_port)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            default_resume_replicas: self.default_resume_replicas,
            bare_pod_strategy: self.bare_pod_strategy,
            mirror_annotations: self.mirror_annotations,
        }
    }
}
