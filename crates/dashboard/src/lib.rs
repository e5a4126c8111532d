//! Kubernetes workload dashboard server
//!
//! Serves cluster data, workload pause/resume actions, health checks and
//! Prometheus metrics over HTTP.

pub mod api;
pub mod config;
pub mod probe;
