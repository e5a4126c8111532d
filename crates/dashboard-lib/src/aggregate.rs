//! Resource Aggregator
//!
//! Sums node capacity/allocatable and pod requests into cluster-wide
//! utilisation. "Usage" means requested resources; live usage from a
//! metrics server is not consulted.

use crate::models::{ClusterSnapshot, PodRequest, ResourceUsage, UsageFigure};
use crate::quantity;

/// Number of pods reported in [`ResourceUsage::top_pods`]
pub const TOP_PODS: usize = 10;

fn figure(capacity: f64, allocatable: f64, requested: f64, display: String) -> UsageFigure {
    let denominator = if allocatable > 0.0 { allocatable } else { capacity };
    let percent = if denominator > 0.0 {
        requested / denominator * 100.0
    } else {
        0.0
    };
    UsageFigure {
        capacity,
        allocatable,
        requested,
        percent: (percent * 10.0).round() / 10.0,
        display,
    }
}

/// Aggregate requests and capacity over a snapshot.
///
/// Pods in a terminal phase are skipped.
pub fn aggregate(snapshot: &ClusterSnapshot) -> ResourceUsage {
    let cpu_capacity: f64 = snapshot.nodes.iter().map(|n| n.cpu_capacity_cores).sum();
    let cpu_allocatable: f64 = snapshot.nodes.iter().map(|n| n.cpu_allocatable_cores).sum();
    let memory_capacity: f64 = snapshot.nodes.iter().map(|n| n.memory_capacity_mib).sum();
    let memory_allocatable: f64 = snapshot
        .nodes
        .iter()
        .map(|n| n.memory_allocatable_mib)
        .sum();

    let active: Vec<_> = snapshot.pods.iter().filter(|p| !p.is_terminal()).collect();
    let cpu_requested: f64 = active.iter().map(|p| p.cpu_request_cores).sum();
    let memory_requested: f64 = active.iter().map(|p| p.memory_request_mib).sum();

    let mut top_pods: Vec<PodRequest> = active
        .iter()
        .map(|p| PodRequest {
            name: p.name.clone(),
            namespace: p.namespace.clone(),
            cpu_cores: p.cpu_request_cores,
            memory_mib: p.memory_request_mib,
        })
        .collect();
    top_pods.sort_by(|a, b| {
        b.cpu_cores
            .partial_cmp(&a.cpu_cores)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    top_pods.truncate(TOP_PODS);

    ResourceUsage {
        cpu: figure(
            cpu_capacity,
            cpu_allocatable,
            cpu_requested,
            format!(
                "{} / {}",
                quantity::format_cpu(cpu_requested),
                quantity::format_cpu(cpu_allocatable.max(cpu_capacity))
            ),
        ),
        memory: figure(
            memory_capacity,
            memory_allocatable,
            memory_requested,
            format!(
                "{} / {}",
                quantity::format_memory(memory_requested),
                quantity::format_memory(memory_allocatable.max(memory_capacity))
            ),
        ),
        top_pods,
    }
}
