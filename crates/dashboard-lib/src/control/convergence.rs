//! Bounded waits for a workload to reach its target replica count

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::WorkloadStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            interval: Duration::from_secs(1),
        }
    }
}

impl WaitOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Convergence {
    Converged(WorkloadStatus),
    /// Deadline passed; `last` is the final observation
    TimedOut { last: WorkloadStatus },
    Cancelled,
}

/// A pause converges once nothing is desired or available; otherwise the
/// available count must match the target.
pub fn is_converged(status: &WorkloadStatus, target: u32) -> bool {
    if target == 0 {
        status.current_replicas == 0 && status.available_replicas == 0
    } else {
        status.available_replicas == target
    }
}

/// Poll `probe` until the workload converges on `target`, the timeout
/// elapses or `cancel` fires. Probe errors end the wait.
pub async fn wait_for_replicas<F, Fut, E>(
    mut probe: F,
    target: u32,
    options: WaitOptions,
    cancel: &CancellationToken,
) -> Result<Convergence, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<WorkloadStatus, E>>,
{
    let deadline = Instant::now() + options.timeout;

    loop {
        if cancel.is_cancelled() {
            return Ok(Convergence::Cancelled);
        }

        let status = probe().await?;
        if is_converged(&status, target) {
            return Ok(Convergence::Converged(status));
        }
        debug!(
            namespace = %status.namespace,
            name = %status.name,
            available = status.available_replicas,
            target,
            "Waiting for replicas"
        );
        let now = Instant::now();
        if now >= deadline {
            return Ok(Convergence::TimedOut { last: status });
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(Convergence::Cancelled),
            _ = tokio::time::sleep(options.interval.min(deadline - now)) => {}
        }
    }
}
