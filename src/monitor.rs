//! Load-monitor seam.

use crate::error::Result;

/// Metric sampler whose sampling is paused while an execution is in
/// flight, so that in-flight movement does not pollute load measurements.
#[async_trait::async_trait]
pub trait LoadMonitor: Send + Sync + std::fmt::Debug {
    /// Pause metric sampling. Fails with
    /// [`Error::MonitorNotReady`](crate::Error::MonitorNotReady) while the
    /// monitor is in a transient state that cannot be paused; the caller
    /// retries.
    async fn pause_metric_sampling(&self, reason: &str) -> Result<()>;

    /// Resume metric sampling.
    async fn resume_metric_sampling(&self, reason: &str);
}
