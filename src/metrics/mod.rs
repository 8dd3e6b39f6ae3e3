//! Metrics exported by the rebalance execution engine.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug)]
pub struct Counter {
    name: &'static str,
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            value: AtomicU64::new(0),
        }
    }

    /// Get the counter name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Increment the counter by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A gauge that can increase or decrease.
#[derive(Debug)]
pub struct Gauge {
    name: &'static str,
    value: AtomicI64,
}

impl Gauge {
    /// Create a new gauge.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            value: AtomicI64::new(0),
        }
    }

    /// Get the gauge name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Set the gauge to a specific value.
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Get the current value.
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters tracking executor lifecycle events for external scrapers.
#[derive(Debug)]
pub struct ExecutorMetrics {
    /// Executions stopped, by user request or internally.
    pub execution_stopped: Counter,
    /// Executions stopped explicitly by a user.
    pub execution_stopped_by_user: Counter,
    /// Executions started in assigner mode.
    pub execution_started_assigner: Counter,
    /// Executions started in rebalancer mode.
    pub execution_started_rebalancer: Counter,
}

impl ExecutorMetrics {
    /// Create a fresh metric set.
    pub fn new() -> Self {
        Self {
            execution_stopped: Counter::new("execution-stopped"),
            execution_stopped_by_user: Counter::new("execution-stopped-by-user"),
            execution_started_assigner: Counter::new("execution-started-assigner"),
            execution_started_rebalancer: Counter::new("execution-started-rebalancer"),
        }
    }

    /// Point-in-time copy of all counter values.
    pub fn snapshot(&self) -> ExecutorMetricsSnapshot {
        ExecutorMetricsSnapshot {
            execution_stopped: self.execution_stopped.get(),
            execution_stopped_by_user: self.execution_stopped_by_user.get(),
            execution_started_assigner: self.execution_started_assigner.get(),
            execution_started_rebalancer: self.execution_started_rebalancer.get(),
        }
    }
}

impl Default for ExecutorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`ExecutorMetrics`] counter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorMetricsSnapshot {
    /// Executions stopped, by user request or internally.
    pub execution_stopped: u64,
    /// Executions stopped explicitly by a user.
    pub execution_stopped_by_user: u64,
    /// Executions started in assigner mode.
    pub execution_started_assigner: u64,
    /// Executions started in rebalancer mode.
    pub execution_started_rebalancer: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new("test_counter");
        assert_eq!(counter.get(), 0);
        counter.inc();
        counter.inc();
        assert_eq!(counter.get(), 2);
        assert_eq!(counter.name(), "test_counter");
    }

    #[test]
    fn test_gauge() {
        let gauge = Gauge::new("test_gauge");
        assert_eq!(gauge.get(), 0);
        gauge.set(7);
        assert_eq!(gauge.get(), 7);
        gauge.set(-3);
        assert_eq!(gauge.get(), -3);
    }

    #[test]
    fn test_executor_metrics_snapshot() {
        let metrics = ExecutorMetrics::new();
        metrics.execution_stopped.inc();
        metrics.execution_started_rebalancer.inc();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.execution_stopped, 1);
        assert_eq!(snapshot.execution_stopped_by_user, 0);
        assert_eq!(snapshot.execution_started_assigner, 0);
        assert_eq!(snapshot.execution_started_rebalancer, 1);
    }
}
