//! Configuration for the rebalance execution engine.

use std::time::Duration;

/// The maximum time to wait for a leader movement to finish. A leader
/// movement is marked as dead if it takes longer than this to finish.
pub const LEADER_ACTION_TIMEOUT_MS: u64 = 180_000;

/// Period of the execution-history expiry scan.
pub const HISTORY_SCANNER_PERIOD: Duration = Duration::from_secs(5);

/// Minimum interval between two cluster-metadata fetches.
pub const METADATA_REFRESH_BACKOFF: Duration = Duration::from_millis(100);

/// Configuration for the [`Executor`](crate::executor::Executor).
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of concurrent partition movements per broker.
    pub num_concurrent_partition_movements_per_broker: usize,

    /// Maximum number of concurrent leadership movements across the cluster.
    pub num_concurrent_leadership_movements: usize,

    /// Interval between execution-progress checks.
    pub progress_check_interval: Duration,

    /// Identifiers of replica-movement strategies applied, in order, when
    /// selecting the next replica-movement batch. Unknown identifiers are
    /// skipped with a warning. Empty means proposal input order.
    pub replica_movement_strategies: Vec<String>,

    /// How long demoted brokers stay in the demotion history.
    pub demotion_history_retention: Duration,

    /// How long removed brokers stay in the removal history.
    pub removal_history_retention: Duration,

    /// Maximum number of pause retries while the load monitor reports
    /// not-ready. `None` retries indefinitely.
    pub monitor_ready_max_retries: Option<usize>,

    /// Minimum interval between two cluster-metadata fetches.
    pub metadata_refresh_backoff: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            num_concurrent_partition_movements_per_broker: 5,
            num_concurrent_leadership_movements: 1000,
            progress_check_interval: Duration::from_secs(10),
            replica_movement_strategies: Vec::new(),
            demotion_history_retention: Duration::from_secs(60 * 60),
            removal_history_retention: Duration::from_secs(12 * 60 * 60),
            monitor_ready_max_retries: None,
            metadata_refresh_backoff: METADATA_REFRESH_BACKOFF,
        }
    }
}

impl ExecutorConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-broker partition movement concurrency.
    pub fn with_partition_movement_concurrency(mut self, n: usize) -> Self {
        self.num_concurrent_partition_movements_per_broker = n;
        self
    }

    /// Set the cluster-wide leadership movement concurrency.
    pub fn with_leadership_movement_concurrency(mut self, n: usize) -> Self {
        self.num_concurrent_leadership_movements = n;
        self
    }

    /// Set the progress-check interval.
    pub fn with_progress_check_interval(mut self, interval: Duration) -> Self {
        self.progress_check_interval = interval;
        self
    }

    /// Set the replica-movement strategy identifiers.
    pub fn with_replica_movement_strategies<I, S>(mut self, strategies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replica_movement_strategies = strategies.into_iter().map(Into::into).collect();
        self
    }

    /// Set the demotion-history retention.
    pub fn with_demotion_history_retention(mut self, retention: Duration) -> Self {
        self.demotion_history_retention = retention;
        self
    }

    /// Set the removal-history retention.
    pub fn with_removal_history_retention(mut self, retention: Duration) -> Self {
        self.removal_history_retention = retention;
        self
    }

    /// Bound the number of load-monitor pause retries.
    pub fn with_monitor_ready_max_retries(mut self, retries: Option<usize>) -> Self {
        self.monitor_ready_max_retries = retries;
        self
    }

    /// Set the minimum interval between cluster-metadata fetches.
    pub fn with_metadata_refresh_backoff(mut self, backoff: Duration) -> Self {
        self.metadata_refresh_backoff = backoff;
        self
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.num_concurrent_partition_movements_per_broker == 0 {
            return Err("partition movement concurrency must be at least 1".to_string());
        }
        if self.num_concurrent_leadership_movements == 0 {
            return Err("leadership movement concurrency must be at least 1".to_string());
        }
        if self.progress_check_interval.is_zero() {
            return Err("progress check interval must be non-zero".to_string());
        }
        Ok(())
    }
}
