//! Demotion and removal history with time-based retention.

use crate::config::HISTORY_SCANNER_PERIOD;
use crate::types::{BrokerId, Clock};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Tracks recently demoted and recently removed brokers.
///
/// Each map entry records the wall-clock start time of the latest
/// demotion/removal of a broker; a periodic scan expires entries older
/// than the configured retention. The maps are concurrent, so external
/// observers may read the key sets while the executor writes.
#[derive(Debug)]
pub struct HistoryRetainer {
    clock: Arc<dyn Clock>,
    demotion_retention_ms: u64,
    removal_retention_ms: u64,
    latest_demote_start_ms_by_broker: Arc<DashMap<BrokerId, u64>>,
    latest_remove_start_ms_by_broker: Arc<DashMap<BrokerId, u64>>,
    scanner: Mutex<Option<JoinHandle<()>>>,
}

impl HistoryRetainer {
    /// Create a retainer and start its periodic expiry scan.
    pub fn new(
        clock: Arc<dyn Clock>,
        demotion_retention: Duration,
        removal_retention: Duration,
    ) -> Self {
        let retainer = Self {
            clock,
            demotion_retention_ms: demotion_retention.as_millis() as u64,
            removal_retention_ms: removal_retention.as_millis() as u64,
            latest_demote_start_ms_by_broker: Arc::new(DashMap::new()),
            latest_remove_start_ms_by_broker: Arc::new(DashMap::new()),
            scanner: Mutex::new(None),
        };
        retainer.start_scanner();
        retainer
    }

    fn start_scanner(&self) {
        let clock = Arc::clone(&self.clock);
        let demote = Arc::clone(&self.latest_demote_start_ms_by_broker);
        let remove = Arc::clone(&self.latest_remove_start_ms_by_broker);
        let demotion_retention_ms = self.demotion_retention_ms;
        let removal_retention_ms = self.removal_retention_ms;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HISTORY_SCANNER_PERIOD);
            loop {
                ticker.tick().await;
                // The scan must outlive anything unexpected; a panic here
                // is logged, not fatal to the job.
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    let now = clock.now_ms();
                    debug!("Removing expired demotion history");
                    demote.retain(|_, ts| *ts + demotion_retention_ms >= now);
                    debug!("Removing expired broker removal history");
                    remove.retain(|_, ts| *ts + removal_retention_ms >= now);
                }));
                if let Err(panic) = result {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    warn!(message = %message, "Execution history expiry scan failed");
                }
            }
        });
        *self.scanner.lock() = Some(handle);
    }

    /// Record the start of a demotion for each broker at the current time.
    pub fn record_demoted(&self, brokers: impl IntoIterator<Item = BrokerId>) {
        let now = self.clock.now_ms();
        for broker in brokers {
            self.latest_demote_start_ms_by_broker.insert(broker, now);
        }
    }

    /// Record the start of a removal for each broker at the current time.
    pub fn record_removed(&self, brokers: impl IntoIterator<Item = BrokerId>) {
        let now = self.clock.now_ms();
        for broker in brokers {
            self.latest_remove_start_ms_by_broker.insert(broker, now);
        }
    }

    /// Brokers for which a demotion was started within the retention
    /// window, regardless of how the demotion completed.
    pub fn recently_demoted_brokers(&self) -> BTreeSet<BrokerId> {
        self.latest_demote_start_ms_by_broker
            .iter()
            .map(|entry| *entry.key())
            .collect()
    }

    /// Brokers for which a removal was started within the retention
    /// window, regardless of how the removal completed.
    pub fn recently_removed_brokers(&self) -> BTreeSet<BrokerId> {
        self.latest_remove_start_ms_by_broker
            .iter()
            .map(|entry| *entry.key())
            .collect()
    }

    /// Run one expiry pass immediately. Exposed for deterministic tests;
    /// the background scanner performs the same work every period.
    pub fn expire_now(&self) {
        let now = self.clock.now_ms();
        self.latest_demote_start_ms_by_broker
            .retain(|_, ts| *ts + self.demotion_retention_ms >= now);
        self.latest_remove_start_ms_by_broker
            .retain(|_, ts| *ts + self.removal_retention_ms >= now);
    }

    /// Stop the periodic scan.
    pub fn shutdown(&self) {
        if let Some(handle) = self.scanner.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for HistoryRetainer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
