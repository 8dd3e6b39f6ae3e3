//! Scriptable implementations of the external collaborator seams.

use crate::cluster::{ClusterView, MetadataSource};
use crate::control::ControlPlane;
use crate::error::{Error, Result};
use crate::executor::{ExecutionTask, TaskId};
use crate::monitor::LoadMonitor;
use crate::types::{BrokerId, Clock, PartitionInfo, TopicPartition};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Clock whose time is advanced by the test.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Start the clock at a fixed time.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    /// Advance the clock.
    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump the clock to an absolute time.
    pub fn set(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Metadata source backed by a view the test mutates between polls.
#[derive(Debug, Default)]
pub struct MutableClusterSource {
    view: Mutex<ClusterView>,
}

impl MutableClusterSource {
    /// Start with the given view.
    pub fn new(view: ClusterView) -> Self {
        Self {
            view: Mutex::new(view),
        }
    }

    /// Replace the whole view.
    pub fn set_view(&self, view: ClusterView) {
        *self.view.lock() = view;
    }

    /// Rewrite a partition's replica set (and ISR) in place, keeping the
    /// leader.
    pub fn apply_reassignment(&self, tp: &TopicPartition, new_replicas: Vec<BrokerId>) {
        let mut view = self.view.lock();
        let mut partitions: Vec<(TopicPartition, PartitionInfo)> = view
            .partitions()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (partition, info) in &mut partitions {
            if partition == tp {
                info.isr = new_replicas.clone();
                info.replicas = new_replicas.clone();
            }
        }
        let brokers: Vec<BrokerId> = view.brokers().iter().copied().collect();
        *view = ClusterView::new(brokers, partitions);
    }

    /// Change a partition's leader.
    pub fn set_leader(&self, tp: &TopicPartition, leader: Option<BrokerId>) {
        let mut view = self.view.lock();
        let mut partitions: Vec<(TopicPartition, PartitionInfo)> = view
            .partitions()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (partition, info) in &mut partitions {
            if partition == tp {
                info.leader = leader;
            }
        }
        let brokers: Vec<BrokerId> = view.brokers().iter().copied().collect();
        *view = ClusterView::new(brokers, partitions);
    }

    /// Drop a partition from the view, as if its topic was deleted.
    pub fn remove_partition(&self, tp: &TopicPartition) {
        let mut view = self.view.lock();
        let partitions: Vec<(TopicPartition, PartitionInfo)> = view
            .partitions()
            .iter()
            .filter(|(k, _)| *k != tp)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let brokers: Vec<BrokerId> = view.brokers().iter().copied().collect();
        *view = ClusterView::new(brokers, partitions);
    }
}

#[async_trait::async_trait]
impl MetadataSource for MutableClusterSource {
    async fn fetch(&self) -> Result<ClusterView> {
        Ok(self.view.lock().clone())
    }
}

/// Control plane that records every submission and lets the test script
/// what is reported in flight.
#[derive(Debug, Default)]
pub struct MockControlPlane {
    replica_submissions: Mutex<Vec<Vec<TaskId>>>,
    election_submissions: Mutex<Vec<Vec<TaskId>>>,
    reassigning: Mutex<HashSet<TopicPartition>>,
    electing: Mutex<HashSet<TopicPartition>>,
    closed: AtomicUsize,
}

impl MockControlPlane {
    /// Empty control plane with nothing in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Control plane that already reports foreign reassignments in flight.
    pub fn with_inflight_reassignments(partitions: impl IntoIterator<Item = TopicPartition>) -> Self {
        let cp = Self::default();
        cp.reassigning.lock().extend(partitions);
        cp
    }

    /// All replica-reassignment submissions, in order.
    pub fn replica_submissions(&self) -> Vec<Vec<TaskId>> {
        self.replica_submissions.lock().clone()
    }

    /// All preferred-leader-election submissions, in order.
    pub fn election_submissions(&self) -> Vec<Vec<TaskId>> {
        self.election_submissions.lock().clone()
    }

    /// Stop reporting a partition as reassigning.
    pub fn finish_reassignment(&self, tp: &TopicPartition) {
        self.reassigning.lock().remove(tp);
    }

    /// Stop reporting a partition's election as ongoing.
    pub fn finish_election(&self, tp: &TopicPartition) {
        self.electing.lock().remove(tp);
    }

    /// Forget everything reported in flight.
    pub fn clear_in_flight(&self) {
        self.reassigning.lock().clear();
        self.electing.lock().clear();
    }

    /// How many times `close` was called.
    pub fn close_calls(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ControlPlane for MockControlPlane {
    async fn submit_replica_reassignments(&self, tasks: &[ExecutionTask]) -> Result<()> {
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id.clone()).collect();
        self.reassigning
            .lock()
            .extend(ids.iter().map(|id| id.partition.clone()));
        self.replica_submissions.lock().push(ids);
        Ok(())
    }

    async fn submit_preferred_leader_election(&self, tasks: &[ExecutionTask]) -> Result<()> {
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id.clone()).collect();
        self.electing
            .lock()
            .extend(ids.iter().map(|id| id.partition.clone()));
        self.election_submissions.lock().push(ids);
        Ok(())
    }

    async fn partitions_being_reassigned(&self) -> Result<HashSet<TopicPartition>> {
        Ok(self.reassigning.lock().clone())
    }

    async fn ongoing_leader_election(&self) -> Result<HashSet<TopicPartition>> {
        Ok(self.electing.lock().clone())
    }

    async fn close(&self, _timeout: Duration) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Load monitor that records pause/resume calls and can be scripted to
/// report not-ready for a number of pause attempts.
#[derive(Debug, Default)]
pub struct MockLoadMonitor {
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    not_ready_budget: AtomicUsize,
}

impl MockLoadMonitor {
    /// Monitor that is always ready.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `attempts` pause calls with not-ready.
    pub fn not_ready_for(attempts: usize) -> Self {
        Self {
            pauses: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
            not_ready_budget: AtomicUsize::new(attempts),
        }
    }

    /// Successful pause calls so far.
    pub fn pause_count(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    /// Resume calls so far.
    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LoadMonitor for MockLoadMonitor {
    async fn pause_metric_sampling(&self, _reason: &str) -> Result<()> {
        let budget = self.not_ready_budget.load(Ordering::SeqCst);
        if budget > 0 {
            self.not_ready_budget.store(budget - 1, Ordering::SeqCst);
            return Err(Error::MonitorNotReady);
        }
        self.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn resume_metric_sampling(&self, _reason: &str) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }
}
