//! Control-plane seam for submitting reassignments and elections.

use crate::error::Result;
use crate::executor::ExecutionTask;
use crate::types::TopicPartition;
use std::collections::HashSet;
use std::time::Duration;

/// Client for the cluster's coordination store.
///
/// Implementors submit replica-reassignment and preferred-leader-election
/// requests and report what the cluster currently considers in flight.
/// Submissions are atomic per task; re-submitting a task that is already
/// in flight must be harmless.
#[async_trait::async_trait]
pub trait ControlPlane: Send + Sync + std::fmt::Debug {
    /// Request that each task's partition become its new replica list.
    async fn submit_replica_reassignments(&self, tasks: &[ExecutionTask]) -> Result<()>;

    /// Request that each task's partition elect its preferred (first)
    /// replica as leader.
    async fn submit_preferred_leader_election(&self, tasks: &[ExecutionTask]) -> Result<()>;

    /// Partitions the control plane currently knows to be undergoing
    /// reassignment.
    async fn partitions_being_reassigned(&self) -> Result<HashSet<TopicPartition>>;

    /// Partitions currently undergoing a leader election.
    async fn ongoing_leader_election(&self) -> Result<HashSet<TopicPartition>>;

    /// Close the client, waiting at most `timeout` for in-flight requests.
    async fn close(&self, timeout: Duration) -> Result<()>;
}

/// Control plane that accepts everything and reports nothing in flight.
#[derive(Debug, Default)]
pub struct NoopControlPlane;

#[async_trait::async_trait]
impl ControlPlane for NoopControlPlane {
    async fn submit_replica_reassignments(&self, tasks: &[ExecutionTask]) -> Result<()> {
        tracing::debug!(count = tasks.len(), "noop: accepting replica reassignments");
        Ok(())
    }

    async fn submit_preferred_leader_election(&self, tasks: &[ExecutionTask]) -> Result<()> {
        tracing::debug!(count = tasks.len(), "noop: accepting leader elections");
        Ok(())
    }

    async fn partitions_being_reassigned(&self) -> Result<HashSet<TopicPartition>> {
        Ok(HashSet::new())
    }

    async fn ongoing_leader_election(&self) -> Result<HashSet<TopicPartition>> {
        Ok(HashSet::new())
    }

    async fn close(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}
