//! Published snapshots of what the executor is doing.

use crate::executor::task_manager::ExecutionTasksSummary;
use crate::types::BrokerId;
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Lifecycle phase of the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    /// Idle.
    NoTaskInProgress,
    /// An execution was accepted and is initializing.
    StartingExecution,
    /// Replica movements are being driven.
    ReplicaMovementTaskInProgress,
    /// Leadership movements are being driven.
    LeaderMovementTaskInProgress,
    /// A stop was requested; in-flight work is draining.
    StoppingExecution,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPhase::NoTaskInProgress => write!(f, "no_task_in_progress"),
            ExecutionPhase::StartingExecution => write!(f, "starting_execution"),
            ExecutionPhase::ReplicaMovementTaskInProgress => {
                write!(f, "replica_movement_task_in_progress")
            }
            ExecutionPhase::LeaderMovementTaskInProgress => {
                write!(f, "leader_movement_task_in_progress")
            }
            ExecutionPhase::StoppingExecution => write!(f, "stopping_execution"),
        }
    }
}

/// Immutable snapshot describing what the executor is doing right now.
///
/// Every observer-visible number is captured at snapshot creation, never
/// read by reference, so observers always see a consistent point-in-time
/// view.
#[derive(Debug, Clone)]
pub struct ExecutorState {
    /// Current lifecycle phase.
    pub phase: ExecutionPhase,
    /// Partition movements finished so far in this execution.
    pub finished_partition_movements: usize,
    /// Leadership movements finished so far in this execution.
    pub finished_leadership_movements: usize,
    /// Megabytes moved so far in this execution.
    pub finished_data_movement_mb: u64,
    /// Effective per-broker partition movement cap.
    pub partition_movement_concurrency: usize,
    /// Effective leadership movement cap.
    pub leadership_movement_concurrency: usize,
    /// Identity of the execution, if one was supplied.
    pub execution_id: Option<Uuid>,
    /// Brokers demoted within the demotion-history retention window.
    pub recently_demoted_brokers: BTreeSet<BrokerId>,
    /// Brokers removed within the removal-history retention window.
    pub recently_removed_brokers: BTreeSet<BrokerId>,
    /// Task summary, absent while idle.
    pub task_summary: Option<ExecutionTasksSummary>,
}

impl ExecutorState {
    /// Snapshot for an idle executor.
    pub fn no_task_in_progress(
        recently_demoted_brokers: BTreeSet<BrokerId>,
        recently_removed_brokers: BTreeSet<BrokerId>,
    ) -> Self {
        Self {
            phase: ExecutionPhase::NoTaskInProgress,
            finished_partition_movements: 0,
            finished_leadership_movements: 0,
            finished_data_movement_mb: 0,
            partition_movement_concurrency: 0,
            leadership_movement_concurrency: 0,
            execution_id: None,
            recently_demoted_brokers,
            recently_removed_brokers,
            task_summary: None,
        }
    }

    /// Snapshot for an execution that was accepted and is initializing.
    pub fn starting(
        execution_id: Option<Uuid>,
        recently_demoted_brokers: BTreeSet<BrokerId>,
        recently_removed_brokers: BTreeSet<BrokerId>,
    ) -> Self {
        Self {
            phase: ExecutionPhase::StartingExecution,
            execution_id,
            ..Self::no_task_in_progress(recently_demoted_brokers, recently_removed_brokers)
        }
    }

    /// Snapshot for the replica-movement phase.
    #[allow(clippy::too_many_arguments)]
    pub fn replica_movement_in_progress(
        finished_partition_movements: usize,
        finished_data_movement_mb: u64,
        task_summary: ExecutionTasksSummary,
        partition_movement_concurrency: usize,
        leadership_movement_concurrency: usize,
        execution_id: Option<Uuid>,
        recently_demoted_brokers: BTreeSet<BrokerId>,
        recently_removed_brokers: BTreeSet<BrokerId>,
    ) -> Self {
        Self {
            phase: ExecutionPhase::ReplicaMovementTaskInProgress,
            finished_partition_movements,
            finished_leadership_movements: 0,
            finished_data_movement_mb,
            partition_movement_concurrency,
            leadership_movement_concurrency,
            execution_id,
            recently_demoted_brokers,
            recently_removed_brokers,
            task_summary: Some(task_summary),
        }
    }

    /// Snapshot for the leadership-movement phase.
    #[allow(clippy::too_many_arguments)]
    pub fn leader_movement_in_progress(
        finished_leadership_movements: usize,
        task_summary: ExecutionTasksSummary,
        partition_movement_concurrency: usize,
        leadership_movement_concurrency: usize,
        execution_id: Option<Uuid>,
        recently_demoted_brokers: BTreeSet<BrokerId>,
        recently_removed_brokers: BTreeSet<BrokerId>,
    ) -> Self {
        Self {
            phase: ExecutionPhase::LeaderMovementTaskInProgress,
            finished_partition_movements: 0,
            finished_leadership_movements,
            finished_data_movement_mb: 0,
            partition_movement_concurrency,
            leadership_movement_concurrency,
            execution_id,
            recently_demoted_brokers,
            recently_removed_brokers,
            task_summary: Some(task_summary),
        }
    }

    /// Snapshot for an execution that is draining after a stop request.
    #[allow(clippy::too_many_arguments)]
    pub fn stopping(
        finished_partition_movements: usize,
        finished_leadership_movements: usize,
        finished_data_movement_mb: u64,
        task_summary: ExecutionTasksSummary,
        partition_movement_concurrency: usize,
        leadership_movement_concurrency: usize,
        execution_id: Option<Uuid>,
        recently_demoted_brokers: BTreeSet<BrokerId>,
        recently_removed_brokers: BTreeSet<BrokerId>,
    ) -> Self {
        Self {
            phase: ExecutionPhase::StoppingExecution,
            finished_partition_movements,
            finished_leadership_movements,
            finished_data_movement_mb,
            partition_movement_concurrency,
            leadership_movement_concurrency,
            execution_id,
            recently_demoted_brokers,
            recently_removed_brokers,
            task_summary: Some(task_summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_snapshot() {
        let state = ExecutorState::no_task_in_progress(BTreeSet::new(), [7].into_iter().collect());
        assert_eq!(state.phase, ExecutionPhase::NoTaskInProgress);
        assert!(state.task_summary.is_none());
        assert!(state.recently_removed_brokers.contains(&7));
    }

    #[test]
    fn test_starting_keeps_execution_id() {
        let id = Uuid::new_v4();
        let state = ExecutorState::starting(Some(id), BTreeSet::new(), BTreeSet::new());
        assert_eq!(state.phase, ExecutionPhase::StartingExecution);
        assert_eq!(state.execution_id, Some(id));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(
            ExecutionPhase::ReplicaMovementTaskInProgress.to_string(),
            "replica_movement_task_in_progress"
        );
    }
}
