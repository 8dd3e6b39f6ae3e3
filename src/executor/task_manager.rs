//! Task set ownership and concurrency bookkeeping for one execution.

use crate::cluster::ClusterView;
use crate::executor::proposal::ExecutionProposal;
use crate::executor::strategy::{self, ReplicaMovementStrategy};
use crate::executor::task::{ExecutionTask, TaskId, TaskKind, TaskState};
use crate::types::BrokerId;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// Point-in-time summary of the task set, used by the execution loop and
/// published inside executor state snapshots.
#[derive(Debug, Clone, Default)]
pub struct ExecutionTasksSummary {
    /// Number of tasks per state.
    pub task_count_by_state: BTreeMap<TaskState, usize>,
    /// Pending replica movements, in execution order.
    pub remaining_replica_movements: Vec<ExecutionTask>,
    /// Pending leadership movements, in execution order.
    pub remaining_leadership_movements: Vec<ExecutionTask>,
    /// Tasks that are in progress or aborting.
    pub in_execution_tasks: Vec<ExecutionTask>,
    /// Tasks that are in progress.
    pub in_progress_tasks: Vec<ExecutionTask>,
    /// Number of aborting tasks.
    pub aborting_tasks: usize,
    /// Tasks drained to aborted.
    pub aborted_tasks: Vec<ExecutionTask>,
    /// Tasks that died.
    pub dead_tasks: Vec<ExecutionTask>,
    /// Megabytes still waiting to move.
    pub remaining_data_to_move_mb: u64,
    /// Megabytes currently moving.
    pub in_execution_data_to_move_mb: u64,
}

#[derive(Debug, Default)]
struct TaskSet {
    tasks: HashMap<TaskId, ExecutionTask>,
    /// Pending replica-action ids in strategy order.
    pending_replica: Vec<TaskId>,
    /// Pending leader-action ids in proposal order.
    pending_leader: Vec<TaskId>,
    /// In-progress and aborting ids.
    in_execution: BTreeSet<TaskId>,
    /// Brokers whose in-flight counts are not checked against the cap.
    skip_cap_brokers: HashSet<BrokerId>,
    /// Per-broker count of in-flight replica actions.
    in_flight_by_broker: HashMap<BrokerId, usize>,
    remaining_data_mb: u64,
    in_execution_data_mb: u64,
    requested_partition_concurrency: Option<usize>,
    requested_leadership_concurrency: Option<usize>,
}

/// Owns the full set of tasks for an execution, tracks per-broker
/// in-flight counts, issues the next batch under the concurrency caps,
/// and transitions task states.
///
/// Caps are per-execution and may be changed mid-execution; a new value
/// applies at the next batch selection.
#[derive(Debug)]
pub struct TaskManager {
    default_partition_concurrency: usize,
    default_leadership_concurrency: usize,
    strategy_chain: Vec<Box<dyn ReplicaMovementStrategy>>,
    inner: RwLock<TaskSet>,
}

impl TaskManager {
    /// Create a manager with the given default caps and strategy chain.
    pub fn new(
        partition_movement_concurrency: usize,
        leadership_movement_concurrency: usize,
        strategy_identifiers: &[String],
    ) -> Self {
        Self {
            default_partition_concurrency: partition_movement_concurrency,
            default_leadership_concurrency: leadership_movement_concurrency,
            strategy_chain: strategy::resolve(strategy_identifiers),
            inner: RwLock::new(TaskSet::default()),
        }
    }

    /// Convert proposals into tasks.
    ///
    /// A proposal whose replica set changes produces one replica-action
    /// task. A proposal whose replica set is unchanged but whose leader
    /// changes produces one leader-action task, and only when the new
    /// leader is already in the ISR; a destination outside the ISR can
    /// never win the election.
    pub fn add_execution_proposals(
        &self,
        proposals: Vec<ExecutionProposal>,
        brokers_to_skip_cap: &HashSet<BrokerId>,
        cluster: &ClusterView,
    ) {
        let mut inner = self.inner.write();
        inner.skip_cap_brokers = brokers_to_skip_cap.clone();

        let mut replica_tasks = Vec::new();
        for proposal in proposals {
            if proposal.has_replica_action() {
                let task = ExecutionTask::new(TaskKind::ReplicaAction, proposal);
                replica_tasks.push(task);
            } else if proposal.has_leader_action() {
                let in_isr = cluster
                    .partition(&proposal.partition)
                    .map(|p| p.is_in_isr(proposal.new_leader))
                    .unwrap_or(false);
                if !in_isr {
                    warn!(
                        partition = %proposal.partition,
                        new_leader = proposal.new_leader,
                        "Skipping leadership movement: destination is not in the ISR"
                    );
                    continue;
                }
                let task = ExecutionTask::new(TaskKind::LeaderAction, proposal);
                inner.pending_leader.push(task.id.clone());
                inner.tasks.insert(task.id.clone(), task);
            }
        }

        strategy::order_tasks(&mut replica_tasks, &self.strategy_chain);
        for task in replica_tasks {
            inner.remaining_data_mb += task.proposal.data_to_move_mb;
            inner.pending_replica.push(task.id.clone());
            inner.tasks.insert(task.id.clone(), task);
        }

        debug!(
            replica_movements = inner.pending_replica.len(),
            leadership_movements = inner.pending_leader.len(),
            remaining_data_mb = inner.remaining_data_mb,
            "Added execution proposals"
        );
    }

    /// Next replica-movement batch: the largest prefix of the
    /// strategy-ordered pending tasks for which every involved broker
    /// stays under the per-broker cap. Skip-cap brokers are not counted.
    pub fn replica_movement_tasks(&self) -> Vec<ExecutionTask> {
        let inner = self.inner.read();
        let cap = inner
            .requested_partition_concurrency
            .unwrap_or(self.default_partition_concurrency);

        let mut counts = inner.in_flight_by_broker.clone();
        let mut batch = Vec::new();
        for id in &inner.pending_replica {
            let task = &inner.tasks[id];
            let involved: Vec<BrokerId> = task
                .proposal
                .involved_brokers()
                .into_iter()
                .filter(|b| !inner.skip_cap_brokers.contains(b))
                .collect();
            if involved.iter().any(|b| counts.get(b).copied().unwrap_or(0) >= cap) {
                break;
            }
            for b in involved {
                *counts.entry(b).or_insert(0) += 1;
            }
            batch.push(task.clone());
        }
        batch
    }

    /// Next leadership-movement batch, up to the leadership cap minus what
    /// is already in flight.
    pub fn leadership_movement_tasks(&self) -> Vec<ExecutionTask> {
        let inner = self.inner.read();
        let cap = inner
            .requested_leadership_concurrency
            .unwrap_or(self.default_leadership_concurrency);
        let in_flight = inner
            .in_execution
            .iter()
            .filter(|id| id.kind == TaskKind::LeaderAction)
            .count();
        let budget = cap.saturating_sub(in_flight);

        inner
            .pending_leader
            .iter()
            .take(budget)
            .map(|id| inner.tasks[id].clone())
            .collect()
    }

    /// Transition pending tasks to in-progress and stamp their start time.
    /// Tasks that are not pending are left untouched, which makes
    /// re-submission of an already-dispatched batch a no-op.
    pub fn mark_tasks_in_progress(&self, tasks: &[ExecutionTask], now_ms: u64) {
        let mut inner = self.inner.write();
        for task in tasks {
            let id = task.id.clone();
            let entry = match inner.tasks.get(&id) {
                Some(t) => t,
                None => {
                    warn!(task = %task, "Ignoring unknown task");
                    continue;
                }
            };
            if entry.state != TaskState::Pending {
                continue;
            }

            let data_mb = entry.proposal.data_to_move_mb;
            let involved: Vec<BrokerId> = entry
                .proposal
                .involved_brokers()
                .into_iter()
                .filter(|b| !inner.skip_cap_brokers.contains(b))
                .collect();

            match id.kind {
                TaskKind::ReplicaAction => {
                    inner.pending_replica.retain(|p| p != &id);
                    inner.remaining_data_mb -= data_mb;
                    inner.in_execution_data_mb += data_mb;
                    for b in involved {
                        *inner.in_flight_by_broker.entry(b).or_insert(0) += 1;
                    }
                }
                TaskKind::LeaderAction => {
                    inner.pending_leader.retain(|p| p != &id);
                }
            }

            inner.in_execution.insert(id.clone());
            if let Some(entry) = inner.tasks.get_mut(&id) {
                entry.state = TaskState::InProgress;
                entry.start_time_ms = Some(now_ms);
            }
        }
    }

    /// Transition a task that finished: in-progress becomes completed,
    /// aborting becomes aborted, dead stays dead.
    pub fn mark_task_done(&self, id: &TaskId) {
        let mut inner = self.inner.write();
        let state = match inner.tasks.get(id) {
            Some(t) => t.state,
            None => return,
        };
        match state {
            TaskState::InProgress => Self::finish(&mut inner, id, TaskState::Completed),
            TaskState::Aborting => Self::finish(&mut inner, id, TaskState::Aborted),
            TaskState::Dead => {}
            other => warn!(task = %id.partition, state = %other, "mark_task_done on unexpected state"),
        }
    }

    /// Transition an in-progress task to aborting.
    pub fn mark_task_aborting(&self, id: &TaskId) {
        let mut inner = self.inner.write();
        if let Some(task) = inner.tasks.get_mut(id) {
            if task.state == TaskState::InProgress {
                task.state = TaskState::Aborting;
            }
        }
    }

    /// Transition any non-terminal task to dead.
    pub fn mark_task_dead(&self, id: &TaskId) {
        let mut inner = self.inner.write();
        let state = match inner.tasks.get(id) {
            Some(t) => t.state,
            None => return,
        };
        if state.is_terminal() {
            return;
        }
        if state == TaskState::Pending {
            // Drop from the pending queues before killing it.
            let data_mb = inner.tasks[id].proposal.data_to_move_mb;
            match id.kind {
                TaskKind::ReplicaAction => {
                    inner.pending_replica.retain(|p| p != id);
                    inner.remaining_data_mb -= data_mb;
                }
                TaskKind::LeaderAction => {
                    inner.pending_leader.retain(|p| p != id);
                }
            }
            if let Some(task) = inner.tasks.get_mut(id) {
                task.state = TaskState::Dead;
            }
        } else {
            Self::finish(&mut inner, id, TaskState::Dead);
        }
    }

    /// Remove an in-flight task from the execution bookkeeping and park it
    /// in a terminal state.
    fn finish(inner: &mut TaskSet, id: &TaskId, terminal: TaskState) {
        debug_assert!(terminal.is_terminal());
        if !inner.in_execution.remove(id) {
            return;
        }
        let task = match inner.tasks.get(id) {
            Some(task) => task,
            None => return,
        };
        let data_mb = task.proposal.data_to_move_mb;
        let involved: Vec<BrokerId> = task
            .proposal
            .involved_brokers()
            .into_iter()
            .filter(|b| !inner.skip_cap_brokers.contains(b))
            .collect();
        if id.kind == TaskKind::ReplicaAction {
            inner.in_execution_data_mb -= data_mb;
            for b in involved {
                if let Some(count) = inner.in_flight_by_broker.get_mut(&b) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        inner.in_flight_by_broker.remove(&b);
                    }
                }
            }
        }
        if let Some(task) = inner.tasks.get_mut(id) {
            task.state = terminal;
        }
    }

    /// Tasks in progress or aborting, optionally filtered by kind.
    pub fn in_execution_tasks(&self, kind: Option<TaskKind>) -> Vec<ExecutionTask> {
        let inner = self.inner.read();
        inner
            .in_execution
            .iter()
            .filter(|id| kind.map_or(true, |k| id.kind == k))
            .map(|id| inner.tasks[id].clone())
            .collect()
    }

    /// Tasks in progress.
    pub fn in_progress_tasks(&self) -> Vec<ExecutionTask> {
        let inner = self.inner.read();
        inner
            .in_execution
            .iter()
            .map(|id| &inner.tasks[id])
            .filter(|t| t.state == TaskState::InProgress)
            .cloned()
            .collect()
    }

    /// Pending replica movements in execution order.
    pub fn remaining_replica_movements(&self) -> Vec<ExecutionTask> {
        let inner = self.inner.read();
        inner
            .pending_replica
            .iter()
            .map(|id| inner.tasks[id].clone())
            .collect()
    }

    /// Pending leadership movements in execution order.
    pub fn remaining_leadership_movements(&self) -> Vec<ExecutionTask> {
        let inner = self.inner.read();
        inner
            .pending_leader
            .iter()
            .map(|id| inner.tasks[id].clone())
            .collect()
    }

    /// Megabytes still waiting to move.
    pub fn remaining_data_to_move_mb(&self) -> u64 {
        self.inner.read().remaining_data_mb
    }

    /// Megabytes currently moving.
    pub fn in_execution_data_to_move_mb(&self) -> u64 {
        self.inner.read().in_execution_data_mb
    }

    /// Effective per-broker partition movement cap.
    pub fn partition_movement_concurrency(&self) -> usize {
        self.inner
            .read()
            .requested_partition_concurrency
            .unwrap_or(self.default_partition_concurrency)
    }

    /// Effective leadership movement cap.
    pub fn leadership_movement_concurrency(&self) -> usize {
        self.inner
            .read()
            .requested_leadership_concurrency
            .unwrap_or(self.default_leadership_concurrency)
    }

    /// Override the per-broker partition movement cap from the next batch
    /// selection on. `None` restores the configured default.
    pub fn set_requested_partition_movement_concurrency(&self, n: Option<usize>) {
        self.inner.write().requested_partition_concurrency = n;
    }

    /// Override the leadership movement cap from the next batch selection
    /// on. `None` restores the configured default.
    pub fn set_requested_leadership_movement_concurrency(&self, n: Option<usize>) {
        self.inner.write().requested_leadership_concurrency = n;
    }

    /// Build a point-in-time summary of the task set.
    pub fn execution_tasks_summary(&self) -> ExecutionTasksSummary {
        let inner = self.inner.read();
        let mut task_count_by_state = BTreeMap::new();
        let mut aborted_tasks = Vec::new();
        let mut dead_tasks = Vec::new();
        let mut aborting_tasks = 0;
        for task in inner.tasks.values() {
            *task_count_by_state.entry(task.state).or_insert(0) += 1;
            match task.state {
                TaskState::Aborted => aborted_tasks.push(task.clone()),
                TaskState::Dead => dead_tasks.push(task.clone()),
                TaskState::Aborting => aborting_tasks += 1,
                _ => {}
            }
        }

        let in_execution_tasks: Vec<ExecutionTask> = inner
            .in_execution
            .iter()
            .map(|id| inner.tasks[id].clone())
            .collect();
        let in_progress_tasks = in_execution_tasks
            .iter()
            .filter(|t| t.state == TaskState::InProgress)
            .cloned()
            .collect();

        ExecutionTasksSummary {
            task_count_by_state,
            remaining_replica_movements: inner
                .pending_replica
                .iter()
                .map(|id| inner.tasks[id].clone())
                .collect(),
            remaining_leadership_movements: inner
                .pending_leader
                .iter()
                .map(|id| inner.tasks[id].clone())
                .collect(),
            in_execution_tasks,
            in_progress_tasks,
            aborting_tasks,
            aborted_tasks,
            dead_tasks,
            remaining_data_to_move_mb: inner.remaining_data_mb,
            in_execution_data_to_move_mb: inner.in_execution_data_mb,
        }
    }

    /// Drop all tasks and reset counters.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        *inner = TaskSet::default();
    }
}
