//! Execution tasks and their state machine.

use crate::executor::proposal::ExecutionProposal;
use crate::types::TopicPartition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskKind {
    /// Rewrite a partition's replica set.
    ReplicaAction,
    /// Move a partition's leadership to the preferred replica.
    LeaderAction,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::ReplicaAction => write!(f, "replica_action"),
            TaskKind::LeaderAction => write!(f, "leader_action"),
        }
    }
}

/// State of an execution task.
///
/// Legal transitions:
///
/// ```text
/// Pending ──► InProgress ──► Completed
///                  │
///                  ├──► Aborting ──► Aborted
///                  │                    │
///                  └──► Dead ◄──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskState {
    /// Not yet dispatched.
    Pending,
    /// Dispatched to the control plane.
    InProgress,
    /// Being drained after the partition disappeared mid-flight.
    Aborting,
    /// Drained; the move no longer applies.
    Aborted,
    /// The move can never finish; no forward progress or rollback is
    /// attempted.
    Dead,
    /// The cluster reached the proposed state.
    Completed,
}

impl TaskState {
    /// Whether a task in this state never transitions again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Aborted | TaskState::Dead)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::InProgress => write!(f, "in_progress"),
            TaskState::Aborting => write!(f, "aborting"),
            TaskState::Aborted => write!(f, "aborted"),
            TaskState::Dead => write!(f, "dead"),
            TaskState::Completed => write!(f, "completed"),
        }
    }
}

/// Stable task identity: one proposal, one kind. Re-submission of the same
/// identity is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId {
    /// Partition the task operates on.
    pub partition: TopicPartition,
    /// Kind of work.
    pub kind: TaskKind,
}

/// Unit of work for one proposal and one action kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTask {
    /// Stable identity.
    pub id: TaskId,
    /// The proposal being executed.
    pub proposal: ExecutionProposal,
    /// Current state.
    pub state: TaskState,
    /// When the task entered `InProgress`, in milliseconds since the
    /// Unix epoch. `None` while pending.
    pub start_time_ms: Option<u64>,
}

impl ExecutionTask {
    /// Create a pending task for a proposal.
    pub fn new(kind: TaskKind, proposal: ExecutionProposal) -> Self {
        Self {
            id: TaskId {
                partition: proposal.partition.clone(),
                kind,
            },
            proposal,
            state: TaskState::Pending,
            start_time_ms: None,
        }
    }

    /// Kind of work this task performs.
    pub fn kind(&self) -> TaskKind {
        self.id.kind
    }

    /// Partition this task operates on.
    pub fn partition(&self) -> &TopicPartition {
        &self.id.partition
    }

    /// Whether the task can still transition.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

impl fmt::Display for ExecutionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] {}", self.id.kind, self.state, self.proposal)
    }
}
