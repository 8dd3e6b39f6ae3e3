//! Execution proposals produced by an upstream optimizer.

use crate::types::{BrokerId, TopicPartition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A desired post-move state for one partition.
///
/// A proposal rewrites the replica set and/or the leader of a single
/// partition. It is immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionProposal {
    /// Partition this proposal applies to.
    pub partition: TopicPartition,
    /// Replica list before the move, in order.
    pub old_replicas: Vec<BrokerId>,
    /// Replica list after the move, in order.
    pub new_replicas: Vec<BrokerId>,
    /// Leader before the move.
    pub old_leader: BrokerId,
    /// Leader after the move.
    pub new_leader: BrokerId,
    /// Estimated data to move, in megabytes.
    pub data_to_move_mb: u64,
}

impl ExecutionProposal {
    /// Create a proposal.
    pub fn new(
        partition: TopicPartition,
        old_replicas: Vec<BrokerId>,
        new_replicas: Vec<BrokerId>,
        old_leader: BrokerId,
        new_leader: BrokerId,
        data_to_move_mb: u64,
    ) -> Self {
        Self {
            partition,
            old_replicas,
            new_replicas,
            old_leader,
            new_leader,
            data_to_move_mb,
        }
    }

    /// The move completed: the observed ordered replica list equals the
    /// new replica list.
    pub fn is_completed(&self, current_ordered_replicas: &[BrokerId]) -> bool {
        self.new_replicas == current_ordered_replicas
    }

    /// The move was rolled back: the observed ordered replica list equals
    /// the old replica list.
    pub fn is_aborted(&self, current_ordered_replicas: &[BrokerId]) -> bool {
        self.old_replicas == current_ordered_replicas
    }

    /// Whether this proposal changes the replica set.
    pub fn has_replica_action(&self) -> bool {
        self.old_replicas != self.new_replicas
    }

    /// Whether this proposal changes the leader.
    pub fn has_leader_action(&self) -> bool {
        self.old_leader != self.new_leader
    }

    /// Brokers involved in the replica move: everything in the old or new
    /// replica list.
    pub fn involved_brokers(&self) -> BTreeSet<BrokerId> {
        self.old_replicas
            .iter()
            .chain(self.new_replicas.iter())
            .copied()
            .collect()
    }
}

impl fmt::Display for ExecutionProposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:?} -> {:?}, leader {} -> {}, {} MB",
            self.partition,
            self.old_replicas,
            self.new_replicas,
            self.old_leader,
            self.new_leader,
            self.data_to_move_mb
        )
    }
}
